// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared application state for the HTTP handlers.

use std::sync::Arc;

use crate::errors::ServiceResult;
use crate::service::EmbeddingService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<EmbeddingService>,
}

impl AppState {
    pub fn new(service: EmbeddingService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }

    /// Runs a blocking service call (model inference, SQLite I/O) on the
    /// blocking thread pool.
    pub async fn run_blocking<T, F>(&self, f: F) -> ServiceResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&EmbeddingService) -> ServiceResult<T> + Send + 'static,
    {
        let service = Arc::clone(&self.service);
        tokio::task::spawn_blocking(move || f(&service)).await?
    }
}
