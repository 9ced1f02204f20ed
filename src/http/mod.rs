// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP API for vecstash.
//!
//! Axum-based JSON API exposing health, embed, search and list-texts
//! endpoints over a shared [`crate::service::EmbeddingService`].

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;
