// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the embedding service boundary.

use thiserror::Error;

/// Errors returned by [`crate::service::EmbeddingService`].
///
/// Validation variants describe bad input; the rest wrap failures from the
/// model or the store.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Missing 'text' in request body")]
    MissingText,

    #[error("Text cannot be empty")]
    EmptyText,

    #[error("'k' must be an integer between 1 and {max}, got {got}")]
    InvalidK { got: String, max: usize },

    #[error("Invalid '{field}': expected {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },

    #[error("embedding failed: {0:#}")]
    Embedding(anyhow::Error),

    #[error("vector store failed: {0:#}")]
    Store(anyhow::Error),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ServiceError {
    /// Whether the error was caused by the caller's input.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ServiceError::MissingText
                | ServiceError::EmptyText
                | ServiceError::InvalidK { .. }
                | ServiceError::InvalidField { .. }
        )
    }
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_classification() {
        assert!(ServiceError::MissingText.is_validation());
        assert!(ServiceError::EmptyText.is_validation());
        assert!(ServiceError::InvalidK {
            got: "0".into(),
            max: 10
        }
        .is_validation());
        assert!(ServiceError::InvalidField {
            field: "filename",
            expected: "a string"
        }
        .is_validation());
        assert!(!ServiceError::Store(anyhow::anyhow!("disk full")).is_validation());
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            ServiceError::MissingText.to_string(),
            "Missing 'text' in request body"
        );
        assert_eq!(
            ServiceError::InvalidK {
                got: "0".into(),
                max: 10
            }
            .to_string(),
            "'k' must be an integer between 1 and 10, got 0"
        );
        assert_eq!(
            ServiceError::InvalidField {
                field: "chunk_number",
                expected: "a non-negative integer"
            }
            .to_string(),
            "Invalid 'chunk_number': expected a non-negative integer"
        );
        let err = ServiceError::Embedding(anyhow::anyhow!("inner").context("outer"));
        assert_eq!(err.to_string(), "embedding failed: outer: inner");
    }
}
