//! Storage error types for the storage backends.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Entity type reported when a contract's `(method, endpoint)` is already taken.
pub const API_ENDPOINT_ENTITY: &str = "api_endpoint";

/// Storage operation errors.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageError {
    /// Entity not found
    #[error("Entity not found: {entity_type} with id {entity_id}")]
    NotFound {
        entity_type: String,
        entity_id: String,
    },
    /// Concurrent write lost a serializable or optimistic check
    #[error("Write conflict on {entity_type} {entity_id}: {message}")]
    Conflict {
        entity_type: String,
        entity_id: String,
        message: String,
    },
    /// Uniqueness violation
    #[error("Duplicate {entity_type}: {key}")]
    Duplicate { entity_type: String, key: String },
    /// Database connection error
    #[error("Connection error: {0}")]
    ConnectionError(String),
    /// General storage error
    #[error("Storage error: {0}")]
    Other(String),
}

impl StorageError {
    pub fn not_found(entity_type: &str, entity_id: impl ToString) -> Self {
        StorageError::NotFound {
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
        }
    }

    pub fn duplicate(entity_type: &str, key: impl Into<String>) -> Self {
        StorageError::Duplicate {
            entity_type: entity_type.to_string(),
            key: key.into(),
        }
    }

    /// A write failed because a record is still referenced, or references one that is gone
    pub fn referenced(entity_type: &str, entity_id: impl ToString, message: &str) -> Self {
        StorageError::Conflict {
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            message: message.to_string(),
        }
    }

    pub fn is_duplicate_of(&self, entity: &str) -> bool {
        matches!(self, StorageError::Duplicate { entity_type, .. } if entity_type == entity)
    }

    /// Transient failures worth retrying the whole operation for.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StorageError::Conflict { .. } | StorageError::Duplicate { .. }
        )
    }
}
