//! Engine error types.
//!
//! Diagram validation problems and consistency findings are returned as data and
//! never show up here.

use crate::storage::StorageError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Counter increments kept conflicting until the retry bound ran out
    #[error("Code allocation failed for {key} after {attempts} attempts: {source}")]
    AllocationFailed {
        key: String,
        attempts: u32,
        #[source]
        source: StorageError,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Invalid path template '{template}': {message}")]
    InvalidTemplate { template: String, message: String },
    #[error("Moving module {module_id} under {parent_id} would create a cycle")]
    HierarchyCycle { module_id: Uuid, parent_id: Uuid },
    #[error("Cannot delete {entity_type} {entity_id}: {count} {dependent_type} still attached")]
    HasDependents {
        entity_type: &'static str,
        entity_id: Uuid,
        dependent_type: &'static str,
        count: usize,
    },
    #[error("DTO {dto_id} is a {kind} schema and cannot be linked with role '{role}'")]
    DtoRoleMismatch {
        dto_id: Uuid,
        role: String,
        kind: String,
    },
    #[error("Endpoint {method} {endpoint} already exists in project {project_id}")]
    DuplicateEndpoint {
        project_id: Uuid,
        method: String,
        endpoint: String,
    },
}

impl EngineError {
    pub fn is_allocation_failure(&self) -> bool {
        matches!(self, EngineError::AllocationFailed { .. })
    }
}
