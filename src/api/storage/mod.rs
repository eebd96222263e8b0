//! Storage module for the engine.
//!
//! Provides the persistence collaborator traits plus PostgreSQL and in-memory backends.

pub mod error;
pub mod traits;

// Storage backend implementations
pub mod memory;
pub mod postgres;

pub use error::{API_ENDPOINT_ENTITY, StorageError};
pub use memory::MemoryStorageBackend;
pub use postgres::PostgresStorageBackend;
pub use traits::{CounterKey, CounterStore, StorageBackend};
