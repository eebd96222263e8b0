//! Specification integrity engine.
//!
//! Allocates artifact codes, parses sequence diagrams, links diagram calls to
//! API contracts and checks a project's artifacts for consistency.

// API module: models, services and storage
pub mod api;

// Module hierarchy graph algorithms
pub mod graph;

// Re-export api modules at crate root
pub use api::config;
pub use api::error;
pub use api::models;
pub use api::observability;
pub use api::services;
pub use api::storage;
