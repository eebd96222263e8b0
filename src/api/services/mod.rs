//! Services module - allocation, parsing, matching, linking and consistency checks.

pub mod artifact_service;
pub mod code_allocator;
pub mod consistency_analyzer;
pub mod diagram_parser;
pub mod endpoint_matcher;
pub mod link_resolver;

// Re-export for convenience
pub use artifact_service::{ArtifactService, NewApiContract};
pub use code_allocator::{AllocationRequest, CodeAllocator, format_code, normalize_domain};
pub use consistency_analyzer::ConsistencyAnalyzer;
pub use diagram_parser::{
    DiagramParser, MessageArrow, ParsedCall, ParsedDiagram, ValidationResult,
};
pub use endpoint_matcher::{EndpointMatcher, strip_path_params};
pub use link_resolver::LinkResolver;
