// Models module - artifacts of a specification project, their links, and integrity reports

pub mod api_contract;
pub mod dto_schema;
#[path = "enums.rs"]
pub mod enums;
pub mod graph;
pub mod issue;
pub mod link;
pub mod module;
pub mod project;
pub mod schema;
pub mod sequence_diagram;
pub mod use_case;

pub use api_contract::ApiContract;
pub use dto_schema::DtoSchema;
pub use enums::{
    ArtifactKind, DtoKind, DtoRole, HttpMethod, IssueType, ParseStatus, Severity,
};
pub use graph::ProjectGraph;
pub use issue::{ConsistencyIssue, ConsistencyReport, ReportStats, ResourceRef};
pub use link::{ApiDtoLink, ApiSequenceLink};
pub use module::Module;
pub use project::Project;
pub use schema::SchemaNode;
pub use sequence_diagram::SequenceDiagram;
pub use use_case::UseCase;
