//! Storage trait definitions for the storage backends.

use super::StorageError;
use crate::models::{
    ApiContract, ApiDtoLink, ApiSequenceLink, ArtifactKind, DtoSchema, Module, Project,
    ProjectGraph, SequenceDiagram, UseCase,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifies one counter sequence: project, artifact kind and up to two scope strings.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CounterKey {
    pub project_id: Uuid,
    pub artifact_kind: ArtifactKind,
    pub scope_ref1: Option<String>,
    pub scope_ref2: Option<String>,
}

impl CounterKey {
    pub fn new(project_id: Uuid, artifact_kind: ArtifactKind) -> Self {
        Self {
            project_id,
            artifact_kind,
            scope_ref1: None,
            scope_ref2: None,
        }
    }

    pub fn scoped(mut self, scope_ref1: Option<&str>, scope_ref2: Option<&str>) -> Self {
        self.scope_ref1 = scope_ref1.map(str::to_string);
        self.scope_ref2 = scope_ref2.map(str::to_string);
        self
    }
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.project_id,
            self.artifact_kind,
            self.scope_ref1.as_deref().unwrap_or("-"),
            self.scope_ref2.as_deref().unwrap_or("-")
        )
    }
}

/// Atomic increment-or-create over persisted sequence counters.
#[async_trait::async_trait]
pub trait CounterStore: Send + Sync {
    /// Return the next number for `key` and advance the counter.
    ///
    /// A missing counter is created so that the first call returns 1 and leaves
    /// `next_number = 2`. Implementations must be serializable across processes and
    /// report lost races as `StorageError::Conflict` or `StorageError::Duplicate`.
    async fn increment_counter(&self, key: &CounterKey) -> Result<i64, StorageError>;
}

/// Storage backend trait for specification artifacts.
#[async_trait::async_trait]
pub trait StorageBackend: CounterStore {
    /// Get project by ID
    async fn get_project(&self, project_id: Uuid) -> Result<Option<Project>, StorageError>;

    /// Create a new project
    async fn create_project(&self, project: Project) -> Result<Project, StorageError>;

    async fn get_module(&self, module_id: Uuid) -> Result<Option<Module>, StorageError>;

    async fn create_module(&self, module: Module) -> Result<Module, StorageError>;

    async fn update_module(&self, module: Module) -> Result<Module, StorageError>;

    async fn delete_module(&self, module_id: Uuid) -> Result<(), StorageError>;

    /// List modules in a project, ordered by code
    async fn list_modules(&self, project_id: Uuid) -> Result<Vec<Module>, StorageError>;

    async fn get_use_case(&self, use_case_id: Uuid) -> Result<Option<UseCase>, StorageError>;

    async fn create_use_case(&self, use_case: UseCase) -> Result<UseCase, StorageError>;

    async fn delete_use_case(&self, use_case_id: Uuid) -> Result<(), StorageError>;

    async fn list_use_cases(&self, project_id: Uuid) -> Result<Vec<UseCase>, StorageError>;

    async fn get_sequence_diagram(
        &self,
        sequence_id: Uuid,
    ) -> Result<Option<SequenceDiagram>, StorageError>;

    async fn create_sequence_diagram(
        &self,
        diagram: SequenceDiagram,
    ) -> Result<SequenceDiagram, StorageError>;

    async fn update_sequence_diagram(
        &self,
        diagram: SequenceDiagram,
    ) -> Result<SequenceDiagram, StorageError>;

    /// Delete a diagram together with its API links
    async fn delete_sequence_diagram(&self, sequence_id: Uuid) -> Result<(), StorageError>;

    async fn list_sequence_diagrams(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<SequenceDiagram>, StorageError>;

    async fn get_api_contract(&self, api_id: Uuid) -> Result<Option<ApiContract>, StorageError>;

    async fn create_api_contract(&self, api: ApiContract) -> Result<ApiContract, StorageError>;

    /// Delete a contract together with its sequence and DTO links
    async fn delete_api_contract(&self, api_id: Uuid) -> Result<(), StorageError>;

    async fn list_api_contracts(&self, project_id: Uuid)
    -> Result<Vec<ApiContract>, StorageError>;

    async fn get_dto_schema(&self, dto_id: Uuid) -> Result<Option<DtoSchema>, StorageError>;

    async fn create_dto_schema(&self, dto: DtoSchema) -> Result<DtoSchema, StorageError>;

    /// Delete a DTO together with its API links
    async fn delete_dto_schema(&self, dto_id: Uuid) -> Result<(), StorageError>;

    async fn list_dto_schemas(&self, project_id: Uuid) -> Result<Vec<DtoSchema>, StorageError>;

    /// Create a sequence link; a repeated `(api_id, sequence_id, step_ref)` is `Duplicate`
    async fn create_api_sequence_link(
        &self,
        link: ApiSequenceLink,
    ) -> Result<ApiSequenceLink, StorageError>;

    /// List sequence links whose contract belongs to the project
    async fn list_api_sequence_links(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<ApiSequenceLink>, StorageError>;

    /// Create a DTO link; a repeated `(api_id, dto_id, role)` is `Duplicate`
    async fn create_api_dto_link(&self, link: ApiDtoLink) -> Result<ApiDtoLink, StorageError>;

    /// List DTO links whose contract belongs to the project
    async fn list_api_dto_links(&self, project_id: Uuid) -> Result<Vec<ApiDtoLink>, StorageError>;

    /// Load every artifact and link of a project in one snapshot.
    async fn load_project_graph(&self, project_id: Uuid) -> Result<ProjectGraph, StorageError> {
        let (modules, use_cases, sequence_diagrams, api_contracts, dto_schemas) = tokio::try_join!(
            self.list_modules(project_id),
            self.list_use_cases(project_id),
            self.list_sequence_diagrams(project_id),
            self.list_api_contracts(project_id),
            self.list_dto_schemas(project_id),
        )?;
        let (sequence_links, dto_links) = tokio::try_join!(
            self.list_api_sequence_links(project_id),
            self.list_api_dto_links(project_id),
        )?;

        Ok(ProjectGraph {
            project_id,
            modules,
            use_cases,
            sequence_diagrams,
            api_contracts,
            dto_schemas,
            sequence_links,
            dto_links,
        })
    }
}
