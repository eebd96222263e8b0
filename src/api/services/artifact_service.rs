//! Create, update and delete paths for specification artifacts.
//!
//! Every create obtains its code from the [`CodeAllocator`] before anything is
//! written. Diagram sources are parsed on every write so the stored parse status
//! always reflects the stored text.

use super::code_allocator::{AllocationRequest, CodeAllocator, normalize_domain};
use super::diagram_parser::DiagramParser;
use super::endpoint_matcher::EndpointMatcher;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::graph::would_create_cycle;
use crate::models::{
    ApiContract, ApiDtoLink, ApiSequenceLink, ArtifactKind, DtoKind, DtoRole, DtoSchema,
    HttpMethod, Module, Project, SchemaNode, SequenceDiagram, UseCase,
};
use crate::storage::{API_ENDPOINT_ENTITY, CounterStore, StorageBackend, StorageError};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

fn found<T>(value: Option<T>, entity_type: &str, id: Uuid) -> Result<T, StorageError> {
    value.ok_or_else(|| StorageError::not_found(entity_type, id))
}

/// Fields for a new API contract.
#[derive(Debug, Clone)]
pub struct NewApiContract {
    pub method: HttpMethod,
    pub endpoint: String,
    pub domain: Option<String>,
    pub description: Option<String>,
    pub request_spec: SchemaNode,
    pub response_spec: SchemaNode,
}

impl NewApiContract {
    pub fn new(method: HttpMethod, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            domain: None,
            description: None,
            request_spec: SchemaNode::Null,
            response_spec: SchemaNode::Null,
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_specs(mut self, request_spec: SchemaNode, response_spec: SchemaNode) -> Self {
        self.request_spec = request_spec;
        self.response_spec = response_spec;
        self
    }
}

#[derive(Clone)]
pub struct ArtifactService {
    storage: Arc<dyn StorageBackend>,
    allocator: CodeAllocator,
    parser: DiagramParser,
}

impl ArtifactService {
    /// Service whose allocator draws counters from the same backend.
    pub fn new<S: StorageBackend + 'static>(storage: Arc<S>) -> Self {
        let counters: Arc<dyn CounterStore> = storage.clone();
        Self::with_allocator(storage, CodeAllocator::new(counters))
    }

    /// Service whose allocator uses the retry bound and backoff from `config`.
    pub fn with_config<S: StorageBackend + 'static>(storage: Arc<S>, config: &EngineConfig) -> Self {
        let counters: Arc<dyn CounterStore> = storage.clone();
        let allocator = CodeAllocator::with_config(counters, config.allocator.clone());
        Self::with_allocator(storage, allocator)
    }

    pub fn with_allocator(storage: Arc<dyn StorageBackend>, allocator: CodeAllocator) -> Self {
        Self {
            storage,
            allocator,
            parser: DiagramParser::new(),
        }
    }

    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    pub fn allocator(&self) -> &CodeAllocator {
        &self.allocator
    }

    async fn require_project(&self, project_id: Uuid) -> Result<Project, EngineError> {
        let project = self.storage.get_project(project_id).await?;
        Ok(found(project, "project", project_id)?)
    }

    pub async fn create_project(
        &self,
        name: &str,
        description: Option<String>,
    ) -> Result<Project, EngineError> {
        let mut project = Project::new(name.to_string());
        project.description = description;
        let project = self.storage.create_project(project).await?;
        info!("Created project {} ({})", project.name, project.id);
        Ok(project)
    }

    /// Create a module, optionally under `parent_id` in the same project.
    pub async fn create_module(
        &self,
        project_id: Uuid,
        title: &str,
        parent_id: Option<Uuid>,
    ) -> Result<Module, EngineError> {
        self.require_project(project_id).await?;
        if let Some(parent_id) = parent_id {
            let parent = self.storage.get_module(parent_id).await?;
            let parent = found(parent, "module", parent_id)?;
            if parent.project_id != project_id {
                return Err(StorageError::not_found("module", parent_id).into());
            }
        }

        let code = self
            .allocator
            .allocate(&AllocationRequest::new(project_id, ArtifactKind::Module))
            .await?;
        let mut module = Module::new(project_id, code, title.to_string());
        module.parent_id = parent_id;

        let module = self.storage.create_module(module).await?;
        info!("Created module {} in project {}", module.code, project_id);
        Ok(module)
    }

    /// Re-parent a module. A parent that is the module itself or one of its
    /// descendants is rejected.
    pub async fn move_module(
        &self,
        module_id: Uuid,
        new_parent: Option<Uuid>,
    ) -> Result<Module, EngineError> {
        let module = self.storage.get_module(module_id).await?;
        let mut module = found(module, "module", module_id)?;
        let siblings = self.storage.list_modules(module.project_id).await?;

        if let Some(parent_id) = new_parent {
            if !siblings.iter().any(|m| m.id == parent_id) {
                return Err(StorageError::not_found("module", parent_id).into());
            }
        }
        if would_create_cycle(&siblings, module_id, new_parent) {
            return Err(EngineError::HierarchyCycle {
                module_id,
                parent_id: new_parent.unwrap_or(module_id),
            });
        }

        module.parent_id = new_parent;
        module.updated_at = Utc::now();
        let module = self.storage.update_module(module).await?;
        info!("Moved module {} under {:?}", module.code, new_parent);
        Ok(module)
    }

    /// Delete a module with no child modules and no use cases.
    pub async fn delete_module(&self, module_id: Uuid) -> Result<(), EngineError> {
        let module = self.storage.get_module(module_id).await?;
        let module = found(module, "module", module_id)?;

        let (modules, use_cases) = tokio::try_join!(
            self.storage.list_modules(module.project_id),
            self.storage.list_use_cases(module.project_id),
        )?;
        let children = modules
            .iter()
            .filter(|m| m.parent_id == Some(module_id))
            .count();
        if children > 0 {
            return Err(EngineError::HasDependents {
                entity_type: "module",
                entity_id: module_id,
                dependent_type: "child modules",
                count: children,
            });
        }
        let owned = use_cases.iter().filter(|u| u.module_id == module_id).count();
        if owned > 0 {
            return Err(EngineError::HasDependents {
                entity_type: "module",
                entity_id: module_id,
                dependent_type: "use cases",
                count: owned,
            });
        }

        self.storage.delete_module(module_id).await?;
        info!("Deleted module {}", module.code);
        Ok(())
    }

    pub async fn create_use_case(
        &self,
        project_id: Uuid,
        module_id: Uuid,
        title: &str,
    ) -> Result<UseCase, EngineError> {
        let module = self.storage.get_module(module_id).await?;
        let module = found(module, "module", module_id)?;
        if module.project_id != project_id {
            return Err(StorageError::not_found("module", module_id).into());
        }

        let code = self
            .allocator
            .allocate(&AllocationRequest::new(project_id, ArtifactKind::UseCase))
            .await?;
        let use_case = UseCase::new(project_id, module_id, code, title.to_string());

        let use_case = self.storage.create_use_case(use_case).await?;
        info!("Created use case {} under module {}", use_case.code, module.code);
        Ok(use_case)
    }

    /// Delete a use case that owns no sequence diagrams.
    pub async fn delete_use_case(&self, use_case_id: Uuid) -> Result<(), EngineError> {
        let use_case = self.storage.get_use_case(use_case_id).await?;
        let use_case = found(use_case, "use_case", use_case_id)?;

        let diagrams = self.storage.list_sequence_diagrams(use_case.project_id).await?;
        let owned = diagrams
            .iter()
            .filter(|d| d.use_case_id == use_case_id)
            .count();
        if owned > 0 {
            return Err(EngineError::HasDependents {
                entity_type: "use_case",
                entity_id: use_case_id,
                dependent_type: "sequence diagrams",
                count: owned,
            });
        }

        self.storage.delete_use_case(use_case_id).await?;
        info!("Deleted use case {}", use_case.code);
        Ok(())
    }

    fn apply_source(&self, diagram: &mut SequenceDiagram, source: String) {
        let parsed = self.parser.parse(&source);
        diagram.source = source;
        diagram.set_parse_outcome((!parsed.success).then(|| parsed.error.unwrap_or_default()));
    }

    pub async fn create_sequence_diagram(
        &self,
        project_id: Uuid,
        use_case_id: Uuid,
        title: &str,
        source: &str,
    ) -> Result<SequenceDiagram, EngineError> {
        let use_case = self.storage.get_use_case(use_case_id).await?;
        let use_case = found(use_case, "use_case", use_case_id)?;
        if use_case.project_id != project_id {
            return Err(StorageError::not_found("use_case", use_case_id).into());
        }

        let code = self
            .allocator
            .allocate(&AllocationRequest::new(project_id, ArtifactKind::SequenceDiagram))
            .await?;
        let mut diagram = SequenceDiagram::new(project_id, use_case_id, code, title.to_string());
        self.apply_source(&mut diagram, source.to_string());

        let diagram = self.storage.create_sequence_diagram(diagram).await?;
        info!(
            "Created sequence diagram {} ({:?})",
            diagram.code, diagram.parse_status
        );
        Ok(diagram)
    }

    /// Replace a diagram's source and store the new parse outcome.
    pub async fn update_diagram_source(
        &self,
        sequence_id: Uuid,
        source: &str,
    ) -> Result<SequenceDiagram, EngineError> {
        let diagram = self.storage.get_sequence_diagram(sequence_id).await?;
        let mut diagram = found(diagram, "sequence_diagram", sequence_id)?;
        self.apply_source(&mut diagram, source.to_string());

        let diagram = self.storage.update_sequence_diagram(diagram).await?;
        info!(
            "Updated source of sequence diagram {} ({:?})",
            diagram.code, diagram.parse_status
        );
        Ok(diagram)
    }

    /// Parse the stored source again and store the outcome.
    pub async fn reparse_diagram(&self, sequence_id: Uuid) -> Result<SequenceDiagram, EngineError> {
        let diagram = self.storage.get_sequence_diagram(sequence_id).await?;
        let mut diagram = found(diagram, "sequence_diagram", sequence_id)?;
        let source = std::mem::take(&mut diagram.source);
        self.apply_source(&mut diagram, source);

        let diagram = self.storage.update_sequence_diagram(diagram).await?;
        info!(
            "Re-parsed sequence diagram {} ({:?})",
            diagram.code, diagram.parse_status
        );
        Ok(diagram)
    }

    /// Store the formatted form of the diagram's source.
    pub async fn format_diagram_source(
        &self,
        sequence_id: Uuid,
    ) -> Result<SequenceDiagram, EngineError> {
        let diagram = self.storage.get_sequence_diagram(sequence_id).await?;
        let mut diagram = found(diagram, "sequence_diagram", sequence_id)?;
        let formatted = self.parser.format(&diagram.source);
        self.apply_source(&mut diagram, formatted);

        let diagram = self.storage.update_sequence_diagram(diagram).await?;
        info!("Formatted sequence diagram {}", diagram.code);
        Ok(diagram)
    }

    pub async fn delete_sequence_diagram(&self, sequence_id: Uuid) -> Result<(), EngineError> {
        self.storage.delete_sequence_diagram(sequence_id).await?;
        info!("Deleted sequence diagram {}", sequence_id);
        Ok(())
    }

    /// Create a contract; a second `(method, endpoint)` in the project is rejected,
    /// also when two writers race, since the backend enforces the pair as unique.
    pub async fn create_api_contract(
        &self,
        project_id: Uuid,
        input: NewApiContract,
    ) -> Result<ApiContract, EngineError> {
        self.require_project(project_id).await?;
        EndpointMatcher::compile(&input.endpoint)?;

        let existing = self.storage.list_api_contracts(project_id).await?;
        if existing
            .iter()
            .any(|a| a.method == input.method && a.endpoint == input.endpoint)
        {
            return Err(EngineError::DuplicateEndpoint {
                project_id,
                method: input.method.to_string(),
                endpoint: input.endpoint,
            });
        }

        let domain = normalize_domain(input.domain.as_deref().unwrap_or(""));
        let request = AllocationRequest::new(project_id, ArtifactKind::ApiContract)
            .with_scope(Some(&domain), None)
            .with_domain(&domain);
        let code = self.allocator.allocate(&request).await?;

        let mut api = ApiContract::new(project_id, code, input.method, input.endpoint);
        api.domain = Some(domain);
        api.description = input.description;
        api.request_spec = input.request_spec;
        api.response_spec = input.response_spec;

        let (method, endpoint) = (api.method, api.endpoint.clone());
        let api = match self.storage.create_api_contract(api).await {
            Ok(api) => api,
            // A concurrent writer took the same (method, endpoint) after the check above
            Err(e) if e.is_duplicate_of(API_ENDPOINT_ENTITY) => {
                return Err(EngineError::DuplicateEndpoint {
                    project_id,
                    method: method.to_string(),
                    endpoint,
                });
            }
            Err(e) => return Err(e.into()),
        };
        info!("Created API contract {} ({})", api.code, api.signature());
        Ok(api)
    }

    pub async fn delete_api_contract(&self, api_id: Uuid) -> Result<(), EngineError> {
        self.storage.delete_api_contract(api_id).await?;
        info!("Deleted API contract {}", api_id);
        Ok(())
    }

    pub async fn create_dto_schema(
        &self,
        project_id: Uuid,
        name: &str,
        kind: DtoKind,
        domain: Option<&str>,
        schema: SchemaNode,
    ) -> Result<DtoSchema, EngineError> {
        self.require_project(project_id).await?;

        let domain = normalize_domain(domain.unwrap_or(""));
        let request = AllocationRequest::new(project_id, ArtifactKind::DtoSchema)
            .with_scope(Some(&domain), None)
            .with_domain(&domain);
        let code = self.allocator.allocate(&request).await?;

        let mut dto = DtoSchema::new(project_id, code, name.to_string(), kind);
        dto.domain = Some(domain);
        dto.schema = schema;

        let dto = self.storage.create_dto_schema(dto).await?;
        info!("Created {} DTO {} ({})", dto.kind, dto.code, dto.name);
        Ok(dto)
    }

    pub async fn delete_dto_schema(&self, dto_id: Uuid) -> Result<(), EngineError> {
        self.storage.delete_dto_schema(dto_id).await?;
        info!("Deleted DTO schema {}", dto_id);
        Ok(())
    }

    /// Link a contract to a diagram by hand. A repeated link is `Duplicate`.
    pub async fn link_api_sequence(
        &self,
        api_id: Uuid,
        sequence_id: Uuid,
        step: Option<(String, u32)>,
    ) -> Result<ApiSequenceLink, EngineError> {
        let (api, diagram) = tokio::try_join!(
            self.storage.get_api_contract(api_id),
            self.storage.get_sequence_diagram(sequence_id),
        )?;
        let api = found(api, "api_contract", api_id)?;
        let diagram = found(diagram, "sequence_diagram", sequence_id)?;

        let mut link = ApiSequenceLink::new(api.id, diagram.id);
        if let Some((step_ref, line_number)) = step {
            link = link.at_step(step_ref, line_number);
        }

        let link = self.storage.create_api_sequence_link(link).await?;
        info!("Linked API {} to sequence diagram {}", api.code, diagram.code);
        Ok(link)
    }

    /// Link a DTO to a contract; `req` needs a request DTO and `res` a response DTO.
    pub async fn link_api_dto(
        &self,
        api_id: Uuid,
        dto_id: Uuid,
        role: DtoRole,
    ) -> Result<ApiDtoLink, EngineError> {
        let (api, dto) = tokio::try_join!(
            self.storage.get_api_contract(api_id),
            self.storage.get_dto_schema(dto_id),
        )?;
        let api = found(api, "api_contract", api_id)?;
        let dto = found(dto, "dto_schema", dto_id)?;

        if dto.kind != role.required_kind() {
            return Err(EngineError::DtoRoleMismatch {
                dto_id,
                role: role.to_string(),
                kind: dto.kind.to_string(),
            });
        }

        let link = self
            .storage
            .create_api_dto_link(ApiDtoLink::new(api.id, dto.id, role))
            .await?;
        info!("Linked DTO {} to API {} as {}", dto.code, api.code, role);
        Ok(link)
    }
}
