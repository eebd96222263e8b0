//! In-memory storage backend.
//!
//! Used by tests and by the offline CLI commands. Every operation takes the state
//! lock once, so counter increments are atomic within the process.

use super::{API_ENDPOINT_ENTITY, StorageError, traits::*};
use crate::models::{
    ApiContract, ApiDtoLink, ApiSequenceLink, DtoSchema, Module, Project, SequenceDiagram,
    UseCase,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    projects: Vec<Project>,
    modules: Vec<Module>,
    use_cases: Vec<UseCase>,
    sequence_diagrams: Vec<SequenceDiagram>,
    api_contracts: Vec<ApiContract>,
    dto_schemas: Vec<DtoSchema>,
    sequence_links: Vec<ApiSequenceLink>,
    dto_links: Vec<ApiDtoLink>,
    /// Counter key -> next number to hand out
    counters: HashMap<CounterKey, i64>,
}

impl MemoryState {
    fn project_api_ids(&self, project_id: Uuid) -> Vec<Uuid> {
        self.api_contracts
            .iter()
            .filter(|a| a.project_id == project_id)
            .map(|a| a.id)
            .collect()
    }
}

/// In-memory storage backend implementation.
#[derive(Default)]
pub struct MemoryStorageBackend {
    state: RwLock<MemoryState>,
}

impl MemoryStorageBackend {
    /// Create an empty in-memory storage backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored `next_number` for a counter, if it exists.
    pub async fn counter_next_number(&self, key: &CounterKey) -> Option<i64> {
        self.state.read().await.counters.get(key).copied()
    }
}

/// Creation order, ties broken by code.
fn sorted_by_creation<T: Clone>(
    items: impl Iterator<Item = T>,
    key: impl Fn(&T) -> (DateTime<Utc>, &str),
) -> Vec<T> {
    let mut out: Vec<T> = items.collect();
    out.sort_by(|a, b| key(a).cmp(&key(b)));
    out
}

fn replace_by_id<T: Clone>(
    items: &mut [T],
    entity_type: &str,
    id: Uuid,
    id_of: impl Fn(&T) -> Uuid,
    value: T,
) -> Result<T, StorageError> {
    let slot = items
        .iter_mut()
        .find(|item| id_of(item) == id)
        .ok_or_else(|| StorageError::not_found(entity_type, id))?;
    *slot = value.clone();
    Ok(value)
}

fn remove_by_id<T>(
    items: &mut Vec<T>,
    entity_type: &str,
    id: Uuid,
    id_of: impl Fn(&T) -> Uuid,
) -> Result<(), StorageError> {
    let initial_len = items.len();
    items.retain(|item| id_of(item) != id);
    if items.len() < initial_len {
        Ok(())
    } else {
        Err(StorageError::not_found(entity_type, id))
    }
}

#[async_trait]
impl CounterStore for MemoryStorageBackend {
    async fn increment_counter(&self, key: &CounterKey) -> Result<i64, StorageError> {
        let mut state = self.state.write().await;
        let next_number = state.counters.entry(key.clone()).or_insert(1);
        let allocated = *next_number;
        *next_number += 1;
        Ok(allocated)
    }
}

#[async_trait]
impl StorageBackend for MemoryStorageBackend {
    async fn get_project(&self, project_id: Uuid) -> Result<Option<Project>, StorageError> {
        let state = self.state.read().await;
        Ok(state.projects.iter().find(|p| p.id == project_id).cloned())
    }

    async fn create_project(&self, project: Project) -> Result<Project, StorageError> {
        let mut state = self.state.write().await;
        if state.projects.iter().any(|p| p.id == project.id) {
            return Err(StorageError::duplicate("project", project.id.to_string()));
        }
        state.projects.push(project.clone());
        Ok(project)
    }

    async fn get_module(&self, module_id: Uuid) -> Result<Option<Module>, StorageError> {
        let state = self.state.read().await;
        Ok(state.modules.iter().find(|m| m.id == module_id).cloned())
    }

    async fn create_module(&self, module: Module) -> Result<Module, StorageError> {
        let mut state = self.state.write().await;
        if state
            .modules
            .iter()
            .any(|m| m.project_id == module.project_id && m.code == module.code)
        {
            return Err(StorageError::duplicate("module", module.code.clone()));
        }
        if let Some(parent_id) = module.parent_id {
            if !state.modules.iter().any(|m| m.id == parent_id) {
                return Err(StorageError::referenced(
                    "module",
                    module.id,
                    "parent module does not exist",
                ));
            }
        }
        state.modules.push(module.clone());
        Ok(module)
    }

    async fn update_module(&self, module: Module) -> Result<Module, StorageError> {
        let mut state = self.state.write().await;
        replace_by_id(&mut state.modules, "module", module.id, |m| m.id, module)
    }

    async fn delete_module(&self, module_id: Uuid) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        if state.modules.iter().any(|m| m.parent_id == Some(module_id))
            || state.use_cases.iter().any(|u| u.module_id == module_id)
        {
            return Err(StorageError::referenced(
                "module",
                module_id,
                "still referenced by child modules or use cases",
            ));
        }
        remove_by_id(&mut state.modules, "module", module_id, |m| m.id)
    }

    async fn list_modules(&self, project_id: Uuid) -> Result<Vec<Module>, StorageError> {
        let state = self.state.read().await;
        Ok(sorted_by_creation(
            state
                .modules
                .iter()
                .filter(|m| m.project_id == project_id)
                .cloned(),
            |m| (m.created_at, m.code.as_str()),
        ))
    }

    async fn get_use_case(&self, use_case_id: Uuid) -> Result<Option<UseCase>, StorageError> {
        let state = self.state.read().await;
        Ok(state.use_cases.iter().find(|u| u.id == use_case_id).cloned())
    }

    async fn create_use_case(&self, use_case: UseCase) -> Result<UseCase, StorageError> {
        let mut state = self.state.write().await;
        if state
            .use_cases
            .iter()
            .any(|u| u.project_id == use_case.project_id && u.code == use_case.code)
        {
            return Err(StorageError::duplicate("use_case", use_case.code.clone()));
        }
        if !state.modules.iter().any(|m| m.id == use_case.module_id) {
            return Err(StorageError::referenced(
                "use_case",
                use_case.id,
                "owning module does not exist",
            ));
        }
        state.use_cases.push(use_case.clone());
        Ok(use_case)
    }

    async fn delete_use_case(&self, use_case_id: Uuid) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        if state
            .sequence_diagrams
            .iter()
            .any(|d| d.use_case_id == use_case_id)
        {
            return Err(StorageError::referenced(
                "use_case",
                use_case_id,
                "still referenced by sequence diagrams",
            ));
        }
        remove_by_id(&mut state.use_cases, "use_case", use_case_id, |u| u.id)
    }

    async fn list_use_cases(&self, project_id: Uuid) -> Result<Vec<UseCase>, StorageError> {
        let state = self.state.read().await;
        Ok(sorted_by_creation(
            state
                .use_cases
                .iter()
                .filter(|u| u.project_id == project_id)
                .cloned(),
            |u| (u.created_at, u.code.as_str()),
        ))
    }

    async fn get_sequence_diagram(
        &self,
        sequence_id: Uuid,
    ) -> Result<Option<SequenceDiagram>, StorageError> {
        let state = self.state.read().await;
        Ok(state
            .sequence_diagrams
            .iter()
            .find(|d| d.id == sequence_id)
            .cloned())
    }

    async fn create_sequence_diagram(
        &self,
        diagram: SequenceDiagram,
    ) -> Result<SequenceDiagram, StorageError> {
        let mut state = self.state.write().await;
        if state
            .sequence_diagrams
            .iter()
            .any(|d| d.project_id == diagram.project_id && d.code == diagram.code)
        {
            return Err(StorageError::duplicate("sequence_diagram", diagram.code.clone()));
        }
        if !state.use_cases.iter().any(|u| u.id == diagram.use_case_id) {
            return Err(StorageError::referenced(
                "sequence_diagram",
                diagram.id,
                "owning use case does not exist",
            ));
        }
        state.sequence_diagrams.push(diagram.clone());
        Ok(diagram)
    }

    async fn update_sequence_diagram(
        &self,
        diagram: SequenceDiagram,
    ) -> Result<SequenceDiagram, StorageError> {
        let mut state = self.state.write().await;
        replace_by_id(
            &mut state.sequence_diagrams,
            "sequence_diagram",
            diagram.id,
            |d| d.id,
            diagram,
        )
    }

    async fn delete_sequence_diagram(&self, sequence_id: Uuid) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        remove_by_id(
            &mut state.sequence_diagrams,
            "sequence_diagram",
            sequence_id,
            |d| d.id,
        )?;
        state.sequence_links.retain(|l| l.sequence_id != sequence_id);
        Ok(())
    }

    async fn list_sequence_diagrams(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<SequenceDiagram>, StorageError> {
        let state = self.state.read().await;
        Ok(sorted_by_creation(
            state
                .sequence_diagrams
                .iter()
                .filter(|d| d.project_id == project_id)
                .cloned(),
            |d| (d.created_at, d.code.as_str()),
        ))
    }

    async fn get_api_contract(&self, api_id: Uuid) -> Result<Option<ApiContract>, StorageError> {
        let state = self.state.read().await;
        Ok(state.api_contracts.iter().find(|a| a.id == api_id).cloned())
    }

    async fn create_api_contract(&self, api: ApiContract) -> Result<ApiContract, StorageError> {
        let mut state = self.state.write().await;
        if state
            .api_contracts
            .iter()
            .any(|a| a.project_id == api.project_id && a.code == api.code)
        {
            return Err(StorageError::duplicate("api_contract", api.code.clone()));
        }
        if state.api_contracts.iter().any(|a| {
            a.project_id == api.project_id && a.method == api.method && a.endpoint == api.endpoint
        }) {
            return Err(StorageError::duplicate(API_ENDPOINT_ENTITY, api.signature()));
        }
        state.api_contracts.push(api.clone());
        Ok(api)
    }

    async fn delete_api_contract(&self, api_id: Uuid) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        remove_by_id(&mut state.api_contracts, "api_contract", api_id, |a| a.id)?;
        state.sequence_links.retain(|l| l.api_id != api_id);
        state.dto_links.retain(|l| l.api_id != api_id);
        Ok(())
    }

    async fn list_api_contracts(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<ApiContract>, StorageError> {
        let state = self.state.read().await;
        Ok(sorted_by_creation(
            state
                .api_contracts
                .iter()
                .filter(|a| a.project_id == project_id)
                .cloned(),
            |a| (a.created_at, a.code.as_str()),
        ))
    }

    async fn get_dto_schema(&self, dto_id: Uuid) -> Result<Option<DtoSchema>, StorageError> {
        let state = self.state.read().await;
        Ok(state.dto_schemas.iter().find(|d| d.id == dto_id).cloned())
    }

    async fn create_dto_schema(&self, dto: DtoSchema) -> Result<DtoSchema, StorageError> {
        let mut state = self.state.write().await;
        if state
            .dto_schemas
            .iter()
            .any(|d| d.project_id == dto.project_id && d.code == dto.code)
        {
            return Err(StorageError::duplicate("dto_schema", dto.code.clone()));
        }
        state.dto_schemas.push(dto.clone());
        Ok(dto)
    }

    async fn delete_dto_schema(&self, dto_id: Uuid) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        remove_by_id(&mut state.dto_schemas, "dto_schema", dto_id, |d| d.id)?;
        state.dto_links.retain(|l| l.dto_id != dto_id);
        Ok(())
    }

    async fn list_dto_schemas(&self, project_id: Uuid) -> Result<Vec<DtoSchema>, StorageError> {
        let state = self.state.read().await;
        Ok(sorted_by_creation(
            state
                .dto_schemas
                .iter()
                .filter(|d| d.project_id == project_id)
                .cloned(),
            |d| (d.created_at, d.code.as_str()),
        ))
    }

    async fn create_api_sequence_link(
        &self,
        link: ApiSequenceLink,
    ) -> Result<ApiSequenceLink, StorageError> {
        let mut state = self.state.write().await;
        if state
            .sequence_links
            .iter()
            .any(|l| l.unique_key() == link.unique_key())
        {
            let (api_id, sequence_id, step_ref) = link.unique_key();
            return Err(StorageError::duplicate(
                "api_sequence_link",
                format!("{}/{}/{}", api_id, sequence_id, step_ref),
            ));
        }
        state.sequence_links.push(link.clone());
        Ok(link)
    }

    async fn list_api_sequence_links(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<ApiSequenceLink>, StorageError> {
        let state = self.state.read().await;
        let api_ids = state.project_api_ids(project_id);
        Ok(state
            .sequence_links
            .iter()
            .filter(|l| api_ids.contains(&l.api_id))
            .cloned()
            .collect())
    }

    async fn create_api_dto_link(&self, link: ApiDtoLink) -> Result<ApiDtoLink, StorageError> {
        let mut state = self.state.write().await;
        if state
            .dto_links
            .iter()
            .any(|l| l.api_id == link.api_id && l.dto_id == link.dto_id && l.role == link.role)
        {
            return Err(StorageError::duplicate(
                "api_dto_link",
                format!("{}/{}/{}", link.api_id, link.dto_id, link.role),
            ));
        }
        state.dto_links.push(link.clone());
        Ok(link)
    }

    async fn list_api_dto_links(&self, project_id: Uuid) -> Result<Vec<ApiDtoLink>, StorageError> {
        let state = self.state.read().await;
        let api_ids = state.project_api_ids(project_id);
        Ok(state
            .dto_links
            .iter()
            .filter(|l| api_ids.contains(&l.api_id))
            .cloned()
            .collect())
    }
}
