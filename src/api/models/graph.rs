use super::{ApiContract, ApiDtoLink, ApiSequenceLink, DtoSchema, Module, SequenceDiagram, UseCase};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Every artifact and link of one project, loaded for analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectGraph {
    pub project_id: Uuid,
    #[serde(default)]
    pub modules: Vec<Module>,
    #[serde(default)]
    pub use_cases: Vec<UseCase>,
    #[serde(default)]
    pub sequence_diagrams: Vec<SequenceDiagram>,
    #[serde(default)]
    pub api_contracts: Vec<ApiContract>,
    #[serde(default)]
    pub dto_schemas: Vec<DtoSchema>,
    #[serde(default)]
    pub sequence_links: Vec<ApiSequenceLink>,
    #[serde(default)]
    pub dto_links: Vec<ApiDtoLink>,
}

impl ProjectGraph {
    pub fn new(project_id: Uuid) -> Self {
        Self {
            project_id,
            ..Default::default()
        }
    }

    pub fn get_api_contract(&self, api_id: Uuid) -> Option<&ApiContract> {
        self.api_contracts.iter().find(|a| a.id == api_id)
    }

    pub fn get_dto_schema(&self, dto_id: Uuid) -> Option<&DtoSchema> {
        self.dto_schemas.iter().find(|d| d.id == dto_id)
    }
}
