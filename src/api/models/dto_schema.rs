use super::enums::DtoKind;
use super::schema::SchemaNode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DtoSchema {
    pub id: Uuid,
    pub project_id: Uuid,
    pub code: String,
    pub name: String,
    pub kind: DtoKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default)]
    pub schema: SchemaNode,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DtoSchema {
    pub fn new(project_id: Uuid, code: String, name: String, kind: DtoKind) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_id,
            code,
            name,
            kind,
            domain: None,
            schema: SchemaNode::Null,
            created_at: now,
            updated_at: now,
        }
    }

    /// Render the schema as a TypeScript interface named after the DTO.
    pub fn type_declaration(&self) -> String {
        self.schema.to_type_declaration(&self.name)
    }
}
