use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UseCase {
    pub id: Uuid,
    pub project_id: Uuid,
    pub module_id: Uuid,
    pub code: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UseCase {
    pub fn new(project_id: Uuid, module_id: Uuid, code: String, title: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_id,
            module_id,
            code,
            title,
            description: None,
            created_at: now,
            updated_at: now,
        }
    }
}
