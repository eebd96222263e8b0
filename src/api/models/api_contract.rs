use super::enums::HttpMethod;
use super::schema::SchemaNode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiContract {
    pub id: Uuid,
    pub project_id: Uuid,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    pub method: HttpMethod,
    /// Path template, e.g. `/orders/{id}/items`.
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub request_spec: SchemaNode,
    #[serde(default)]
    pub response_spec: SchemaNode,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApiContract {
    pub fn new(project_id: Uuid, code: String, method: HttpMethod, endpoint: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_id,
            code,
            domain: None,
            method,
            endpoint,
            description: None,
            request_spec: SchemaNode::Null,
            response_spec: SchemaNode::Null,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_description(&self) -> bool {
        self.description
            .as_deref()
            .map(|d| !d.trim().is_empty())
            .unwrap_or(false)
    }

    /// `METHOD /path` label used in messages.
    pub fn signature(&self) -> String {
        format!("{} {}", self.method, self.endpoint)
    }
}
