use super::enums::ParseStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceDiagram {
    pub id: Uuid,
    pub project_id: Uuid,
    pub use_case_id: Uuid,
    pub code: String,
    pub title: String,
    /// Raw diagram source text.
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub parse_status: ParseStatus,
    /// Set whenever `parse_status` is `Error`, never empty in that case.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SequenceDiagram {
    pub fn new(project_id: Uuid, use_case_id: Uuid, code: String, title: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_id,
            use_case_id,
            code,
            title,
            source: String::new(),
            parse_status: ParseStatus::Pending,
            parse_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record the outcome of a parse run, keeping status and message in step.
    pub fn set_parse_outcome(&mut self, error: Option<String>) {
        match error {
            Some(message) => {
                let message = if message.trim().is_empty() {
                    "Unknown parse error".to_string()
                } else {
                    message
                };
                self.parse_status = ParseStatus::Error;
                self.parse_error = Some(message);
            }
            None => {
                self.parse_status = ParseStatus::Success;
                self.parse_error = None;
            }
        }
        self.updated_at = Utc::now();
    }
}
