use super::enums::DtoRole;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Association between an API contract and a sequence diagram.
///
/// `(api_id, sequence_id, step_ref)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSequenceLink {
    pub id: Uuid,
    pub api_id: Uuid,
    pub sequence_id: Uuid,
    /// Raw source line the link was detected on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl ApiSequenceLink {
    pub fn new(api_id: Uuid, sequence_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            api_id,
            sequence_id,
            step_ref: None,
            line_number: None,
            created_at: Utc::now(),
        }
    }

    pub fn at_step(mut self, step_ref: impl Into<String>, line_number: u32) -> Self {
        self.step_ref = Some(step_ref.into());
        self.line_number = Some(line_number);
        self
    }

    /// Identity used for duplicate detection.
    pub fn unique_key(&self) -> (Uuid, Uuid, &str) {
        (
            self.api_id,
            self.sequence_id,
            self.step_ref.as_deref().unwrap_or(""),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiDtoLink {
    pub id: Uuid,
    pub api_id: Uuid,
    pub dto_id: Uuid,
    pub role: DtoRole,
    pub created_at: DateTime<Utc>,
}

impl ApiDtoLink {
    pub fn new(api_id: Uuid, dto_id: Uuid, role: DtoRole) -> Self {
        Self {
            id: Uuid::new_v4(),
            api_id,
            dto_id,
            role,
            created_at: Utc::now(),
        }
    }
}
