use super::enums::{ArtifactKind, IssueType, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The artifact an issue points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ArtifactKind,
    pub id: Uuid,
    pub code: String,
}

impl ResourceRef {
    pub fn new(kind: ArtifactKind, id: Uuid, code: impl Into<String>) -> Self {
        Self {
            kind,
            id,
            code: code.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyIssue {
    pub issue_type: IssueType,
    pub severity: Severity,
    pub resource: ResourceRef,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ConsistencyIssue {
    pub fn new(
        issue_type: IssueType,
        severity: Severity,
        resource: ResourceRef,
        message: impl Into<String>,
    ) -> Self {
        Self {
            issue_type,
            severity,
            resource,
            message: message.into(),
            details: None,
            suggestion: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Key used to compare issue sets independent of emission order.
    pub fn key(&self) -> (IssueType, Uuid) {
        (self.issue_type, self.resource.id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportStats {
    pub modules: usize,
    pub use_cases: usize,
    pub sequence_diagrams: usize,
    pub api_contracts: usize,
    pub dto_schemas: usize,
    pub sequence_links: usize,
    pub dto_links: usize,
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub project_id: Uuid,
    pub checked_at: DateTime<Utc>,
    pub issues: Vec<ConsistencyIssue>,
    pub stats: ReportStats,
}

impl ConsistencyReport {
    pub fn issues_of(&self, issue_type: IssueType) -> impl Iterator<Item = &ConsistencyIssue> {
        self.issues.iter().filter(move |i| i.issue_type == issue_type)
    }

    pub fn has_errors(&self) -> bool {
        self.stats.errors > 0
    }
}
