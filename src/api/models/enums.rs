use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 7] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
        HttpMethod::Head,
        HttpMethod::Options,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }

    /// Methods whose contracts are expected to carry a request body.
    pub fn expects_request_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    /// Only the canonical upper-case spelling is accepted, so that prose such as
    /// "get the user" in a diagram message is never mistaken for a call.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HttpMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("Unknown HTTP method: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseStatus {
    #[default]
    Pending,
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DtoKind {
    Request,
    Response,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DtoRole {
    Req,
    Res,
}

impl DtoRole {
    /// The DTO kind a link with this role must point at.
    pub fn required_kind(&self) -> DtoKind {
        match self {
            DtoRole::Req => DtoKind::Request,
            DtoRole::Res => DtoKind::Response,
        }
    }
}

impl fmt::Display for DtoRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DtoRole::Req => "req",
            DtoRole::Res => "res",
        })
    }
}

impl fmt::Display for DtoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DtoKind::Request => "request",
            DtoKind::Response => "response",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Module,
    UseCase,
    SequenceDiagram,
    ApiContract,
    DtoSchema,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Module => "module",
            ArtifactKind::UseCase => "use_case",
            ArtifactKind::SequenceDiagram => "sequence_diagram",
            ArtifactKind::ApiContract => "api_contract",
            ArtifactKind::DtoSchema => "dto_schema",
        }
    }

    pub fn default_prefix(&self) -> &'static str {
        match self {
            ArtifactKind::Module => "MOD",
            ArtifactKind::UseCase => "UC",
            ArtifactKind::SequenceDiagram => "SEQ",
            ArtifactKind::ApiContract => "API",
            ArtifactKind::DtoSchema => "DTO",
        }
    }

    /// API and DTO codes carry a domain qualifier (`API-USER-001`).
    pub fn uses_domain(&self) -> bool {
        matches!(self, ArtifactKind::ApiContract | ArtifactKind::DtoSchema)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    OrphanModule,
    OrphanUseCase,
    OrphanApi,
    OrphanDto,
    ParseError,
    ApiSequenceMismatch,
    MissingRequestDto,
    MissingResponseDto,
    ModuleCycle,
    DuplicateEndpoint,
    MissingDtoLink,
    MissingDescription,
    MissingRequestSpec,
    MissingResponseSpec,
}
