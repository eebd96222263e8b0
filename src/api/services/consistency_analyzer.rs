//! Project-wide consistency checks.
//!
//! Every rule is a pure function over a [`ProjectGraph`] snapshot. Rules never
//! short-circuit each other; their issues are concatenated into one report.

use super::diagram_parser::DiagramParser;
use super::endpoint_matcher::{EndpointMatcher, strip_path_params, strip_query};
use crate::error::EngineError;
use crate::graph::find_hierarchy_cycles;
use crate::models::{
    ApiContract, ArtifactKind, ConsistencyIssue, ConsistencyReport, DtoRole, HttpMethod,
    IssueType, ParseStatus, ProjectGraph, ReportStats, ResourceRef, SequenceDiagram, Severity,
};
use crate::storage::StorageBackend;
use chrono::Utc;
use indexmap::IndexMap;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

type Rule = fn(&ProjectGraph) -> Vec<ConsistencyIssue>;

/// Rules in report order.
const RULES: [(&str, Rule); 8] = [
    ("orphans", check_orphans),
    ("parse_errors", check_parse_errors),
    ("api_sequence", check_api_sequence_consistency),
    ("dto_usage", check_dto_usage),
    ("module_hierarchy", check_module_hierarchy),
    ("duplicate_endpoints", check_duplicate_endpoints),
    ("missing_links", check_missing_dto_links),
    ("completeness", check_spec_completeness),
];

fn api_ref(api: &ApiContract) -> ResourceRef {
    ResourceRef::new(ArtifactKind::ApiContract, api.id, api.code.clone())
}

fn diagram_ref(diagram: &SequenceDiagram) -> ResourceRef {
    ResourceRef::new(ArtifactKind::SequenceDiagram, diagram.id, diagram.code.clone())
}

/// Contract ids holding at least one DTO link with `role`.
fn apis_with_dto_role(graph: &ProjectGraph, role: DtoRole) -> HashSet<Uuid> {
    graph
        .dto_links
        .iter()
        .filter(|l| l.role == role)
        .map(|l| l.api_id)
        .collect()
}

/// Modules without use cases, use cases without diagrams, contracts without
/// diagram links and DTOs without contract links.
pub fn check_orphans(graph: &ProjectGraph) -> Vec<ConsistencyIssue> {
    let mut issues = Vec::new();

    let modules_with_use_cases: HashSet<Uuid> =
        graph.use_cases.iter().map(|u| u.module_id).collect();
    for module in &graph.modules {
        if !modules_with_use_cases.contains(&module.id) {
            issues.push(
                ConsistencyIssue::new(
                    IssueType::OrphanModule,
                    Severity::Warning,
                    ResourceRef::new(ArtifactKind::Module, module.id, module.code.clone()),
                    format!("Module {} has no use cases", module.code),
                )
                .with_suggestion("Add a use case or remove the module"),
            );
        }
    }

    let use_cases_with_diagrams: HashSet<Uuid> = graph
        .sequence_diagrams
        .iter()
        .map(|d| d.use_case_id)
        .collect();
    for use_case in &graph.use_cases {
        if !use_cases_with_diagrams.contains(&use_case.id) {
            issues.push(
                ConsistencyIssue::new(
                    IssueType::OrphanUseCase,
                    Severity::Info,
                    ResourceRef::new(ArtifactKind::UseCase, use_case.id, use_case.code.clone()),
                    format!("Use case {} has no sequence diagrams", use_case.code),
                )
                .with_suggestion("Describe the flow with a sequence diagram"),
            );
        }
    }

    let linked_apis: HashSet<Uuid> = graph.sequence_links.iter().map(|l| l.api_id).collect();
    for api in &graph.api_contracts {
        if !linked_apis.contains(&api.id) {
            issues.push(
                ConsistencyIssue::new(
                    IssueType::OrphanApi,
                    Severity::Warning,
                    api_ref(api),
                    format!("API {} ({}) is not used by any sequence diagram", api.code, api.signature()),
                )
                .with_suggestion("Reference the endpoint from a diagram and run link detection"),
            );
        }
    }

    let linked_dtos: HashSet<Uuid> = graph.dto_links.iter().map(|l| l.dto_id).collect();
    for dto in &graph.dto_schemas {
        if !linked_dtos.contains(&dto.id) {
            issues.push(
                ConsistencyIssue::new(
                    IssueType::OrphanDto,
                    Severity::Warning,
                    ResourceRef::new(ArtifactKind::DtoSchema, dto.id, dto.code.clone()),
                    format!("DTO {} ({}) is not linked to any API", dto.code, dto.name),
                )
                .with_suggestion("Link the DTO to an API contract or remove it"),
            );
        }
    }

    issues
}

/// Diagrams whose stored parse status is `error`.
pub fn check_parse_errors(graph: &ProjectGraph) -> Vec<ConsistencyIssue> {
    graph
        .sequence_diagrams
        .iter()
        .filter(|d| d.parse_status == ParseStatus::Error)
        .map(|diagram| {
            let error = diagram
                .parse_error
                .clone()
                .unwrap_or_else(|| "Unknown parse error".to_string());
            ConsistencyIssue::new(
                IssueType::ParseError,
                Severity::Error,
                diagram_ref(diagram),
                format!("Sequence diagram {} failed to parse: {}", diagram.code, error),
            )
            .with_details(json!({ "parse_error": error }))
            .with_suggestion("Fix the diagram source and re-parse it")
        })
        .collect()
}

/// Re-parse every diagram and flag HTTP calls not covered by a linked contract.
///
/// A call is covered when a linked contract has the same method and a template
/// accepting the call path, or when the call path with `{param}` segments removed
/// is a substring of a linked contract's endpoint.
pub fn check_api_sequence_consistency(graph: &ProjectGraph) -> Vec<ConsistencyIssue> {
    let parser = DiagramParser::new();
    let mut issues = Vec::new();

    let mut linked_by_diagram: HashMap<Uuid, Vec<&ApiContract>> = HashMap::new();
    for link in &graph.sequence_links {
        if let Some(api) = graph.get_api_contract(link.api_id) {
            let linked = linked_by_diagram.entry(link.sequence_id).or_default();
            if !linked.iter().any(|a| a.id == api.id) {
                linked.push(api);
            }
        }
    }

    for diagram in &graph.sequence_diagrams {
        let parsed = parser.parse(&diagram.source);
        let linked = linked_by_diagram
            .get(&diagram.id)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let matchers: Vec<(&ApiContract, Option<EndpointMatcher>)> = linked
            .iter()
            .map(|api| (*api, EndpointMatcher::compile(&api.endpoint).ok()))
            .collect();

        for call in parsed.http_calls() {
            let (Some(method), Some(path)) = (call.method, call.path.as_deref()) else {
                continue;
            };
            let stripped = strip_path_params(strip_query(path));
            let covered = matchers.iter().any(|(api, matcher)| {
                let by_template = api.method == method
                    && matcher.as_ref().is_some_and(|m| m.test(path));
                by_template || api.endpoint.contains(&stripped)
            });
            if covered {
                continue;
            }

            issues.push(
                ConsistencyIssue::new(
                    IssueType::ApiSequenceMismatch,
                    Severity::Warning,
                    diagram_ref(diagram),
                    format!(
                        "Call {} {} at line {} in {} has no linked API contract",
                        method, path, call.line_number, diagram.code
                    ),
                )
                .with_details(json!({
                    "method": method,
                    "path": path,
                    "line_number": call.line_number,
                }))
                .with_suggestion("Declare the endpoint or run link detection"),
            );
        }
    }

    issues
}

/// Body-carrying contracts without a request DTO, and any contract without a response DTO.
pub fn check_dto_usage(graph: &ProjectGraph) -> Vec<ConsistencyIssue> {
    let with_request = apis_with_dto_role(graph, DtoRole::Req);
    let with_response = apis_with_dto_role(graph, DtoRole::Res);
    let mut issues = Vec::new();

    for api in &graph.api_contracts {
        if api.method.expects_request_body() && !with_request.contains(&api.id) {
            issues.push(ConsistencyIssue::new(
                IssueType::MissingRequestDto,
                Severity::Info,
                api_ref(api),
                format!("API {} ({}) has no request DTO", api.code, api.signature()),
            ));
        }
        if !with_response.contains(&api.id) {
            issues.push(ConsistencyIssue::new(
                IssueType::MissingResponseDto,
                Severity::Info,
                api_ref(api),
                format!("API {} ({}) has no response DTO", api.code, api.signature()),
            ));
        }
    }

    issues
}

/// Cycles in the module parent/child relation.
pub fn check_module_hierarchy(graph: &ProjectGraph) -> Vec<ConsistencyIssue> {
    let codes: HashMap<Uuid, &str> = graph
        .modules
        .iter()
        .map(|m| (m.id, m.code.as_str()))
        .collect();

    find_hierarchy_cycles(&graph.modules)
        .into_iter()
        .map(|cycle| {
            let path: Vec<&str> = cycle
                .path
                .iter()
                .map(|id| codes.get(id).copied().unwrap_or("?"))
                .collect();
            let start_code = codes.get(&cycle.start).copied().unwrap_or("?");
            ConsistencyIssue::new(
                IssueType::ModuleCycle,
                Severity::Error,
                ResourceRef::new(ArtifactKind::Module, cycle.start, start_code),
                format!("Module hierarchy cycle: {} -> {}", path.join(" -> "), start_code),
            )
            .with_details(json!({ "cycle": cycle.path, "codes": path }))
            .with_suggestion("Move one of the modules under a different parent")
        })
        .collect()
}

/// Contracts sharing a `(method, endpoint)` pair; every member of a group is flagged.
pub fn check_duplicate_endpoints(graph: &ProjectGraph) -> Vec<ConsistencyIssue> {
    let mut groups: IndexMap<(HttpMethod, &str), Vec<&ApiContract>> = IndexMap::new();
    for api in &graph.api_contracts {
        groups
            .entry((api.method, api.endpoint.as_str()))
            .or_default()
            .push(api);
    }

    let mut issues = Vec::new();
    for ((method, endpoint), apis) in groups.iter().filter(|(_, apis)| apis.len() > 1) {
        let ids: Vec<Uuid> = apis.iter().map(|a| a.id).collect();
        let codes: Vec<&str> = apis.iter().map(|a| a.code.as_str()).collect();
        for api in apis {
            issues.push(
                ConsistencyIssue::new(
                    IssueType::DuplicateEndpoint,
                    Severity::Error,
                    api_ref(api),
                    format!(
                        "{} {} is declared by {} contracts: {}",
                        method,
                        endpoint,
                        apis.len(),
                        codes.join(", ")
                    ),
                )
                .with_details(json!({ "duplicates": ids, "codes": codes }))
                .with_suggestion("Merge the contracts or change one endpoint"),
            );
        }
    }

    issues
}

/// Contracts declaring a request body without a linked request DTO.
pub fn check_missing_dto_links(graph: &ProjectGraph) -> Vec<ConsistencyIssue> {
    let with_request = apis_with_dto_role(graph, DtoRole::Req);
    graph
        .api_contracts
        .iter()
        .filter(|api| !api.request_spec.is_empty() && !with_request.contains(&api.id))
        .map(|api| {
            ConsistencyIssue::new(
                IssueType::MissingDtoLink,
                Severity::Info,
                api_ref(api),
                format!(
                    "API {} declares a request specification but no request DTO is linked",
                    api.code
                ),
            )
            .with_details(json!({ "request_fields": api.request_spec.field_names() }))
            .with_suggestion("Create a request DTO from the specification and link it")
        })
        .collect()
}

pub fn check_spec_completeness(graph: &ProjectGraph) -> Vec<ConsistencyIssue> {
    let mut issues = Vec::new();

    for api in &graph.api_contracts {
        if !api.has_description() {
            issues.push(ConsistencyIssue::new(
                IssueType::MissingDescription,
                Severity::Info,
                api_ref(api),
                format!("API {} has no description", api.code),
            ));
        }
        if api.method.expects_request_body() && api.request_spec.is_empty() {
            issues.push(ConsistencyIssue::new(
                IssueType::MissingRequestSpec,
                Severity::Warning,
                api_ref(api),
                format!("{} API {} has no request specification", api.method, api.code),
            ));
        }
        if api.response_spec.is_empty() {
            issues.push(ConsistencyIssue::new(
                IssueType::MissingResponseSpec,
                Severity::Info,
                api_ref(api),
                format!("API {} has no response specification", api.code),
            ));
        }
    }

    issues
}

/// Run every rule over the graph.
pub fn analyze(graph: &ProjectGraph) -> Vec<ConsistencyIssue> {
    let mut issues = Vec::new();
    for (name, rule) in RULES {
        let found = rule(graph);
        debug!("Rule {} found {} issues", name, found.len());
        issues.extend(found);
    }
    issues
}

/// Counts of artifacts, links and issues by severity.
pub fn report_stats(graph: &ProjectGraph, issues: &[ConsistencyIssue]) -> ReportStats {
    let by_severity = |s: Severity| issues.iter().filter(|i| i.severity == s).count();
    ReportStats {
        modules: graph.modules.len(),
        use_cases: graph.use_cases.len(),
        sequence_diagrams: graph.sequence_diagrams.len(),
        api_contracts: graph.api_contracts.len(),
        dto_schemas: graph.dto_schemas.len(),
        sequence_links: graph.sequence_links.len(),
        dto_links: graph.dto_links.len(),
        errors: by_severity(Severity::Error),
        warnings: by_severity(Severity::Warning),
        infos: by_severity(Severity::Info),
    }
}

/// Loads a project graph and runs the consistency rules over it.
#[derive(Clone)]
pub struct ConsistencyAnalyzer {
    storage: Arc<dyn StorageBackend>,
}

impl ConsistencyAnalyzer {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Check one project. Only a failure to read the graph is an error.
    pub async fn check_project(&self, project_id: Uuid) -> Result<ConsistencyReport, EngineError> {
        let graph = self.storage.load_project_graph(project_id).await?;
        let issues = analyze(&graph);
        let stats = report_stats(&graph, &issues);

        info!(
            "Consistency check for project {}: {} errors, {} warnings, {} infos",
            project_id, stats.errors, stats.warnings, stats.infos
        );

        Ok(ConsistencyReport {
            project_id,
            checked_at: Utc::now(),
            issues,
            stats,
        })
    }
}
