//! Consistency rule tests over hand-built project graphs.

use serde_json::json;
use spec_integrity::models::{
    ApiContract, ApiDtoLink, ApiSequenceLink, DtoKind, DtoRole, DtoSchema, HttpMethod,
    IssueType, Module, ProjectGraph, SchemaNode, SequenceDiagram, Severity, UseCase,
};
use spec_integrity::services::DiagramParser;
use spec_integrity::services::consistency_analyzer::{
    analyze, check_api_sequence_consistency, check_dto_usage, check_duplicate_endpoints,
    check_missing_dto_links, check_module_hierarchy, check_orphans, check_parse_errors,
    check_spec_completeness, report_stats,
};
use std::collections::HashSet;
use uuid::Uuid;

fn module(project_id: Uuid, code: &str, parent: Option<&Module>) -> Module {
    let mut module = Module::new(project_id, code.to_string(), code.to_string());
    module.parent_id = parent.map(|p| p.id);
    module
}

fn diagram(project_id: Uuid, use_case: &UseCase, code: &str, source: &str) -> SequenceDiagram {
    let mut diagram =
        SequenceDiagram::new(project_id, use_case.id, code.to_string(), code.to_string());
    let parsed = DiagramParser::new().parse(source);
    diagram.source = source.to_string();
    diagram.set_parse_outcome((!parsed.success).then(|| parsed.error.unwrap_or_default()));
    diagram
}

fn api(project_id: Uuid, code: &str, method: HttpMethod, endpoint: &str) -> ApiContract {
    ApiContract::new(project_id, code.to_string(), method, endpoint.to_string())
}

/// Contract with description and both specs, so only the rule under test fires.
fn complete_api(project_id: Uuid, code: &str, method: HttpMethod, endpoint: &str) -> ApiContract {
    let mut api = api(project_id, code, method, endpoint);
    api.description = Some("documented".to_string());
    api.request_spec = SchemaNode::from(json!({"name": "string"}));
    api.response_spec = SchemaNode::from(json!({"id": "integer"}));
    api
}

fn keys(issues: &[spec_integrity::models::ConsistencyIssue]) -> HashSet<(IssueType, Uuid)> {
    issues.iter().map(|i| i.key()).collect()
}

#[test]
fn test_cycle_without_root_is_flagged() {
    let project_id = Uuid::new_v4();
    let mut a = module(project_id, "MOD-001", None);
    let mut b = module(project_id, "MOD-002", None);
    let mut c = module(project_id, "MOD-003", None);
    a.parent_id = Some(c.id);
    b.parent_id = Some(a.id);
    c.parent_id = Some(b.id);
    let cycle_ids = [a.id, b.id, c.id];

    let mut graph = ProjectGraph::new(project_id);
    graph.modules = vec![a, b, c];

    let issues = check_module_hierarchy(&graph);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].issue_type, IssueType::ModuleCycle);
    assert_eq!(issues[0].severity, Severity::Error);
    assert!(cycle_ids.contains(&issues[0].resource.id));
    let cycle = issues[0].details.as_ref().unwrap()["cycle"].as_array().unwrap();
    assert_eq!(cycle.len(), 3);
}

#[test]
fn test_shared_ancestry_is_not_a_cycle() {
    let project_id = Uuid::new_v4();
    let a = module(project_id, "MOD-001", None);
    let b = module(project_id, "MOD-002", Some(&a));
    let c = module(project_id, "MOD-003", Some(&a));
    let d = module(project_id, "MOD-004", Some(&b));

    let mut graph = ProjectGraph::new(project_id);
    graph.modules = vec![a, b, c, d];

    assert!(check_module_hierarchy(&graph).is_empty());
}

#[test]
fn test_cycle_next_to_healthy_tree() {
    let project_id = Uuid::new_v4();
    let root = module(project_id, "MOD-001", None);
    let child = module(project_id, "MOD-002", Some(&root));
    let mut x = module(project_id, "MOD-003", None);
    let y = module(project_id, "MOD-004", Some(&x));
    x.parent_id = Some(y.id);
    let hanger = module(project_id, "MOD-005", Some(&y));

    let mut graph = ProjectGraph::new(project_id);
    graph.modules = vec![root, child, x.clone(), y.clone(), hanger];

    let issues = check_module_hierarchy(&graph);
    assert_eq!(issues.len(), 1);
    assert!([x.id, y.id].contains(&issues[0].resource.id));
}

#[test]
fn test_duplicate_endpoints_reference_each_other() {
    let project_id = Uuid::new_v4();
    let first = api(project_id, "API-GEN-001", HttpMethod::Get, "/users");
    let second = api(project_id, "API-GEN-002", HttpMethod::Get, "/users");
    let other = api(project_id, "API-GEN-003", HttpMethod::Post, "/users");

    let mut graph = ProjectGraph::new(project_id);
    graph.api_contracts = vec![first.clone(), second.clone(), other];

    let issues = check_duplicate_endpoints(&graph);
    assert_eq!(
        keys(&issues),
        HashSet::from([
            (IssueType::DuplicateEndpoint, first.id),
            (IssueType::DuplicateEndpoint, second.id),
        ])
    );
    for issue in &issues {
        assert_eq!(issue.severity, Severity::Error);
        let duplicates = issue.details.as_ref().unwrap()["duplicates"].as_array().unwrap();
        let ids: Vec<String> = duplicates
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect();
        assert!(ids.contains(&first.id.to_string()));
        assert!(ids.contains(&second.id.to_string()));
    }
}

#[test]
fn test_orphans() {
    let project_id = Uuid::new_v4();
    let empty_module = module(project_id, "MOD-001", None);
    let used_module = module(project_id, "MOD-002", None);
    let idle_use_case = UseCase::new(project_id, used_module.id, "UC-001".into(), "Idle".into());
    let busy_use_case = UseCase::new(project_id, used_module.id, "UC-002".into(), "Busy".into());
    let seq = diagram(project_id, &busy_use_case, "SEQ-001", "sequenceDiagram\nA->>B: hi\n");
    let unused_api = complete_api(project_id, "API-GEN-001", HttpMethod::Get, "/a");
    let used_api = complete_api(project_id, "API-GEN-002", HttpMethod::Get, "/b");
    let lonely_dto = DtoSchema::new(project_id, "DTO-GEN-001".into(), "Lonely".into(), DtoKind::Request);
    let used_dto = DtoSchema::new(project_id, "DTO-GEN-002".into(), "Used".into(), DtoKind::Response);

    let mut graph = ProjectGraph::new(project_id);
    graph.sequence_links = vec![ApiSequenceLink::new(used_api.id, seq.id)];
    graph.dto_links = vec![ApiDtoLink::new(used_api.id, used_dto.id, DtoRole::Res)];
    graph.modules = vec![empty_module.clone(), used_module];
    graph.use_cases = vec![idle_use_case.clone(), busy_use_case];
    graph.sequence_diagrams = vec![seq];
    graph.api_contracts = vec![unused_api.clone(), used_api];
    graph.dto_schemas = vec![lonely_dto.clone(), used_dto];

    let issues = check_orphans(&graph);
    assert_eq!(
        keys(&issues),
        HashSet::from([
            (IssueType::OrphanModule, empty_module.id),
            (IssueType::OrphanUseCase, idle_use_case.id),
            (IssueType::OrphanApi, unused_api.id),
            (IssueType::OrphanDto, lonely_dto.id),
        ])
    );
    let severity_of = |t: IssueType| issues.iter().find(|i| i.issue_type == t).unwrap().severity;
    assert_eq!(severity_of(IssueType::OrphanModule), Severity::Warning);
    assert_eq!(severity_of(IssueType::OrphanUseCase), Severity::Info);
    assert_eq!(severity_of(IssueType::OrphanApi), Severity::Warning);
    assert_eq!(severity_of(IssueType::OrphanDto), Severity::Warning);
}

#[test]
fn test_parse_errors_surface_stored_message() {
    let project_id = Uuid::new_v4();
    let owner = module(project_id, "MOD-001", None);
    let use_case = UseCase::new(project_id, owner.id, "UC-001".into(), "Checkout".into());
    let broken = diagram(project_id, &use_case, "SEQ-001", "sequenceDiagram\nalt paid\nA->>B: hi\n");
    let fine = diagram(project_id, &use_case, "SEQ-002", "sequenceDiagram\nA->>B: hi\n");

    let mut graph = ProjectGraph::new(project_id);
    graph.sequence_diagrams = vec![broken.clone(), fine];

    let issues = check_parse_errors(&graph);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].resource.id, broken.id);
    assert_eq!(issues[0].severity, Severity::Error);
    assert!(issues[0].message.contains("Unclosed 'alt' block"));
}

#[test]
fn test_unlinked_calls_are_reported() {
    let project_id = Uuid::new_v4();
    let owner = module(project_id, "MOD-001", None);
    let use_case = UseCase::new(project_id, owner.id, "UC-001".into(), "Orders".into());
    let seq = diagram(
        project_id,
        &use_case,
        "SEQ-001",
        "sequenceDiagram\nUser->>Api: GET /users/42\nUser->>Api: POST /orders\nApi-->>User: done\n",
    );
    let users = complete_api(project_id, "API-GEN-001", HttpMethod::Get, "/users/{id}");

    let mut graph = ProjectGraph::new(project_id);
    graph.sequence_links = vec![ApiSequenceLink::new(users.id, seq.id)];
    graph.sequence_diagrams = vec![seq.clone()];
    graph.api_contracts = vec![users];

    let issues = check_api_sequence_consistency(&graph);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].issue_type, IssueType::ApiSequenceMismatch);
    assert_eq!(issues[0].severity, Severity::Warning);
    assert_eq!(issues[0].resource.id, seq.id);
    let details = issues[0].details.as_ref().unwrap();
    assert_eq!(details["method"], "POST");
    assert_eq!(details["path"], "/orders");
    assert_eq!(details["line_number"], 3);
}

#[test]
fn test_template_path_in_diagram_counts_as_covered() {
    let project_id = Uuid::new_v4();
    let owner = module(project_id, "MOD-001", None);
    let use_case = UseCase::new(project_id, owner.id, "UC-001".into(), "Users".into());
    let seq = diagram(project_id, &use_case, "SEQ-001", "sequenceDiagram\nUser->>System: GET /users/{id}\n");
    let users = complete_api(project_id, "API-GEN-001", HttpMethod::Get, "/users/{id}");

    let mut graph = ProjectGraph::new(project_id);
    graph.sequence_links = vec![ApiSequenceLink::new(users.id, seq.id)];
    graph.sequence_diagrams = vec![seq];
    graph.api_contracts = vec![users];

    assert!(check_api_sequence_consistency(&graph).is_empty());
}

#[test]
fn test_dto_usage_and_missing_links() {
    let project_id = Uuid::new_v4();
    let create = complete_api(project_id, "API-GEN-001", HttpMethod::Post, "/orders");
    let read = complete_api(project_id, "API-GEN-002", HttpMethod::Get, "/orders/{id}");
    let covered = complete_api(project_id, "API-GEN-003", HttpMethod::Put, "/orders/{id}");
    let request = DtoSchema::new(project_id, "DTO-GEN-001".into(), "OrderIn".into(), DtoKind::Request);
    let response = DtoSchema::new(project_id, "DTO-GEN-002".into(), "OrderOut".into(), DtoKind::Response);

    let mut graph = ProjectGraph::new(project_id);
    graph.dto_links = vec![
        ApiDtoLink::new(covered.id, request.id, DtoRole::Req),
        ApiDtoLink::new(covered.id, response.id, DtoRole::Res),
        ApiDtoLink::new(read.id, response.id, DtoRole::Res),
    ];
    graph.api_contracts = vec![create.clone(), read.clone(), covered];
    graph.dto_schemas = vec![request, response];

    assert_eq!(
        keys(&check_dto_usage(&graph)),
        HashSet::from([
            (IssueType::MissingRequestDto, create.id),
            (IssueType::MissingResponseDto, create.id),
        ])
    );
    // `read` carries a request spec too, even though GET has no body.
    assert_eq!(
        keys(&check_missing_dto_links(&graph)),
        HashSet::from([
            (IssueType::MissingDtoLink, create.id),
            (IssueType::MissingDtoLink, read.id),
        ])
    );
}

#[test]
fn test_spec_completeness() {
    let project_id = Uuid::new_v4();
    let bare_post = api(project_id, "API-GEN-001", HttpMethod::Post, "/orders");
    let bare_get = api(project_id, "API-GEN-002", HttpMethod::Get, "/orders");
    let complete = complete_api(project_id, "API-GEN-003", HttpMethod::Patch, "/orders/{id}");

    let mut graph = ProjectGraph::new(project_id);
    graph.api_contracts = vec![bare_post.clone(), bare_get.clone(), complete];

    let issues = check_spec_completeness(&graph);
    assert_eq!(
        keys(&issues),
        HashSet::from([
            (IssueType::MissingDescription, bare_post.id),
            (IssueType::MissingRequestSpec, bare_post.id),
            (IssueType::MissingResponseSpec, bare_post.id),
            (IssueType::MissingDescription, bare_get.id),
            (IssueType::MissingResponseSpec, bare_get.id),
        ])
    );
    let request_spec = issues
        .iter()
        .find(|i| i.issue_type == IssueType::MissingRequestSpec)
        .unwrap();
    assert_eq!(request_spec.severity, Severity::Warning);
}

#[test]
fn test_all_rules_run_and_are_repeatable() {
    let project_id = Uuid::new_v4();
    let mut a = module(project_id, "MOD-001", None);
    a.parent_id = Some(a.id);
    let use_case = UseCase::new(project_id, a.id, "UC-001".into(), "Broken".into());
    let broken = diagram(project_id, &use_case, "SEQ-001", "sequenceDiagram\nloop\nA->>B: GET /x\n");
    let dup_one = api(project_id, "API-GEN-001", HttpMethod::Get, "/x");
    let dup_two = api(project_id, "API-GEN-002", HttpMethod::Get, "/x");

    let mut graph = ProjectGraph::new(project_id);
    graph.modules = vec![a];
    graph.use_cases = vec![use_case];
    graph.sequence_diagrams = vec![broken];
    graph.api_contracts = vec![dup_one, dup_two];

    let first = analyze(&graph);
    let second = analyze(&graph);
    assert_eq!(first, second);

    let types: HashSet<IssueType> = first.iter().map(|i| i.issue_type).collect();
    for expected in [
        IssueType::ModuleCycle,
        IssueType::ParseError,
        IssueType::ApiSequenceMismatch,
        IssueType::DuplicateEndpoint,
        IssueType::OrphanApi,
        IssueType::MissingResponseDto,
        IssueType::MissingDescription,
    ] {
        assert!(types.contains(&expected), "missing {:?}", expected);
    }

    let stats = report_stats(&graph, &first);
    assert_eq!(stats.modules, 1);
    assert_eq!(stats.api_contracts, 2);
    assert_eq!(stats.errors + stats.warnings + stats.infos, first.len());
    assert_eq!(stats.errors, 4);
}
