//! Link detection and project checks end to end.

use chrono::Utc;
use spec_integrity::error::EngineError;
use spec_integrity::models::{ApiContract, DtoKind, HttpMethod, IssueType, SchemaNode};
use spec_integrity::services::{ArtifactService, ConsistencyAnalyzer, LinkResolver, NewApiContract};
use spec_integrity::storage::{MemoryStorageBackend, StorageBackend, StorageError};
use std::sync::Arc;
use uuid::Uuid;

struct Fixture {
    store: Arc<MemoryStorageBackend>,
    service: ArtifactService,
    project_id: Uuid,
    use_case_id: Uuid,
}

async fn fixture() -> Fixture {
    let store = Arc::new(MemoryStorageBackend::new());
    let service = ArtifactService::new(store.clone());
    let project = service.create_project("Directory", None).await.unwrap();
    let module = service.create_module(project.id, "Users", None).await.unwrap();
    let use_case = service
        .create_use_case(project.id, module.id, "View profile")
        .await
        .unwrap();
    Fixture {
        store,
        service,
        project_id: project.id,
        use_case_id: use_case.id,
    }
}

#[tokio::test]
async fn test_auto_detect_then_check_project() {
    let f = fixture().await;
    let diagram = f
        .service
        .create_sequence_diagram(
            f.project_id,
            f.use_case_id,
            "Profile",
            "sequenceDiagram\nUser->>System: GET /users/{id}",
        )
        .await
        .unwrap();
    let api = f
        .service
        .create_api_contract(
            f.project_id,
            NewApiContract::new(HttpMethod::Get, "/users/{id}").with_domain("users"),
        )
        .await
        .unwrap();

    let resolver = LinkResolver::new(f.store.clone());
    let links = resolver.auto_detect(diagram.id).await.unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].api_id, api.id);
    assert_eq!(links[0].sequence_id, diagram.id);
    assert_eq!(links[0].step_ref.as_deref(), Some("User->>System: GET /users/{id}"));
    assert_eq!(links[0].line_number, Some(2));

    // Re-running finds the same link and creates nothing.
    assert!(resolver.auto_detect(diagram.id).await.unwrap().is_empty());
    assert_eq!(f.store.list_api_sequence_links(f.project_id).await.unwrap().len(), 1);

    let analyzer = ConsistencyAnalyzer::new(f.store.clone());
    let report = analyzer.check_project(f.project_id).await.unwrap();
    assert_eq!(report.issues_of(IssueType::ApiSequenceMismatch).count(), 0);
    assert_eq!(report.issues_of(IssueType::OrphanApi).count(), 0);
    assert!(
        report
            .issues_of(IssueType::MissingResponseDto)
            .any(|i| i.resource.id == api.id)
    );
    assert_eq!(report.stats.sequence_links, 1);

    let dto = f
        .service
        .create_dto_schema(f.project_id, "UserView", DtoKind::Response, Some("users"), SchemaNode::Null)
        .await
        .unwrap();
    let report = analyzer.check_project(f.project_id).await.unwrap();
    assert!(
        report
            .issues_of(IssueType::OrphanDto)
            .any(|i| i.resource.id == dto.id)
    );
}

#[tokio::test]
async fn test_method_must_match_and_first_contract_wins() {
    let f = fixture().await;
    let diagram = f
        .service
        .create_sequence_diagram(
            f.project_id,
            f.use_case_id,
            "Users",
            "sequenceDiagram\n%% lookups\nClient->>Api: GET /users/7?fields=name\nClient->>Api: DELETE /users/7\nApi-->>Client: ok\n",
        )
        .await
        .unwrap();
    let by_id = f
        .service
        .create_api_contract(f.project_id, NewApiContract::new(HttpMethod::Get, "/users/{id}"))
        .await
        .unwrap();
    f.service
        .create_api_contract(f.project_id, NewApiContract::new(HttpMethod::Get, "/users/*"))
        .await
        .unwrap();
    f.service
        .create_api_contract(f.project_id, NewApiContract::new(HttpMethod::Post, "/users/{id}"))
        .await
        .unwrap();

    let links = LinkResolver::new(f.store.clone())
        .auto_detect(diagram.id)
        .await
        .unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].api_id, by_id.id);
    assert_eq!(links[0].line_number, Some(3));

    let report = ConsistencyAnalyzer::new(f.store.clone())
        .check_project(f.project_id)
        .await
        .unwrap();
    let mismatches: Vec<_> = report.issues_of(IssueType::ApiSequenceMismatch).collect();
    assert_eq!(mismatches.len(), 1);
    assert_eq!(mismatches[0].details.as_ref().unwrap()["method"], "DELETE");
}

#[tokio::test]
async fn test_unusable_template_is_skipped() {
    let f = fixture().await;
    let diagram = f
        .service
        .create_sequence_diagram(
            f.project_id,
            f.use_case_id,
            "Health",
            "sequenceDiagram\nProbe->>Api: GET /health\n",
        )
        .await
        .unwrap();
    let broken = ApiContract::new(
        f.project_id,
        "API-GEN-900".to_string(),
        HttpMethod::Get,
        "/health{".to_string(),
    );
    f.store.create_api_contract(broken).await.unwrap();
    let health = f
        .service
        .create_api_contract(f.project_id, NewApiContract::new(HttpMethod::Get, "/health"))
        .await
        .unwrap();

    let links = LinkResolver::new(f.store.clone())
        .auto_detect(diagram.id)
        .await
        .unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].api_id, health.id);
}

#[tokio::test]
async fn test_missing_diagram_is_not_found() {
    let f = fixture().await;
    let err = LinkResolver::new(f.store.clone())
        .auto_detect(Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Storage(StorageError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_earliest_contract_wins_past_three_digit_codes() {
    let f = fixture().await;
    let diagram = f
        .service
        .create_sequence_diagram(
            f.project_id,
            f.use_case_id,
            "Widgets",
            "sequenceDiagram\nClient->>Api: GET /widgets/42\n",
        )
        .await
        .unwrap();

    let mut older = ApiContract::new(
        f.project_id,
        "API-GEN-999".to_string(),
        HttpMethod::Get,
        "/widgets/*".to_string(),
    );
    older.created_at = Utc::now() - chrono::Duration::seconds(5);
    let newer = ApiContract::new(
        f.project_id,
        "API-GEN-1000".to_string(),
        HttpMethod::Get,
        "/widgets/{id}".to_string(),
    );
    f.store.create_api_contract(newer.clone()).await.unwrap();
    f.store.create_api_contract(older.clone()).await.unwrap();

    let codes: Vec<String> = f
        .store
        .list_api_contracts(f.project_id)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.code)
        .collect();
    assert_eq!(codes, vec!["API-GEN-999", "API-GEN-1000"]);

    let links = LinkResolver::new(f.store.clone())
        .auto_detect(diagram.id)
        .await
        .unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].api_id, older.id);
}
