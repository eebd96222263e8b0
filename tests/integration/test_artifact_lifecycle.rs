//! Create/update/delete paths against the in-memory backend.

use serde_json::json;
use spec_integrity::error::EngineError;
use spec_integrity::models::{ApiContract, DtoKind, DtoRole, HttpMethod, ParseStatus, SchemaNode};
use spec_integrity::services::{ArtifactService, NewApiContract};
use spec_integrity::storage::{
    API_ENDPOINT_ENTITY, MemoryStorageBackend, StorageBackend, StorageError,
};
use std::sync::Arc;

async fn setup() -> (ArtifactService, Arc<MemoryStorageBackend>, uuid::Uuid) {
    let store = Arc::new(MemoryStorageBackend::new());
    let service = ArtifactService::new(store.clone());
    let project = service
        .create_project("Storefront", Some("Online shop".to_string()))
        .await
        .unwrap();
    (service, store, project.id)
}

#[tokio::test]
async fn test_module_hierarchy_guards() {
    let (service, _store, project_id) = setup().await;
    let root = service.create_module(project_id, "Catalog", None).await.unwrap();
    let child = service
        .create_module(project_id, "Search", Some(root.id))
        .await
        .unwrap();
    let grandchild = service
        .create_module(project_id, "Facets", Some(child.id))
        .await
        .unwrap();
    assert_eq!(root.code, "MOD-001");
    assert_eq!(grandchild.code, "MOD-003");

    let err = service
        .move_module(root.id, Some(grandchild.id))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::HierarchyCycle { .. }));

    let err = service.move_module(child.id, Some(child.id)).await.unwrap_err();
    assert!(matches!(err, EngineError::HierarchyCycle { .. }));

    let moved = service.move_module(grandchild.id, None).await.unwrap();
    assert!(moved.is_root());

    let err = service.delete_module(root.id).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::HasDependents { dependent_type: "child modules", count: 1, .. }
    ));
}

#[tokio::test]
async fn test_delete_rejects_owned_artifacts() {
    let (service, store, project_id) = setup().await;
    let module = service.create_module(project_id, "Checkout", None).await.unwrap();
    let use_case = service
        .create_use_case(project_id, module.id, "Pay by card")
        .await
        .unwrap();
    let diagram = service
        .create_sequence_diagram(project_id, use_case.id, "Card flow", "sequenceDiagram\n")
        .await
        .unwrap();

    let err = service.delete_module(module.id).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::HasDependents { dependent_type: "use cases", .. }
    ));
    let err = service.delete_use_case(use_case.id).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::HasDependents { dependent_type: "sequence diagrams", .. }
    ));

    service.delete_sequence_diagram(diagram.id).await.unwrap();
    service.delete_use_case(use_case.id).await.unwrap();
    service.delete_module(module.id).await.unwrap();
    assert!(store.get_module(module.id).await.unwrap().is_none());

    // Numbers are never handed out twice, even after deletion.
    let next = service.create_module(project_id, "Returns", None).await.unwrap();
    assert_eq!(next.code, "MOD-002");
}

#[tokio::test]
async fn test_diagram_parse_status_follows_source() {
    let (service, store, project_id) = setup().await;
    let module = service.create_module(project_id, "Orders", None).await.unwrap();
    let use_case = service
        .create_use_case(project_id, module.id, "Place order")
        .await
        .unwrap();

    let diagram = service
        .create_sequence_diagram(
            project_id,
            use_case.id,
            "Place order",
            "sequenceDiagram\nalt in stock\nUser->>Api: POST /orders\n",
        )
        .await
        .unwrap();
    assert_eq!(diagram.code, "SEQ-001");
    assert_eq!(diagram.parse_status, ParseStatus::Error);
    assert!(diagram.parse_error.as_deref().unwrap().contains("'alt'"));

    let fixed = service
        .update_diagram_source(
            diagram.id,
            "sequenceDiagram\nalt in stock\nUser->>Api: POST /orders\nend\n",
        )
        .await
        .unwrap();
    assert_eq!(fixed.parse_status, ParseStatus::Success);
    assert_eq!(fixed.parse_error, None);

    let formatted = service.format_diagram_source(diagram.id).await.unwrap();
    assert_eq!(
        formatted.source,
        "sequenceDiagram\n    alt in stock\n        User->>Api: POST /orders\n    end\n"
    );
    assert_eq!(formatted.parse_status, ParseStatus::Success);

    let reparsed = service.reparse_diagram(diagram.id).await.unwrap();
    assert_eq!(reparsed.parse_status, ParseStatus::Success);
    let stored = store.get_sequence_diagram(diagram.id).await.unwrap().unwrap();
    assert_eq!(stored.source, formatted.source);
}

#[tokio::test]
async fn test_api_contract_codes_and_uniqueness() {
    let (service, _store, project_id) = setup().await;

    let get_user = service
        .create_api_contract(
            project_id,
            NewApiContract::new(HttpMethod::Get, "/users/{id}")
                .with_domain("user service!!")
                .with_description("Fetch a user"),
        )
        .await
        .unwrap();
    assert_eq!(get_user.code, "API-USER-SERVICE-001");
    assert_eq!(get_user.domain.as_deref(), Some("USER-SERVICE"));

    let health = service
        .create_api_contract(project_id, NewApiContract::new(HttpMethod::Get, "/health"))
        .await
        .unwrap();
    assert_eq!(health.code, "API-GEN-001");

    let err = service
        .create_api_contract(
            project_id,
            NewApiContract::new(HttpMethod::Get, "/users/{id}").with_domain("users"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::DuplicateEndpoint { .. }));

    let err = service
        .create_api_contract(project_id, NewApiContract::new(HttpMethod::Get, "/users/{id"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTemplate { .. }));

    let put_user = service
        .create_api_contract(
            project_id,
            NewApiContract::new(HttpMethod::Put, "/users/{id}").with_domain("User Service"),
        )
        .await
        .unwrap();
    assert_eq!(put_user.code, "API-USER-SERVICE-002");
}

#[tokio::test]
async fn test_dto_links_enforce_role() {
    let (service, _store, project_id) = setup().await;
    let api = service
        .create_api_contract(
            project_id,
            NewApiContract::new(HttpMethod::Post, "/users").with_specs(
                SchemaNode::from(json!({"email": "string"})),
                SchemaNode::from(json!({"id": "integer"})),
            ),
        )
        .await
        .unwrap();
    let request = service
        .create_dto_schema(
            project_id,
            "CreateUser",
            DtoKind::Request,
            Some("users"),
            SchemaNode::from(json!({"email": "string"})),
        )
        .await
        .unwrap();
    assert_eq!(request.code, "DTO-USERS-001");

    let err = service
        .link_api_dto(api.id, request.id, DtoRole::Res)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::DtoRoleMismatch { .. }));

    let link = service
        .link_api_dto(api.id, request.id, DtoRole::Req)
        .await
        .unwrap();
    assert_eq!(link.role, DtoRole::Req);

    let err = service
        .link_api_dto(api.id, request.id, DtoRole::Req)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Storage(StorageError::Duplicate { .. })
    ));
}

#[tokio::test]
async fn test_manual_sequence_link_and_cascade() {
    let (service, store, project_id) = setup().await;
    let module = service.create_module(project_id, "Auth", None).await.unwrap();
    let use_case = service
        .create_use_case(project_id, module.id, "Log in")
        .await
        .unwrap();
    let diagram = service
        .create_sequence_diagram(
            project_id,
            use_case.id,
            "Login",
            "sequenceDiagram\nUser->>Api: POST /sessions\n",
        )
        .await
        .unwrap();
    let api = service
        .create_api_contract(project_id, NewApiContract::new(HttpMethod::Post, "/sessions"))
        .await
        .unwrap();

    let step = Some(("User->>Api: POST /sessions".to_string(), 2));
    service
        .link_api_sequence(api.id, diagram.id, step.clone())
        .await
        .unwrap();
    let err = service
        .link_api_sequence(api.id, diagram.id, step)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Storage(StorageError::Duplicate { .. })
    ));

    service.delete_api_contract(api.id).await.unwrap();
    assert!(store.list_api_sequence_links(project_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_backend_guards_references_and_endpoints() {
    let (service, store, project_id) = setup().await;
    let parent = service.create_module(project_id, "Billing", None).await.unwrap();
    service
        .create_module(project_id, "Invoices", Some(parent.id))
        .await
        .unwrap();
    let use_case = service
        .create_use_case(project_id, parent.id, "Send invoice")
        .await
        .unwrap();
    service
        .create_sequence_diagram(project_id, use_case.id, "Invoice flow", "sequenceDiagram\n")
        .await
        .unwrap();

    // Deletes that skip the service checks are still refused by the backend.
    let err = store.delete_module(parent.id).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict { .. }));
    let err = store.delete_use_case(use_case.id).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict { .. }));

    let first = ApiContract::new(
        project_id,
        "API-GEN-001".to_string(),
        HttpMethod::Post,
        "/invoices".to_string(),
    );
    let second = ApiContract::new(
        project_id,
        "API-GEN-002".to_string(),
        HttpMethod::Post,
        "/invoices".to_string(),
    );
    store.create_api_contract(first).await.unwrap();
    let err = store.create_api_contract(second).await.unwrap_err();
    assert!(err.is_duplicate_of(API_ENDPOINT_ENTITY));
    assert_eq!(store.list_api_contracts(project_id).await.unwrap().len(), 1);
}
