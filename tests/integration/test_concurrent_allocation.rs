//! Concurrent allocation tests: one scope key, many writers.

use spec_integrity::error::EngineError;
use spec_integrity::models::{ArtifactKind, HttpMethod};
use spec_integrity::services::{AllocationRequest, ArtifactService, CodeAllocator, NewApiContract};
use spec_integrity::storage::{MemoryStorageBackend, StorageBackend};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

const WRITERS: usize = 64;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_allocations_are_distinct() {
    let store = Arc::new(MemoryStorageBackend::new());
    let allocator = CodeAllocator::new(store.clone());
    let project_id = Uuid::new_v4();

    let mut handles = Vec::with_capacity(WRITERS);
    for _ in 0..WRITERS {
        let allocator = allocator.clone();
        handles.push(tokio::spawn(async move {
            let request = AllocationRequest::new(project_id, ArtifactKind::ApiContract)
                .with_scope(Some("ORDERS"), None)
                .with_domain("orders");
            allocator.allocate(&request).await
        }));
    }

    let mut codes = HashSet::new();
    for handle in handles {
        let code = handle.await.expect("task panicked").expect("allocation failed");
        assert!(codes.insert(code.clone()), "duplicate code {}", code);
    }

    let numbers: HashSet<u32> = codes
        .iter()
        .map(|code| code.rsplit('-').next().unwrap().parse().unwrap())
        .collect();
    let expected: HashSet<u32> = (1..=WRITERS as u32).collect();
    assert_eq!(numbers, expected);

    let key = AllocationRequest::new(project_id, ArtifactKind::ApiContract)
        .with_scope(Some("ORDERS"), None)
        .counter_key();
    assert_eq!(
        store.counter_next_number(&key).await,
        Some(WRITERS as i64 + 1)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_module_creation() {
    let store = Arc::new(MemoryStorageBackend::new());
    let service = ArtifactService::new(store.clone());
    let project = service.create_project("Payments", None).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..20 {
        let service = service.clone();
        let project_id = project.id;
        handles.push(tokio::spawn(async move {
            service
                .create_module(project_id, &format!("Module {}", i), None)
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let modules = store.list_modules(project.id).await.unwrap();
    let codes: HashSet<&str> = modules.iter().map(|m| m.code.as_str()).collect();
    assert_eq!(modules.len(), 20);
    assert_eq!(codes.len(), 20);
    assert!(codes.contains("MOD-001"));
    assert!(codes.contains("MOD-020"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_endpoint_stores_one_contract() {
    let store = Arc::new(MemoryStorageBackend::new());
    let service = ArtifactService::new(store.clone());
    let project = service.create_project("Accounts", None).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = service.clone();
        let project_id = project.id;
        handles.push(tokio::spawn(async move {
            service
                .create_api_contract(project_id, NewApiContract::new(HttpMethod::Get, "/users"))
                .await
        }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.expect("task panicked") {
            Ok(_) => created += 1,
            Err(EngineError::DuplicateEndpoint { method, endpoint, .. }) => {
                assert_eq!(method, "GET");
                assert_eq!(endpoint, "/users");
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(store.list_api_contracts(project.id).await.unwrap().len(), 1);
}
