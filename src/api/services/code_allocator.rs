//! Human-readable artifact code allocation.
//!
//! Codes look like `MOD-001` or, for kinds carrying a domain, `API-USER-SERVICE-007`.
//! Numbers come from persisted per-scope counters; they are never reused, and a lost
//! race may leave a gap but never a duplicate.

use crate::config::AllocatorConfig;
use crate::error::EngineError;
use crate::models::ArtifactKind;
use crate::storage::{CounterKey, CounterStore, StorageError};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Domain used when the supplied qualifier normalizes to nothing.
pub const DEFAULT_DOMAIN: &str = "GEN";

/// One allocation request.
#[derive(Debug, Clone)]
pub struct AllocationRequest<'a> {
    pub project_id: Uuid,
    pub artifact_kind: ArtifactKind,
    pub scope_ref1: Option<&'a str>,
    pub scope_ref2: Option<&'a str>,
    pub prefix: &'a str,
    pub domain: Option<&'a str>,
}

impl<'a> AllocationRequest<'a> {
    /// Request using the kind's default prefix and no scope refs.
    pub fn new(project_id: Uuid, artifact_kind: ArtifactKind) -> Self {
        Self {
            project_id,
            artifact_kind,
            scope_ref1: None,
            scope_ref2: None,
            prefix: artifact_kind.default_prefix(),
            domain: None,
        }
    }

    pub fn with_scope(mut self, scope_ref1: Option<&'a str>, scope_ref2: Option<&'a str>) -> Self {
        self.scope_ref1 = scope_ref1;
        self.scope_ref2 = scope_ref2;
        self
    }

    pub fn with_prefix(mut self, prefix: &'a str) -> Self {
        self.prefix = prefix;
        self
    }

    pub fn with_domain(mut self, domain: &'a str) -> Self {
        self.domain = Some(domain);
        self
    }

    pub fn counter_key(&self) -> CounterKey {
        CounterKey::new(self.project_id, self.artifact_kind).scoped(self.scope_ref1, self.scope_ref2)
    }
}

/// Issues unique codes per scope key on top of a [`CounterStore`].
#[derive(Clone)]
pub struct CodeAllocator {
    store: Arc<dyn CounterStore>,
    config: AllocatorConfig,
}

impl CodeAllocator {
    /// Create an allocator with the default retry bound and backoff.
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self::with_config(store, AllocatorConfig::default())
    }

    pub fn with_config(store: Arc<dyn CounterStore>, config: AllocatorConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// Allocate the next code for the request's scope key.
    ///
    /// Conflicting increments are retried as a whole, waiting `attempt * backoff`
    /// between tries. Once `max_attempts` is spent the call fails with
    /// [`EngineError::AllocationFailed`]; non-retryable storage errors surface at once.
    pub async fn allocate(&self, request: &AllocationRequest<'_>) -> Result<String, EngineError> {
        let key = request.counter_key();
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_error: Option<StorageError> = None;

        for attempt in 1..=max_attempts {
            match self.store.increment_counter(&key).await {
                Ok(number) => {
                    let code = format_code(request.prefix, request.domain, number);
                    debug!("Allocated {} for {} (attempt {})", code, key, attempt);
                    return Ok(code);
                }
                Err(e) if e.is_retryable() => {
                    warn!(
                        "Allocation attempt {}/{} for {} conflicted: {}",
                        attempt, max_attempts, key, e
                    );
                    last_error = Some(e);
                    if attempt < max_attempts {
                        tokio::time::sleep(self.config.backoff * attempt).await;
                    }
                }
                Err(e) => return Err(EngineError::Storage(e)),
            }
        }

        Err(EngineError::AllocationFailed {
            key: key.to_string(),
            attempts: max_attempts,
            source: last_error.unwrap_or_else(|| {
                StorageError::Other("allocation retries exhausted".to_string())
            }),
        })
    }
}

/// Normalize a domain qualifier: upper-case, `[A-Z0-9-]` only, single hyphens,
/// no leading or trailing hyphen, `GEN` when nothing is left.
pub fn normalize_domain(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars().flat_map(char::to_uppercase) {
        let c = if c.is_ascii_uppercase() || c.is_ascii_digit() {
            c
        } else {
            '-'
        };
        if c == '-' && (out.is_empty() || out.ends_with('-')) {
            continue;
        }
        out.push(c);
    }
    while out.ends_with('-') {
        out.pop();
    }

    if out.is_empty() {
        DEFAULT_DOMAIN.to_string()
    } else {
        out
    }
}

/// `PREFIX-NNN` or `PREFIX-DOMAIN-NNN`, zero-padded to at least three digits.
pub fn format_code(prefix: &str, domain: Option<&str>, number: i64) -> String {
    match domain {
        Some(domain) => format!("{}-{}-{:03}", prefix, normalize_domain(domain), number),
        None => format!("{}-{:03}", prefix, number),
    }
}
