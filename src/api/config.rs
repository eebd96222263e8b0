//! Runtime configuration read from the environment.

use std::time::Duration;
use tracing::warn;

/// Attempts per allocation before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Base delay between attempts; attempt `n` waits `n * base`.
pub const DEFAULT_BACKOFF_MS: u64 = 25;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatorConfig {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// PostgreSQL connection string. Required by the commands that read stored artifacts.
    pub database_url: Option<String>,
    pub allocator: AllocatorConfig,
    /// `SPEC_LOG_FORMAT=json` switches log output to JSON lines.
    pub log_json: bool,
}

impl EngineConfig {
    /// Build configuration from `DATABASE_URL`, `SPEC_ALLOCATOR_BACKOFF_MS`,
    /// `SPEC_ALLOCATOR_MAX_ATTEMPTS` and `SPEC_LOG_FORMAT`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut allocator = AllocatorConfig::default();

        if let Some(raw) = lookup("SPEC_ALLOCATOR_BACKOFF_MS") {
            match raw.trim().parse::<u64>() {
                Ok(ms) => allocator.backoff = Duration::from_millis(ms),
                Err(_) => warn!("Ignoring invalid SPEC_ALLOCATOR_BACKOFF_MS={}", raw),
            }
        }

        if let Some(raw) = lookup("SPEC_ALLOCATOR_MAX_ATTEMPTS") {
            match raw.trim().parse::<u32>() {
                Ok(n) if (1..=10).contains(&n) => allocator.max_attempts = n,
                _ => warn!(
                    "Ignoring invalid SPEC_ALLOCATOR_MAX_ATTEMPTS={}, using {}",
                    raw, DEFAULT_MAX_ATTEMPTS
                ),
            }
        }

        Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            allocator,
            log_json: lookup("SPEC_LOG_FORMAT")
                .is_some_and(|format| format.trim().eq_ignore_ascii_case("json")),
        }
    }
}
