use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

use crate::telemetry::generate_correlation_id;

/// GitHub API usage counters for the whole process
#[derive(Debug, Default)]
pub struct GitHubApiMetrics {
    pub total_requests: AtomicU64,
    pub errors: AtomicU64,
    pub not_found: AtomicU64,
    pub mutations: AtomicU64,
}

impl GitHubApiMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// 404s are routine here (missing files, unborn branches) so they are kept apart from errors.
    pub fn record_not_found(&self) {
        self.not_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_mutation(&self) {
        self.mutations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> GitHubApiStats {
        GitHubApiStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            mutations: self.mutations.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            requests = stats.total_requests,
            errors = stats.errors,
            not_found = stats.not_found,
            mutations = stats.mutations,
            "GitHub API usage"
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GitHubApiStats {
    pub total_requests: u64,
    pub errors: u64,
    pub not_found: u64,
    pub mutations: u64,
}

static GITHUB_METRICS: std::sync::LazyLock<GitHubApiMetrics> =
    std::sync::LazyLock::new(GitHubApiMetrics::new);

pub fn github_metrics() -> &'static GitHubApiMetrics {
    &GITHUB_METRICS
}

/// Span wrapping all work for one repository of a batch.
pub fn create_repo_span(command: &str, repo: &str) -> tracing::Span {
    tracing::info_span!(
        "repo",
        command = command,
        repo.name = repo,
        correlation.id = %generate_correlation_id(),
    )
}

/// Logs how long an operation took when finished.
pub struct OperationTimer {
    operation: String,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub fn finish(self) {
        let duration = self.start.elapsed();
        info!(
            operation = %self.operation,
            duration_ms = duration.as_millis() as u64,
            "Operation completed"
        );
    }
}
