// launch-sync: release backfill and reusable-workflow sync for tf-* repositories,
// plus the harness the integration tests drive real pull requests with.

pub mod backfill;
pub mod cli;
pub mod config;
pub mod git;
pub mod github;
pub mod harness;
pub mod observability;
pub mod reconcile;
pub mod skeleton;
pub mod sync;
pub mod telemetry;
pub mod templates;
pub mod versioning;
pub mod wait;

// Re-export key types for easy access
pub use backfill::{BackfillOutcome, BackfillSummary, ReleaseBackfill};
pub use config::SyncConfig;
pub use git::{Git2Operations, GitOperations};
pub use github::{GitHubClient, GitHubError, GitHubOps};
pub use harness::TestRepository;
pub use observability::{create_repo_span, github_metrics, GitHubApiMetrics, OperationTimer};
pub use reconcile::{Action, Plan, Reconciler, RepoSnapshot, RepoState};
pub use skeleton::{SkeletonDriftError, SkeletonManifest};
pub use sync::{SkipReason, SyncOutcome, SyncSummary, WorkflowSync};
pub use telemetry::{generate_correlation_id, init_telemetry};
pub use templates::{ExpectedFiles, Provider, TemplateSet};
pub use versioning::{latest_semver_tag, SemverTag};
pub use wait::{wait_for, WaitOptions};
