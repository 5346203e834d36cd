pub mod actions;
pub mod branches;
pub mod client;
pub mod errors;
pub mod pulls;
pub mod releases;
pub mod repos;
pub mod types;

pub use actions::{RunConclusion, RunSelection, RunStatus, WorkflowRun};
pub use client::{GitHubClient, GitHubOps};
pub use errors::GitHubError;
pub use types::{PullRequestRef, TreeEntry};
