//! Throwaway repositories for exercising the reusable workflows end to end.
//!
//! A [`TestRepository`] is created in the test organization, seeded with files
//! and branches, and driven through pull requests whose workflow runs are
//! polled until they finish. Rust has no async drop, so callers delete the
//! repository explicitly once the scenario is over.

use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

use octocrab::models::pulls::Merge;
use octocrab::models::repos::{Branch, Release, Tag};

use crate::github::{GitHubClient, GitHubError, PullRequestRef, RunSelection, WorkflowRun};
use crate::wait::{poll_attempts, wait_for, WaitOptions};

pub const DEFAULT_TEST_ORGANIZATION: &str = "nttdtest";
pub const TEST_ORGANIZATION_VAR: &str = "TESTING_ORGANIZATION_NAME";
pub const DEFAULT_README: &str = "# README";

const NAME_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const NAME_SUFFIX_LEN: usize = 8;

/// `test-repo-` followed by eight lowercase alphanumerics.
pub fn random_repo_name() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..NAME_SUFFIX_LEN)
        .map(|_| NAME_ALPHABET[rng.random_range(0..NAME_ALPHABET.len())] as char)
        .collect();
    format!("test-repo-{suffix}")
}

pub fn test_organization() -> String {
    std::env::var(TEST_ORGANIZATION_VAR)
        .ok()
        .filter(|org| !org.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TEST_ORGANIZATION.to_string())
}

pub fn commit_message(path: &str, message: Option<&str>, skip_ci: bool) -> String {
    let message = message.map_or_else(|| format!("Add {path}"), str::to_string);
    if skip_ci {
        format!("{message} [skip ci]")
    } else {
        message
    }
}

fn main_branch_readme(repo: &str) -> String {
    format!("# README for {repo}\n\nThis is the main branch.")
}

#[derive(Debug)]
pub struct TestRepository {
    client: GitHubClient,
    name: String,
}

impl TestRepository {
    /// Create a public, empty repository and wait until the organization
    /// listing shows it.
    pub async fn create(
        client: GitHubClient,
        visible_attempts: u32,
        interval: Duration,
    ) -> Result<Self, GitHubError> {
        let name = random_repo_name();
        let description = format!("Test Repository for Integration Test: {name}");
        client.create_org_repository(&name, &description).await?;

        let repo = Self { client, name };
        let this = &repo;
        let visible = poll_attempts(visible_attempts, interval, move || async move {
            let listed = this.client.list_org_repositories().await?;
            Ok(listed.iter().any(|r| r.name == this.name).then_some(()))
        })
        .await?;
        if visible.is_none() {
            warn!(repo = %repo.name, attempts = visible_attempts, "Repository never appeared in listing");
            let name = repo.name.clone();
            repo.delete().await?;
            return Err(GitHubError::Timeout {
                operation: format!("repository '{name}' visible"),
                duration_ms: interval.as_millis() as u64 * u64::from(visible_attempts),
            });
        }
        info!(repo = %repo.name, org = %repo.client.org(), "Test repository ready");
        Ok(repo)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client(&self) -> &GitHubClient {
        &self.client
    }

    pub async fn delete(self) -> Result<(), GitHubError> {
        self.client.repos(&self.name).delete().await
    }

    /// Commit `content` at `path` on `branch`.
    pub async fn populate_file(
        &self,
        path: &str,
        content: &str,
        branch: &str,
        message: Option<&str>,
        skip_ci: bool,
    ) -> Result<(), GitHubError> {
        let message = commit_message(path, message, skip_ci);
        self.client
            .repos(&self.name)
            .create_file(path, content, &message, branch)
            .await
    }

    pub async fn populate_readme(
        &self,
        branch: &str,
        content: Option<&str>,
    ) -> Result<(), GitHubError> {
        self.populate_file(
            "README.md",
            content.unwrap_or(DEFAULT_README),
            branch,
            None,
            false,
        )
        .await
    }

    /// Make `branch` exist and return it once GitHub reports it.
    ///
    /// Without an origin the branch is created by committing a README to it,
    /// which is how `main` comes to exist in an empty repository. With an
    /// origin, the origin is awaited first and the new branch points at its
    /// head commit.
    pub async fn branch_created(
        &self,
        branch: &str,
        origin: Option<&str>,
        options: WaitOptions,
    ) -> Result<Branch, GitHubError> {
        let handler = self.client.branches(&self.name);
        let branches = &handler;
        match origin {
            None => {
                self.populate_readme(branch, Some(&main_branch_readme(&self.name)))
                    .await?;
            }
            Some(origin) => {
                let operation = format!("origin branch '{origin}'");
                let origin_branch =
                    wait_for(&operation, options, move || branches.get(origin)).await?;
                branches.create(branch, &origin_branch.commit.sha).await?;
            }
        }
        let operation = format!("branch '{branch}'");
        wait_for(&operation, options, move || branches.get(branch)).await
    }

    pub async fn create_pull(
        &self,
        title: &str,
        head: &str,
        base: &str,
        body: &str,
    ) -> Result<PullRequestRef, GitHubError> {
        self.client
            .pulls(&self.name)
            .create(title, head, base, body)
            .await
    }

    pub async fn pull_labels(&self, number: u64) -> Result<Vec<String>, GitHubError> {
        self.client.pulls(&self.name).label_names(number).await
    }

    pub async fn merge_pull(&self, number: u64) -> Result<Merge, GitHubError> {
        self.client.pulls(&self.name).merge(number).await
    }

    /// Releases, drafts included, newest first.
    pub async fn releases(&self) -> Result<Vec<Release>, GitHubError> {
        self.client.releases(&self.name).list().await
    }

    pub async fn tags(&self) -> Result<Vec<Tag>, GitHubError> {
        self.client.releases(&self.name).tags().await
    }

    /// Published release at `tag` on the default branch, with generated notes.
    pub async fn create_release(&self, tag: &str) -> Result<Release, GitHubError> {
        self.client.releases(&self.name).create(tag).await
    }

    /// Point `refs/tags/{tag}` at `sha` without creating a release.
    pub async fn create_tag(&self, tag: &str, sha: &str) -> Result<(), GitHubError> {
        self.client.repos(&self.name).create_tag(tag, sha).await
    }

    /// Publish a drafted release under `tag`, titled with the tag.
    pub async fn publish_release(&self, release: &Release, tag: &str) -> Result<Release, GitHubError> {
        self.client
            .releases(&self.name)
            .publish(release.id.into_inner(), tag)
            .await
    }

    pub async fn workflow_run_created(
        &self,
        workflow_file: &str,
        branch: &str,
        selection: RunSelection,
        options: WaitOptions,
    ) -> Result<WorkflowRun, GitHubError> {
        self.client
            .actions(&self.name)
            .wait_for_run_created(workflow_file, branch, selection, options)
            .await
    }

    pub async fn workflow_run_completed(
        &self,
        run: &WorkflowRun,
        options: WaitOptions,
    ) -> Result<WorkflowRun, GitHubError> {
        self.client
            .actions(&self.name)
            .wait_for_run_completed(run.id, options)
            .await
    }

    pub async fn workflow_run_logs(
        &self,
        run: &WorkflowRun,
        drop_timestamps: bool,
    ) -> Result<String, GitHubError> {
        self.client
            .actions(&self.name)
            .logs(run.id, drop_timestamps)
            .await
    }
}
