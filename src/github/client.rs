use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Jitter, Quota, RateLimiter};
use octocrab::Octocrab;
use octocrab::Page;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::actions::ActionsHandler;
use super::branches::BranchHandler;
use super::errors::GitHubError;
use super::pulls::PullRequestHandler;
use super::releases::ReleaseHandler;
use super::repos::RepoHandler;
use super::types::{PullRequestRef, TreeEntry};
use crate::observability::github_metrics;

/// GitHub caps `per_page` at 100 for every listing endpoint used here.
pub(crate) const PER_PAGE: u8 = 100;

/// Remote operations the batch commands depend on.
///
/// `GitHubClient` is the production implementation; tests substitute fakes or
/// the generated `MockGitHubOps`.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait GitHubOps: Send + Sync {
    /// Names of the organization's public repositories starting with `prefix`, sorted.
    async fn list_repositories(&self, prefix: &str) -> Result<Vec<String>, GitHubError>;
    /// Recursive tree of the default branch head.
    async fn fetch_tree(&self, repo: &str) -> Result<Vec<TreeEntry>, GitHubError>;
    /// Decoded text of a file on the default branch; `None` when absent or empty.
    async fn fetch_file_content(&self, repo: &str, path: &str) -> Result<Option<String>, GitHubError>;
    async fn list_tag_names(&self, repo: &str) -> Result<Vec<String>, GitHubError>;
    async fn has_releases(&self, repo: &str) -> Result<bool, GitHubError>;
    /// Create a release at `tag`, titled with the tag name, with generated notes.
    async fn create_release(&self, repo: &str, tag: &str) -> Result<(), GitHubError>;
    /// Tag name of the release GitHub marks as latest.
    async fn latest_release_tag(&self, repo: &str) -> Result<String, GitHubError>;
    async fn branch_exists(&self, repo: &str, branch: &str) -> Result<bool, GitHubError>;
    async fn create_pull_request(
        &self,
        repo: &str,
        title: &str,
        head: &str,
        base: &str,
        body: &str,
    ) -> Result<PullRequestRef, GitHubError>;
    /// Create the label, or recolor it when it already exists.
    async fn ensure_label(&self, repo: &str, name: &str, color: &str) -> Result<(), GitHubError>;
    async fn add_labels(&self, repo: &str, number: u64, labels: Vec<String>) -> Result<(), GitHubError>;
}

#[derive(Debug, Clone)]
pub struct GitHubClient {
    octocrab: Octocrab,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
    org: String,
}

impl GitHubClient {
    pub fn new(token: &str, org: &str) -> Result<Self, GitHubError> {
        Self::build(token, org, None, 5)
    }

    /// Client pointed at a non-default API root (GitHub Enterprise, or a mock server in tests).
    pub fn with_base_uri(token: &str, org: &str, base_uri: &str) -> Result<Self, GitHubError> {
        Self::build(token, org, Some(base_uri), 50)
    }

    pub fn build(
        token: &str,
        org: &str,
        base_uri: Option<&str>,
        requests_per_second: u32,
    ) -> Result<Self, GitHubError> {
        if token.trim().is_empty() {
            return Err(GitHubError::TokenNotFound(
                "An empty GitHub token was supplied".to_string(),
            ));
        }

        let mut builder = Octocrab::builder().personal_token(token.to_string());
        if let Some(base_uri) = base_uri {
            builder = builder.base_uri(base_uri)?;
        }
        let octocrab = builder.build()?;

        // Primary limit is 5000/hour, but bursts of content writes trip the
        // secondary limits well before that.
        let per_second = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(per_second).allow_burst(per_second);
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        Ok(Self {
            octocrab,
            rate_limiter,
            org: org.to_string(),
        })
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    pub fn octocrab(&self) -> &Octocrab {
        &self.octocrab
    }

    pub fn repos(&self, repo: &str) -> RepoHandler<'_> {
        RepoHandler::new(self, repo)
    }

    pub fn releases(&self, repo: &str) -> ReleaseHandler<'_> {
        ReleaseHandler::new(self, repo)
    }

    pub fn branches(&self, repo: &str) -> BranchHandler<'_> {
        BranchHandler::new(self, repo)
    }

    pub fn pulls(&self, repo: &str) -> PullRequestHandler<'_> {
        PullRequestHandler::new(self, repo)
    }

    pub fn actions(&self, repo: &str) -> ActionsHandler<'_> {
        ActionsHandler::new(self, repo)
    }

    pub(crate) async fn throttle(&self) {
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(100)))
            .await;
        github_metrics().record_request();
    }

    fn observe<T>(result: Result<T, octocrab::Error>) -> Result<T, GitHubError> {
        result.map_err(|err| {
            let err = GitHubError::from(err);
            if err.is_not_found() {
                github_metrics().record_not_found();
            } else {
                github_metrics().record_error();
            }
            err
        })
    }

    /// Await one octocrab request behind the rate limiter.
    pub(crate) async fn send<T, F>(&self, request: F) -> Result<T, GitHubError>
    where
        F: Future<Output = Result<T, octocrab::Error>>,
    {
        self.throttle().await;
        Self::observe(request.await)
    }

    /// Like [`send`](Self::send), but counted as a write.
    pub(crate) async fn send_mutation<T, F>(&self, request: F) -> Result<T, GitHubError>
    where
        F: Future<Output = Result<T, octocrab::Error>>,
    {
        github_metrics().record_mutation();
        self.send(request).await
    }

    /// First page from `request`, then every `next` link after it.
    pub(crate) async fn send_all_pages<T, F>(&self, request: F) -> Result<Vec<T>, GitHubError>
    where
        T: DeserializeOwned,
        F: Future<Output = Result<Page<T>, octocrab::Error>>,
    {
        let first = self.send(request).await?;
        let items = Self::observe(self.octocrab.all_pages(first).await)?;
        debug!(items = items.len(), "Fetched paginated listing");
        Ok(items)
    }
}

#[async_trait]
impl GitHubOps for GitHubClient {
    async fn list_repositories(&self, prefix: &str) -> Result<Vec<String>, GitHubError> {
        let repos = self.list_org_repositories().await?;
        let mut names: Vec<String> = repos
            .into_iter()
            .map(|repo| repo.name)
            .filter(|name| name.starts_with(prefix))
            .collect();
        names.sort();
        Ok(names)
    }

    async fn fetch_tree(&self, repo: &str) -> Result<Vec<TreeEntry>, GitHubError> {
        Ok(self.repos(repo).tree("HEAD").await?.tree)
    }

    async fn fetch_file_content(&self, repo: &str, path: &str) -> Result<Option<String>, GitHubError> {
        self.repos(repo).file_content(path, None).await
    }

    async fn list_tag_names(&self, repo: &str) -> Result<Vec<String>, GitHubError> {
        let tags = self.releases(repo).tags().await?;
        Ok(tags.into_iter().map(|tag| tag.name).collect())
    }

    async fn has_releases(&self, repo: &str) -> Result<bool, GitHubError> {
        self.releases(repo).has_any().await
    }

    async fn create_release(&self, repo: &str, tag: &str) -> Result<(), GitHubError> {
        self.releases(repo).create(tag).await.map(|_| ())
    }

    async fn latest_release_tag(&self, repo: &str) -> Result<String, GitHubError> {
        Ok(self.repos(repo).latest_release().await?.tag_name)
    }

    async fn branch_exists(&self, repo: &str, branch: &str) -> Result<bool, GitHubError> {
        self.branches(repo).exists(branch).await
    }

    async fn create_pull_request(
        &self,
        repo: &str,
        title: &str,
        head: &str,
        base: &str,
        body: &str,
    ) -> Result<PullRequestRef, GitHubError> {
        self.pulls(repo).create(title, head, base, body).await
    }

    async fn ensure_label(&self, repo: &str, name: &str, color: &str) -> Result<(), GitHubError> {
        self.pulls(repo).ensure_label(name, color).await.map(|_| ())
    }

    async fn add_labels(&self, repo: &str, number: u64, labels: Vec<String>) -> Result<(), GitHubError> {
        self.pulls(repo).add_labels(number, &labels).await.map(|_| ())
    }
}
