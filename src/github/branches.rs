use octocrab::models::repos::{Branch, Ref};
use octocrab::params::repos::Reference;
use tracing::info;

use super::client::GitHubClient;
use super::errors::GitHubError;

/// Handler for GitHub branch operations
#[derive(Debug, Clone)]
pub struct BranchHandler<'a> {
    client: &'a GitHubClient,
    repo: String,
}

impl<'a> BranchHandler<'a> {
    pub fn new(client: &'a GitHubClient, repo: &str) -> Self {
        Self {
            client,
            repo: repo.to_string(),
        }
    }

    fn repos(&self) -> octocrab::repos::RepoHandler<'a> {
        self.client.octocrab().repos(self.client.org(), &self.repo)
    }

    /// Branch with its head commit, or `None` while GitHub still answers 404.
    ///
    /// octocrab lists branches but cannot fetch one by name.
    pub async fn get(&self, branch_name: &str) -> Result<Option<Branch>, GitHubError> {
        let route = format!(
            "/repos/{}/{}/branches/{branch_name}",
            self.client.org(),
            self.repo
        );
        match self
            .client
            .send(self.client.octocrab().get(route, None::<&()>))
            .await
        {
            Ok(branch) => Ok(Some(branch)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Check if a branch exists
    pub async fn exists(&self, branch_name: &str) -> Result<bool, GitHubError> {
        let reference = Reference::Branch(branch_name.to_string());
        match self.client.send(self.repos().get_ref(&reference)).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Create `refs/heads/{branch_name}` pointing at `sha`.
    pub async fn create(&self, branch_name: &str, sha: &str) -> Result<Ref, GitHubError> {
        let reference = Reference::Branch(branch_name.to_string());
        let created = self
            .client
            .send_mutation(self.repos().create_ref(&reference, sha))
            .await?;
        info!(repo = %self.repo, branch = branch_name, sha, "Created branch");
        Ok(created)
    }
}
