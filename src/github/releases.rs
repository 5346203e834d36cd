use octocrab::models::repos::{Release, Tag};
use tracing::info;

use super::client::{GitHubClient, PER_PAGE};
use super::errors::GitHubError;

/// Tags and releases of one repository.
#[derive(Debug, Clone)]
pub struct ReleaseHandler<'a> {
    client: &'a GitHubClient,
    repo: String,
}

impl<'a> ReleaseHandler<'a> {
    pub fn new(client: &'a GitHubClient, repo: &str) -> Self {
        Self {
            client,
            repo: repo.to_string(),
        }
    }

    fn repos(&self) -> octocrab::repos::RepoHandler<'a> {
        self.client.octocrab().repos(self.client.org(), &self.repo)
    }

    /// Every tag, in the order GitHub lists them.
    pub async fn tags(&self) -> Result<Vec<Tag>, GitHubError> {
        let repos = self.repos();
        self.client
            .send_all_pages(repos.list_tags().per_page(PER_PAGE).send())
            .await
    }

    /// Every release, drafts included, newest first.
    pub async fn list(&self) -> Result<Vec<Release>, GitHubError> {
        let repos = self.repos();
        let releases = repos.releases();
        self.client
            .send_all_pages(releases.list().per_page(PER_PAGE).send())
            .await
    }

    /// True when the repository has at least one release (drafts included).
    pub async fn has_any(&self) -> Result<bool, GitHubError> {
        let repos = self.repos();
        let releases = repos.releases();
        let first = self
            .client
            .send(releases.list().per_page(1u8).send())
            .await?;
        Ok(!first.items.is_empty())
    }

    /// Publish a release at `tag`, titled with the tag, with generated notes.
    pub async fn create(&self, tag: &str) -> Result<Release, GitHubError> {
        let repos = self.repos();
        let releases = repos.releases();
        let notes = self
            .client
            .send(releases.generate_release_notes(tag).send())
            .await?;
        let release = self
            .client
            .send_mutation(releases.create(tag).name(tag).body(&notes.body).send())
            .await?;
        info!(repo = %self.repo, tag, release_id = %release.id, "Created release");
        Ok(release)
    }

    /// Take a draft live under `tag`, renaming it to match. The body is kept.
    pub async fn publish(&self, release_id: u64, tag: &str) -> Result<Release, GitHubError> {
        let repos = self.repos();
        let releases = repos.releases();
        let release = self
            .client
            .send_mutation(
                releases
                    .update(release_id)
                    .tag_name(tag)
                    .name(tag)
                    .draft(false)
                    .send(),
            )
            .await?;
        info!(repo = %self.repo, tag, release_id, "Published release");
        Ok(release)
    }
}
