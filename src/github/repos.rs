use octocrab::models::repos::{Content, Release};
use octocrab::models::Repository;
use octocrab::params;
use serde_json::json;
use tracing::{debug, info, warn};

use super::client::{GitHubClient, PER_PAGE};
use super::errors::GitHubError;
use super::types::GitTree;

/// Repository-scoped reads and writes: trees, file contents, latest release.
#[derive(Debug, Clone)]
pub struct RepoHandler<'a> {
    client: &'a GitHubClient,
    repo: String,
}

impl<'a> RepoHandler<'a> {
    pub fn new(client: &'a GitHubClient, repo: &str) -> Self {
        Self {
            client,
            repo: repo.to_string(),
        }
    }

    fn repos(&self) -> octocrab::repos::RepoHandler<'a> {
        self.client.octocrab().repos(self.client.org(), &self.repo)
    }

    /// Recursive git tree for `reference` (a branch, tag, sha or `HEAD`).
    ///
    /// octocrab has no trees endpoint, so this one goes through the generic
    /// `get` with [`GitTree`] as the response model.
    pub async fn tree(&self, reference: &str) -> Result<GitTree, GitHubError> {
        let route = format!(
            "/repos/{}/{}/git/trees/{reference}",
            self.client.org(),
            self.repo
        );
        let tree: GitTree = self
            .client
            .send(
                self.client
                    .octocrab()
                    .get(route, Some(&[("recursive", "1")])),
            )
            .await?;
        if tree.truncated {
            warn!(repo = %self.repo, "Git tree listing was truncated by GitHub");
        }
        Ok(tree)
    }

    /// Decoded UTF-8 content of `path`, or `None` when the file is missing or empty.
    pub async fn file_content(
        &self,
        path: &str,
        reference: Option<&str>,
    ) -> Result<Option<String>, GitHubError> {
        let repos = self.repos();
        let mut request = repos.get_content().path(path);
        if let Some(reference) = reference {
            request = request.r#ref(reference);
        }
        let mut items = match self.client.send(request.send()).await {
            Ok(items) => items,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err),
        };
        Ok(items.take_items().first().and_then(file_text))
    }

    /// Create `path` on `branch` through the contents API.
    pub async fn create_file(
        &self,
        path: &str,
        content: &str,
        message: &str,
        branch: &str,
    ) -> Result<(), GitHubError> {
        self.client
            .send_mutation(
                self.repos()
                    .create_file(path, message, content)
                    .branch(branch)
                    .send(),
            )
            .await?;
        info!(repo = %self.repo, path, branch, "Created file");
        Ok(())
    }

    /// Lightweight tag `refs/tags/{tag}` at `sha`.
    pub async fn create_tag(&self, tag: &str, sha: &str) -> Result<(), GitHubError> {
        let reference = params::repos::Reference::Tag(tag.to_string());
        self.client
            .send_mutation(self.repos().create_ref(&reference, sha))
            .await?;
        info!(repo = %self.repo, tag, sha, "Created tag");
        Ok(())
    }

    pub async fn latest_release(&self) -> Result<Release, GitHubError> {
        self.client
            .send(self.repos().releases().get_latest())
            .await
    }

    pub async fn delete(&self) -> Result<(), GitHubError> {
        self.client.send_mutation(self.repos().delete()).await?;
        info!(repo = %self.repo, "Deleted repository");
        Ok(())
    }
}

/// Text of a file entry; directories and empty files yield `None`.
fn file_text(content: &Content) -> Option<String> {
    if content.r#type != "file" {
        return None;
    }
    content
        .decoded_content()
        .filter(|text| !text.trim().is_empty())
}

impl GitHubClient {
    /// Every public repository of the organization, across all pages.
    pub async fn list_org_repositories(&self) -> Result<Vec<Repository>, GitHubError> {
        let orgs = self.octocrab().orgs(self.org());
        let repos = self
            .send_all_pages(
                orgs.list_repos()
                    .repo_type(params::repos::Type::Public)
                    .per_page(PER_PAGE)
                    .send(),
            )
            .await?;
        debug!(org = %self.org(), count = repos.len(), "Listed organization repositories");
        Ok(repos)
    }

    /// octocrab only creates repositories for the authenticated user, so the
    /// organization route is posted directly.
    pub async fn create_org_repository(
        &self,
        name: &str,
        description: &str,
    ) -> Result<Repository, GitHubError> {
        let route = format!("/orgs/{}/repos", self.org());
        let body = json!({
            "name": name,
            "description": description,
            "private": false,
            "visibility": "public",
            "auto_init": false,
        });
        let repo: Repository = self
            .send_mutation(self.octocrab().post(route, Some(&body)))
            .await?;
        info!(org = %self.org(), repo = %repo.name, "Created repository");
        Ok(repo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(kind: &str, encoded: Option<&str>) -> Content {
        serde_json::from_value(json!({
            "name": "dependabot.yml",
            "path": ".github/dependabot.yml",
            "sha": "abc",
            "size": 10,
            "url": "https://api.github.com/repos/o/r/contents/.github/dependabot.yml",
            "type": kind,
            "encoding": "base64",
            "content": encoded,
            "_links": {
                "self": "https://api.github.com/repos/o/r/contents/.github/dependabot.yml"
            }
        }))
        .unwrap()
    }

    #[test]
    fn decodes_wrapped_base64() {
        // "version: 2\nupdates: []\n", wrapped the way GitHub wraps it
        let wrapped = "dmVyc2lvbjog\nMgp1cGRhdGVzOiBbXQo=\n";
        assert_eq!(
            file_text(&content("file", Some(wrapped))).as_deref(),
            Some("version: 2\nupdates: []\n")
        );
    }

    #[test]
    fn empty_content_is_none() {
        assert_eq!(file_text(&content("file", None)), None);
        assert_eq!(file_text(&content("file", Some("ICAK"))), None);
    }

    #[test]
    fn directories_are_not_files() {
        assert_eq!(file_text(&content("dir", Some("eA=="))), None);
    }
}
