use octocrab::models::pulls::Merge;
use octocrab::models::Label;
use octocrab::params::pulls::MergeMethod;
use serde_json::json;
use tracing::{info, warn};

use super::client::{GitHubClient, PER_PAGE};
use super::errors::GitHubError;
use super::types::PullRequestRef;

/// Handler for GitHub pull request and label operations
#[derive(Debug, Clone)]
pub struct PullRequestHandler<'a> {
    client: &'a GitHubClient,
    repo: String,
}

impl<'a> PullRequestHandler<'a> {
    pub fn new(client: &'a GitHubClient, repo: &str) -> Self {
        Self {
            client,
            repo: repo.to_string(),
        }
    }

    fn issues(&self) -> octocrab::issues::IssueHandler<'a> {
        self.client.octocrab().issues(self.client.org(), &self.repo)
    }

    /// Create a new pull request
    pub async fn create(
        &self,
        title: &str,
        head_branch: &str,
        base_branch: &str,
        body: &str,
    ) -> Result<PullRequestRef, GitHubError> {
        let pulls = self.client.octocrab().pulls(self.client.org(), &self.repo);
        let pr = self
            .client
            .send_mutation(pulls.create(title, head_branch, base_branch).body(body).send())
            .await?;
        let pr = PullRequestRef::from(&pr);
        info!(
            repo = %self.repo,
            number = pr.number,
            url = pr.html_url.as_deref().unwrap_or_default(),
            "Created pull request"
        );
        Ok(pr)
    }

    /// Merge with a merge commit, the way the web UI does by default.
    pub async fn merge(&self, number: u64) -> Result<Merge, GitHubError> {
        let pulls = self.client.octocrab().pulls(self.client.org(), &self.repo);
        let merged = self
            .client
            .send_mutation(pulls.merge(number).method(MergeMethod::Merge).send())
            .await?;
        info!(repo = %self.repo, number, sha = merged.sha.as_deref().unwrap_or_default(), "Merged pull request");
        Ok(merged)
    }

    /// Create `name` with `color`, or recolor it when it already exists.
    pub async fn ensure_label(&self, name: &str, color: &str) -> Result<Label, GitHubError> {
        let issues = self.issues();
        match self
            .client
            .send_mutation(issues.create_label(name, color, ""))
            .await
        {
            Ok(label) => Ok(label),
            Err(err) if err.status_code() == Some(422) => {
                warn!(repo = %self.repo, label = name, "Label already exists; updating color");
                // octocrab can create and delete labels but not edit them
                let route = format!("/repos/{}/{}/labels/{name}", self.client.org(), self.repo);
                self.client
                    .send_mutation(
                        self.client
                            .octocrab()
                            .patch(route, Some(&json!({ "color": color }))),
                    )
                    .await
            }
            Err(err) => Err(err),
        }
    }

    pub async fn add_labels(&self, number: u64, labels: &[String]) -> Result<Vec<Label>, GitHubError> {
        self.client
            .send_mutation(self.issues().add_labels(number, labels))
            .await
    }

    pub async fn label_names(&self, number: u64) -> Result<Vec<String>, GitHubError> {
        let issues = self.issues();
        let labels = self
            .client
            .send_all_pages(
                issues
                    .list_labels_for_issue(number)
                    .per_page(PER_PAGE)
                    .send(),
            )
            .await?;
        Ok(labels.into_iter().map(|label| label.name).collect())
    }
}
