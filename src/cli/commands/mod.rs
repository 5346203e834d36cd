use anyhow::{Context, Result};

use crate::cli::RepoSelection;
use crate::config::SyncConfig;
use crate::github::{GitHubClient, GitHubOps};

pub mod backfill;
pub mod sync;

pub use backfill::BackfillCommand;
pub use sync::SyncCommand;

#[allow(async_fn_in_trait)]
pub trait Command {
    async fn execute(&self, config: SyncConfig) -> Result<()>;
}

/// Apply the `--org` override and build the client.
///
/// Fails before any remote call when no token is configured.
pub fn connect(config: &mut SyncConfig, org: Option<&str>) -> Result<GitHubClient> {
    if let Some(org) = org {
        config.github.organization = org.to_string();
    }
    let client = config.github_client()?;
    tracing::debug!(org = %config.github.organization, "GitHub client ready");
    Ok(client)
}

/// The single named repo, or every prefix-matching repo of the org.
pub async fn resolve_repositories(
    ops: &dyn GitHubOps,
    selection: &RepoSelection,
    prefix: &str,
) -> Result<Vec<String>> {
    if let Some(repo) = &selection.repo {
        return Ok(vec![repo.clone()]);
    }
    println!("Listing {prefix}* repos...");
    let repos = ops
        .list_repositories(prefix)
        .await
        .context("Failed to list organization repositories")?;
    println!("Found {} repos", repos.len());
    Ok(repos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::client::MockGitHubOps;

    #[tokio::test]
    async fn single_repo_needs_no_listing() {
        let mut ops = MockGitHubOps::new();
        ops.expect_list_repositories().never();
        let selection = RepoSelection {
            repo: Some("tf-aws-x".to_string()),
            all: false,
        };

        let repos = resolve_repositories(&ops, &selection, "tf-").await.unwrap();
        assert_eq!(repos, vec!["tf-aws-x".to_string()]);
    }

    #[tokio::test]
    async fn all_lists_by_prefix() {
        let mut ops = MockGitHubOps::new();
        ops.expect_list_repositories()
            .withf(|prefix| prefix == "tf-")
            .times(1)
            .returning(|_| Ok(vec!["tf-aws-a".to_string(), "tf-azurerm-b".to_string()]));
        let selection = RepoSelection {
            repo: None,
            all: true,
        };

        let repos = resolve_repositories(&ops, &selection, "tf-").await.unwrap();
        assert_eq!(repos.len(), 2);
    }

    #[test]
    fn missing_token_fails_before_any_call() {
        let mut config = SyncConfig::default();
        let err = connect(&mut config, Some("someorg")).unwrap_err();
        assert!(err.to_string().contains("GITHUB_TOKEN"));
        assert_eq!(config.github.organization, "someorg");
    }
}
