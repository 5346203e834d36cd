use anyhow::{bail, Context, Result};

use super::{connect, resolve_repositories, Command};
use crate::cli::RepoSelection;
use crate::config::SyncConfig;
use crate::github::GitHubOps;
use crate::observability::github_metrics;
use crate::skeleton::SkeletonManifest;
use crate::sync::WorkflowSync;
use crate::templates::{Provider, TemplateSet};
use crate::versioning::SemverTag;

pub struct SyncCommand {
    pub selection: RepoSelection,
    pub dry_run: bool,
    pub org: Option<String>,
    pub version: Option<String>,
    pub provider: Option<Provider>,
    pub branch: Option<String>,
    pub skip_skeleton_check: bool,
}

impl SyncCommand {
    /// `--version` as given, or the latest release tag of the workflows repo.
    async fn target_version(&self, ops: &dyn GitHubOps, workflows_repo: &str) -> Result<String> {
        if let Some(version) = &self.version {
            if SemverTag::parse(version).is_none() {
                bail!("--version must look like X.Y.Z, got '{version}'");
            }
            return Ok(version.clone());
        }
        println!("Fetching latest {workflows_repo} version...");
        ops.latest_release_tag(workflows_repo)
            .await
            .with_context(|| format!("Failed to look up the latest release of {workflows_repo}"))
    }
}

impl Command for SyncCommand {
    async fn execute(&self, mut config: SyncConfig) -> Result<()> {
        if let Some(branch) = &self.branch {
            config.sync.branch = branch.clone();
        }
        let client = connect(&mut config, self.org.as_deref())?;

        let templates = TemplateSet::load(config.sync.templates_dir.as_deref())?;
        templates.validate()?;

        if self.skip_skeleton_check {
            println!("Skipping skeleton check");
        } else {
            println!("Validating templates against skeleton repo...");
            let manifest = SkeletonManifest::load(config.sync.templates_dir.as_deref())?;
            manifest.verify(&client, &config.sync.skeleton_repo).await?;
            println!("  Templates match {}", config.sync.skeleton_repo);
        }

        let version = self
            .target_version(&client, &config.sync.workflows_repo)
            .await?;
        println!("Target version: {version}");

        let repos = resolve_repositories(&client, &self.selection, &config.sync.repo_prefix).await?;
        let sync = WorkflowSync::new(
            &client,
            &config,
            templates,
            &version,
            self.provider,
            self.dry_run,
        );
        let summary = sync.run(&repos).await;
        println!("\n{summary}");
        github_metrics().log_stats();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::client::MockGitHubOps;

    fn command(version: Option<&str>) -> SyncCommand {
        SyncCommand {
            selection: RepoSelection {
                repo: Some("tf-aws-x".to_string()),
                all: false,
            },
            dry_run: true,
            org: None,
            version: version.map(str::to_string),
            provider: None,
            branch: None,
            skip_skeleton_check: true,
        }
    }

    #[tokio::test]
    async fn explicit_version_is_used_verbatim() {
        let mut ops = MockGitHubOps::new();
        ops.expect_latest_release_tag().never();

        let version = command(Some("0.14.0"))
            .target_version(&ops, "launch-workflows")
            .await
            .unwrap();
        assert_eq!(version, "0.14.0");
    }

    #[tokio::test]
    async fn malformed_version_is_rejected() {
        let ops = MockGitHubOps::new();
        let err = command(Some("latest"))
            .target_version(&ops, "launch-workflows")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("X.Y.Z"));
    }

    #[tokio::test]
    async fn defaults_to_latest_workflows_release() {
        let mut ops = MockGitHubOps::new();
        ops.expect_latest_release_tag()
            .withf(|repo| repo == "launch-workflows")
            .times(1)
            .returning(|_| Ok("0.15.2".to_string()));

        let version = command(None)
            .target_version(&ops, "launch-workflows")
            .await
            .unwrap();
        assert_eq!(version, "0.15.2");
    }
}
