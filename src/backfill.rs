//! Release backfill: repositories that carry semver tags but no GitHub release
//! get a release at their highest tag, so the release pipeline has something
//! to publish from.

use std::fmt;
use tracing::{info, Instrument};

use crate::github::GitHubOps;
use crate::observability::{create_repo_span, OperationTimer};
use crate::versioning::latest_semver_tag;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackfillOutcome {
    NoTags,
    HasReleases,
    WouldCreate { tag: String },
    Created { tag: String },
    Error(String),
}

impl BackfillOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackfillOutcome::NoTags => "no_tags",
            BackfillOutcome::HasReleases => "has_releases",
            BackfillOutcome::WouldCreate { .. } => "would_create",
            BackfillOutcome::Created { .. } => "created",
            BackfillOutcome::Error(_) => "error",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillSummary {
    pub dry_run: bool,
    pub processed: usize,
    /// Created, or would be created in dry-run mode.
    pub created: usize,
    pub no_tags: usize,
    pub has_releases: usize,
    pub errors: usize,
}

impl BackfillSummary {
    pub fn record(&mut self, outcome: &BackfillOutcome) {
        self.processed += 1;
        match outcome {
            BackfillOutcome::NoTags => self.no_tags += 1,
            BackfillOutcome::HasReleases => self.has_releases += 1,
            BackfillOutcome::WouldCreate { .. } | BackfillOutcome::Created { .. } => {
                self.created += 1
            }
            BackfillOutcome::Error(_) => self.errors += 1,
        }
    }
}

impl fmt::Display for BackfillSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(50);
        writeln!(f, "{rule}\nSummary\n{rule}")?;
        writeln!(f, "  Repos processed:        {}", self.processed)?;
        if self.dry_run {
            writeln!(f, "  Would create releases:  {}", self.created)?;
        } else {
            writeln!(f, "  Created releases:       {}", self.created)?;
        }
        writeln!(f, "  Skipped (no tags):      {}", self.no_tags)?;
        writeln!(f, "  Skipped (has releases): {}", self.has_releases)?;
        write!(f, "  Errors:                 {}", self.errors)
    }
}

pub struct ReleaseBackfill<'a> {
    ops: &'a dyn GitHubOps,
    dry_run: bool,
}

impl<'a> ReleaseBackfill<'a> {
    pub fn new(ops: &'a dyn GitHubOps, dry_run: bool) -> Self {
        Self { ops, dry_run }
    }

    pub async fn run(&self, repos: &[String]) -> BackfillSummary {
        let mut summary = BackfillSummary {
            dry_run: self.dry_run,
            ..BackfillSummary::default()
        };
        for repo in repos {
            let span = create_repo_span("backfill-releases", repo);
            let outcome = self.process_repo(repo).instrument(span).await;
            summary.record(&outcome);
        }
        summary
    }

    /// Never fails: remote errors become [`BackfillOutcome::Error`].
    pub async fn process_repo(&self, repo: &str) -> BackfillOutcome {
        println!("\n=== {repo} ===");
        let timer = OperationTimer::new(&format!("backfill {repo}"));
        let outcome = match self.backfill(repo).await {
            Ok(outcome) => outcome,
            Err(err) => {
                println!("  ERROR: {err}");
                BackfillOutcome::Error(err.to_string())
            }
        };
        info!(repo, outcome = outcome.as_str(), "Backfill finished");
        timer.finish();
        outcome
    }

    async fn backfill(&self, repo: &str) -> Result<BackfillOutcome, crate::github::GitHubError> {
        let tags = self.ops.list_tag_names(repo).await?;
        let Some(latest) = latest_semver_tag(&tags) else {
            println!("  No semver tags found, skipping");
            return Ok(BackfillOutcome::NoTags);
        };
        println!("  Latest semver tag: {latest}");

        if self.ops.has_releases(repo).await? {
            println!("  Already has releases, skipping");
            return Ok(BackfillOutcome::HasReleases);
        }

        let tag = latest.tag;
        if self.dry_run {
            println!("  WOULD CREATE release at {tag}");
            return Ok(BackfillOutcome::WouldCreate { tag });
        }

        println!("  Creating release at {tag}...");
        self.ops.create_release(repo, &tag).await?;
        println!("  Release created: {tag}");
        Ok(BackfillOutcome::Created { tag })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::client::MockGitHubOps;
    use crate::github::GitHubError;

    fn tags(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[tokio::test]
    async fn creates_release_at_highest_tag() {
        let mut ops = MockGitHubOps::new();
        ops.expect_list_tag_names()
            .withf(|repo| repo == "tf-aws-x")
            .returning(|_| Ok(tags(&["v0.1.0", "v0.2.0"])));
        ops.expect_has_releases().returning(|_| Ok(false));
        ops.expect_create_release()
            .withf(|repo, tag| repo == "tf-aws-x" && tag == "v0.2.0")
            .times(1)
            .returning(|_, _| Ok(()));

        let outcome = ReleaseBackfill::new(&ops, false).process_repo("tf-aws-x").await;
        assert_eq!(
            outcome,
            BackfillOutcome::Created {
                tag: "v0.2.0".to_string()
            }
        );
    }

    #[tokio::test]
    async fn no_semver_tags_means_no_mutation() {
        let mut ops = MockGitHubOps::new();
        ops.expect_list_tag_names()
            .returning(|_| Ok(tags(&["latest", "v1.0"])));
        ops.expect_has_releases().never();
        ops.expect_create_release().never();

        let outcome = ReleaseBackfill::new(&ops, false).process_repo("tf-aws-x").await;
        assert_eq!(outcome, BackfillOutcome::NoTags);
    }

    #[tokio::test]
    async fn existing_release_is_left_alone() {
        let mut ops = MockGitHubOps::new();
        ops.expect_list_tag_names().returning(|_| Ok(tags(&["1.0.0"])));
        ops.expect_has_releases().returning(|_| Ok(true));
        ops.expect_create_release().never();

        let outcome = ReleaseBackfill::new(&ops, false).process_repo("tf-aws-x").await;
        assert_eq!(outcome, BackfillOutcome::HasReleases);
    }

    #[tokio::test]
    async fn dry_run_reports_would_create() {
        let mut ops = MockGitHubOps::new();
        ops.expect_list_tag_names()
            .returning(|_| Ok(tags(&["v1.9.0", "v1.10.0", "v2.0.0"])));
        ops.expect_has_releases().returning(|_| Ok(false));
        ops.expect_create_release().never();

        let outcome = ReleaseBackfill::new(&ops, true).process_repo("tf-aws-x").await;
        assert_eq!(
            outcome,
            BackfillOutcome::WouldCreate {
                tag: "v2.0.0".to_string()
            }
        );
    }

    #[tokio::test]
    async fn errors_are_recorded_and_batch_continues() {
        let mut ops = MockGitHubOps::new();
        ops.expect_list_tag_names()
            .withf(|repo| repo == "tf-aws-broken")
            .returning(|_| Err(GitHubError::InvalidResponse("boom".to_string())));
        ops.expect_list_tag_names()
            .withf(|repo| repo == "tf-aws-fine")
            .returning(|_| Ok(tags(&["v0.1.0"])));
        ops.expect_has_releases().returning(|_| Ok(false));
        ops.expect_create_release().never();

        let repos = tags(&["tf-aws-broken", "tf-aws-fine"]);
        let summary = ReleaseBackfill::new(&ops, true).run(&repos).await;

        assert_eq!(
            summary,
            BackfillSummary {
                dry_run: true,
                processed: 2,
                created: 1,
                no_tags: 0,
                has_releases: 0,
                errors: 1,
            }
        );
        assert!(summary.to_string().contains("Would create releases:  1"));
    }
}
