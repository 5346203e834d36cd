//! Merges labelled pull requests and checks the release the reusable
//! release-draft-on-merge workflow drafts for them.
//!
//! Needs `GITHUB_TOKEN` with admin rights on the test organization
//! (`TESTING_ORGANIZATION_NAME`, default `nttdtest`). Each case gets its own
//! repository. Run with
//! `cargo test --test release_draft_on_merge_live -- --ignored`.

use launch_sync::config::SyncConfig;
use launch_sync::github::{GitHubClient, RunConclusion, RunSelection, WorkflowRun};
use launch_sync::harness::{test_organization, TestRepository};
use launch_sync::templates::{ExpectedFiles, Provider, TemplateSet};
use std::time::Duration;

const LABEL_WORKFLOW: &str = "pull-request-label.yml";
const DRAFT_WORKFLOW: &str = "release-draft.yml";

/// State of the repository before the first pull request is merged.
#[derive(Debug, Clone, Copy)]
enum Seed {
    Empty,
    /// `0.1.0` tag on main, no release.
    Tag,
    /// Published `0.1.0` release.
    Release,
}

fn workflows_ref() -> String {
    std::env::var("LAUNCH_WORKFLOWS_REF_TO_TEST").unwrap_or_else(|_| "main".to_string())
}

fn draft_workflow(reference: &str) -> String {
    format!(
        r#"name: Draft Release

on:
  push:
    branches:
      - main

permissions:
  contents: read

jobs:
  draft-release:
    name: "Draft Release on Merge"
    permissions:
      contents: write
      pull-requests: write
    uses: launchbynttdata/launch-workflows/.github/workflows/reusable-release-draft-on-merge.yml@{reference}
    secrets: inherit # pragma: allowlist secret
"#
    )
}

/// Fail with the run's logs attached unless it concluded successfully.
async fn require_success(repo: &TestRepository, run: &WorkflowRun, what: &str) -> anyhow::Result<()> {
    if run.conclusion != Some(RunConclusion::Success) {
        let logs = repo.workflow_run_logs(run, true).await?;
        anyhow::bail!("{what} did not succeed: {:?}\nLogs:\n{logs}", run.conclusion);
    }
    Ok(())
}

async fn exercise(
    repo: &TestRepository,
    config: &SyncConfig,
    seed: Seed,
    branch: &str,
    expected_tag: &str,
) -> anyhow::Result<()> {
    let reference = workflows_ref();
    let files = ExpectedFiles::build(&TemplateSet::embedded(), Provider::Aws, &reference);

    let main = repo.branch_created("main", None, config.branch_wait()).await?;
    for path in [".github/release-drafter.yml", ".github/workflows/pull-request-label.yml"] {
        let content = files
            .get(path)
            .ok_or_else(|| anyhow::anyhow!("no template for {path}"))?;
        repo.populate_file(path, content, "main", None, false).await?;
    }
    repo.populate_file(
        ".github/workflows/release-draft.yml",
        &draft_workflow(&reference),
        "main",
        Some("Add reusable release draft workflow file"),
        !matches!(seed, Seed::Empty),
    )
    .await?;

    match seed {
        Seed::Empty => {}
        Seed::Tag => repo.create_tag("0.1.0", &main.commit.sha).await?,
        Seed::Release => {
            repo.create_release("0.1.0").await?;
        }
    }

    repo.branch_created(branch, Some("main"), config.branch_wait())
        .await?;
    repo.populate_file("test.txt", "Test file", branch, None, false)
        .await?;
    let pull = repo
        .create_pull(
            &format!("Test PR Label for {branch}"),
            branch,
            "main",
            &format!(
                "This is a test pull request to validate the workflow drafts a release for {expected_tag}."
            ),
        )
        .await?;

    let run = repo
        .workflow_run_created(LABEL_WORKFLOW, branch, RunSelection::FirstListed, config.run_created_wait())
        .await?;
    let run = repo
        .workflow_run_completed(&run, config.run_completed_wait())
        .await?;
    require_success(repo, &run, &format!("Label run for {branch}")).await?;
    let labels = repo.pull_labels(pull.number).await?;
    anyhow::ensure!(!labels.is_empty(), "no label applied to the pull request for {branch}");

    repo.merge_pull(pull.number).await?;

    // Earlier pushes to main may have drafted too; only the merge counts.
    let run = repo
        .workflow_run_created(DRAFT_WORKFLOW, "main", RunSelection::MostRecent, config.run_created_wait())
        .await?;
    let run = repo
        .workflow_run_completed(&run, config.run_completed_wait())
        .await?;
    require_success(repo, &run, "Release draft run").await?;

    let releases = repo.releases().await?;
    let draft = releases
        .first()
        .ok_or_else(|| anyhow::anyhow!("no release drafted"))?;
    assert_eq!(draft.name.as_deref(), Some(expected_tag), "draft title for {branch}");

    let title = draft.name.clone().unwrap_or_default();
    repo.publish_release(draft, &title).await?;
    let tags = repo.tags().await?;
    assert_eq!(
        tags.first().map(|tag| tag.name.as_str()),
        Some(expected_tag),
        "newest tag for {branch}"
    );
    Ok(())
}

async fn run_cases(seed: Seed, cases: &[(&str, &str)]) {
    let config = SyncConfig::load().unwrap();
    let token = config.require_token().unwrap().to_string();

    for (branch, expected_tag) in cases {
        let client = GitHubClient::new(&token, &test_organization()).unwrap();
        let repo = TestRepository::create(
            client,
            config.polling.repo_visible_attempts,
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        let result = exercise(&repo, &config, seed, branch, expected_tag).await;
        repo.delete().await.unwrap();
        result.unwrap_or_else(|err| panic!("{seed:?} / {branch}: {err:#}"));
    }
}

/// A first release is always 0.x, whatever the label says.
#[tokio::test]
#[ignore = "creates and deletes real repositories"]
async fn first_draft_in_empty_repository_is_0_1_0() {
    run_cases(
        Seed::Empty,
        &[("fix/patch", "0.1.0"), ("feature/minor", "0.1.0"), ("patch!/major", "0.1.0")],
    )
    .await;
}

/// Without a release the drafter ignores existing tags and reuses 0.1.0.
#[tokio::test]
#[ignore = "creates and deletes real repositories"]
async fn existing_tag_without_release_is_reused() {
    run_cases(
        Seed::Tag,
        &[("fix/patch", "0.1.0"), ("feature/minor", "0.1.0"), ("patch!/major", "0.1.0")],
    )
    .await;
}

#[tokio::test]
#[ignore = "creates and deletes real repositories"]
async fn existing_release_is_bumped_by_label() {
    run_cases(
        Seed::Release,
        &[("fix/patch", "0.1.1"), ("feature/minor", "0.2.0"), ("patch!/major", "1.0.0")],
    )
    .await;
}
