//! Workflow-file synchronization across `tf-*` repositories.
//!
//! Each repository is snapshotted through the API and planned by the
//! [`Reconciler`]. Dry-run stops after printing the plan; apply executes the
//! same plan in a fresh clone, pushes the sync branch and opens a labelled
//! pull request.

use anyhow::{Context, Result};
use std::fmt;
use std::path::PathBuf;
use tracing::{info, warn, Instrument};

use crate::config::SyncConfig;
use crate::git::{Git2Operations, GitOperations};
use crate::github::{GitHubOps, PullRequestRef};
use crate::observability::{create_repo_span, OperationTimer};
use crate::reconcile::{Action, Plan, Reconciler};
use crate::templates::{Provider, TemplateSet};

/// Why a repository was left alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    UnknownProvider(String),
    EmptyRepository,
    BranchExists(String),
    NoChanges,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnknownProvider(reason) => f.write_str(reason),
            SkipReason::EmptyRepository => f.write_str("empty or inaccessible repo"),
            SkipReason::BranchExists(branch) => write!(
                f,
                "branch '{branch}' already exists on remote; a pull request is likely already open"
            ),
            SkipReason::NoChanges => f.write_str("no changes needed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    UpToDate,
    /// Dry-run result for a repository that needs changes.
    WouldChange(Plan),
    Applied {
        plan: Plan,
        pull_request: PullRequestRef,
    },
    Skipped(SkipReason),
    Failed(String),
}

/// Aggregate counts printed after a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub dry_run: bool,
    pub processed: usize,
    pub up_to_date: usize,
    pub changed: usize,
    pub skipped_provider: usize,
    pub skipped_empty: usize,
    pub skipped_branch: usize,
    pub skipped_no_changes: usize,
    pub errors: usize,
}

impl SyncSummary {
    pub fn record(&mut self, outcome: &SyncOutcome) {
        self.processed += 1;
        match outcome {
            SyncOutcome::UpToDate => self.up_to_date += 1,
            SyncOutcome::WouldChange(_) | SyncOutcome::Applied { .. } => self.changed += 1,
            SyncOutcome::Skipped(SkipReason::UnknownProvider(_)) => self.skipped_provider += 1,
            SyncOutcome::Skipped(SkipReason::EmptyRepository) => self.skipped_empty += 1,
            SyncOutcome::Skipped(SkipReason::BranchExists(_)) => self.skipped_branch += 1,
            SyncOutcome::Skipped(SkipReason::NoChanges) => self.skipped_no_changes += 1,
            SyncOutcome::Failed(_) => self.errors += 1,
        }
    }
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(50);
        writeln!(f, "{rule}\nSummary\n{rule}")?;
        writeln!(f, "  Repos processed:              {}", self.processed)?;
        writeln!(f, "  Up to date:                   {}", self.up_to_date)?;
        if self.dry_run {
            writeln!(f, "  Would change:                 {}", self.changed)?;
        } else {
            writeln!(f, "  Pull requests opened:         {}", self.changed)?;
        }
        writeln!(f, "  Skipped (unknown provider):   {}", self.skipped_provider)?;
        writeln!(f, "  Skipped (empty/inaccessible): {}", self.skipped_empty)?;
        writeln!(f, "  Skipped (branch exists):      {}", self.skipped_branch)?;
        writeln!(f, "  Skipped (no changes needed):  {}", self.skipped_no_changes)?;
        write!(f, "  Errors:                       {}", self.errors)
    }
}

/// Result of executing a plan in a working copy.
struct PreparedBranch {
    base: String,
    status: Vec<String>,
}

enum FileEdit {
    Write(String, String),
    Remove(String),
}

/// Clone, branch, edit, commit and push. libgit2 blocks, so this runs on
/// the blocking pool.
struct BranchJob {
    url: String,
    dest: PathBuf,
    depth: i32,
    token: Option<String>,
    branch: String,
    title: String,
    edits: Vec<FileEdit>,
}

impl BranchJob {
    /// `None` when the working tree ends up identical to the default branch.
    fn run(self) -> Result<Option<PreparedBranch>> {
        let git = Git2Operations::clone_into(&self.url, &self.dest, self.depth, self.token.as_deref())?;
        let base = git.current_branch()?;
        git.create_and_checkout_branch(&self.branch)?;

        for edit in &self.edits {
            match edit {
                FileEdit::Remove(path) => git.remove_file(path)?,
                FileEdit::Write(path, content) => git.write_file(path, content)?,
            }
        }

        git.stage_all()?;
        let status = git.get_status()?;
        if status.is_empty() {
            return Ok(None);
        }

        git.commit(&self.title)?;
        println!("  Pushing branch '{}'...", self.branch);
        git.push("origin", &self.branch)?;
        Ok(Some(PreparedBranch { base, status }))
    }
}

pub struct WorkflowSync<'a> {
    ops: &'a dyn GitHubOps,
    config: &'a SyncConfig,
    templates: TemplateSet,
    version: String,
    provider: Option<Provider>,
    dry_run: bool,
}

impl<'a> WorkflowSync<'a> {
    pub fn new(
        ops: &'a dyn GitHubOps,
        config: &'a SyncConfig,
        templates: TemplateSet,
        version: &str,
        provider: Option<Provider>,
        dry_run: bool,
    ) -> Self {
        Self {
            ops,
            config,
            templates,
            version: version.to_string(),
            provider,
            dry_run,
        }
    }

    /// Process `repos` one at a time, in the order given.
    pub async fn run(&self, repos: &[String]) -> SyncSummary {
        let mut summary = SyncSummary {
            dry_run: self.dry_run,
            ..SyncSummary::default()
        };
        for repo in repos {
            let span = create_repo_span("sync-workflows", repo);
            let outcome = self.process_repo(repo).instrument(span).await;
            summary.record(&outcome);
        }
        summary
    }

    pub async fn process_repo(&self, repo: &str) -> SyncOutcome {
        let timer = OperationTimer::new(&format!("sync {repo}"));
        let outcome = self.reconcile(repo).await;
        timer.finish();
        outcome
    }

    async fn reconcile(&self, repo: &str) -> SyncOutcome {
        let provider = match Provider::detect(repo, self.provider) {
            Ok(provider) => provider,
            Err(err) => return skip(repo, SkipReason::UnknownProvider(err.to_string())),
        };

        let reconciler = match Reconciler::new(
            &self.templates,
            provider,
            &self.version,
            &self.config.sync.workflows_repo,
        ) {
            Ok(reconciler) => reconciler,
            Err(err) => return fail(repo, &err.to_string()),
        };

        let snapshot = match reconciler.snapshot(self.ops, repo).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(repo, error = %err, "Could not fetch repository tree");
                return skip(repo, SkipReason::EmptyRepository);
            }
        };

        let plan = reconciler.plan(&snapshot);
        println!("\n=== {repo} ({}) ===", plan.state());
        if plan.is_empty() {
            println!("  SKIP (all files match version {})", self.version);
            return SyncOutcome::UpToDate;
        }
        for action in &plan.actions {
            println!("  {}", action.describe(&self.version));
        }
        if plan.up_to_date > 0 {
            println!("  ({} files already up to date)", plan.up_to_date);
        }

        if self.dry_run {
            return SyncOutcome::WouldChange(plan);
        }

        match self.apply(&reconciler, plan).await {
            Ok(outcome) => outcome,
            Err(err) => {
                println!("  ERROR: {err:#}");
                SyncOutcome::Failed(format!("{err:#}"))
            }
        }
    }

    async fn apply(&self, reconciler: &Reconciler, plan: Plan) -> Result<SyncOutcome> {
        let repo = plan.repo.clone();
        let branch = &self.config.sync.branch;

        if self.ops.branch_exists(&repo, branch).await? {
            println!("  SKIP ({})", SkipReason::BranchExists(branch.clone()));
            return Ok(SyncOutcome::Skipped(SkipReason::BranchExists(branch.clone())));
        }

        // Removed on drop, whichever way this function returns.
        let workdir = tempfile::Builder::new()
            .prefix("sync_wf_")
            .tempdir()
            .context("Failed to create temporary directory")?;

        println!("  Cloning {}/{repo}...", self.config.github.organization);
        let job = self.branch_job(reconciler, &plan, workdir.path().join(&repo))?;
        let prepared = tokio::task::spawn_blocking(move || job.run())
            .await
            .context("Git task did not complete")??;
        let Some(prepared) = prepared else {
            println!("  SKIP ({})", SkipReason::NoChanges);
            return Ok(SyncOutcome::Skipped(SkipReason::NoChanges));
        };

        let title = plan.commit_title();
        let body = self.pull_request_body(&plan, &prepared.status);
        println!("  Creating PR...");
        let pull_request = self
            .ops
            .create_pull_request(&repo, &title, branch, &prepared.base, &body)
            .await
            .context("Failed to create pull request")?;
        println!(
            "  PR created: {}",
            pull_request.html_url.as_deref().unwrap_or("(no url)")
        );

        let label = &self.config.sync.label;
        if let Err(err) = self.ops.ensure_label(&repo, &label.name, &label.color).await {
            warn!(repo = %repo, label = %label.name, error = %err, "Could not ensure label exists");
        }
        self.ops
            .add_labels(&repo, pull_request.number, vec![label.name.clone()])
            .await
            .with_context(|| format!("Failed to apply label '{}'", label.name))?;
        println!("  Label '{}' applied", label.name);

        info!(repo = %repo, number = pull_request.number, "Sync pull request opened");
        Ok(SyncOutcome::Applied { plan, pull_request })
    }

    /// Everything the blocking git step needs, rendered up front.
    fn branch_job(&self, reconciler: &Reconciler, plan: &Plan, dest: PathBuf) -> Result<BranchJob> {
        let edits = plan
            .actions
            .iter()
            .map(|action| match action {
                Action::Delete { path } => Ok(FileEdit::Remove(path.clone())),
                Action::Create { path } | Action::Update { path, .. } => {
                    let content = reconciler
                        .expected()
                        .get(path)
                        .with_context(|| format!("No template renders {path}"))?;
                    Ok(FileEdit::Write(path.clone(), content.to_string()))
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(BranchJob {
            url: self.config.clone_url(&plan.repo),
            dest,
            depth: self.config.sync.clone_depth,
            token: self.config.github.token.clone(),
            branch: self.config.sync.branch.clone(),
            title: plan.commit_title(),
            edits,
        })
    }

    fn pull_request_body(&self, plan: &Plan, status: &[String]) -> String {
        let org = &self.config.github.organization;
        let workflows_repo = &plan.workflows_repo;
        let file_list: Vec<String> = status.iter().map(|line| format!("- `{line}`")).collect();

        let mut body = String::from("## Summary\n");
        if plan.legacy {
            body.push_str(&format!(
                "- Migrated CI workflows to use `{workflows_repo}` reusable workflows at version `{}`\n",
                plan.version
            ));
            body.push_str("- Removed legacy `actions-lcaf` workflow files\n");
        } else {
            body.push_str(&format!(
                "- Updated `{workflows_repo}` reusable workflows at version `{}`\n",
                plan.version
            ));
        }
        body.push_str("- Added/updated `release-drafter.yml` and `dependabot.yml`\n\n");
        body.push_str("## Files changed\n");
        body.push_str(&file_list.join("\n"));
        body.push_str("\n\n---\n");
        body.push_str(&format!(
            "Generated by `launch-sync sync-workflows` from [{workflows_repo}](https://github.com/{org}/{workflows_repo})\n"
        ));
        body
    }
}

fn skip(repo: &str, reason: SkipReason) -> SyncOutcome {
    println!("\n=== {repo} ===");
    println!("  SKIP ({reason})");
    SyncOutcome::Skipped(reason)
}

fn fail(repo: &str, message: &str) -> SyncOutcome {
    println!("\n=== {repo} ===");
    println!("  ERROR: {message}");
    SyncOutcome::Failed(message.to_string())
}
