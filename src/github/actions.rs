// GitHub Actions API integration: workflow runs, their status, and their logs
use chrono::{DateTime, Utc};
use octocrab::models::workflows::Run;
use octocrab::models::RunId;
use std::io::{Cursor, Read};
use tracing::{debug, info, warn};

use super::client::GitHubClient;
use super::errors::GitHubError;
use crate::wait::{wait_for, WaitOptions};

/// Width of the `2024-05-01T12:00:00.0000000Z ` prefix GitHub puts on every log line.
pub const LOG_TIMESTAMP_WIDTH: usize = 29;

/// Status of a GitHub Actions workflow run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Requested,
    Queued,
    Pending,
    Waiting,
    InProgress,
    Completed,
    /// Reported by older runs instead of `completed` + `failure`.
    Failed,
    Unknown(String),
}

impl From<&str> for RunStatus {
    fn from(status: &str) -> Self {
        match status {
            "requested" => RunStatus::Requested,
            "queued" => RunStatus::Queued,
            "pending" => RunStatus::Pending,
            "waiting" => RunStatus::Waiting,
            "in_progress" => RunStatus::InProgress,
            "completed" => RunStatus::Completed,
            "failed" => RunStatus::Failed,
            _ => RunStatus::Unknown(status.to_string()),
        }
    }
}

impl From<String> for RunStatus {
    fn from(status: String) -> Self {
        RunStatus::from(status.as_str())
    }
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunConclusion {
    Success,
    Failure,
    Cancelled,
    Skipped,
    TimedOut,
    Other(String),
}

impl From<String> for RunConclusion {
    fn from(conclusion: String) -> Self {
        match conclusion.as_str() {
            "success" => RunConclusion::Success,
            "failure" => RunConclusion::Failure,
            "cancelled" => RunConclusion::Cancelled,
            "skipped" => RunConclusion::Skipped,
            "timed_out" => RunConclusion::TimedOut,
            _ => RunConclusion::Other(conclusion),
        }
    }
}

/// The parts of an octocrab [`Run`] the harness acts on, with status and
/// conclusion parsed.
#[derive(Debug, Clone)]
pub struct WorkflowRun {
    pub id: u64,
    pub name: String,
    pub head_branch: String,
    pub status: RunStatus,
    pub conclusion: Option<RunConclusion>,
    pub html_url: String,
    pub created_at: DateTime<Utc>,
}

impl From<Run> for WorkflowRun {
    fn from(run: Run) -> Self {
        Self {
            id: run.id.into_inner(),
            name: run.name,
            head_branch: run.head_branch,
            status: RunStatus::from(run.status),
            conclusion: run.conclusion.map(RunConclusion::from),
            html_url: run.html_url.to_string(),
            created_at: run.created_at,
        }
    }
}

/// Which run to report when a branch has several (re-runs, repeated pushes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunSelection {
    /// First entry in the order the API lists them.
    #[default]
    FirstListed,
    /// Latest `created_at`.
    MostRecent,
}

impl RunSelection {
    pub fn pick(self, runs: Vec<WorkflowRun>) -> Option<WorkflowRun> {
        match self {
            RunSelection::FirstListed => runs.into_iter().next(),
            RunSelection::MostRecent => runs.into_iter().max_by_key(|run| run.created_at),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ActionsHandler<'a> {
    client: &'a GitHubClient,
    repo: String,
}

impl<'a> ActionsHandler<'a> {
    pub fn new(client: &'a GitHubClient, repo: &str) -> Self {
        Self {
            client,
            repo: repo.to_string(),
        }
    }

    fn workflows(&self) -> octocrab::workflows::WorkflowsHandler<'a> {
        self.client
            .octocrab()
            .workflows(self.client.org(), &self.repo)
    }

    /// Runs of `workflow_file` (e.g. `pull-request-label.yml`) for `branch`.
    pub async fn list_runs(
        &self,
        workflow_file: &str,
        branch: &str,
    ) -> Result<Vec<WorkflowRun>, GitHubError> {
        let workflows = self.workflows();
        let page = self
            .client
            .send(workflows.list_runs(workflow_file).branch(branch).send())
            .await?;
        debug!(
            repo = %self.repo,
            workflow_file,
            branch,
            total = page.total_count.unwrap_or_default(),
            "Listed workflow runs"
        );
        Ok(page.items.into_iter().map(WorkflowRun::from).collect())
    }

    pub async fn get_run(&self, run_id: u64) -> Result<WorkflowRun, GitHubError> {
        let workflows = self.workflows();
        let run = self.client.send(workflows.get(RunId(run_id))).await?;
        Ok(WorkflowRun::from(run))
    }

    /// Poll until a run of `workflow_file` shows up for `branch`.
    ///
    /// Listing errors are logged and polling continues; only the timeout fails.
    pub async fn wait_for_run_created(
        &self,
        workflow_file: &str,
        branch: &str,
        selection: RunSelection,
        options: WaitOptions,
    ) -> Result<WorkflowRun, GitHubError> {
        let operation = format!("workflow run for branch '{branch}'");
        let run = wait_for(&operation, options, move || async move {
            match self.list_runs(workflow_file, branch).await {
                Ok(runs) => Ok(selection.pick(runs)),
                Err(err) => {
                    warn!(repo = %self.repo, branch, error = %err, "Error while checking for workflow runs");
                    Ok(None)
                }
            }
        })
        .await?;
        info!(repo = %self.repo, branch, run_id = run.id, "Workflow run found");
        Ok(run)
    }

    /// Poll until the run reaches a terminal status; returns the refreshed run.
    pub async fn wait_for_run_completed(
        &self,
        run_id: u64,
        options: WaitOptions,
    ) -> Result<WorkflowRun, GitHubError> {
        let operation = format!("completion of workflow run {run_id}");
        let run = wait_for(&operation, options, move || async move {
            let run = self.get_run(run_id).await?;
            Ok(run.status.is_terminal().then_some(run))
        })
        .await?;
        info!(
            repo = %self.repo,
            run_id,
            status = ?run.status,
            conclusion = ?run.conclusion,
            "Workflow run finished"
        );
        Ok(run)
    }

    /// Raw zip archive of a run's logs.
    pub async fn download_logs(&self, run_id: u64) -> Result<Vec<u8>, GitHubError> {
        let actions = self.client.octocrab().actions();
        let archive = self
            .client
            .send(actions.download_workflow_run_logs(self.client.org(), &self.repo, RunId(run_id)))
            .await?;
        Ok(archive.to_vec())
    }

    /// Text of the first top-level log file in the run's archive.
    pub async fn logs(&self, run_id: u64, drop_timestamps: bool) -> Result<String, GitHubError> {
        let archive = self.download_logs(run_id).await?;
        let contents = first_text_log(&archive)?;
        Ok(if drop_timestamps {
            strip_log_timestamps(&contents)
        } else {
            contents
        })
    }
}

/// Contents of the first (by name) `*.txt` entry at the root of a log archive.
pub fn first_text_log(archive: &[u8]) -> Result<String, GitHubError> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive))
        .map_err(|e| GitHubError::InvalidResponse(format!("log archive is not a zip: {e}")))?;

    let mut candidates: Vec<(String, usize)> = (0..zip.len())
        .filter_map(|index| {
            let entry = zip.by_index(index).ok()?;
            let name = entry.name().to_string();
            (entry.is_file() && name.ends_with(".txt") && !name.contains('/'))
                .then_some((name, index))
        })
        .collect();
    candidates.sort();

    let Some((name, index)) = candidates.into_iter().next() else {
        return Err(GitHubError::InvalidResponse(
            "log archive contains no top-level .txt file".to_string(),
        ));
    };

    let mut entry = zip
        .by_index(index)
        .map_err(|e| GitHubError::InvalidResponse(format!("{name}: {e}")))?;
    let mut contents = String::new();
    entry.read_to_string(&mut contents)?;
    Ok(contents)
}

/// Drop the fixed-width timestamp column from every line.
pub fn strip_log_timestamps(contents: &str) -> String {
    contents
        .lines()
        .map(|line| line.chars().skip(LOG_TIMESTAMP_WIDTH).collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn archive(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn picks_first_top_level_text_file() {
        let zip = archive(&[
            ("check/1_Set up job.txt", "nested"),
            ("1_check.txt", "second"),
            ("0_check.txt", "first"),
        ]);
        assert_eq!(first_text_log(&zip).unwrap(), "first");
    }

    #[test]
    fn archive_without_text_logs_is_an_error() {
        let zip = archive(&[("check/1_Set up job.txt", "nested")]);
        assert!(matches!(
            first_text_log(&zip),
            Err(GitHubError::InvalidResponse(_))
        ));
    }

    #[test]
    fn strips_timestamp_column() {
        let raw = "2024-05-01T12:00:00.1234567Z ##[group]Run labeler\n\
                   2024-05-01T12:00:01.1234567Z Applied label patch\n";
        assert_eq!(
            strip_log_timestamps(raw),
            "##[group]Run labeler\nApplied label patch"
        );
    }

    #[test]
    fn short_lines_become_empty() {
        assert_eq!(strip_log_timestamps("short\n"), "");
    }

    #[test]
    fn timestamp_width_counts_characters() {
        // 18 characters, 32 bytes
        let line = format!("a{}xyz", "é".repeat(14));
        assert_eq!(strip_log_timestamps(&line), "");

        let line = format!("{}Änderung übernommen", "x".repeat(LOG_TIMESTAMP_WIDTH));
        assert_eq!(strip_log_timestamps(&line), "Änderung übernommen");

        let line = format!("{}ok", "ü".repeat(LOG_TIMESTAMP_WIDTH));
        assert_eq!(strip_log_timestamps(&line), "ok");
    }

    #[test]
    fn status_parsing_covers_lifecycle() {
        assert_eq!(RunStatus::from("queued"), RunStatus::Queued);
        assert_eq!(RunStatus::from("in_progress"), RunStatus::InProgress);
        assert!(RunStatus::from("completed").is_terminal());
        assert!(RunStatus::from("failed").is_terminal());
        assert!(!RunStatus::from("waiting").is_terminal());
        assert_eq!(
            RunStatus::from("mystery"),
            RunStatus::Unknown("mystery".to_string())
        );
    }

    fn run_json(id: u64, status: &str, conclusion: Option<&str>, created_at: &str) -> serde_json::Value {
        let api = "https://api.github.com/repos/launchbynttdata/tf-aws-x";
        serde_json::json!({
            "id": id,
            "workflow_id": 3,
            "node_id": "WFR_1",
            "name": "Label Pull Request",
            "head_branch": "fix/something",
            "head_sha": "c0ffee",
            "run_number": id,
            "event": "pull_request",
            "status": status,
            "conclusion": conclusion,
            "created_at": created_at,
            "updated_at": created_at,
            "url": format!("{api}/actions/runs/{id}"),
            "html_url": format!("https://github.com/launchbynttdata/tf-aws-x/actions/runs/{id}"),
            "jobs_url": format!("{api}/actions/runs/{id}/jobs"),
            "logs_url": format!("{api}/actions/runs/{id}/logs"),
            "check_suite_url": format!("{api}/check-suites/1"),
            "artifacts_url": format!("{api}/actions/runs/{id}/artifacts"),
            "cancel_url": format!("{api}/actions/runs/{id}/cancel"),
            "rerun_url": format!("{api}/actions/runs/{id}/rerun"),
            "workflow_url": format!("{api}/actions/workflows/3"),
            "head_commit": {
                "id": "c0ffee",
                "tree_id": "7ree",
                "message": "Add README.md",
                "timestamp": created_at,
                "author": { "name": "Test", "email": "test@example.com" },
                "committer": { "name": "Test", "email": "test@example.com" }
            },
            "repository": { "id": 1, "name": "tf-aws-x", "url": api }
        })
    }

    fn run(id: u64, status: &str, conclusion: Option<&str>, created_at: &str) -> WorkflowRun {
        let run: Run = serde_json::from_value(run_json(id, status, conclusion, created_at)).unwrap();
        WorkflowRun::from(run)
    }

    #[test]
    fn run_conversion_parses_conclusion() {
        let run = run(42, "completed", Some("timed_out"), "2024-05-01T12:00:00Z");
        assert_eq!(run.id, 42);
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.conclusion, Some(RunConclusion::TimedOut));
        assert_eq!(run.head_branch, "fix/something");
    }

    #[test]
    fn most_recent_selection_uses_created_at() {
        let runs = vec![
            run(1, "completed", Some("success"), "2024-05-01T12:00:00Z"),
            run(2, "queued", None, "2024-05-01T12:05:00Z"),
        ];
        assert_eq!(RunSelection::FirstListed.pick(runs.clone()).unwrap().id, 1);
        assert_eq!(RunSelection::MostRecent.pick(runs).unwrap().id, 2);
        assert!(RunSelection::FirstListed.pick(Vec::new()).is_none());
    }
}
