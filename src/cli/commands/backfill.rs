use anyhow::Result;

use super::{connect, resolve_repositories, Command};
use crate::backfill::ReleaseBackfill;
use crate::cli::RepoSelection;
use crate::config::SyncConfig;
use crate::observability::github_metrics;

pub struct BackfillCommand {
    pub selection: RepoSelection,
    pub dry_run: bool,
    pub org: Option<String>,
}

impl Command for BackfillCommand {
    async fn execute(&self, mut config: SyncConfig) -> Result<()> {
        let client = connect(&mut config, self.org.as_deref())?;
        let repos = resolve_repositories(&client, &self.selection, &config.sync.repo_prefix).await?;

        let summary = ReleaseBackfill::new(&client, self.dry_run).run(&repos).await;
        println!("\n{summary}");
        github_metrics().log_stats();
        Ok(())
    }
}
