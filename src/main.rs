use anyhow::Result;
use clap::Parser;

use launch_sync::cli::commands::{BackfillCommand, Command, SyncCommand};
use launch_sync::cli::{Cli, Commands};
use launch_sync::config::SyncConfig;
use launch_sync::telemetry::init_telemetry;

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    SyncConfig::load_env_file()?;
    let config = SyncConfig::load()?;
    init_telemetry(config.observability.json_logs, &config.observability.log_level)?;

    tokio::runtime::Runtime::new()?.block_on(async {
        match cli.command {
            Commands::BackfillReleases {
                selection,
                dry_run,
                org,
            } => {
                BackfillCommand {
                    selection,
                    dry_run,
                    org,
                }
                .execute(config)
                .await
            }
            Commands::SyncWorkflows {
                selection,
                dry_run,
                org,
                version,
                provider,
                branch,
                skip_skeleton_check,
            } => {
                SyncCommand {
                    selection,
                    dry_run,
                    org,
                    version,
                    provider,
                    branch,
                    skip_skeleton_check,
                }
                .execute(config)
                .await
            }
        }
    })
}
