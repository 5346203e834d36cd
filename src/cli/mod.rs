use clap::{Args, Parser, Subcommand};

use crate::templates::Provider;

pub mod commands;

#[derive(Parser, Debug)]
#[command(name = "launch-sync")]
#[command(about = "Keep tf-* repositories on the launch-workflows reusable workflows")]
#[command(long_about = "launch-sync backfills GitHub releases for repositories that only carry semver tags, \
                       and synchronizes the reusable CI workflow files of every tf-* repository in an \
                       organization by opening one pull request per repository.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Exactly one of `--repo` or `--all`.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
#[group(required = true, multiple = false)]
pub struct RepoSelection {
    /// Target a single repo (short name, no org prefix)
    #[arg(long, value_name = "NAME")]
    pub repo: Option<String>,
    /// Target all repos matching the configured prefix in the org
    #[arg(long)]
    pub all: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a release at the highest semver tag of repos that have tags but no releases
    BackfillReleases {
        #[command(flatten)]
        selection: RepoSelection,
        /// Show what would happen without creating releases
        #[arg(long)]
        dry_run: bool,
        /// GitHub org (default: launchbynttdata)
        #[arg(long)]
        org: Option<String>,
    },
    /// Migrate legacy repos to launch-workflows and keep migrated repos on the target version
    SyncWorkflows {
        #[command(flatten)]
        selection: RepoSelection,
        /// Show what would change without pushing
        #[arg(long)]
        dry_run: bool,
        /// GitHub org (default: launchbynttdata)
        #[arg(long)]
        org: Option<String>,
        /// launch-workflows version to pin (default: latest release tag)
        #[arg(long, value_name = "SEMVER")]
        version: Option<String>,
        /// Override cloud provider auto-detection
        #[arg(long, value_enum)]
        provider: Option<Provider>,
        /// PR branch name (default: chore/sync-workflows)
        #[arg(long)]
        branch: Option<String>,
        /// Skip validation that templates match the skeleton repo (use with caution)
        #[arg(long)]
        skip_skeleton_check: bool,
    },
}
