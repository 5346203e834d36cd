use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::github::{GitHubClient, GitHubError};
use crate::wait::WaitOptions;

pub const CONFIG_FILE: &str = "launch-sync.toml";
pub const ENV_PREFIX: &str = "LAUNCH_SYNC";

/// Main configuration structure for launch-sync
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncConfig {
    pub github: GitHubConfig,
    pub sync: SyncSettings,
    pub polling: PollingConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GitHubConfig {
    /// GitHub API token (falls back to `GITHUB_TOKEN`)
    pub token: Option<String>,
    pub organization: String,
    /// API root; unset means api.github.com
    pub api_base: Option<String>,
    /// Base URL that `{org}/{repo}.git` is appended to when cloning
    pub clone_base: String,
    pub requests_per_second: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncSettings {
    /// Only repositories whose name starts with this are considered
    pub repo_prefix: String,
    /// Repository publishing the reusable workflows
    pub workflows_repo: String,
    /// Repository whose `.github` files the templates were derived from
    pub skeleton_repo: String,
    pub branch: String,
    pub clone_depth: i32,
    pub label: LabelConfig,
    /// Directory of template overrides; embedded templates fill the gaps
    pub templates_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LabelConfig {
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollingConfig {
    pub interval_seconds: u64,
    pub run_created_timeout_seconds: u64,
    pub run_completed_timeout_seconds: u64,
    pub branch_timeout_seconds: u64,
    pub repo_visible_attempts: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub json_logs: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            github: GitHubConfig {
                token: None,
                organization: "launchbynttdata".to_string(),
                api_base: None,
                clone_base: "https://github.com".to_string(),
                requests_per_second: 5,
            },
            sync: SyncSettings {
                repo_prefix: "tf-".to_string(),
                workflows_repo: "launch-workflows".to_string(),
                skeleton_repo: "lcaf-skeleton-terraform".to_string(),
                branch: "chore/sync-workflows".to_string(),
                clone_depth: 1,
                label: LabelConfig {
                    name: "patch".to_string(),
                    color: "006b75".to_string(),
                },
                templates_dir: None,
            },
            polling: PollingConfig {
                interval_seconds: 1,
                run_created_timeout_seconds: 60,
                run_completed_timeout_seconds: 120,
                branch_timeout_seconds: 60,
                repo_visible_attempts: 10,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: false,
            },
        }
    }
}

impl SyncConfig {
    /// Load configuration with precedence:
    /// 1. Default values
    /// 2. `launch-sync.toml` in the working directory
    /// 3. Environment variables (`LAUNCH_SYNC_GITHUB__ORGANIZATION`, ...)
    pub fn load() -> Result<Self> {
        let file = Path::new(CONFIG_FILE);
        let mut config = Self::load_layers(
            file.exists().then_some(file),
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )?;
        config.fill_token(std::env::var("GITHUB_TOKEN").ok());
        Ok(config)
    }

    fn load_layers(file: Option<&Path>, env: Environment) -> Result<Self> {
        let defaults = Config::try_from(&Self::default())?;
        let mut builder = Config::builder().add_source(defaults);
        if let Some(file) = file {
            builder = builder.add_source(File::from(file));
        }
        let layered = builder
            .add_source(env)
            .build()
            .context("Failed to read configuration")?;
        Ok(layered.try_deserialize()?)
    }

    /// Use `env_token` unless a token was already configured.
    pub fn fill_token(&mut self, env_token: Option<String>) {
        if self.github.token.as_deref().is_none_or(|t| t.trim().is_empty()) {
            self.github.token = env_token.filter(|t| !t.trim().is_empty());
        }
    }

    pub fn require_token(&self) -> Result<&str, GitHubError> {
        self.github.token.as_deref().ok_or_else(|| {
            GitHubError::TokenNotFound("GITHUB_TOKEN environment variable is not set".to_string())
        })
    }

    pub fn github_client(&self) -> Result<GitHubClient, GitHubError> {
        GitHubClient::build(
            self.require_token()?,
            &self.github.organization,
            self.github.api_base.as_deref(),
            self.github.requests_per_second,
        )
    }

    pub fn clone_url(&self, repo: &str) -> String {
        format!(
            "{}/{}/{}.git",
            self.github.clone_base.trim_end_matches('/'),
            self.github.organization,
            repo
        )
    }

    fn wait(&self, timeout_secs: u64) -> WaitOptions {
        WaitOptions::new(
            Duration::from_secs(timeout_secs),
            Duration::from_secs(self.polling.interval_seconds.max(1)),
        )
    }

    pub fn run_created_wait(&self) -> WaitOptions {
        self.wait(self.polling.run_created_timeout_seconds)
    }

    pub fn run_completed_wait(&self) -> WaitOptions {
        self.wait(self.polling.run_completed_timeout_seconds)
    }

    pub fn branch_wait(&self) -> WaitOptions {
        self.wait(self.polling.branch_timeout_seconds)
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::debug!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Environment source fed from a fixed map instead of the process environment.
pub fn environment_from(vars: &[(&str, &str)]) -> Environment {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .source(Some(map))
}
