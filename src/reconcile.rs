//! Repository-state reconciliation.
//!
//! A [`Reconciler`] is built once per repository from the provider and target
//! version. It fetches a [`RepoSnapshot`] of the remote tree and the contents
//! it needs, then [`Reconciler::plan`] turns that snapshot into the ordered
//! actions that bring the repository to the expected file set. Planning is
//! pure: dry-run prints the plan, apply executes it.

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, warn};

use crate::github::{GitHubError, GitHubOps, TreeEntry};
use crate::templates::{ExpectedFiles, Provider, TemplateSet};

/// Files of the old `actions-lcaf` automation; any one marks a repository legacy.
pub const LEGACY_FILES: [&str; 4] = [
    ".github/workflows/increment_tagged_version.yaml",
    ".github/workflows/increment-tagged-version.yaml",
    ".github/workflows/lint-terraform.yaml",
    ".github/workflows/validate-branch-name.yaml",
];

/// Superseded file names, removed without making the repository legacy.
pub const OLD_NAMING_FILES: [&str; 1] = [".github/workflows/pull-request-terraform-check.yml"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Create {
        path: String,
    },
    Update {
        path: String,
        previous_version: Option<String>,
    },
    Delete {
        path: String,
    },
}

impl Action {
    pub fn path(&self) -> &str {
        match self {
            Action::Create { path } | Action::Update { path, .. } | Action::Delete { path } => path,
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Action::Create { .. } => "CREATE",
            Action::Update { .. } => "UPDATE",
            Action::Delete { .. } => "DELETE",
        }
    }

    /// Progress line, e.g. `UPDATE .github/dependabot.yml (0.3.0 → 0.4.0)`.
    pub fn describe(&self, target_version: &str) -> String {
        match self {
            Action::Update {
                path,
                previous_version: Some(previous),
            } => format!("UPDATE {path} ({previous} \u{2192} {target_version})"),
            other => format!("{} {}", other.verb(), other.path()),
        }
    }
}

/// Summary label printed next to the repository name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoState {
    Legacy { provider: Provider },
    UpToDate,
    Outdated { observed: Vec<String>, target: String },
}

impl fmt::Display for RepoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoState::Legacy { provider } => write!(f, "legacy \u{2192} {provider}"),
            RepoState::UpToDate => f.write_str("up to date"),
            RepoState::Outdated { observed, target } => {
                let observed = if observed.is_empty() {
                    "unknown".to_string()
                } else {
                    observed.join("/")
                };
                write!(f, "update {observed} \u{2192} {target}")
            }
        }
    }
}

/// Remote tree paths plus the contents fetched for expected paths.
///
/// A content entry of `None` means the fetch failed or the file was empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoSnapshot {
    pub repo: String,
    pub paths: BTreeSet<String>,
    pub contents: BTreeMap<String, Option<String>>,
}

impl RepoSnapshot {
    pub fn from_tree(repo: &str, tree: &[TreeEntry]) -> Self {
        Self {
            repo: repo.to_string(),
            paths: tree.iter().map(|entry| entry.path.clone()).collect(),
            contents: BTreeMap::new(),
        }
    }

    pub fn with_content(mut self, path: &str, content: Option<&str>) -> Self {
        self.contents
            .insert(path.to_string(), content.map(str::to_string));
        self
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn legacy_files(&self) -> Vec<&'static str> {
        LEGACY_FILES
            .into_iter()
            .filter(|path| self.contains(path))
            .collect()
    }

    pub fn is_legacy(&self) -> bool {
        !self.legacy_files().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub repo: String,
    pub provider: Provider,
    pub version: String,
    pub workflows_repo: String,
    pub legacy: bool,
    pub actions: Vec<Action>,
    /// Expected files already byte-identical to their target.
    pub up_to_date: usize,
    /// Versions referenced by the current files, sorted and de-duplicated.
    pub observed_versions: BTreeSet<String>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn state(&self) -> RepoState {
        if self.legacy {
            RepoState::Legacy {
                provider: self.provider,
            }
        } else if self.actions.is_empty() {
            RepoState::UpToDate
        } else {
            RepoState::Outdated {
                observed: self.observed_versions.iter().cloned().collect(),
                target: self.version.clone(),
            }
        }
    }

    pub fn commit_title(&self) -> String {
        if self.legacy {
            format!("chore: migrate to {} {}", self.workflows_repo, self.version)
        } else {
            format!("chore: update {} to {}", self.workflows_repo, self.version)
        }
    }
}

/// Target state of one repository and the means to diff against it.
#[derive(Debug, Clone)]
pub struct Reconciler {
    expected: ExpectedFiles,
    provider: Provider,
    version: String,
    workflows_repo: String,
    version_pattern: Regex,
}

impl Reconciler {
    pub fn new(
        templates: &TemplateSet,
        provider: Provider,
        version: &str,
        workflows_repo: &str,
    ) -> Result<Self, regex::Error> {
        let version_pattern = Regex::new(&format!(
            r"{}/[^@]+@(\d+\.\d+\.\d+)",
            regex::escape(workflows_repo)
        ))?;
        Ok(Self {
            expected: ExpectedFiles::build(templates, provider, version),
            provider,
            version: version.to_string(),
            workflows_repo: workflows_repo.to_string(),
            version_pattern,
        })
    }

    pub fn expected(&self) -> &ExpectedFiles {
        &self.expected
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Every `<workflows-repo>/...@X.Y.Z` reference in `content`, in order.
    pub fn extract_versions(&self, content: &str) -> Vec<String> {
        self.version_pattern
            .captures_iter(content)
            .filter_map(|captures| captures.get(1))
            .map(|version| version.as_str().to_string())
            .collect()
    }

    /// Fetch the tree, then the content of every expected path present.
    ///
    /// A failed tree fetch is returned as an error; the caller treats it as an
    /// empty or inaccessible repository. Failed content fetches are recorded as
    /// missing content. Legacy repositories get everything recreated, so their
    /// contents are not fetched at all.
    pub async fn snapshot(
        &self,
        ops: &dyn GitHubOps,
        repo: &str,
    ) -> Result<RepoSnapshot, GitHubError> {
        let tree = ops.fetch_tree(repo).await?;
        let mut snapshot = RepoSnapshot::from_tree(repo, &tree);
        if snapshot.is_legacy() {
            return Ok(snapshot);
        }

        for (path, _) in self.expected.iter() {
            if !snapshot.contains(path) {
                continue;
            }
            let content = match ops.fetch_file_content(repo, path).await {
                Ok(content) => content,
                Err(err) => {
                    warn!(repo, path, error = %err, "Could not fetch file content; treating as absent");
                    None
                }
            };
            snapshot.contents.insert(path.to_string(), content);
        }
        Ok(snapshot)
    }

    pub fn plan(&self, snapshot: &RepoSnapshot) -> Plan {
        let legacy_present = snapshot.legacy_files();
        let legacy = !legacy_present.is_empty();

        let mut actions: Vec<Action> = legacy_present
            .into_iter()
            .chain(OLD_NAMING_FILES.into_iter().filter(|path| snapshot.contains(path)))
            .map(|path| Action::Delete {
                path: path.to_string(),
            })
            .collect();

        let mut up_to_date = 0;
        let mut observed_versions = BTreeSet::new();

        for (path, expected_content) in self.expected.iter() {
            if legacy || !snapshot.contains(path) {
                actions.push(Action::Create {
                    path: path.to_string(),
                });
                continue;
            }

            let Some(current) = snapshot.contents.get(path).and_then(Option::as_deref) else {
                actions.push(Action::Create {
                    path: path.to_string(),
                });
                continue;
            };

            let versions = self.extract_versions(current);
            if current == expected_content {
                up_to_date += 1;
            } else {
                actions.push(Action::Update {
                    path: path.to_string(),
                    previous_version: versions.first().cloned(),
                });
            }
            observed_versions.extend(versions);
        }

        debug!(
            repo = %snapshot.repo,
            legacy,
            actions = actions.len(),
            up_to_date,
            "Planned reconciliation"
        );

        Plan {
            repo: snapshot.repo.clone(),
            provider: self.provider,
            version: self.version.clone(),
            workflows_repo: self.workflows_repo.clone(),
            legacy,
            actions,
            up_to_date,
            observed_versions,
        }
    }
}
