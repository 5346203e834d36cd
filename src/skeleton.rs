//! Drift check between the shipped templates and the skeleton repository they
//! were copied from.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::github::{GitHubError, GitHubOps, TreeEntry};
use crate::templates::TemplateError;

pub const MANIFEST_FILE: &str = "skeleton.toml";
const EMBEDDED_MANIFEST: &str = include_str!("../templates/skeleton.toml");

/// Skeleton paths whose blob SHA changed or that disappeared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkeletonDriftError {
    pub repo: String,
    pub changed: Vec<String>,
    pub missing: Vec<String>,
}

impl fmt::Display for SkeletonDriftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "The skeleton repo ({}) has changed since the templates were last updated.",
            self.repo
        )?;
        writeln!(
            f,
            "The templates may be stale and must be reviewed before applying to other repos.\n"
        )?;
        for path in &self.changed {
            writeln!(f, "  CHANGED: {path}")?;
        }
        for path in &self.missing {
            writeln!(f, "  MISSING: {path}")?;
        }
        writeln!(f, "\nTo fix:")?;
        writeln!(f, "  1. Review the changes in the skeleton repo")?;
        writeln!(f, "  2. Update the workflow templates under templates/")?;
        write!(
            f,
            "  3. Update the blob SHAs in templates/{MANIFEST_FILE} (see the comment at its top)"
        )
    }
}

impl std::error::Error for SkeletonDriftError {}

#[derive(Debug, Error)]
pub enum SkeletonError {
    #[error("Could not fetch skeleton repo tree for {repo}: {source}")]
    Fetch {
        repo: String,
        #[source]
        source: GitHubError,
    },
    #[error(transparent)]
    Drift(#[from] SkeletonDriftError),
    #[error("Invalid skeleton.toml: {0}")]
    Manifest(#[from] toml::de::Error),
    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// Expected blob SHA per skeleton path.
#[derive(Debug, Clone, Deserialize)]
pub struct SkeletonManifest {
    pub blobs: BTreeMap<String, String>,
}

impl SkeletonManifest {
    pub fn parse(text: &str) -> Result<Self, SkeletonError> {
        Ok(toml::from_str(text)?)
    }

    /// The manifest next to overridden templates, or the embedded one.
    pub fn load(templates_dir: Option<&Path>) -> Result<Self, SkeletonError> {
        if let Some(path) = templates_dir.map(|dir| dir.join(MANIFEST_FILE)) {
            if path.is_file() {
                let text = std::fs::read_to_string(&path)
                    .map_err(|source| TemplateError::Read { path, source })?;
                return Self::parse(&text);
            }
        }
        Self::parse(EMBEDDED_MANIFEST)
    }

    /// Compare against a tree listing; paths are reported sorted.
    pub fn compare(&self, repo: &str, tree: &[TreeEntry]) -> Result<(), SkeletonDriftError> {
        let current: HashMap<&str, &str> = tree
            .iter()
            .map(|entry| (entry.path.as_str(), entry.sha.as_str()))
            .collect();

        let mut changed = Vec::new();
        let mut missing = Vec::new();
        for (path, expected_sha) in &self.blobs {
            match current.get(path.as_str()) {
                None => missing.push(path.clone()),
                Some(actual) if *actual != expected_sha.as_str() => changed.push(path.clone()),
                Some(_) => {}
            }
        }

        if changed.is_empty() && missing.is_empty() {
            Ok(())
        } else {
            Err(SkeletonDriftError {
                repo: repo.to_string(),
                changed,
                missing,
            })
        }
    }

    pub async fn verify(&self, ops: &dyn GitHubOps, repo: &str) -> Result<(), SkeletonError> {
        let tree = ops
            .fetch_tree(repo)
            .await
            .map_err(|source| SkeletonError::Fetch {
                repo: repo.to_string(),
                source,
            })?;
        self.compare(repo, &tree)?;
        info!(repo, files = self.blobs.len(), "Templates match skeleton repo");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::client::MockGitHubOps;

    fn manifest() -> SkeletonManifest {
        SkeletonManifest::parse(
            r#"
[blobs]
".github/dependabot.yml" = "aaa"
".github/workflows/release-publish.yml" = "bbb"
".github/workflows/pull-request-label.yml" = "ccc"
"#,
        )
        .unwrap()
    }

    #[test]
    fn embedded_manifest_covers_every_template() {
        let manifest = SkeletonManifest::load(None).unwrap();
        assert_eq!(manifest.blobs.len(), 6);
        assert!(manifest
            .blobs
            .contains_key(".github/workflows/pull-request-terraform-check-azure.yml"));
    }

    #[test]
    fn matching_tree_passes() {
        let tree = vec![
            TreeEntry::blob(".github/dependabot.yml", "aaa"),
            TreeEntry::blob(".github/workflows/release-publish.yml", "bbb"),
            TreeEntry::blob(".github/workflows/pull-request-label.yml", "ccc"),
            TreeEntry::blob("README.md", "zzz"),
        ];
        assert!(manifest().compare("skeleton", &tree).is_ok());
    }

    #[test]
    fn reports_changed_and_missing_paths() {
        let tree = vec![
            TreeEntry::blob(".github/dependabot.yml", "aaa"),
            TreeEntry::blob(".github/workflows/release-publish.yml", "new"),
        ];
        let drift = manifest().compare("skeleton", &tree).unwrap_err();
        assert_eq!(drift.changed, vec![".github/workflows/release-publish.yml"]);
        assert_eq!(drift.missing, vec![".github/workflows/pull-request-label.yml"]);

        let message = drift.to_string();
        assert!(message.contains("CHANGED: .github/workflows/release-publish.yml"));
        assert!(message.contains("MISSING: .github/workflows/pull-request-label.yml"));
        assert!(message.contains("To fix:"));
    }

    #[tokio::test]
    async fn fetch_failure_is_reported_separately() {
        let mut ops = MockGitHubOps::new();
        ops.expect_fetch_tree()
            .returning(|_| Err(GitHubError::InvalidResponse("gone".to_string())));

        let err = manifest().verify(&ops, "skeleton").await.unwrap_err();
        assert!(matches!(err, SkeletonError::Fetch { .. }));
    }
}
