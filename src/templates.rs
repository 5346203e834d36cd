//! Workflow templates and the expected file set they render into.
//!
//! Templates ship embedded in the binary. A configured templates directory may
//! override any of them by file name; the rest keep their embedded text.

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const VERSION_PLACEHOLDER: &str = "{version}";

const PR_LABEL: &str = include_str!("../templates/pull-request-label.yml");
const CHECK_AWS: &str = include_str!("../templates/pull-request-terraform-check-aws.yml");
const CHECK_AZURE: &str = include_str!("../templates/pull-request-terraform-check-azure.yml");
const RELEASE_PUBLISH: &str = include_str!("../templates/release-publish.yml");
const RELEASE_DRAFTER: &str = include_str!("../templates/release-drafter.yml");
const DEPENDABOT: &str = include_str!("../templates/dependabot.yml");

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Cannot detect cloud provider for '{repo}'. Use --provider aws|azure to override.")]
    Undetectable { repo: String },
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Failed to read template {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Template {name} has no {{version}} placeholder")]
    MissingPlaceholder { name: &'static str },
}

/// Cloud platform a `tf-*` module targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Provider {
    Aws,
    Azure,
}

impl Provider {
    /// Detect from the repository name unless `override_with` is given.
    pub fn detect(repo: &str, override_with: Option<Provider>) -> Result<Provider, ProviderError> {
        if let Some(provider) = override_with {
            return Ok(provider);
        }
        if repo.starts_with("tf-aws-") {
            Ok(Provider::Aws)
        } else if repo.starts_with("tf-azurerm-") || repo.starts_with("tf-azureado-") {
            Ok(Provider::Azure)
        } else {
            Err(ProviderError::Undetectable {
                repo: repo.to_string(),
            })
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Aws => "aws",
            Provider::Azure => "azure",
        }
    }

    pub fn check_workflow_file(self) -> &'static str {
        match self {
            Provider::Aws => "pull-request-terraform-check-aws.yml",
            Provider::Azure => "pull-request-terraform-check-azure.yml",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw template text, `{version}` still unexpanded.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    pub pr_label: String,
    pub check_aws: String,
    pub check_azure: String,
    pub release_publish: String,
    pub release_drafter: String,
    pub dependabot: String,
}

impl TemplateSet {
    pub fn embedded() -> Self {
        Self {
            pr_label: PR_LABEL.to_string(),
            check_aws: CHECK_AWS.to_string(),
            check_azure: CHECK_AZURE.to_string(),
            release_publish: RELEASE_PUBLISH.to_string(),
            release_drafter: RELEASE_DRAFTER.to_string(),
            dependabot: DEPENDABOT.to_string(),
        }
    }

    /// Embedded templates, with any same-named file in `dir` taking precedence.
    pub fn load(dir: Option<&Path>) -> Result<Self, TemplateError> {
        let mut set = Self::embedded();
        let Some(dir) = dir else {
            return Ok(set);
        };

        let slots: [(&str, &mut String); 6] = [
            ("pull-request-label.yml", &mut set.pr_label),
            ("pull-request-terraform-check-aws.yml", &mut set.check_aws),
            ("pull-request-terraform-check-azure.yml", &mut set.check_azure),
            ("release-publish.yml", &mut set.release_publish),
            ("release-drafter.yml", &mut set.release_drafter),
            ("dependabot.yml", &mut set.dependabot),
        ];
        for (name, slot) in slots {
            let path = dir.join(name);
            if !path.is_file() {
                continue;
            }
            *slot = std::fs::read_to_string(&path)
                .map_err(|source| TemplateError::Read { path: path.clone(), source })?;
            debug!(template = name, path = %path.display(), "Template overridden");
        }

        set.validate()?;
        Ok(set)
    }

    /// Workflow templates must reference the version they pin.
    pub fn validate(&self) -> Result<(), TemplateError> {
        let pinned = [
            ("pull-request-label.yml", &self.pr_label),
            ("pull-request-terraform-check-aws.yml", &self.check_aws),
            ("pull-request-terraform-check-azure.yml", &self.check_azure),
            ("release-publish.yml", &self.release_publish),
        ];
        for (name, text) in pinned {
            if !text.contains(VERSION_PLACEHOLDER) {
                return Err(TemplateError::MissingPlaceholder { name });
            }
        }
        Ok(())
    }

    fn check_template(&self, provider: Provider) -> &str {
        match provider {
            Provider::Aws => &self.check_aws,
            Provider::Azure => &self.check_azure,
        }
    }
}

/// Target file set of one repository: repository-relative path to exact content.
///
/// Iteration order is fixed and drives the order of reconciliation actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedFiles {
    files: Vec<(String, String)>,
}

impl ExpectedFiles {
    pub fn build(templates: &TemplateSet, provider: Provider, version: &str) -> Self {
        let render = |text: &str| text.replace(VERSION_PLACEHOLDER, version);
        let files = vec![
            (
                ".github/workflows/pull-request-label.yml".to_string(),
                render(&templates.pr_label),
            ),
            (
                format!(".github/workflows/{}", provider.check_workflow_file()),
                render(templates.check_template(provider)),
            ),
            (
                ".github/workflows/release-publish.yml".to_string(),
                render(&templates.release_publish),
            ),
            (
                ".github/release-drafter.yml".to_string(),
                templates.release_drafter.clone(),
            ),
            (
                ".github/dependabot.yml".to_string(),
                templates.dependabot.clone(),
            ),
        ];
        Self { files }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(p, c)| (p.as_str(), c.as_str()))
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.iter().find(|(p, _)| *p == path).map(|(_, c)| c)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_provider_from_prefix() {
        assert_eq!(Provider::detect("tf-aws-module_primitive-s3_bucket", None).unwrap(), Provider::Aws);
        assert_eq!(Provider::detect("tf-azurerm-module_ref-vnet", None).unwrap(), Provider::Azure);
        assert_eq!(Provider::detect("tf-azureado-module_primitive-project", None).unwrap(), Provider::Azure);
    }

    #[test]
    fn override_beats_detection() {
        assert_eq!(
            Provider::detect("tf-aws-something", Some(Provider::Azure)).unwrap(),
            Provider::Azure
        );
        assert_eq!(
            Provider::detect("tf-gcp-something", Some(Provider::Aws)).unwrap(),
            Provider::Aws
        );
    }

    #[test]
    fn unknown_prefix_is_an_error() {
        let err = Provider::detect("tf-gcp-something", None).unwrap_err();
        assert!(err.to_string().contains("--provider aws|azure"));
    }

    #[test]
    fn expected_files_are_ordered_and_versioned() {
        let files = ExpectedFiles::build(&TemplateSet::embedded(), Provider::Azure, "1.4.0");
        let paths: Vec<&str> = files.iter().map(|(p, _)| p).collect();
        assert_eq!(
            paths,
            vec![
                ".github/workflows/pull-request-label.yml",
                ".github/workflows/pull-request-terraform-check-azure.yml",
                ".github/workflows/release-publish.yml",
                ".github/release-drafter.yml",
                ".github/dependabot.yml",
            ]
        );

        let check = files
            .get(".github/workflows/pull-request-terraform-check-azure.yml")
            .unwrap();
        assert!(check.contains("reusable-terraform-check-azure.yml@1.4.0"));
        assert!(files.iter().all(|(_, c)| !c.contains(VERSION_PLACEHOLDER)));
    }

    #[test]
    fn embedded_templates_are_valid() {
        TemplateSet::embedded().validate().unwrap();
    }

    #[test]
    fn directory_overrides_single_template() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("dependabot.yml"), "version: 2\n").unwrap();

        let set = TemplateSet::load(Some(dir.path())).unwrap();
        assert_eq!(set.dependabot, "version: 2\n");
        assert_eq!(set.pr_label, PR_LABEL);
    }

    #[test]
    fn override_without_placeholder_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("release-publish.yml"), "name: Publish\n").unwrap();

        let err = TemplateSet::load(Some(dir.path())).unwrap_err();
        assert!(matches!(
            err,
            TemplateError::MissingPlaceholder { name: "release-publish.yml" }
        ));
    }
}
