//! Shapes octocrab does not model: the recursive git tree listing and the
//! pull request summary handed across the `GitHubOps` seam.

use octocrab::models::pulls::PullRequest;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct GitTree {
    #[serde(default)]
    pub tree: Vec<TreeEntry>,
    #[serde(default)]
    pub truncated: bool,
}

/// One entry of a recursive git tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    pub sha: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl TreeEntry {
    pub fn blob(path: &str, sha: &str) -> Self {
        Self {
            path: path.to_string(),
            sha: sha.to_string(),
            kind: "blob".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRef {
    pub number: u64,
    pub html_url: Option<String>,
}

impl From<&PullRequest> for PullRequestRef {
    fn from(pr: &PullRequest) -> Self {
        Self {
            number: pr.number,
            html_url: pr.html_url.as_ref().map(ToString::to_string),
        }
    }
}
