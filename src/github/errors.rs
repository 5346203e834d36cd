use octocrab::Error as OctocrabError;

#[derive(Debug)]
pub enum GitHubError {
    TokenNotFound(String),
    ApiError(OctocrabError),
    IoError(std::io::Error),
    InvalidResponse(String),
    Timeout {
        operation: String,
        duration_ms: u64,
    },
}

impl GitHubError {
    /// HTTP status reported by GitHub, if this error came from an API response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            GitHubError::ApiError(OctocrabError::GitHub { source, .. }) => {
                Some(source.status_code.as_u16())
            }
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, GitHubError::Timeout { .. })
    }
}

impl From<OctocrabError> for GitHubError {
    fn from(err: OctocrabError) -> Self {
        GitHubError::ApiError(err)
    }
}

impl From<std::io::Error> for GitHubError {
    fn from(err: std::io::Error) -> Self {
        GitHubError::IoError(err)
    }
}

impl std::fmt::Display for GitHubError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitHubError::TokenNotFound(msg) => {
                writeln!(f, "GitHub Authentication Error")?;
                writeln!(f, "──────────────────────────")?;
                write!(f, "🔑 {msg}\n\n")?;
                writeln!(f, "🔧 QUICK FIXES:")?;
                writeln!(f, "   → Export a token: export GITHUB_TOKEN=\"$(gh auth token)\"")?;
                writeln!(f, "   → Or add it to a .env file next to launch-sync.toml")?;
                write!(
                    f,
                    "   → Create token at: https://github.com/settings/tokens (needs 'repo' and 'workflow' scopes)"
                )
            }
            GitHubError::ApiError(octocrab_err) => match octocrab_err {
                OctocrabError::GitHub { source, .. } => {
                    write!(f, "GitHub API error: HTTP {}: {}", source.status_code, source.message)?;
                    match source.status_code.as_u16() {
                        401 => write!(f, " (token is invalid or expired)"),
                        403 => write!(f, " (token lacks permissions or rate limit hit)"),
                        404 => write!(f, " (repository or resource not found)"),
                        422 => write!(f, " (request rejected by validation)"),
                        _ => Ok(()),
                    }
                }
                OctocrabError::Http { .. } => {
                    write!(f, "Network connection to the GitHub API failed: {octocrab_err}")
                }
                _ => write!(f, "GitHub API error: {octocrab_err}"),
            },
            GitHubError::IoError(io_err) => write!(f, "File system error: {io_err}"),
            GitHubError::InvalidResponse(msg) => {
                write!(f, "Unexpected response from GitHub: {msg}")
            }
            GitHubError::Timeout {
                operation,
                duration_ms,
            } => write!(f, "Operation '{operation}' timed out after {duration_ms}ms"),
        }
    }
}

impl std::error::Error for GitHubError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GitHubError::ApiError(err) => Some(err),
            GitHubError::IoError(err) => Some(err),
            _ => None,
        }
    }
}
