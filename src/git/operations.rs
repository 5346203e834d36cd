use anyhow::{Context, Result};
use git2::build::RepoBuilder;
use git2::{
    Cred, FetchOptions, IndexAddOption, Oid, PushOptions, RemoteCallbacks, Repository, Signature,
    Status, StatusOptions,
};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Username GitHub expects alongside an installation or personal token.
const TOKEN_USERNAME: &str = "x-access-token";

/// Working-copy operations the workflow sync performs on a cloned repository
pub trait GitOperations {
    /// Short name of the checked-out branch (`git branch --show-current`)
    fn current_branch(&self) -> Result<String>;

    /// Create `name` at HEAD and switch to it (`git checkout -b`)
    fn create_and_checkout_branch(&self, name: &str) -> Result<()>;

    /// Stage additions, modifications and deletions (`git add -A`)
    fn stage_all(&self) -> Result<()>;

    /// Porcelain status lines, e.g. `A  .github/dependabot.yml`
    fn get_status(&self) -> Result<Vec<String>>;

    /// Commit the index on top of HEAD
    fn commit(&self, message: &str) -> Result<Oid>;

    /// Push `branch` to the same name on `remote`
    fn push(&self, remote: &str, branch: &str) -> Result<()>;
}

/// Implementation of GitOperations using git2
pub struct Git2Operations {
    repo: Repository,
    token: Option<String>,
}

impl Git2Operations {
    /// Clone `url` into `dest`. A `depth` of zero or less fetches full history.
    pub fn clone_into(url: &str, dest: &Path, depth: i32, token: Option<&str>) -> Result<Self> {
        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(Self::callbacks(token));
        if depth > 0 {
            fetch_options.depth(depth);
        }

        let repo = RepoBuilder::new()
            .fetch_options(fetch_options)
            .clone(url, dest)
            .with_context(|| format!("Failed to clone {url}"))?;
        debug!(url, dest = %dest.display(), depth, "Cloned repository");

        Ok(Self {
            repo,
            token: token.map(str::to_string),
        })
    }

    fn callbacks(token: Option<&str>) -> RemoteCallbacks<'static> {
        let token = token.map(str::to_string);
        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(move |_url, _username_from_url, _allowed_types| match &token {
            Some(token) => Cred::userpass_plaintext(TOKEN_USERNAME, token),
            None => Cred::default(),
        });
        callbacks
    }

    pub fn workdir(&self) -> Result<&Path> {
        self.repo
            .workdir()
            .context("Repository has no working directory")
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf> {
        Ok(self.workdir()?.join(relative))
    }

    /// Write `content` to `relative`, creating parent directories.
    pub fn write_file(&self, relative: &str, content: &str) -> Result<()> {
        let path = self.resolve(relative)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Remove `relative`; an already-missing file is not an error.
    pub fn remove_file(&self, relative: &str) -> Result<()> {
        let path = self.resolve(relative)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("Failed to delete {}", path.display())),
        }
    }

    fn get_signature(&self) -> Result<Signature<'static>> {
        match self.repo.signature() {
            Ok(sig) => Ok(sig),
            Err(_) => Signature::now("launch-sync", "launch-sync@users.noreply.github.com")
                .context("Failed to create default signature"),
        }
    }
}

/// Two-column porcelain code (`XY`) for a status entry.
pub(crate) fn porcelain_code(status: Status) -> String {
    let index = if status.contains(Status::INDEX_NEW) {
        'A'
    } else if status.contains(Status::INDEX_MODIFIED) {
        'M'
    } else if status.contains(Status::INDEX_DELETED) {
        'D'
    } else if status.contains(Status::INDEX_RENAMED) {
        'R'
    } else if status.contains(Status::WT_NEW) {
        '?'
    } else {
        ' '
    };
    let worktree = if status.contains(Status::WT_NEW) {
        '?'
    } else if status.contains(Status::WT_MODIFIED) {
        'M'
    } else if status.contains(Status::WT_DELETED) {
        'D'
    } else {
        ' '
    };
    format!("{index}{worktree}")
}

impl GitOperations for Git2Operations {
    fn current_branch(&self) -> Result<String> {
        let head = self.repo.head().context("Repository has no HEAD")?;
        head.shorthand()
            .map(str::to_string)
            .context("HEAD is not a valid UTF-8 branch name")
    }

    fn create_and_checkout_branch(&self, name: &str) -> Result<()> {
        let head = self.repo.head()?.peel_to_commit()?;
        self.repo
            .branch(name, &head, false)
            .with_context(|| format!("Failed to create branch '{name}'"))?;
        self.repo
            .set_head(&format!("refs/heads/{name}"))
            .with_context(|| format!("Failed to check out branch '{name}'"))?;
        Ok(())
    }

    fn stage_all(&self) -> Result<()> {
        let mut index = self.repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"].iter(), None)?;
        index.write().context("Failed to write index")?;
        Ok(())
    }

    fn get_status(&self) -> Result<Vec<String>> {
        let mut options = StatusOptions::new();
        options
            .include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);
        let statuses = self.repo.statuses(Some(&mut options))?;

        let mut status_list: Vec<String> = statuses
            .iter()
            .filter_map(|entry| {
                let path = entry.path()?;
                Some(format!("{} {path}", porcelain_code(entry.status())))
            })
            .collect();
        status_list.sort_by(|a, b| a[3..].cmp(&b[3..]));
        Ok(status_list)
    }

    fn commit(&self, message: &str) -> Result<Oid> {
        let signature = self.get_signature()?;
        let tree_id = self.repo.index()?.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;
        let parent = self.repo.head()?.peel_to_commit()?;

        let oid = self
            .repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &[&parent])
            .context("Failed to create commit")?;
        debug!(commit = %oid, "Committed");
        Ok(oid)
    }

    fn push(&self, remote_name: &str, branch: &str) -> Result<()> {
        let mut remote = self
            .repo
            .find_remote(remote_name)
            .with_context(|| format!("Remote '{remote_name}' not found"))?;

        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");

        let mut callbacks = Self::callbacks(self.token.as_deref());
        callbacks.push_update_reference(|refname, rejection| match rejection {
            Some(reason) => Err(git2::Error::from_str(&format!(
                "remote rejected {refname}: {reason}"
            ))),
            None => Ok(()),
        });

        let mut push_options = PushOptions::new();
        push_options.remote_callbacks(callbacks);

        remote
            .push(&[&refspec], Some(&mut push_options))
            .with_context(|| format!("Failed to push '{branch}' to {remote_name}"))?;
        Ok(())
    }
}
