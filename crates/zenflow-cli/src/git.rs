use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use tracing::debug;

use zenflow_core::vcs::VcsResult;
use zenflow_core::{ConfigStore, Scope, VcsAdapter, VcsError};

/// Runs one git invocation in `dir`, returning trimmed stdout.
fn run_git(dir: &Path, args: &[&str]) -> Result<String> {
    debug!("git {}", args.join(" "));
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .with_context(|| format!("failed to start 'git {}'", args.join(" ")))?;

    if !output.status.success() {
        bail!(
            "git {} exited with {}: {}",
            args.join(" "),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// [`ConfigStore`] backed by `git config`.
#[derive(Debug)]
pub struct GitConfigStore {
    dir: PathBuf,
}

impl GitConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn scope_flag(scope: Scope) -> &'static str {
        match scope {
            Scope::Global => "--global",
            Scope::Local => "--local",
        }
    }

    /// Every key/value entry in a scope; used by hub listings.
    pub fn entries(&self, scope: Scope) -> Result<Vec<(String, String)>> {
        let text = run_git(&self.dir, &["config", Self::scope_flag(scope), "--list"])?;
        Ok(text
            .lines()
            .filter_map(|line| line.split_once('='))
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect())
    }
}

impl ConfigStore for GitConfigStore {
    fn get(&self, key: &str, scope: Scope) -> Option<String> {
        // `git config --get` exits non-zero for a missing key; that is the
        // absent case, not an error.
        let value = run_git(&self.dir, &["config", Self::scope_flag(scope), "--get", key]).ok()?;
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }

    fn set(&self, key: &str, scope: Scope, value: &str) -> Result<()> {
        run_git(&self.dir, &["config", Self::scope_flag(scope), key, value]).map(|_| ())
    }
}

/// [`VcsAdapter`] that shells out to the `git` binary.
#[derive(Debug)]
pub struct GitVcs {
    dir: PathBuf,
}

impl GitVcs {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn git(&self, primitive: &'static str, args: &[&str]) -> VcsResult<String> {
        run_git(&self.dir, args).map_err(|e| VcsError::new(primitive, format!("{e:#}")))
    }

    /// The remote a hub maps to: a remote named after the hub when one
    /// exists, else `origin`.
    fn remote_for(&self, hub: &str) -> String {
        match run_git(&self.dir, &["remote"]) {
            Ok(remotes) if remotes.lines().any(|remote| remote == hub) => hub.to_string(),
            _ => "origin".to_string(),
        }
    }
}

impl VcsAdapter for GitVcs {
    fn update(&self, branch: &str) -> VcsResult<()> {
        self.git("update", &["checkout", branch])?;
        self.git("update", &["pull"])?;
        Ok(())
    }

    fn create(&self, branch: &str, from: &str) -> VcsResult<()> {
        self.git("create", &["branch", branch, from]).map(|_| ())
    }

    fn checkout(&self, branch: &str) -> VcsResult<()> {
        self.git("checkout", &["checkout", branch]).map(|_| ())
    }

    fn push(&self, branch: &str, hub: &str) -> VcsResult<()> {
        let remote = self.remote_for(hub);
        self.git("push", &["push", &remote, branch]).map(|_| ())
    }

    fn track(&self, branch: &str, hub: &str) -> VcsResult<()> {
        let remote = self.remote_for(hub);
        let upstream = format!("{remote}/{branch}");
        self.git("track", &["branch", "--set-upstream-to", &upstream, branch])
            .map(|_| ())
    }

    fn merge(&self, branch: &str, into: &str) -> VcsResult<()> {
        self.git("merge", &["checkout", into])?;
        self.git("merge", &["merge", "--no-ff", branch]).map(|_| ())
    }

    fn commit(&self, files: &[&str], message: &str) -> VcsResult<()> {
        let mut add = vec!["add", "--"];
        add.extend_from_slice(files);
        self.git("commit", &add)?;
        self.git("commit", &["commit", "-m", message]).map(|_| ())
    }

    fn tag(&self, name: &str, message: &str) -> VcsResult<()> {
        self.git("tag", &["tag", "-a", name, "-m", message]).map(|_| ())
    }

    fn delete(&self, branch: &str) -> VcsResult<()> {
        self.git("delete", &["branch", "-d", branch])?;
        // An unpublished branch has nothing to remove on the remote.
        if let Err(e) = run_git(&self.dir, &["push", "origin", "--delete", branch]) {
            debug!("skipping remote delete of {branch}: {e:#}");
        }
        Ok(())
    }

    fn current_branch(&self) -> VcsResult<String> {
        self.git("current-branch", &["rev-parse", "--abbrev-ref", "HEAD"])
    }
}
