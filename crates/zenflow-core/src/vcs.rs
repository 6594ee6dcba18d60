use thiserror::Error;

/// Failure of a single version-control primitive.
#[derive(Debug, Error)]
#[error("git {primitive} failed: {message}")]
pub struct VcsError {
    pub primitive: &'static str,
    pub message: String,
}

impl VcsError {
    pub fn new(primitive: &'static str, message: impl Into<String>) -> Self {
        Self {
            primitive,
            message: message.into(),
        }
    }
}

pub type VcsResult<T> = Result<T, VcsError>;

/// The version-control port.
///
/// The lifecycle sequences these primitives but does not define their
/// mechanics; the git-backed implementation lives in the CLI crate. Hub-aware
/// primitives receive the resolved hub so the adapter can pick the remote.
pub trait VcsAdapter: std::fmt::Debug {
    /// Brings `branch` up to date with its upstream.
    fn update(&self, branch: &str) -> VcsResult<()>;
    /// Creates `branch` cut from `from`.
    fn create(&self, branch: &str, from: &str) -> VcsResult<()>;
    fn checkout(&self, branch: &str) -> VcsResult<()>;
    fn push(&self, branch: &str, hub: &str) -> VcsResult<()>;
    /// Sets up remote tracking for an already-pushed branch.
    fn track(&self, branch: &str, hub: &str) -> VcsResult<()>;
    /// Merges `branch` into `into`, leaving `into` checked out.
    fn merge(&self, branch: &str, into: &str) -> VcsResult<()>;
    /// Commits the given workspace files on the current branch.
    fn commit(&self, files: &[&str], message: &str) -> VcsResult<()>;
    fn tag(&self, name: &str, message: &str) -> VcsResult<()>;
    /// Deletes `branch` locally and on its remote.
    fn delete(&self, branch: &str) -> VcsResult<()>;
    fn current_branch(&self) -> VcsResult<String>;
}
