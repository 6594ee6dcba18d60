use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use chrono::Local;
use thiserror::Error;
use tracing::{info, instrument};

use crate::changelog::Changelog;
use crate::config::{CHANGELOG_FILE, VERSION_FILE};
use crate::flow::{ChangelogPolicy, FlowDefinition, VersionBumpPolicy};
use crate::vcs::{VcsAdapter, VcsError, VcsResult};
use crate::version::Version;

/// One of the lifecycle stages a branch moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleStage {
    Start,
    Publish,
    Finish,
}

impl LifecycleStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Publish => "publish",
            Self::Finish => "finish",
        }
    }
}

impl Display for LifecycleStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A flow name plus a short label, naming the working branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRef {
    flow: String,
    label: String,
}

impl BranchRef {
    pub fn new(flow: &FlowDefinition, label: &str) -> Self {
        Self {
            flow: flow.name.clone(),
            label: label.to_string(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// The full branch name used for every version-control operation.
    pub fn qualified(&self) -> String {
        format!("{}/{}", self.flow, self.label)
    }
}

impl Display for BranchRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.qualified())
    }
}

/// A lifecycle stage halted. The repository is left at whatever state the
/// last successful primitive produced; nothing is rolled back or retried.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{stage} halted: {source}")]
    Primitive {
        stage: LifecycleStage,
        source: VcsError,
    },
    #[error("{stage} halted: {detail}")]
    Workspace {
        stage: LifecycleStage,
        detail: String,
    },
}

impl LifecycleError {
    pub fn stage(&self) -> LifecycleStage {
        match self {
            Self::Primitive { stage, .. } | Self::Workspace { stage, .. } => *stage,
        }
    }

    fn workspace(stage: LifecycleStage, err: impl Display) -> Self {
        Self::Workspace {
            stage,
            detail: format!("{err:#}"),
        }
    }
}

fn vcs_step<T>(stage: LifecycleStage, result: VcsResult<T>) -> Result<T, LifecycleError> {
    result.map_err(|source| LifecycleError::Primitive { stage, source })
}

/// Drives a branch through start/publish/finish for a given flow.
///
/// Holds the version-control port and the workspace root where the changelog
/// and version files live. Stages run synchronously to completion; a failed
/// primitive aborts the remaining sequence.
#[derive(Debug)]
pub struct BranchLifecycle<'a> {
    vcs: &'a dyn VcsAdapter,
    root: PathBuf,
}

impl<'a> BranchLifecycle<'a> {
    pub fn new(vcs: &'a dyn VcsAdapter, root: impl Into<PathBuf>) -> Self {
        Self {
            vcs,
            root: root.into(),
        }
    }

    /// Cuts `<flow>/<label>` from the flow's source branch and checks it out.
    #[instrument(skip(self, flow), fields(flow = %flow.name))]
    pub fn start(&self, flow: &FlowDefinition, label: &str) -> Result<BranchRef, LifecycleError> {
        const STAGE: LifecycleStage = LifecycleStage::Start;
        let branch = BranchRef::new(flow, label);
        let full = branch.qualified();

        info!("starting {full} from {}", flow.source_branch);
        vcs_step(STAGE, self.vcs.update(&flow.source_branch))?;
        vcs_step(STAGE, self.vcs.create(&full, &flow.source_branch))?;
        vcs_step(STAGE, self.vcs.checkout(&full))?;
        Ok(branch)
    }

    /// Pushes the branch to the resolved hub's remote and tracks it.
    ///
    /// The caller resolves the hub beforehand; with a single known hub the
    /// resolution degrades to that hub and this still runs unchanged.
    #[instrument(skip(self, flow), fields(flow = %flow.name))]
    pub fn publish(
        &self,
        flow: &FlowDefinition,
        label: &str,
        hub: &str,
    ) -> Result<BranchRef, LifecycleError> {
        const STAGE: LifecycleStage = LifecycleStage::Publish;
        let branch = BranchRef::new(flow, label);
        let full = branch.qualified();

        info!("publishing {full} to {hub}");
        vcs_step(STAGE, self.vcs.push(&full, hub))?;
        vcs_step(STAGE, self.vcs.track(&full, hub))?;
        Ok(branch)
    }

    /// Merges the branch into the flow's deploy branch, applies the flow's
    /// changelog and version policies, and deletes the merged branch.
    ///
    /// When both side effects apply, the changelog is committed strictly
    /// before the tag is created, so the tag includes the changelog change.
    #[instrument(skip(self, flow), fields(flow = %flow.name))]
    pub fn finish(
        &self,
        flow: &FlowDefinition,
        label: &str,
        log_entry: Option<&str>,
    ) -> Result<BranchRef, LifecycleError> {
        const STAGE: LifecycleStage = LifecycleStage::Finish;
        let branch = BranchRef::new(flow, label);
        let full = branch.qualified();

        info!("finishing {full} into {}", flow.deploy_branch);
        vcs_step(STAGE, self.vcs.merge(&full, &flow.deploy_branch))?;

        // The bumped version is computed up front so a rotation can title its
        // release section with it; the VERSION write itself stays after the
        // changelog commit.
        let next_version = match flow.version_bump {
            VersionBumpPolicy::None => None,
            policy => {
                let current = Version::read_from(&self.root.join(VERSION_FILE))
                    .map_err(|e| LifecycleError::workspace(STAGE, e))?;
                Some(current.bumped(policy))
            }
        };

        if flow.changelog != ChangelogPolicy::None {
            let changelog = Changelog::new(self.root.join(CHANGELOG_FILE));
            let entry = log_entry.map(ToOwned::to_owned).unwrap_or_else(|| format!("Merge {full}"));
            changelog
                .append(&entry)
                .map_err(|e| LifecycleError::workspace(STAGE, e))?;
            if flow.changelog == ChangelogPolicy::Rotate {
                changelog
                    .rotate(next_version.as_ref(), Local::now().date_naive())
                    .map_err(|e| LifecycleError::workspace(STAGE, e))?;
            }
            vcs_step(STAGE, self.vcs.commit(&[CHANGELOG_FILE], "Update changelog"))?;
        }

        if let Some(version) = next_version {
            version
                .write_to(&self.root.join(VERSION_FILE))
                .map_err(|e| LifecycleError::workspace(STAGE, e))?;
            vcs_step(
                STAGE,
                self.vcs
                    .commit(&[VERSION_FILE], &format!("Bump version to {version}")),
            )?;
            vcs_step(
                STAGE,
                self.vcs.tag(&format!("v{version}"), &format!("Release {version}")),
            )?;
        }

        vcs_step(STAGE, self.vcs.delete(&full))?;
        Ok(branch)
    }
}
