//! Core logic and abstractions for the Zenflow branching engine.
//!
//! This crate defines the flow registry, the branch lifecycle, and the two
//! ports (configuration store and version-control adapter) the lifecycle is
//! driven through. Hub identity resolution lives in `zenflow-hub`; the
//! git-backed port implementations live in `zenflow-cli`.

pub mod branch;
pub mod changelog;
pub mod config;
pub mod flow;
pub mod vcs;
pub mod version;

pub use branch::{BranchLifecycle, BranchRef, LifecycleError, LifecycleStage};
pub use config::{ConfigError, ConfigStore, FlowSettings, MemoryConfigStore, Scope};
pub use flow::{ChangelogPolicy, FlowDefinition, FlowRegistry, VersionBumpPolicy};
pub use vcs::{VcsAdapter, VcsError};
pub use version::Version;
