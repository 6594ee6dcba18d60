use std::cell::RefCell;
use std::collections::HashMap;

use anyhow::Result;
use thiserror::Error;
use tracing::debug;

/// Key recording the branch new development work is cut from.
pub const DEVELOPMENT_BRANCH_KEY: &str = "zenflow.development.branch";
/// Key recording the branch bugfixes are staged on.
pub const QA_BRANCH_KEY: &str = "zenflow.qa.branch";
/// Key recording the branch releases ship from.
pub const PRODUCTION_BRANCH_KEY: &str = "zenflow.production.branch";
/// Key recording the optional release staging branch. Its presence gates
/// changelog rotation and version bumping for the release-tracking flows.
pub const RELEASE_BRANCH_KEY: &str = "zenflow.release.branch";

/// The changelog maintained at the repository root.
pub const CHANGELOG_FILE: &str = "CHANGELOG.md";
/// The stored version number, one `MAJOR.MINOR.PATCH` line.
pub const VERSION_FILE: &str = "VERSION";

/// A fatal configuration problem, surfaced at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown changelog policy '{0}' (expected none, rotate, or sans-rotation)")]
    UnknownChangelogPolicy(String),
    #[error("unknown version bump policy '{0}' (expected none, patch, minor, or major)")]
    UnknownVersionPolicy(String),
    #[error("malformed version '{0}' (expected MAJOR.MINOR.PATCH)")]
    MalformedVersion(String),
    #[error("flow '{0}' is already defined")]
    DuplicateFlow(String),
}

/// Scope of a configuration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Shared across every repository on the machine.
    Global,
    /// Recorded in the current repository only.
    Local,
}

/// The key-value configuration port.
///
/// Keys are dotted strings; an absent value is `None`, never an error.
pub trait ConfigStore: std::fmt::Debug {
    fn get(&self, key: &str, scope: Scope) -> Option<String>;
    fn set(&self, key: &str, scope: Scope, value: &str) -> Result<()>;
}

/// Raw per-flow policy overrides, parsed during registry construction.
#[derive(Debug, Clone, Default)]
pub struct PolicyOverride {
    pub changelog: Option<String>,
    pub version: Option<String>,
}

/// The branch taxonomy and policy overrides a repository is configured with.
///
/// Loaded once at process start; flow definitions derived from it never
/// change afterwards.
#[derive(Debug, Clone)]
pub struct FlowSettings {
    pub development_branch: String,
    pub qa_branch: String,
    pub production_branch: String,
    pub release_branch: Option<String>,
    pub policy_overrides: HashMap<String, PolicyOverride>,
}

impl FlowSettings {
    /// Reads the settings snapshot from the local configuration scope.
    pub fn load(store: &dyn ConfigStore) -> Self {
        let get_local =
            |key: &str, fallback: &str| store.get(key, Scope::Local).unwrap_or_else(|| fallback.to_string());

        let mut policy_overrides = HashMap::new();
        for flow in crate::flow::BUILTIN_FLOW_NAMES {
            let raw = PolicyOverride {
                changelog: store.get(&flow_policy_key(flow, "changelog"), Scope::Local),
                version: store.get(&flow_policy_key(flow, "version"), Scope::Local),
            };
            if raw.changelog.is_some() || raw.version.is_some() {
                policy_overrides.insert(flow.to_string(), raw);
            }
        }

        let settings = Self {
            development_branch: get_local(DEVELOPMENT_BRANCH_KEY, "develop"),
            qa_branch: get_local(QA_BRANCH_KEY, "qa"),
            production_branch: get_local(PRODUCTION_BRANCH_KEY, "main"),
            release_branch: store.get(RELEASE_BRANCH_KEY, Scope::Local),
            policy_overrides,
        };
        debug!("loaded flow settings: {:?}", settings);
        settings
    }
}

/// Key holding a per-flow policy override, e.g. `zenflow.flow.bugfix.changelog`.
pub fn flow_policy_key(flow: &str, policy: &str) -> String {
    format!("zenflow.flow.{flow}.{policy}")
}

/// An in-memory [`ConfigStore`], used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    values: RefCell<HashMap<(Scope, String), String>>,
}

impl MemoryConfigStore {
    pub fn seeded(entries: &[(Scope, &str, &str)]) -> Self {
        let store = Self::default();
        for (scope, key, value) in entries {
            store
                .values
                .borrow_mut()
                .insert((*scope, (*key).to_string()), (*value).to_string());
        }
        store
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, key: &str, scope: Scope) -> Option<String> {
        self.values.borrow().get(&(scope, key.to_string())).cloned()
    }

    fn set(&self, key: &str, scope: Scope, value: &str) -> Result<()> {
        self.values
            .borrow_mut()
            .insert((scope, key.to_string()), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_applies_branch_defaults_when_unset() {
        let store = MemoryConfigStore::default();
        let settings = FlowSettings::load(&store);
        assert_eq!(settings.development_branch, "develop");
        assert_eq!(settings.qa_branch, "qa");
        assert_eq!(settings.production_branch, "main");
        assert_eq!(settings.release_branch, None);
        assert!(settings.policy_overrides.is_empty());
    }

    #[test]
    fn load_reads_configured_branches_from_local_scope() {
        let store = MemoryConfigStore::seeded(&[
            (Scope::Local, DEVELOPMENT_BRANCH_KEY, "dev"),
            (Scope::Local, RELEASE_BRANCH_KEY, "release"),
            // Global values must not leak into the repository snapshot.
            (Scope::Global, QA_BRANCH_KEY, "global-qa"),
        ]);
        let settings = FlowSettings::load(&store);
        assert_eq!(settings.development_branch, "dev");
        assert_eq!(settings.release_branch.as_deref(), Some("release"));
        assert_eq!(settings.qa_branch, "qa");
    }

    #[test]
    fn load_collects_policy_overrides_per_flow() {
        let store = MemoryConfigStore::seeded(&[
            (Scope::Local, "zenflow.flow.bugfix.changelog", "rotate"),
            (Scope::Local, "zenflow.flow.release.version", "major"),
        ]);
        let settings = FlowSettings::load(&store);
        assert_eq!(
            settings.policy_overrides["bugfix"].changelog.as_deref(),
            Some("rotate")
        );
        assert_eq!(
            settings.policy_overrides["release"].version.as_deref(),
            Some("major")
        );
        assert!(!settings.policy_overrides.contains_key("feature"));
    }

    #[test]
    fn memory_store_set_then_get_roundtrips_per_scope() {
        let store = MemoryConfigStore::default();
        store.set("zenflow.token", Scope::Global, "t").unwrap();
        assert_eq!(store.get("zenflow.token", Scope::Global).as_deref(), Some("t"));
        assert_eq!(store.get("zenflow.token", Scope::Local), None);
    }
}
