use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use tracing::debug;

use crate::config::{ConfigError, FlowSettings};

/// How finishing a branch updates the changelog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangelogPolicy {
    /// No changelog side effect.
    None,
    /// Rotate pending entries into a dated release section.
    Rotate,
    /// Append the entry without rotating a release section.
    SansRotation,
}

impl ChangelogPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Rotate => "rotate",
            Self::SansRotation => "sans-rotation",
        }
    }
}

impl Display for ChangelogPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ChangelogPolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "none" => Ok(Self::None),
            "rotate" => Ok(Self::Rotate),
            "sans-rotation" | "sans_rotation" => Ok(Self::SansRotation),
            other => Err(ConfigError::UnknownChangelogPolicy(other.to_string())),
        }
    }
}

/// Which unit of the stored version finishing a branch increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionBumpPolicy {
    None,
    Patch,
    Minor,
    Major,
}

impl VersionBumpPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Patch => "patch",
            Self::Minor => "minor",
            Self::Major => "major",
        }
    }
}

impl Display for VersionBumpPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VersionBumpPolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "none" => Ok(Self::None),
            "patch" => Ok(Self::Patch),
            "minor" => Ok(Self::Minor),
            "major" => Ok(Self::Major),
            other => Err(ConfigError::UnknownVersionPolicy(other.to_string())),
        }
    }
}

/// A named branching strategy with fixed source/deploy branches and policies.
///
/// Immutable once defined; the capability set of a flow never changes during
/// the life of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowDefinition {
    pub name: String,
    pub source_branch: String,
    pub deploy_branch: String,
    pub changelog: ChangelogPolicy,
    pub version_bump: VersionBumpPolicy,
}

impl FlowDefinition {
    /// A non-`None` bump policy always implies a tag on finish.
    pub fn tags_on_finish(&self) -> bool {
        self.version_bump != VersionBumpPolicy::None
    }
}

/// The flows the built-in registry assembles, in definition order.
pub const BUILTIN_FLOW_NAMES: [&str; 4] = ["feature", "bugfix", "hotfix", "release"];

/// Which configured branch a blueprint slot resolves to.
#[derive(Debug, Clone, Copy)]
enum BranchRole {
    Development,
    Qa,
    Production,
}

impl BranchRole {
    fn resolve(self, settings: &FlowSettings) -> &str {
        match self {
            Self::Development => &settings.development_branch,
            Self::Qa => &settings.qa_branch,
            Self::Production => &settings.production_branch,
        }
    }
}

/// How a blueprint derives its policies from the settings snapshot.
#[derive(Debug, Clone, Copy)]
enum PolicyRule {
    Fixed(ChangelogPolicy, VersionBumpPolicy),
    /// Gated on a configured release branch: present means the flow rotates
    /// the changelog and patch-bumps, absent means it appends and never tags.
    ReleaseGated,
}

impl PolicyRule {
    fn evaluate(self, settings: &FlowSettings) -> (ChangelogPolicy, VersionBumpPolicy) {
        match self {
            Self::Fixed(changelog, bump) => (changelog, bump),
            Self::ReleaseGated => {
                if settings.release_branch.is_some() {
                    (ChangelogPolicy::Rotate, VersionBumpPolicy::Patch)
                } else {
                    (ChangelogPolicy::SansRotation, VersionBumpPolicy::None)
                }
            }
        }
    }
}

struct FlowBlueprint {
    name: &'static str,
    source: BranchRole,
    deploy: BranchRole,
    policies: PolicyRule,
}

const BLUEPRINTS: [FlowBlueprint; 4] = [
    FlowBlueprint {
        name: "feature",
        source: BranchRole::Development,
        deploy: BranchRole::Development,
        policies: PolicyRule::Fixed(ChangelogPolicy::None, VersionBumpPolicy::None),
    },
    FlowBlueprint {
        name: "bugfix",
        source: BranchRole::Development,
        deploy: BranchRole::Qa,
        policies: PolicyRule::ReleaseGated,
    },
    FlowBlueprint {
        name: "hotfix",
        source: BranchRole::Production,
        deploy: BranchRole::Production,
        policies: PolicyRule::ReleaseGated,
    },
    FlowBlueprint {
        name: "release",
        source: BranchRole::Development,
        deploy: BranchRole::Production,
        policies: PolicyRule::Fixed(ChangelogPolicy::Rotate, VersionBumpPolicy::Minor),
    },
];

/// A registry of the flows defined for this process.
#[derive(Debug, Default)]
pub struct FlowRegistry {
    flows: HashMap<String, FlowDefinition>,
}

impl FlowRegistry {
    /// Assembles the built-in flows from the blueprint table, evaluating
    /// each blueprint's policy rule against the settings snapshot and then
    /// applying any raw per-flow overrides. Override strings that fail to
    /// parse abort construction.
    pub fn builtin(settings: &FlowSettings) -> Result<Self, ConfigError> {
        let mut registry = Self::default();
        for blueprint in &BLUEPRINTS {
            let (mut changelog, mut bump) = blueprint.policies.evaluate(settings);
            if let Some(overrides) = settings.policy_overrides.get(blueprint.name) {
                if let Some(raw) = &overrides.changelog {
                    changelog = raw.parse()?;
                }
                if let Some(raw) = &overrides.version {
                    bump = raw.parse()?;
                }
            }
            registry.define(
                blueprint.name,
                blueprint.source.resolve(settings),
                blueprint.deploy.resolve(settings),
                changelog,
                bump,
            )?;
        }
        Ok(registry)
    }

    /// Defines a flow. Redefining an existing name is a configuration error.
    pub fn define(
        &mut self,
        name: &str,
        source_branch: &str,
        deploy_branch: &str,
        changelog: ChangelogPolicy,
        version_bump: VersionBumpPolicy,
    ) -> Result<&FlowDefinition, ConfigError> {
        debug!(
            "defining flow {name}: {source_branch} -> {deploy_branch} (changelog={changelog}, version={version_bump})"
        );
        match self.flows.entry(name.to_string()) {
            Entry::Occupied(_) => Err(ConfigError::DuplicateFlow(name.to_string())),
            Entry::Vacant(slot) => Ok(slot.insert(FlowDefinition {
                name: name.to_string(),
                source_branch: source_branch.to_string(),
                deploy_branch: deploy_branch.to_string(),
                changelog,
                version_bump,
            })),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FlowDefinition> {
        self.flows.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.flows.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Every definition, ordered by flow name.
    pub fn definitions(&self) -> Vec<&FlowDefinition> {
        let mut flows: Vec<&FlowDefinition> = self.flows.values().collect();
        flows.sort_by(|a, b| a.name.cmp(&b.name));
        flows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyOverride;

    fn settings(release_branch: Option<&str>) -> FlowSettings {
        FlowSettings {
            development_branch: "develop".to_string(),
            qa_branch: "qa".to_string(),
            production_branch: "main".to_string(),
            release_branch: release_branch.map(ToOwned::to_owned),
            policy_overrides: HashMap::new(),
        }
    }

    #[test]
    fn release_branch_present_gates_rotation_and_patch_bump() {
        let registry = FlowRegistry::builtin(&settings(Some("release"))).unwrap();
        let bugfix = registry.get("bugfix").unwrap();
        assert_eq!(bugfix.changelog, ChangelogPolicy::Rotate);
        assert_eq!(bugfix.version_bump, VersionBumpPolicy::Patch);
        assert!(bugfix.tags_on_finish());
    }

    #[test]
    fn release_branch_absent_degrades_to_plain_append() {
        let registry = FlowRegistry::builtin(&settings(None)).unwrap();
        let bugfix = registry.get("bugfix").unwrap();
        assert_eq!(bugfix.changelog, ChangelogPolicy::SansRotation);
        assert_eq!(bugfix.version_bump, VersionBumpPolicy::None);
        assert!(!bugfix.tags_on_finish());
    }

    #[test]
    fn builtin_flows_cut_from_configured_branches() {
        let registry = FlowRegistry::builtin(&settings(None)).unwrap();
        let bugfix = registry.get("bugfix").unwrap();
        assert_eq!(bugfix.source_branch, "develop");
        assert_eq!(bugfix.deploy_branch, "qa");

        let hotfix = registry.get("hotfix").unwrap();
        assert_eq!(hotfix.source_branch, "main");
        assert_eq!(hotfix.deploy_branch, "main");

        let release = registry.get("release").unwrap();
        assert_eq!(release.changelog, ChangelogPolicy::Rotate);
        assert_eq!(release.version_bump, VersionBumpPolicy::Minor);

        assert_eq!(registry.names(), vec!["bugfix", "feature", "hotfix", "release"]);
    }

    #[test]
    fn policy_overrides_replace_blueprint_policies() {
        let mut cfg = settings(None);
        cfg.policy_overrides.insert(
            "feature".to_string(),
            PolicyOverride {
                changelog: Some("sans-rotation".to_string()),
                version: Some("minor".to_string()),
            },
        );
        let registry = FlowRegistry::builtin(&cfg).unwrap();
        let feature = registry.get("feature").unwrap();
        assert_eq!(feature.changelog, ChangelogPolicy::SansRotation);
        assert_eq!(feature.version_bump, VersionBumpPolicy::Minor);
    }

    #[test]
    fn unrecognized_policy_override_is_fatal_at_construction() {
        let mut cfg = settings(None);
        cfg.policy_overrides.insert(
            "bugfix".to_string(),
            PolicyOverride {
                changelog: Some("rotating".to_string()),
                version: None,
            },
        );
        let err = FlowRegistry::builtin(&cfg).expect_err("must fail");
        assert_eq!(err, ConfigError::UnknownChangelogPolicy("rotating".to_string()));
    }

    #[test]
    fn redefining_a_flow_is_rejected() {
        let mut registry = FlowRegistry::default();
        registry
            .define("bugfix", "develop", "qa", ChangelogPolicy::None, VersionBumpPolicy::None)
            .unwrap();
        let err = registry
            .define("bugfix", "develop", "qa", ChangelogPolicy::None, VersionBumpPolicy::None)
            .expect_err("must fail");
        assert!(matches!(err, ConfigError::DuplicateFlow(_)));
    }

    #[test]
    fn policies_parse_from_config_strings() {
        assert_eq!("rotate".parse::<ChangelogPolicy>().unwrap(), ChangelogPolicy::Rotate);
        assert_eq!(
            "sans_rotation".parse::<ChangelogPolicy>().unwrap(),
            ChangelogPolicy::SansRotation
        );
        assert_eq!("patch".parse::<VersionBumpPolicy>().unwrap(), VersionBumpPolicy::Patch);
        assert!("grande".parse::<VersionBumpPolicy>().is_err());
    }
}
