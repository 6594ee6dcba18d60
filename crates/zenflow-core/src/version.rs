use std::fmt::{Display, Formatter};
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::config::ConfigError;
use crate::flow::VersionBumpPolicy;

/// The stored `MAJOR.MINOR.PATCH` version number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    /// Returns the version incremented by the policy's unit, zeroing the
    /// lower components.
    pub fn bumped(self, policy: VersionBumpPolicy) -> Self {
        match policy {
            VersionBumpPolicy::None => self,
            VersionBumpPolicy::Patch => Self {
                patch: self.patch + 1,
                ..self
            },
            VersionBumpPolicy::Minor => Self {
                minor: self.minor + 1,
                patch: 0,
                ..self
            },
            VersionBumpPolicy::Major => Self {
                major: self.major + 1,
                minor: 0,
                patch: 0,
            },
        }
    }

    /// Reads the version file, e.g. `VERSION` at the repository root.
    pub fn read_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read version file: {}", path.display()))?;
        let version = text.trim().parse::<Self>()?;
        Ok(version)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, format!("{self}\n"))
            .with_context(|| format!("failed to write version file: {}", path.display()))
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let malformed = || ConfigError::MalformedVersion(value.to_string());
        let mut parts = value.split('.');
        let mut next = || -> Result<u64, ConfigError> {
            parts
                .next()
                .and_then(|p| p.parse::<u64>().ok())
                .ok_or_else(malformed)
        };
        let version = Self {
            major: next()?,
            minor: next()?,
            patch: next()?,
        };
        if parts.next().is_some() {
            return Err(malformed());
        }
        Ok(version)
    }
}
