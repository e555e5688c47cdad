//! Published releases of a package.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::version::{SemanticVersion, VersionError};

/// One published version of a package, as listed in the catalog.
///
/// Read-only to the resolver and installer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    #[serde(default)]
    pub id: i64,
    /// Owning package name. Filled in from the catalog entry when omitted.
    #[serde(default)]
    pub package: String,
    pub version: String,
    pub binary_url: String,
    /// Installation script, one instruction per line.
    #[serde(default)]
    pub instructions: String,
    /// Hex SHA256 of the binary; empty skips verification.
    #[serde(default)]
    pub checksum: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub release_notes: String,
    #[serde(default, rename = "prerelease")]
    pub is_prerelease: bool,
    #[serde(default, rename = "deprecated")]
    pub is_deprecated: bool,
    #[serde(default = "epoch")]
    pub released_at: DateTime<Utc>,
}

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

impl Release {
    pub fn new(package: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: 0,
            package: package.into(),
            version: version.into(),
            binary_url: String::new(),
            instructions: String::new(),
            checksum: String::new(),
            file_size: 0,
            release_notes: String::new(),
            is_prerelease: false,
            is_deprecated: false,
            released_at: epoch(),
        }
    }

    /// Parse the raw version string.
    pub fn semantic_version(&self) -> Result<SemanticVersion, VersionError> {
        self.version.parse()
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.binary_url = url.into();
        self
    }

    pub fn with_instructions(mut self, script: impl Into<String>) -> Self {
        self.instructions = script.into();
        self
    }

    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = checksum.into();
        self
    }

    pub fn deprecated(mut self, deprecated: bool) -> Self {
        self.is_deprecated = deprecated;
        self
    }

    pub fn released_at(mut self, at: DateTime<Utc>) -> Self {
        self.released_at = at;
        self
    }
}
