//! Local release catalog.
//!
//! A TOML file listing packages and their releases:
//!
//! ```toml
//! [[package]]
//! name = "ripgrep"
//! description = "Fast grep"
//! homepage = "https://github.com/BurntSushi/ripgrep"
//!
//! [[package.release]]
//! version = "14.1.0"
//! binary_url = "https://example.com/ripgrep-14.1.0.zip"
//! checksum = "e3b0c442..."
//! released_at = "2024-01-06T00:00:00Z"
//! instructions = """
//! EXTRACT ripgrep-14.1.0.zip
//! CHMOD rg
//! ADD_TO_PATH .
//! """
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::release::Release;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("catalog not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("cannot read catalog {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid catalog: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid catalog: {field} '{value}' cannot be used as a directory name")]
    UnsafeName { field: &'static str, value: String },
}

/// Names and versions become directory names under the packages dir.
fn check_segment(field: &'static str, value: &str) -> Result<(), CatalogError> {
    let unsafe_name = value.is_empty()
        || value == "."
        || value.contains("..")
        || value.contains(['/', '\\']);
    if unsafe_name {
        return Err(CatalogError::UnsafeName {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// A package and every release published for it.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub homepage: String,
    #[serde(default, rename = "release")]
    pub releases: Vec<Release>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Catalog {
    #[serde(default, rename = "package")]
    packages: Vec<PackageEntry>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        if !path.exists() {
            return Err(CatalogError::NotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, CatalogError> {
        let mut catalog: Catalog = toml::from_str(text)?;
        for entry in &mut catalog.packages {
            check_segment("package name", &entry.name)?;
            for release in &mut entry.releases {
                if release.package.is_empty() {
                    release.package = entry.name.clone();
                }
                check_segment("package name", &release.package)?;
                check_segment("version", &release.version)?;
            }
        }
        Ok(catalog)
    }

    pub fn packages(&self) -> &[PackageEntry] {
        &self.packages
    }

    pub fn package(&self, name: &str) -> Option<&PackageEntry> {
        self.packages.iter().find(|p| p.name == name)
    }

    /// Releases of `name`; empty when the package is unknown.
    pub fn releases(&self, name: &str) -> &[Release] {
        self.package(name).map(|p| p.releases.as_slice()).unwrap_or(&[])
    }

    /// Case-insensitive substring search on name and description.
    pub fn search(&self, pattern: &str) -> Vec<&PackageEntry> {
        let needle = pattern.to_lowercase();
        self.packages
            .iter()
            .filter(|p| {
                p.name.to_lowercase().contains(&needle)
                    || p.description.to_lowercase().contains(&needle)
            })
            .collect()
    }
}
