//! Installation records and history.
//!
//! One JSON document holds every installed package and an append-only
//! history. Writers hold an exclusive lock file (see [`InstallStore::lock`])
//! for the duration of an operation; the document itself is replaced
//! atomically via a temporary file.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use crate::executor::{InstallStatus, InstallationContext};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("installation store {} is corrupt: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("cannot serialize installation store: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("'{0}' is already installed")]
    AlreadyInstalled(String),
    #[error("'{0}' is not installed")]
    NotInstalled(String),
    #[error("installation store is in use by another process; if this is wrong, delete {}", .0.display())]
    Locked(PathBuf),
}

/// A persisted installation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallationRecord {
    pub context: InstallationContext,
    pub installed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub checksum: String,
    #[serde(default)]
    pub file_size: u64,
}

impl InstallationRecord {
    pub fn new(context: InstallationContext) -> Self {
        let now = Utc::now();
        Self {
            context,
            installed_at: now,
            updated_at: now,
            source_url: String::new(),
            checksum: String::new(),
            file_size: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.context.package
    }

    pub fn version(&self) -> &str {
        &self.context.version
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Install,
    Update,
    Remove,
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HistoryAction::Install => "install",
            HistoryAction::Update => "update",
            HistoryAction::Remove => "remove",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub package: String,
    pub version: String,
    pub action: HistoryAction,
    #[serde(default)]
    pub previous_version: Option<String>,
    pub performed_at: DateTime<Utc>,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl HistoryEntry {
    pub fn new(package: impl Into<String>, version: impl Into<String>, action: HistoryAction) -> Self {
        Self {
            package: package.into(),
            version: version.into(),
            action,
            previous_version: None,
            performed_at: Utc::now(),
            success: true,
            error: None,
        }
    }

    pub fn previous(mut self, version: impl Into<String>) -> Self {
        self.previous_version = Some(version.into());
        self
    }

    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    installed: BTreeMap<String, InstallationRecord>,
    #[serde(default)]
    history: Vec<HistoryEntry>,
}

/// RAII guard for the store lock; released when dropped. The lock file
/// itself stays on disk.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
    path: PathBuf,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!(lock = %self.path.display(), "cannot release store lock: {}", e);
        }
    }
}

#[derive(Debug, Clone)]
pub struct InstallStore {
    path: PathBuf,
}

impl InstallStore {
    /// Open (or prepare to create) the store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Take the exclusive writer lock.
    pub fn lock(&self) -> Result<StoreLock, StoreError> {
        let path = self.lock_path();
        let file = File::create(&path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        if file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked(path));
        }
        debug!(lock = %path.display(), "store locked");
        Ok(StoreLock { file, path })
    }

    fn load(&self) -> Result<StoreData, StoreError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(StoreData::default()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        if text.trim().is_empty() {
            return Ok(StoreData::default());
        }
        serde_json::from_str(&text).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, data: &StoreData) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(data)?;
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let io = |source: std::io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        let mut tmp = NamedTempFile::new_in(dir).map_err(io)?;
        tmp.write_all(json.as_bytes()).map_err(io)?;
        tmp.persist(&self.path).map_err(|e| io(e.error))?;
        Ok(())
    }

    fn modify<T>(&self, f: impl FnOnce(&mut StoreData) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let mut data = self.load()?;
        let out = f(&mut data)?;
        self.save(&data)?;
        Ok(out)
    }

    pub fn get(&self, name: &str) -> Result<Option<InstallationRecord>, StoreError> {
        Ok(self.load()?.installed.remove(name))
    }

    /// Completed installations, by name.
    pub fn list(&self) -> Result<Vec<InstallationRecord>, StoreError> {
        Ok(self
            .load()?
            .installed
            .into_values()
            .filter(|r| r.context.status == InstallStatus::Completed)
            .collect())
    }

    pub fn insert(&self, record: InstallationRecord) -> Result<(), StoreError> {
        self.modify(|data| {
            let name = record.name().to_string();
            if data.installed.contains_key(&name) {
                return Err(StoreError::AlreadyInstalled(name));
            }
            data.installed.insert(name, record);
            Ok(())
        })
    }

    /// Replace an existing record, bumping `updated_at`.
    pub fn update(&self, mut record: InstallationRecord) -> Result<(), StoreError> {
        self.modify(|data| {
            let name = record.name().to_string();
            let Some(existing) = data.installed.get_mut(&name) else {
                return Err(StoreError::NotInstalled(name));
            };
            record.installed_at = existing.installed_at;
            record.updated_at = Utc::now();
            *existing = record;
            Ok(())
        })
    }

    pub fn delete(&self, name: &str) -> Result<InstallationRecord, StoreError> {
        self.modify(|data| {
            data.installed
                .remove(name)
                .ok_or_else(|| StoreError::NotInstalled(name.to_string()))
        })
    }

    pub fn append_history(&self, entry: HistoryEntry) -> Result<(), StoreError> {
        self.modify(|data| {
            data.history.push(entry);
            Ok(())
        })
    }

    /// History, newest first, optionally for one package.
    pub fn history(&self, name: Option<&str>) -> Result<Vec<HistoryEntry>, StoreError> {
        let mut entries: Vec<_> = self
            .load()?
            .history
            .into_iter()
            .filter(|e| name.is_none_or(|n| e.package == n))
            .collect();
        entries.reverse();
        Ok(entries)
    }
}
