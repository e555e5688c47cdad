//! Installation context: the single-owner record of one install.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of an [`InstallationContext`].
///
/// `Pending -> InProgress -> {Completed, Failed}`; the last two are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl InstallStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, InstallStatus::Completed | InstallStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InstallStatus::Pending => "pending",
            InstallStatus::InProgress => "in_progress",
            InstallStatus::Completed => "completed",
            InstallStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for InstallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModificationKind {
    PathAddition,
    EnvVariable,
}

/// A persistent environment change made during installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentModification {
    pub kind: ModificationKind,
    /// Variable name; `PATH` for path additions.
    pub name: String,
    /// The value that was registered.
    pub value: String,
    /// Value before the change, when there was one.
    #[serde(default)]
    pub original_value: Option<String>,
}

impl EnvironmentModification {
    pub fn path_addition(value: impl Into<String>) -> Self {
        Self {
            kind: ModificationKind::PathAddition,
            name: "PATH".to_string(),
            value: value.into(),
            original_value: None,
        }
    }

    pub fn env_variable(
        name: impl Into<String>,
        value: impl Into<String>,
        original_value: Option<String>,
    ) -> Self {
        Self {
            kind: ModificationKind::EnvVariable,
            name: name.into(),
            value: value.into(),
            original_value,
        }
    }
}

/// Mutable state of one installation, owned by whoever drives it.
///
/// Serialized verbatim into the installation store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallationContext {
    pub package: String,
    pub version: String,
    /// Base for every relative instruction argument.
    pub work_dir: PathBuf,
    pub status: InstallStatus,
    /// Filesystem paths created by applied instructions, in order.
    #[serde(default)]
    pub files: Vec<PathBuf>,
    #[serde(default)]
    pub env_modifications: Vec<EnvironmentModification>,
    /// Last registered PATH value.
    #[serde(default)]
    pub path_entry: Option<String>,
    /// PATH values that were already registered before this install asked
    /// for them. Not owned, so never rolled back.
    #[serde(default)]
    pub shared_paths: Vec<String>,
    #[serde(default)]
    pub location: Option<PathBuf>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl InstallationContext {
    pub fn new(
        package: impl Into<String>,
        version: impl Into<String>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            package: package.into(),
            version: version.into(),
            work_dir: work_dir.into(),
            status: InstallStatus::Pending,
            files: Vec::new(),
            env_modifications: Vec::new(),
            path_entry: None,
            shared_paths: Vec::new(),
            location: None,
            error: None,
            started_at: None,
            finished_at: None,
        }
    }

    /// Resolve an instruction argument against the working directory.
    /// Absolute arguments are returned unchanged.
    pub fn resolve(&self, arg: &str) -> PathBuf {
        let path = Path::new(arg);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.work_dir.join(path)
        }
    }

    /// Record a created path. Duplicates are ignored.
    pub fn record_path(&mut self, path: PathBuf) {
        if !self.files.contains(&path) {
            self.files.push(path);
        }
    }

    pub fn record_env(&mut self, modification: EnvironmentModification) {
        if modification.kind == ModificationKind::PathAddition {
            self.path_entry = Some(modification.value.clone());
        }
        self.env_modifications.push(modification);
    }

    /// Note a PATH value that was registered before this install.
    pub fn record_shared_path(&mut self, value: String) {
        self.path_entry = Some(value.clone());
        if !self.shared_paths.contains(&value) {
            self.shared_paths.push(value);
        }
    }

    /// Number of recorded effects that rollback would act on.
    pub fn applied_effects(&self) -> usize {
        self.files.len() + self.env_modifications.len()
    }

    pub(crate) fn begin(&mut self) {
        self.status = InstallStatus::InProgress;
        self.started_at = Some(Utc::now());
    }

    pub(crate) fn complete(&mut self) {
        self.status = InstallStatus::Completed;
        self.finished_at = Some(Utc::now());
    }

    pub(crate) fn fail(&mut self, error: String) {
        self.status = InstallStatus::Failed;
        self.error = Some(error);
        self.finished_at = Some(Utc::now());
    }
}
