//! Side-effecting capabilities used by the executor.
//!
//! The executor only talks to a [`Host`]; [`NativeHost`] is the real
//! implementation and tests substitute their own.

mod archive;
mod fs;
mod path;
mod script;

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub(crate) use archive::normalize_lexical;
pub use path::{rc_export_line, resolve_rc_file};

#[derive(Error, Debug)]
pub enum HostError {
    #[error("{op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("extraction failed for {}: {reason}", archive.display())]
    Extraction { archive: PathBuf, reason: String },

    #[error("environment update failed: {0}")]
    Env(String),

    #[error("script {} failed (exit code: {code:?})", script.display())]
    Script { script: PathBuf, code: Option<i32> },
}

impl HostError {
    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        HostError::Io {
            op,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn extraction(archive: &Path, reason: impl Into<String>) -> Self {
        HostError::Extraction {
            archive: archive.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Filesystem, archive, environment and process capabilities.
pub trait Host {
    fn extract_zip(&self, archive: &Path, dest: &Path) -> Result<(), HostError>;
    fn extract_tar(&self, archive: &Path, dest: &Path) -> Result<(), HostError>;
    fn extract_tar_gz(&self, archive: &Path, dest: &Path) -> Result<(), HostError>;

    /// Remove a file or directory tree. A missing path is not an error.
    fn delete(&self, path: &Path) -> Result<(), HostError>;
    fn move_path(&self, src: &Path, dst: &Path) -> Result<(), HostError>;
    /// Copy a file, or a directory recursively.
    fn copy_path(&self, src: &Path, dst: &Path) -> Result<(), HostError>;
    /// Set the executable bits. No-op where there is no permission model.
    fn make_executable(&self, path: &Path) -> Result<(), HostError>;

    /// Register `dir` on the user's PATH and return the registered value,
    /// or `None` when it was already registered.
    fn add_to_path(&self, dir: &Path) -> Result<Option<String>, HostError>;
    fn remove_from_path(&self, value: &str) -> Result<(), HostError>;
    /// Put a persistent variable back to `original`, or unset it when `None`.
    fn restore_env_var(&self, name: &str, original: Option<&str>) -> Result<(), HostError>;

    fn run_script(&self, script: &Path, args: &[String], cwd: &Path) -> Result<(), HostError>;
}

/// The real host: local disk, shell rc files and child processes.
#[derive(Debug, Clone, Default)]
pub struct NativeHost {
    rc_file: Option<PathBuf>,
}

impl NativeHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific shell rc file for PATH registration.
    pub fn with_rc_file(mut self, rc_file: Option<PathBuf>) -> Self {
        self.rc_file = rc_file;
        self
    }
}

impl Host for NativeHost {
    fn extract_zip(&self, archive: &Path, dest: &Path) -> Result<(), HostError> {
        archive::extract_zip(archive, dest)
    }

    fn extract_tar(&self, archive: &Path, dest: &Path) -> Result<(), HostError> {
        archive::extract_tar(archive, dest)
    }

    fn extract_tar_gz(&self, archive: &Path, dest: &Path) -> Result<(), HostError> {
        archive::extract_tar_gz(archive, dest)
    }

    fn delete(&self, path: &Path) -> Result<(), HostError> {
        fs::delete(path)
    }

    fn move_path(&self, src: &Path, dst: &Path) -> Result<(), HostError> {
        fs::move_path(src, dst)
    }

    fn copy_path(&self, src: &Path, dst: &Path) -> Result<(), HostError> {
        fs::copy_path(src, dst)
    }

    fn make_executable(&self, path: &Path) -> Result<(), HostError> {
        fs::make_executable(path)
    }

    fn add_to_path(&self, dir: &Path) -> Result<Option<String>, HostError> {
        path::add_to_path(self.rc_file.as_deref(), dir)
    }

    fn remove_from_path(&self, value: &str) -> Result<(), HostError> {
        path::remove_from_path(self.rc_file.as_deref(), value)
    }

    fn restore_env_var(&self, name: &str, original: Option<&str>) -> Result<(), HostError> {
        path::restore_env_var(self.rc_file.as_deref(), name, original)
    }

    fn run_script(&self, script: &Path, args: &[String], cwd: &Path) -> Result<(), HostError> {
        script::run_script(script, args, cwd)
    }
}
