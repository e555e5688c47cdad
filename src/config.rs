//! Settings for the package manager.
//!
//! Everything lives under a home directory. An optional `config.toml` there
//! (or at an explicit path) overrides individual settings:
//!
//! ```toml
//! catalog = "/srv/jpm/catalog.toml"
//! packages_dir = "pkgs"          # relative to home
//! rc_file = "~/.profile"
//! verify_checksums = true
//! http_timeout_secs = 60
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const MIN_HTTP_TIMEOUT_SECS: u64 = 5;
const MAX_HTTP_TIMEOUT_SECS: u64 = 300;

pub const HOME_ENV: &str = "JPM_HOME";
pub const CONFIG_FILE: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigToml {
    catalog: Option<PathBuf>,
    store: Option<PathBuf>,
    packages_dir: Option<PathBuf>,
    rc_file: Option<PathBuf>,
    verify_checksums: Option<bool>,
    http_timeout_secs: Option<u64>,
}

/// Resolved settings. Every path is absolute or relative to the process cwd.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub home: PathBuf,
    pub catalog: PathBuf,
    pub store: PathBuf,
    pub packages_dir: PathBuf,
    /// Shell rc file used for PATH registration; `None` picks one per shell.
    pub rc_file: Option<PathBuf>,
    pub verify_checksums: bool,
    pub http_timeout_secs: u64,
}

impl Config {
    /// Defaults rooted at `home`.
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            catalog: home.join("catalog.toml"),
            store: home.join("installed.json"),
            packages_dir: home.join("packages"),
            rc_file: None,
            verify_checksums: true,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            home,
        }
    }

    /// Home directory: the flag, then `JPM_HOME`, then the platform data
    /// directory, then `./.jpm`.
    pub fn resolve_home(flag: Option<&Path>, env: Option<OsString>) -> PathBuf {
        if let Some(home) = flag {
            return home.to_path_buf();
        }
        if let Some(home) = env.filter(|v| !v.is_empty()) {
            return PathBuf::from(home);
        }
        dirs::data_dir()
            .map(|d| d.join("jpm"))
            .unwrap_or_else(|| PathBuf::from(".jpm"))
    }

    /// Defaults for `home`, overlaid with the config file.
    ///
    /// An explicit `file` must exist; the implicit `<home>/config.toml` may not.
    pub fn load(home: &Path, file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::with_home(home);
        let (path, required) = match file {
            Some(f) => (f.to_path_buf(), true),
            None => (home.join(CONFIG_FILE), false),
        };

        if !path.exists() {
            if required {
                return Err(ConfigError::NotFound(path));
            }
            return Ok(config);
        }

        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let parsed: ConfigToml =
            toml::from_str(&text).map_err(|source| ConfigError::Parse { path, source })?;
        config.merge(parsed);
        Ok(config)
    }

    fn merge(&mut self, file: ConfigToml) {
        if let Some(p) = file.catalog {
            self.catalog = self.under_home(p);
        }
        if let Some(p) = file.store {
            self.store = self.under_home(p);
        }
        if let Some(p) = file.packages_dir {
            self.packages_dir = self.under_home(p);
        }
        if let Some(p) = file.rc_file {
            self.rc_file = Some(expand_tilde(p));
        }
        if let Some(v) = file.verify_checksums {
            self.verify_checksums = v;
        }
        if let Some(secs) = file.http_timeout_secs {
            self.http_timeout_secs = secs.clamp(MIN_HTTP_TIMEOUT_SECS, MAX_HTTP_TIMEOUT_SECS);
        }
    }

    fn under_home(&self, path: PathBuf) -> PathBuf {
        let path = expand_tilde(path);
        if path.is_absolute() {
            path
        } else {
            self.home.join(path)
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Working directory for one package.
    pub fn package_dir(&self, name: &str) -> PathBuf {
        self.packages_dir.join(name)
    }
}

fn expand_tilde(path: PathBuf) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path
}
