//! Binary package manager core.
//!
//! Packages are published as releases in a local TOML catalog. Each release
//! carries a download URL, an optional SHA256 and a small line-oriented
//! install script:
//!
//! ```text
//! # comments are allowed
//! EXTRACT ripgrep-14.1.0.zip
//! MOVE ripgrep-14.1.0/rg bin/rg
//! CHMOD bin/rg
//! ADD_TO_PATH bin
//! SET_LOCATION .
//! ```
//!
//! Installing a package resolves a version expression against the catalog
//! ([`resolver`]), downloads and verifies the binary ([`fetch`]), parses the
//! script ([`parser`]) and runs it instruction by instruction ([`executor`])
//! while an [`InstallationContext`] records every filesystem path and
//! environment change. A failed run is compensated with [`rollback`]; a
//! completed one is persisted in the [`store`].
//!
//! # Version expressions
//!
//! - `latest` or empty: newest non-deprecated release
//! - `1.2.3`: exact version (a leading `v` is ignored)
//! - `^1.2.3`, `~1.2.3`: caret and tilde ranges
//! - `>=1.0.0`, `>1.0.0`, `<=2.0.0`, `<2.0.0`: comparisons
//! - `1.x`, `1.2.*`: wildcards
//!
//! # Instructions
//!
//! `EXTRACT`, `EXTRACT_TAR`, `EXTRACT_TARGZ`, `MOVE`, `COPY`, `RENAME`,
//! `DELETE`, `CHMOD`, `ADD_TO_PATH`, `SET_LOCATION`, `RUN_SCRIPT`. Keywords
//! are case-insensitive; arguments are whitespace separated and may be
//! double-quoted. Relative paths resolve against the version's working
//! directory.
//!
//! Side effects go through the [`Host`] trait so the executor can be driven
//! against a real filesystem ([`NativeHost`]) or a recording fake.

pub mod catalog;
pub mod config;
pub mod constraint;
pub mod executor;
pub mod fetch;
pub mod host;
pub mod install;
pub mod instruction;
pub mod output;
pub mod parser;
pub mod release;
pub mod resolver;
pub mod store;
pub mod version;

pub use catalog::Catalog;
pub use config::Config;
pub use constraint::{ConstraintError, is_compatible};
pub use executor::{
    ExecuteError, Executor, InstallStatus, InstallationContext, RollbackReport, rollback,
};
pub use host::{Host, HostError, NativeHost};
pub use install::{Installer, UpdateOutcome, UpdateStatus};
pub use instruction::{Instruction, InstructionKind};
pub use parser::{ParseError, Parser};
pub use release::Release;
pub use resolver::ResolutionError;
pub use store::{InstallStore, InstallationRecord};
pub use version::{SemanticVersion, VersionError};
