//! Executor error types.

use thiserror::Error;

use super::context::InstallStatus;
use crate::host::HostError;

#[derive(Error, Debug)]
pub enum ExecuteError {
    #[error("line {line}: '{raw}' failed: {source}")]
    Instruction {
        line: usize,
        raw: String,
        #[source]
        source: HostError,
    },

    #[error("line {line}: '{raw}' takes {expected}")]
    Malformed {
        line: usize,
        raw: String,
        expected: &'static str,
    },

    #[error("installation context is already {0}")]
    AlreadyStarted(InstallStatus),
}
