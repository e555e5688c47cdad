//! Running release-provided scripts.

use std::path::Path;
use std::process::{Command, Stdio};

use tracing::info;

use super::HostError;

fn command_for(script: &Path) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(script);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.arg(script);
        cmd
    }
}

/// Run `script` with `args` in `cwd`. Output streams to the terminal.
pub(super) fn run_script(script: &Path, args: &[String], cwd: &Path) -> Result<(), HostError> {
    if !script.is_file() {
        return Err(HostError::io(
            "cannot run",
            script,
            std::io::Error::from(std::io::ErrorKind::NotFound),
        ));
    }

    info!(script = %script.display(), ?args, "running script");
    let status = command_for(script)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .map_err(|e| HostError::io("cannot run", script, e))?;

    if !status.success() {
        return Err(HostError::Script {
            script: script.to_path_buf(),
            code: status.code(),
        });
    }
    Ok(())
}
