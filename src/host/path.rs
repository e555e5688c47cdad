//! Persistent PATH and environment registration.
//!
//! On unix the user's shell rc file carries `export` lines; on Windows the
//! user-scoped environment is edited through PowerShell.

use std::path::{Path, PathBuf};

use tracing::info;

use super::HostError;

/// The line appended to the rc file for `dir`.
pub fn rc_export_line(dir: &str) -> String {
    format!("export PATH=\"$PATH:{dir}\"")
}

/// The rc file to edit: the override, else `~/.zshrc` when it exists,
/// else `~/.bashrc`.
pub fn resolve_rc_file(rc_override: Option<&Path>) -> Result<PathBuf, HostError> {
    if let Some(rc) = rc_override {
        return Ok(rc.to_path_buf());
    }
    let home = dirs::home_dir()
        .ok_or_else(|| HostError::Env("cannot determine home directory".to_string()))?;
    let zshrc = home.join(".zshrc");
    if zshrc.exists() {
        return Ok(zshrc);
    }
    Ok(home.join(".bashrc"))
}

#[cfg(not(windows))]
fn read_rc(rc: &Path) -> Result<String, HostError> {
    match std::fs::read_to_string(rc) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(HostError::io("cannot read", rc, e)),
    }
}

#[cfg(not(windows))]
fn write_rc(rc: &Path, text: &str) -> Result<(), HostError> {
    std::fs::write(rc, text).map_err(|e| HostError::io("cannot write", rc, e))
}

/// Append `line` unless an identical line is already present. Returns
/// whether the file changed.
#[cfg(not(windows))]
fn append_line(rc: &Path, line: &str) -> Result<bool, HostError> {
    let text = read_rc(rc)?;
    if text.lines().any(|l| l.trim() == line) {
        tracing::debug!(rc = %rc.display(), "rc file already has entry");
        return Ok(false);
    }
    let mut out = text;
    out.push('\n');
    out.push_str(line);
    out.push('\n');
    write_rc(rc, &out)?;
    Ok(true)
}

/// Drop every line for which `pred` holds. A missing rc file is left alone.
#[cfg(not(windows))]
fn remove_lines(rc: &Path, pred: impl Fn(&str) -> bool) -> Result<(), HostError> {
    if !rc.exists() {
        return Ok(());
    }
    let text = read_rc(rc)?;
    let kept: Vec<&str> = text.lines().filter(|l| !pred(l)).collect();
    let mut out = kept.join("\n");
    if text.ends_with('\n') {
        out.push('\n');
    }
    write_rc(rc, &out)
}

#[cfg(not(windows))]
fn env_export_prefix(name: &str) -> String {
    format!("export {name}=")
}

#[cfg(not(windows))]
pub(super) fn add_to_path(
    rc_override: Option<&Path>,
    dir: &Path,
) -> Result<Option<String>, HostError> {
    let value = dir.display().to_string();
    let rc = resolve_rc_file(rc_override)?;
    if !append_line(&rc, &rc_export_line(&value))? {
        return Ok(None);
    }
    info!(dir = %value, rc = %rc.display(), "registered PATH entry");
    Ok(Some(value))
}

#[cfg(not(windows))]
pub(super) fn remove_from_path(rc_override: Option<&Path>, value: &str) -> Result<(), HostError> {
    if value.is_empty() {
        return Ok(());
    }
    let rc = resolve_rc_file(rc_override)?;
    let export = rc_export_line(value);
    remove_lines(&rc, |line| line.trim() == export)?;
    info!(dir = %value, rc = %rc.display(), "removed PATH entry");
    Ok(())
}

#[cfg(not(windows))]
pub(super) fn restore_env_var(
    rc_override: Option<&Path>,
    name: &str,
    original: Option<&str>,
) -> Result<(), HostError> {
    let rc = resolve_rc_file(rc_override)?;
    let prefix = env_export_prefix(name);
    remove_lines(&rc, |line| line.trim_start().starts_with(&prefix))?;
    if let Some(original) = original {
        append_line(&rc, &format!("{prefix}\"{original}\""))?;
    }
    Ok(())
}

#[cfg(windows)]
fn powershell(script: &str) -> Result<String, HostError> {
    let output = std::process::Command::new("powershell")
        .args(["-NoProfile", "-Command", script])
        .output()
        .map_err(|e| HostError::io("cannot run", "powershell", e))?;
    if !output.status.success() {
        return Err(HostError::Env(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(windows)]
fn ps_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

#[cfg(windows)]
pub(super) fn add_to_path(
    _rc_override: Option<&Path>,
    dir: &Path,
) -> Result<Option<String>, HostError> {
    let value = dir.display().to_string();
    let current = powershell("[Environment]::GetEnvironmentVariable('Path', 'User')")?;
    if current
        .split(';')
        .any(|p| p.trim().eq_ignore_ascii_case(&value))
    {
        return Ok(None);
    }
    let updated = if current.is_empty() {
        value.clone()
    } else {
        format!("{current};{value}")
    };
    powershell(&format!(
        "[Environment]::SetEnvironmentVariable('Path', {}, 'User')",
        ps_quote(&updated)
    ))?;
    info!(dir = %value, "registered PATH entry");
    Ok(Some(value))
}

#[cfg(windows)]
pub(super) fn remove_from_path(_rc_override: Option<&Path>, value: &str) -> Result<(), HostError> {
    let current = powershell("[Environment]::GetEnvironmentVariable('Path', 'User')")?;
    let kept: Vec<&str> = current
        .split(';')
        .filter(|p| !p.is_empty() && !p.trim().eq_ignore_ascii_case(value))
        .collect();
    powershell(&format!(
        "[Environment]::SetEnvironmentVariable('Path', {}, 'User')",
        ps_quote(&kept.join(";"))
    ))?;
    Ok(())
}

#[cfg(windows)]
pub(super) fn restore_env_var(
    _rc_override: Option<&Path>,
    name: &str,
    original: Option<&str>,
) -> Result<(), HostError> {
    let value = original.map(ps_quote).unwrap_or_else(|| "$null".to_string());
    powershell(&format!(
        "[Environment]::SetEnvironmentVariable({}, {}, 'User')",
        ps_quote(name),
        value
    ))?;
    Ok(())
}
