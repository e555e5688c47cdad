//! Filesystem primitives.

use std::io::ErrorKind;
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use super::HostError;

fn ensure_parent(path: &Path) -> Result<(), HostError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .map_err(|e| HostError::io("cannot create directory", parent, e))?;
    }
    Ok(())
}

pub(super) fn delete(path: &Path) -> Result<(), HostError> {
    let meta = match std::fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(HostError::io("cannot stat", path, e)),
    };

    debug!(path = %path.display(), "rm");
    let result = if meta.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(HostError::io("cannot remove", path, e)),
    }
}

pub(super) fn move_path(src: &Path, dst: &Path) -> Result<(), HostError> {
    debug!(src = %src.display(), dst = %dst.display(), "mv");
    if !src.exists() {
        return Err(HostError::io(
            "cannot move",
            src,
            std::io::Error::from(ErrorKind::NotFound),
        ));
    }
    ensure_parent(dst)?;

    if let Err(e) = std::fs::rename(src, dst) {
        // Cross-device moves fall back to copy and delete.
        if e.kind() != ErrorKind::CrossesDevices {
            return Err(HostError::io("cannot move", src, e));
        }
        copy_path(src, dst)?;
        delete(src)?;
    }
    Ok(())
}

pub(super) fn copy_path(src: &Path, dst: &Path) -> Result<(), HostError> {
    debug!(src = %src.display(), dst = %dst.display(), "cp");
    let meta = std::fs::metadata(src).map_err(|e| HostError::io("cannot copy", src, e))?;

    if !meta.is_dir() {
        ensure_parent(dst)?;
        std::fs::copy(src, dst).map_err(|e| HostError::io("cannot copy", src, e))?;
        return Ok(());
    }

    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            HostError::io("cannot read", path, e.into())
        })?;
        let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dst.join(rel);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)
                .map_err(|e| HostError::io("cannot create directory", &target, e))?;
        } else {
            ensure_parent(&target)?;
            std::fs::copy(entry.path(), &target)
                .map_err(|e| HostError::io("cannot copy", entry.path(), e))?;
        }
    }
    Ok(())
}

#[cfg(unix)]
pub(super) fn make_executable(path: &Path) -> Result<(), HostError> {
    use std::os::unix::fs::PermissionsExt;

    let meta = std::fs::metadata(path).map_err(|e| HostError::io("cannot chmod", path, e))?;
    let mut perms = meta.permissions();
    perms.set_mode(perms.mode() | 0o111);
    debug!(path = %path.display(), mode = format_args!("{:o}", perms.mode()), "chmod");
    std::fs::set_permissions(path, perms).map_err(|e| HostError::io("cannot chmod", path, e))
}

#[cfg(not(unix))]
pub(super) fn make_executable(_path: &Path) -> Result<(), HostError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_delete_missing_is_ok() {
        let dir = TempDir::new().unwrap();
        delete(&dir.path().join("nope")).unwrap();
    }

    #[test]
    fn test_delete_file_and_tree() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "x").unwrap();
        let tree = dir.path().join("tree/sub");
        std::fs::create_dir_all(&tree).unwrap();
        std::fs::write(tree.join("b.txt"), "y").unwrap();

        delete(&file).unwrap();
        delete(&dir.path().join("tree")).unwrap();
        assert!(!file.exists());
        assert!(!dir.path().join("tree").exists());
    }

    #[test]
    fn test_move_creates_parent() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("app.exe");
        std::fs::write(&src, "bin").unwrap();
        let dst = dir.path().join("bin/nested/app.exe");

        move_path(&src, &dst).unwrap();
        assert!(!src.exists());
        assert_eq!(std::fs::read_to_string(&dst).unwrap(), "bin");
    }

    #[test]
    fn test_move_missing_source() {
        let dir = TempDir::new().unwrap();
        let err = move_path(&dir.path().join("a"), &dir.path().join("b")).unwrap_err();
        assert!(matches!(err, HostError::Io { .. }));
    }

    #[test]
    fn test_copy_directory() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(src.join("lib")).unwrap();
        std::fs::write(src.join("lib/a.so"), "a").unwrap();
        std::fs::write(src.join("top.txt"), "t").unwrap();

        let dst = dir.path().join("dst");
        copy_path(&src, &dst).unwrap();
        assert_eq!(std::fs::read_to_string(dst.join("lib/a.so")).unwrap(), "a");
        assert_eq!(std::fs::read_to_string(dst.join("top.txt")).unwrap(), "t");
        assert!(src.join("top.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_make_executable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let file = dir.path().join("tool");
        std::fs::write(&file, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o644)).unwrap();

        make_executable(&file).unwrap();
        let mode = std::fs::metadata(&file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
