//! Native zip and tar extraction.
//!
//! Entries with absolute paths, `..` components, or link targets outside the
//! destination are rejected, as are writes through symlinks already present
//! under the destination.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use super::HostError;

/// Lexical normalization, no filesystem access.
pub(crate) fn normalize_lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    let mut has_root = false;

    for c in path.components() {
        match c {
            Component::Prefix(p) => {
                out.clear();
                out.push(p.as_os_str());
                has_root = true;
            }
            Component::RootDir => {
                out.push(Component::RootDir.as_os_str());
                has_root = true;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = out
                    .components()
                    .next_back()
                    .is_some_and(|last| matches!(last, Component::Normal(_)));
                if popped {
                    out.pop();
                } else if !has_root {
                    out.push("..");
                }
            }
            Component::Normal(seg) => out.push(seg),
        }
    }

    out
}

fn is_unsafe_entry(path: &Path) -> bool {
    path.is_absolute()
        || path.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        })
}

fn ensure_no_symlink_components(
    archive: &Path,
    dest: &Path,
    full_path: &Path,
) -> Result<(), HostError> {
    let rel = full_path.strip_prefix(dest).map_err(|_| {
        HostError::extraction(
            archive,
            format!("path outside destination: {}", full_path.display()),
        )
    })?;

    let mut cur = dest.to_path_buf();
    for comp in rel.components() {
        cur.push(comp);
        if let Ok(md) = std::fs::symlink_metadata(&cur)
            && md.file_type().is_symlink()
        {
            return Err(HostError::extraction(
                archive,
                format!("symlink in path component: {}", cur.display()),
            ));
        }
    }

    Ok(())
}

fn ensure_link_target_within_dest(
    archive: &Path,
    dest: &Path,
    link_parent: &Path,
    link_name: &Path,
) -> Result<(), HostError> {
    if link_name.is_absolute()
        || link_name
            .components()
            .any(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
    {
        return Err(HostError::extraction(
            archive,
            format!("unsafe link target (absolute): {}", link_name.display()),
        ));
    }

    let candidate = normalize_lexical(&link_parent.join(link_name));
    let norm_dest = normalize_lexical(dest);
    if candidate.strip_prefix(&norm_dest).is_err() {
        return Err(HostError::extraction(
            archive,
            format!(
                "unsafe link target (escapes destination): {} -> {}",
                link_parent.display(),
                link_name.display()
            ),
        ));
    }

    Ok(())
}

fn open(archive: &Path) -> Result<BufReader<File>, HostError> {
    let file = File::open(archive).map_err(|e| HostError::io("cannot open", archive, e))?;
    Ok(BufReader::new(file))
}

fn create_dir(path: &Path) -> Result<(), HostError> {
    std::fs::create_dir_all(path).map_err(|e| HostError::io("cannot create directory", path, e))
}

fn unpack_tar<R: Read>(archive: &Path, reader: R, dest: &Path) -> Result<(), HostError> {
    let mut tar = tar::Archive::new(reader);
    let bad = |e: std::io::Error| HostError::extraction(archive, e.to_string());

    create_dir(dest)?;

    for entry in tar.entries().map_err(bad)? {
        let mut entry = entry.map_err(bad)?;
        let path = entry.path().map_err(bad)?.into_owned();

        if is_unsafe_entry(&path) {
            return Err(HostError::extraction(
                archive,
                format!("unsafe path: {}", path.display()),
            ));
        }
        if path.as_os_str().is_empty() || path == Path::new(".") {
            continue;
        }

        let full_path = dest.join(&path);
        ensure_no_symlink_components(archive, dest, &full_path)?;

        let entry_type = entry.header().entry_type();
        if entry_type == tar::EntryType::Symlink || entry_type == tar::EntryType::Link {
            match entry.link_name().map_err(bad)? {
                Some(link_name) => {
                    let link_parent = full_path.parent().unwrap_or(dest);
                    ensure_link_target_within_dest(archive, dest, link_parent, &link_name)?;
                }
                None => {
                    return Err(HostError::extraction(
                        archive,
                        format!("link without target: {}", path.display()),
                    ));
                }
            }
        }

        if let Some(parent) = full_path.parent() {
            if parent.starts_with(dest) {
                ensure_no_symlink_components(archive, dest, parent)?;
            }
            create_dir(parent)?;
        }

        entry.unpack(&full_path).map_err(|e| {
            HostError::extraction(archive, format!("unpack {}: {}", path.display(), e))
        })?;
    }

    Ok(())
}

pub(super) fn extract_tar(archive: &Path, dest: &Path) -> Result<(), HostError> {
    debug!(archive = %archive.display(), dest = %dest.display(), "extracting tar");
    unpack_tar(archive, open(archive)?, dest)
}

pub(super) fn extract_tar_gz(archive: &Path, dest: &Path) -> Result<(), HostError> {
    debug!(archive = %archive.display(), dest = %dest.display(), "extracting tar.gz");
    let decoder = flate2::read::GzDecoder::new(open(archive)?);
    unpack_tar(archive, decoder, dest)
}

pub(super) fn extract_zip(archive: &Path, dest: &Path) -> Result<(), HostError> {
    debug!(archive = %archive.display(), dest = %dest.display(), "extracting zip");
    let mut zip = zip::ZipArchive::new(open(archive)?)
        .map_err(|e| HostError::extraction(archive, e.to_string()))?;

    create_dir(dest)?;

    for i in 0..zip.len() {
        let mut file = zip
            .by_index(i)
            .map_err(|e| HostError::extraction(archive, e.to_string()))?;

        let Some(rel) = file.enclosed_name() else {
            return Err(HostError::extraction(
                archive,
                format!("unsafe path: {}", file.name()),
            ));
        };
        let outpath = dest.join(rel);
        ensure_no_symlink_components(archive, dest, &outpath)?;

        if file.is_dir() {
            create_dir(&outpath)?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            create_dir(parent)?;
        }
        let mut outfile =
            File::create(&outpath).map_err(|e| HostError::io("cannot create", &outpath, e))?;
        std::io::copy(&mut file, &mut outfile)
            .map_err(|e| HostError::io("cannot write", &outpath, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = file.unix_mode() {
                std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode)).ok();
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn gnu_header(size: usize, mode: u32) -> tar::Header {
        let mut header = tar::Header::new_gnu();
        header.set_size(size as u64);
        header.set_mode(mode);
        header.set_cksum();
        header
    }

    fn write_tar_gz(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, content) in entries {
            let mut header = gnu_header(content.len(), 0o644);
            builder.append_data(&mut header, name, *content).unwrap();
        }
        let encoder = builder.into_inner().unwrap();
        encoder.finish().unwrap();
    }

    #[test]
    fn test_extract_tar_gz_nested() {
        let temp_dir = tempfile::tempdir().unwrap();
        let archive = temp_dir.path().join("app.tar.gz");
        let dest = temp_dir.path().join("out");
        write_tar_gz(
            &archive,
            &[("app/bin/tool", &b"#!/bin/sh\n"[..]), ("README", &b"hi"[..])],
        );

        extract_tar_gz(&archive, &dest).unwrap();

        assert_eq!(std::fs::read_to_string(dest.join("README")).unwrap(), "hi");
        assert!(dest.join("app/bin/tool").is_file());
    }

    #[test]
    fn test_extract_plain_tar() {
        let temp_dir = tempfile::tempdir().unwrap();
        let archive = temp_dir.path().join("app.tar");
        let dest = temp_dir.path().join("out");

        let mut builder = tar::Builder::new(File::create(&archive).unwrap());
        let mut header = gnu_header(5, 0o755);
        builder.append_data(&mut header, "run.sh", &b"hello"[..]).unwrap();
        builder.into_inner().unwrap().flush().unwrap();

        extract_tar(&archive, &dest).unwrap();
        assert_eq!(std::fs::read_to_string(dest.join("run.sh")).unwrap(), "hello");
    }

    #[test]
    fn test_extract_tar_blocks_symlink_escape() {
        let temp_dir = tempfile::tempdir().unwrap();
        let archive = temp_dir.path().join("escape.tar.gz");
        let dest = temp_dir.path().join("out");

        let file = File::create(&archive).unwrap();
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);

        let mut link_header = tar::Header::new_gnu();
        link_header.set_entry_type(tar::EntryType::Symlink);
        link_header.set_size(0);
        link_header.set_mode(0o777);
        link_header.set_link_name("/").unwrap();
        link_header.set_cksum();
        builder.append_data(&mut link_header, "a", std::io::empty()).unwrap();

        let mut file_header = gnu_header(5, 0o644);
        builder.append_data(&mut file_header, "a/evil.txt", &b"pwned"[..]).unwrap();
        builder.into_inner().unwrap().finish().unwrap();

        let err = extract_tar_gz(&archive, &dest).unwrap_err();
        assert!(matches!(err, HostError::Extraction { .. }), "got {err}");
        assert!(!dest.join("a/evil.txt").exists());
    }

    #[test]
    fn test_extract_tar_blocks_hardlink_outside_dest() {
        let temp_dir = tempfile::tempdir().unwrap();
        let archive = temp_dir.path().join("hardlink.tar.gz");
        let dest = temp_dir.path().join("out");

        let file = File::create(&archive).unwrap();
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Link);
        header.set_size(0);
        header.set_mode(0o777);
        header.set_link_name("/etc/passwd").unwrap();
        header.set_cksum();
        builder.append_data(&mut header, "hl", std::io::empty()).unwrap();
        builder.into_inner().unwrap().finish().unwrap();

        let err = extract_tar_gz(&archive, &dest).unwrap_err();
        assert!(err.to_string().contains("unsafe link target"), "got {err}");
    }

    #[test]
    fn test_extract_zip_nested() {
        let temp_dir = tempfile::tempdir().unwrap();
        let archive = temp_dir.path().join("app.zip");
        let dest = temp_dir.path().join("out");

        let mut zip = zip::ZipWriter::new(File::create(&archive).unwrap());
        let options = zip::write::SimpleFileOptions::default();
        zip.add_directory("app/bin/", options).unwrap();
        zip.start_file("app/bin/tool.exe", options).unwrap();
        zip.write_all(b"binary").unwrap();
        zip.finish().unwrap();

        extract_zip(&archive, &dest).unwrap();
        assert_eq!(
            std::fs::read_to_string(dest.join("app/bin/tool.exe")).unwrap(),
            "binary"
        );
    }

    #[test]
    fn test_extract_zip_rejects_traversal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let archive = temp_dir.path().join("slip.zip");
        let dest = temp_dir.path().join("out");

        let mut zip = zip::ZipWriter::new(File::create(&archive).unwrap());
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("../escaped.txt", options).unwrap();
        zip.write_all(b"nope").unwrap();
        zip.finish().unwrap();

        assert!(matches!(
            extract_zip(&archive, &dest),
            Err(HostError::Extraction { .. })
        ));
        assert!(!temp_dir.path().join("escaped.txt").exists());
    }

    #[test]
    fn test_extract_missing_archive() {
        let temp_dir = tempfile::tempdir().unwrap();
        let err = extract_zip(&temp_dir.path().join("none.zip"), temp_dir.path()).unwrap_err();
        assert!(matches!(err, HostError::Io { .. }));
    }

    #[test]
    fn test_normalize_lexical() {
        assert_eq!(normalize_lexical(Path::new("/a/b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize_lexical(Path::new("a/./b")), PathBuf::from("a/b"));
        assert_eq!(normalize_lexical(Path::new("../x")), PathBuf::from("../x"));
    }
}
