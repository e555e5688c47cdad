//! Downloading release binaries and verifying their checksums.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};

use crate::output;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("download failed for {url}: {reason}")]
    Transfer { url: String, reason: String },

    #[error("{op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("sha256 mismatch for {}: expected {expected}, got {actual}", path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
}

fn io_err<'a>(op: &'static str, path: &'a Path) -> impl FnOnce(std::io::Error) -> FetchError + 'a {
    move |source| FetchError::Io {
        op,
        path: path.to_path_buf(),
        source,
    }
}

/// File name from the last URL path segment, without query or fragment.
pub fn url_filename(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let name = path.rsplit(['/', '\\']).next().unwrap_or("");
    if name.is_empty() || name.contains(':') {
        "download".to_string()
    } else {
        name.to_string()
    }
}

/// Fetch `url` into `dest_dir` and return the local path.
///
/// `file://` URLs and bare local paths are copied. Everything else goes
/// through HTTP, streamed to `<name>.part` and renamed on success.
pub fn download(
    url: &str,
    dest_dir: &Path,
    timeout: Duration,
    show_progress: bool,
) -> Result<PathBuf, FetchError> {
    std::fs::create_dir_all(dest_dir).map_err(io_err("cannot create directory", dest_dir))?;
    let dest = dest_dir.join(url_filename(url));

    if let Some(local) = local_source(url) {
        if local == dest && dest.is_file() {
            return Ok(dest);
        }
        debug!(src = %local.display(), dest = %dest.display(), "copying local artifact");
        std::fs::copy(&local, &dest).map_err(io_err("cannot copy", &local))?;
        return Ok(dest);
    }

    let part = dest.with_extension(match dest.extension() {
        Some(ext) => format!("{}.part", ext.to_string_lossy()),
        None => "part".to_string(),
    });

    let result = http_get(url, &part, timeout, show_progress);
    if result.is_err() {
        let _ = std::fs::remove_file(&part);
    }
    let total = result?;

    std::fs::rename(&part, &dest).map_err(io_err("cannot rename", &part))?;
    info!(url, bytes = total, dest = %dest.display(), "downloaded");
    Ok(dest)
}

fn local_source(url: &str) -> Option<PathBuf> {
    if let Some(rest) = url.strip_prefix("file://") {
        return Some(PathBuf::from(rest));
    }
    if url.contains("://") {
        return None;
    }
    Some(PathBuf::from(url))
}

fn http_get(url: &str, dest: &Path, timeout: Duration, show_progress: bool) -> Result<u64, FetchError> {
    let transfer = |reason: String| FetchError::Transfer {
        url: url.to_string(),
        reason,
    };

    let agent = ureq::AgentBuilder::new().timeout(timeout).build();
    let response = agent.get(url).call().map_err(|e| transfer(e.to_string()))?;

    let length: Option<u64> = response
        .header("content-length")
        .and_then(|s| s.parse().ok());
    let pb = match (show_progress, length) {
        (true, Some(len)) => Some(output::download_progress(len)),
        _ => None,
    };

    let mut file = File::create(dest).map_err(io_err("cannot create", dest))?;
    let mut reader = response.into_reader();
    let mut buffer = [0u8; 8192];
    let mut total = 0u64;

    loop {
        let n = reader
            .read(&mut buffer)
            .map_err(|e| transfer(e.to_string()))?;
        if n == 0 {
            break;
        }
        file.write_all(&buffer[..n]).map_err(io_err("cannot write", dest))?;
        total += n as u64;
        if let Some(pb) = &pb {
            pb.set_position(total);
        }
    }

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    Ok(total)
}

/// Lowercase hex SHA256 of a file.
pub fn sha256_file(path: &Path) -> Result<String, FetchError> {
    let file = File::open(path).map_err(io_err("cannot open", path))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buffer).map_err(io_err("cannot read", path))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Check `path` against a hex SHA256. An empty `expected` skips the check.
pub fn verify_sha256(path: &Path, expected: &str) -> Result<(), FetchError> {
    let expected = expected.trim().to_lowercase();
    if expected.is_empty() {
        debug!(path = %path.display(), "no checksum, skipping verification");
        return Ok(());
    }
    let actual = sha256_file(path)?;
    if actual != expected {
        return Err(FetchError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected,
            actual,
        });
    }
    Ok(())
}
