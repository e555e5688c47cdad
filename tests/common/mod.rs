//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use jpm::output::Console;
use jpm::{Catalog, Config, InstallStore, Installer, NativeHost};
use tempfile::TempDir;

/// An isolated jpm home plus a directory for published artifacts.
pub struct Fixture {
    dir: TempDir,
    pub config: Config,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = Config::with_home(dir.path().join("home"));
        config.rc_file = Some(dir.path().join("shellrc"));
        std::fs::create_dir_all(&config.home).unwrap();
        std::fs::create_dir_all(dir.path().join("dist")).unwrap();
        Self { dir, config }
    }

    /// Path for a published artifact, outside the jpm home.
    pub fn artifact(&self, name: &str) -> PathBuf {
        self.dir.path().join("dist").join(name)
    }

    pub fn write_catalog(&self, package: &str, releases: &[String]) {
        let text = format!(
            "[[package]]\nname = \"{package}\"\ndescription = \"test package\"\n\n{}",
            releases.join("\n")
        );
        std::fs::write(&self.config.catalog, text).unwrap();
    }

    pub fn installer(&self) -> Installer<NativeHost> {
        let catalog = Catalog::load(&self.config.catalog).unwrap();
        let store = InstallStore::open(&self.config.store).unwrap();
        let host = NativeHost::new().with_rc_file(self.config.rc_file.clone());
        Installer::new(self.config.clone(), catalog, store, host)
            .with_console(Console::plain())
            .show_progress(false)
    }

    pub fn rc_text(&self) -> String {
        self.config
            .rc_file
            .as_ref()
            .and_then(|rc| std::fs::read_to_string(rc).ok())
            .unwrap_or_default()
    }
}

/// One `[[package.release]]` table served from a local file.
pub fn release_toml(version: &str, archive: &Path, checksum: &str, script: &str) -> String {
    format!(
        "[[package.release]]\nversion = \"{version}\"\nbinary_url = \"file://{}\"\nchecksum = \"{checksum}\"\ninstructions = \"\"\"\n{script}\n\"\"\"\n",
        archive.display()
    )
}

pub fn sha256_hex(path: &Path) -> String {
    jpm::fetch::sha256_file(path).unwrap()
}

pub fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
    let options = zip::write::SimpleFileOptions::default();
    for (name, content) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

pub fn write_tar_gz(path: &Path, entries: &[(&str, &str)]) {
    let file = File::create(path).unwrap();
    let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, content) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, content.as_bytes()).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();
}
