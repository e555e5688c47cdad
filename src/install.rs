//! Install, update and remove packages.
//!
//! Ties the catalog, resolver, parser, executor and store together. Each
//! version gets its own working directory, `<packages_dir>/<name>/<version>`,
//! so an update can be applied fully before the old version is torn down.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::config::Config;
use crate::executor::{
    EnvironmentModification, Executor, InstallationContext, ModificationKind, RollbackReport,
    rollback,
};
use crate::fetch;
use crate::host::{Host, normalize_lexical};
use crate::output::{self, Console};
use crate::parser;
use crate::release::Release;
use crate::resolver;
use crate::store::{HistoryAction, HistoryEntry, InstallStore, InstallationRecord};
use crate::version::SemanticVersion;

/// Result of an update request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    UpToDate { installed: String },
    Updated { from: String, to: String },
}

/// One row of an update check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateStatus {
    pub name: String,
    pub installed: String,
    /// Newest eligible release, `None` when the catalog has nothing usable.
    pub latest: Option<String>,
    pub needs_update: bool,
}

pub struct Installer<H: Host> {
    config: Config,
    catalog: Catalog,
    store: InstallStore,
    host: H,
    console: Console,
    show_progress: bool,
}

impl<H: Host> Installer<H> {
    pub fn new(config: Config, catalog: Catalog, store: InstallStore, host: H) -> Self {
        Self {
            config,
            catalog,
            store,
            host,
            console: Console::default(),
            show_progress: true,
        }
    }

    pub fn with_console(mut self, console: Console) -> Self {
        self.console = console;
        self
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn store(&self) -> &InstallStore {
        &self.store
    }

    fn select(&self, name: &str, expression: &str) -> Result<&Release> {
        if self.catalog.package(name).is_none() {
            bail!("package '{}' not found in catalog", name);
        }
        let release = resolver::resolve(name, self.catalog.releases(name), expression)
            .with_context(|| format!("cannot resolve {} '{}'", name, expression))?;
        if release.is_deprecated {
            self.console
                .warning(&format!("{} {} is deprecated", name, release.version));
        }
        Ok(release)
    }

    fn version_dir(&self, release: &Release) -> Result<PathBuf> {
        let dir = self.config.package_dir(&release.package).join(&release.version);
        if !is_version_dir(&self.config.packages_dir, &dir) {
            bail!(
                "{} {} does not map to a directory under {}",
                release.package,
                release.version,
                self.config.packages_dir.display()
            );
        }
        Ok(dir)
    }

    /// Install `name` at the release matching `expression`.
    pub fn install(&self, name: &str, expression: &str) -> Result<InstallationRecord> {
        let _lock = self.store.lock()?;

        if let Some(existing) = self.store.get(name)? {
            bail!(
                "{} {} is already installed; use `jpm update {}`",
                name,
                existing.version(),
                name
            );
        }

        let release = self.select(name, expression)?.clone();
        self.console
            .action(&format!("Installing {} {}", name, release.version));

        let record = match self.apply_release(&release) {
            Ok(record) => record,
            Err(e) => {
                self.note_failure(
                    HistoryEntry::new(name, &release.version, HistoryAction::Install),
                    &e,
                );
                return Err(e);
            }
        };

        self.store.insert(record.clone())?;
        self.store
            .append_history(HistoryEntry::new(name, &release.version, HistoryAction::Install))?;
        self.console
            .success(&format!("{} {} installed", name, release.version));
        Ok(record)
    }

    /// Move `name` to the release matching `expression` when it is newer.
    pub fn update(&self, name: &str, expression: &str) -> Result<UpdateOutcome> {
        let _lock = self.store.lock()?;

        let Some(current) = self.store.get(name)? else {
            bail!("'{}' is not installed", name);
        };
        let release = self.select(name, expression)?.clone();

        if !is_newer(&release.version, current.version()) {
            self.console.skip(&format!(
                "{} {} is up to date",
                name,
                current.version()
            ));
            return Ok(UpdateOutcome::UpToDate {
                installed: current.version().to_string(),
            });
        }

        self.console.action(&format!(
            "Updating {} {} -> {}",
            name,
            current.version(),
            release.version
        ));
        let history = HistoryEntry::new(name, &release.version, HistoryAction::Update)
            .previous(current.version());

        let mut record = match self.apply_release(&release) {
            Ok(record) => record,
            Err(e) => {
                self.note_failure(history, &e);
                return Err(e);
            }
        };

        self.teardown(&current.context, Some(&mut record.context));
        self.store.update(record)?;
        self.store.append_history(history)?;
        self.console.success(&format!(
            "{} updated {} -> {}",
            name,
            current.version(),
            release.version
        ));

        Ok(UpdateOutcome::Updated {
            from: current.version().to_string(),
            to: release.version,
        })
    }

    /// Undo an installation and forget it.
    pub fn remove(&self, name: &str) -> Result<InstallationRecord> {
        let _lock = self.store.lock()?;

        let Some(record) = self.store.get(name)? else {
            bail!("'{}' is not installed", name);
        };
        self.console
            .action(&format!("Removing {} {}", name, record.version()));

        self.teardown(&record.context, None);
        self.store.delete(name)?;
        self.store
            .append_history(HistoryEntry::new(name, record.version(), HistoryAction::Remove))?;
        self.console.success(&format!("{} removed", name));
        Ok(record)
    }

    /// Compare installed packages against the newest catalog release.
    /// An empty `names` checks everything installed.
    pub fn check_updates(&self, names: &[String]) -> Result<Vec<UpdateStatus>> {
        let installed = self.store.list()?;
        let mut rows = Vec::new();

        for record in installed {
            if !names.is_empty() && !names.iter().any(|n| n == record.name()) {
                continue;
            }
            let latest = resolver::latest(self.catalog.releases(record.name()))
                .map(|r| r.version.clone());
            let needs_update = latest
                .as_deref()
                .is_some_and(|l| is_newer(l, record.version()));
            rows.push(UpdateStatus {
                name: record.name().to_string(),
                installed: record.version().to_string(),
                latest,
                needs_update,
            });
        }

        for name in names {
            if !rows.iter().any(|r| &r.name == name) {
                self.console
                    .warning(&format!("'{}' is not installed", name));
            }
        }
        Ok(rows)
    }

    /// Parse, fetch, verify and execute one release. On failure every
    /// recorded effect is rolled back and the working directory removed.
    fn apply_release(&self, release: &Release) -> Result<InstallationRecord> {
        let name = &release.package;
        let instructions = parser::parse(&release.instructions)
            .with_context(|| format!("invalid install script for {} {}", name, release.version))?;

        let work_dir = self.version_dir(release)?;
        if work_dir.exists() {
            debug!(dir = %work_dir.display(), "clearing stale working directory");
            self.host.delete(&work_dir)?;
        }
        std::fs::create_dir_all(&work_dir)
            .with_context(|| format!("cannot create {}", work_dir.display()))?;

        let fetched = match self.fetch(release, &work_dir) {
            Ok(fetched) => fetched,
            Err(e) => {
                self.discard(&work_dir);
                return Err(e);
            }
        };

        self.console.sub_action("install");
        let mut ctx = InstallationContext::new(name, &release.version, &work_dir);
        let spinner = self
            .show_progress
            .then(|| output::spinner(&format!("{} instructions", instructions.len())));
        let outcome = Executor::new(&self.host).run(&instructions, &mut ctx);
        if let Some(spinner) = spinner {
            spinner.finish_and_clear();
        }

        if let Err(e) = outcome {
            self.console.error(&e.to_string());
            self.console.sub_action("rollback");
            self.report(&rollback(&self.host, &ctx));
            if let Some((archive, _)) = &fetched {
                self.host.delete(archive).ok();
            }
            self.discard(&work_dir);
            return Err(e).with_context(|| format!("installation of {} {} failed", name, release.version));
        }

        let mut record = InstallationRecord::new(ctx);
        record.source_url = release.binary_url.clone();
        record.checksum = release.checksum.clone();
        record.file_size = fetched
            .map(|(_, size)| size)
            .unwrap_or(release.file_size);
        Ok(record)
    }

    fn fetch(&self, release: &Release, work_dir: &Path) -> Result<Option<(PathBuf, u64)>> {
        if release.binary_url.is_empty() {
            return Ok(None);
        }

        self.console.sub_action("download");
        self.console.detail(&release.binary_url);
        let archive = fetch::download(
            &release.binary_url,
            work_dir,
            self.config.http_timeout(),
            self.show_progress,
        )?;

        if self.config.verify_checksums {
            if release.checksum.is_empty() {
                self.console.warning(&format!(
                    "{} {} has no checksum; skipping verification",
                    release.package, release.version
                ));
            } else {
                self.console.sub_action("verify");
                fetch::verify_sha256(&archive, &release.checksum)?;
            }
        }

        let size = std::fs::metadata(&archive).map(|m| m.len()).unwrap_or(0);
        Ok(Some((archive, size)))
    }

    /// Revert a completed installation.
    ///
    /// During an update `successor` is the new version's context. Paths it
    /// recorded stay on disk, and environment changes it also relies on stay
    /// in place and are handed over to it.
    fn teardown(&self, ctx: &InstallationContext, successor: Option<&mut InstallationContext>) {
        let mut scrubbed = ctx.clone();
        if let Some(location) = &ctx.location {
            scrubbed.record_path(location.clone());
        }

        if let Some(next) = successor {
            scrubbed.files.retain(|p| !next.files.contains(p));
            let (kept, reverted): (Vec<_>, Vec<_>) = std::mem::take(&mut scrubbed.env_modifications)
                .into_iter()
                .partition(|m| relies_on(&*next, m));
            scrubbed.env_modifications = reverted;
            for m in kept {
                debug!(variable = %m.name, value = %m.value, "handing over to new version");
                if m.kind == ModificationKind::PathAddition {
                    next.shared_paths.retain(|p| *p != m.value);
                }
                if !next.env_modifications.iter().any(|n| same_change(n, &m)) {
                    next.env_modifications.push(m);
                }
            }
        }

        self.report(&rollback(&self.host, &scrubbed));
        self.discard(&ctx.work_dir);
    }

    /// Delete a version directory and its package directory once empty.
    fn discard(&self, work_dir: &Path) {
        if !is_version_dir(&self.config.packages_dir, work_dir) {
            warn!(dir = %work_dir.display(), "not a version directory; leaving it");
            self.console.warning(&format!(
                "not removing {}: outside {}",
                work_dir.display(),
                self.config.packages_dir.display()
            ));
            return;
        }
        if let Err(e) = self.host.delete(work_dir) {
            warn!(dir = %work_dir.display(), "cannot remove working directory: {}", e);
            self.console.warning(&e.to_string());
        }
        if let Some(parent) = work_dir.parent()
            && parent.starts_with(&self.config.packages_dir)
            && parent != self.config.packages_dir
        {
            std::fs::remove_dir(parent).ok();
        }
    }

    fn report(&self, report: &RollbackReport) {
        for w in &report.warnings {
            self.console.warning(&format!("rollback: {}", w));
        }
    }

    fn note_failure(&self, entry: HistoryEntry, err: &anyhow::Error) {
        if let Err(e) = self.store.append_history(entry.failed(format!("{:#}", err))) {
            warn!("cannot record failed operation: {}", e);
        }
    }
}

/// Whether `dir` is exactly `<root>/<name>/<version>` once normalized.
fn is_version_dir(root: &Path, dir: &Path) -> bool {
    let root = normalize_lexical(root);
    let dir = normalize_lexical(dir);
    dir.strip_prefix(&root).is_ok_and(|rel| {
        rel.components().count() == 2
            && rel.components().all(|c| matches!(c, Component::Normal(_)))
    })
}

fn same_change(a: &EnvironmentModification, b: &EnvironmentModification) -> bool {
    a.kind == b.kind && a.name == b.name && a.value == b.value
}

/// Whether the new installation `next` depends on the change `m` made by
/// the version it replaces.
fn relies_on(next: &InstallationContext, m: &EnvironmentModification) -> bool {
    next.env_modifications.iter().any(|n| same_change(n, m))
        || (m.kind == ModificationKind::PathAddition && next.shared_paths.contains(&m.value))
}

/// Whether `candidate` orders after `installed`. Unparseable versions
/// compare by string inequality.
fn is_newer(candidate: &str, installed: &str) -> bool {
    match (
        candidate.parse::<SemanticVersion>(),
        installed.parse::<SemanticVersion>(),
    ) {
        (Ok(c), Ok(i)) => c > i,
        _ => candidate != installed,
    }
}
