//! jpm - binary package manager
//!
//! Usage:
//!   jpm install <name> [--version <expr>]   Install a package
//!   jpm remove <name> [--force]             Remove a package
//!   jpm update <name>... | --all            Update packages
//!   jpm list                                List installed packages
//!   jpm search <pattern>                    Search the catalog
//!   jpm info <name>                         Show package info
//!   jpm history [name]                      Show operation history

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use jpm::catalog::{Catalog, CatalogError};
use jpm::config::{self, Config};
use jpm::output::{ColorChoice, Console};
use jpm::resolver::{self, ResolutionError};
use jpm::store::{InstallStore, InstallationRecord};
use jpm::{Installer, NativeHost, UpdateOutcome};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "JPM_LOG";

#[derive(Parser)]
#[command(name = "jpm")]
#[command(about = "Install prebuilt binaries from a release catalog")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Data directory (defaults to $JPM_HOME, then the platform data dir)
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// Config file (defaults to <home>/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Catalog file, overriding the configured one
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// When to use colors
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,
}

#[derive(Subcommand)]
enum Commands {
    /// Install a package
    Install {
        /// Package name
        package: String,

        /// Version expression: latest, 1.2.3, ^1.2, ~1.2.0, >=1.0, 1.x
        #[arg(short = 'v', long = "version", default_value = "latest")]
        version: String,
    },

    /// Remove an installed package
    Remove {
        /// Package name
        package: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Update installed packages to their latest release
    Update {
        /// Packages to update
        packages: Vec<String>,

        /// Update every installed package
        #[arg(long, conflicts_with = "packages")]
        all: bool,

        /// Show what would be updated without installing
        #[arg(long)]
        dry_run: bool,
    },

    /// List installed packages
    List,

    /// Search the catalog
    Search {
        /// Pattern to search for
        pattern: String,
    },

    /// Show package information
    Info {
        /// Package name
        package: String,
    },

    /// Show install, update and remove history
    History {
        /// Only show entries for this package
        package: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let console = Console::new(cli.color);
    if let Err(e) = run(cli, console) {
        console.error(&format!("{:#}", e));
        if let Some(ResolutionError::NoCompatibleVersion { available, .. }) =
            e.downcast_ref::<ResolutionError>()
            && !available.is_empty()
        {
            console.info(&format!("available versions: {}", available.join(", ")));
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli, console: Console) -> Result<()> {
    let home = Config::resolve_home(cli.home.as_deref(), std::env::var_os(config::HOME_ENV));
    let mut config = Config::load(&home, cli.config.as_deref())
        .with_context(|| format!("Failed to load configuration for {}", home.display()))?;
    if let Some(catalog) = cli.catalog {
        config.catalog = catalog;
    }

    std::fs::create_dir_all(&config.home)
        .with_context(|| format!("Failed to create data directory: {}", config.home.display()))?;

    match cli.command {
        Commands::Install { package, version } => {
            validate_package_name(&package)?;
            let installer = create_installer(config, console, true)?;
            installer.install(&package, &version)?;
        }

        Commands::Remove { package, force } => {
            validate_package_name(&package)?;
            let installer = create_installer(config, console, false)?;
            let Some(record) = installer.store().get(&package)? else {
                bail!("'{}' is not installed", package);
            };
            describe_removal(&console, &record);
            if !force && !confirm("Remove this package?")? {
                console.info("Removal cancelled");
                return Ok(());
            }
            installer.remove(&package)?;
        }

        Commands::Update {
            packages,
            all,
            dry_run,
        } => {
            if packages.is_empty() && !all {
                bail!("specify a package name or use --all");
            }
            for name in &packages {
                validate_package_name(name)?;
            }
            let installer = create_installer(config, console, true)?;
            update_packages(&installer, &console, &packages, dry_run)?;
        }

        Commands::List => {
            let store = InstallStore::open(&config.store)?;
            list_packages(&console, &store)?;
        }

        Commands::Search { pattern } => {
            let catalog = load_catalog(&config.catalog)?;
            let store = InstallStore::open(&config.store)?;
            search_packages(&console, &catalog, &store, &pattern)?;
        }

        Commands::Info { package } => {
            let catalog = load_catalog(&config.catalog)?;
            let store = InstallStore::open(&config.store)?;
            show_info(&console, &catalog, &store, &package)?;
        }

        Commands::History { package } => {
            let store = InstallStore::open(&config.store)?;
            show_history(&console, &store, package.as_deref())?;
        }
    }

    Ok(())
}

fn create_installer(config: Config, console: Console, need_catalog: bool) -> Result<Installer<NativeHost>> {
    let catalog = match Catalog::load(&config.catalog) {
        Ok(catalog) => catalog,
        Err(CatalogError::NotFound(_)) if !need_catalog => Catalog::default(),
        Err(e) => return Err(e).context("Failed to load catalog"),
    };
    let store = InstallStore::open(&config.store)
        .with_context(|| format!("Failed to open installation store: {}", config.store.display()))?;
    let host = NativeHost::new().with_rc_file(config.rc_file.clone());

    Ok(Installer::new(config, catalog, store, host).with_console(console))
}

fn load_catalog(path: &Path) -> Result<Catalog> {
    Catalog::load(path).context("Failed to load catalog")
}

/// Validate a package name to prevent path traversal attacks
fn validate_package_name(package: &str) -> Result<()> {
    if package.is_empty() {
        bail!("Package name cannot be empty");
    }

    // Names become directory names under the packages dir
    if !package
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.')
        || package.starts_with('.')
    {
        bail!(
            "Invalid package name '{}': only alphanumeric characters, '.', '_' and '-' are allowed",
            package
        );
    }

    Ok(())
}

fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N]: ", question);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin()
        .read_line(&mut answer)
        .context("Failed to read answer")?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn describe_removal(console: &Console, record: &InstallationRecord) {
    let ctx = &record.context;
    console.info(&format!("{} {}", record.name(), record.version()));
    if let Some(location) = &ctx.location {
        console.detail(&format!("location: {}", location.display()));
    }
    if let Some(entry) = &ctx.path_entry {
        console.detail(&format!("PATH: {}", entry));
    }
    if !ctx.files.is_empty() {
        console.detail(&format!("{} path(s) will be removed", ctx.files.len()));
    }
    if !ctx.env_modifications.is_empty() {
        console.detail(&format!(
            "{} environment modification(s) will be reverted",
            ctx.env_modifications.len()
        ));
    }
}

fn update_packages(
    installer: &Installer<NativeHost>,
    console: &Console,
    names: &[String],
    dry_run: bool,
) -> Result<()> {
    console.action("Checking for updates...");
    let statuses = installer.check_updates(names)?;
    if statuses.is_empty() {
        console.info("No packages installed");
        return Ok(());
    }

    let pending: Vec<_> = statuses.iter().filter(|s| s.needs_update).collect();
    for status in &statuses {
        let line = match (&status.latest, status.needs_update) {
            (Some(latest), true) => format!("[{} -> {}]", status.installed, latest),
            (Some(_), false) => format!("[{}, up to date]", status.installed),
            (None, _) => format!("[{}, not in catalog]", status.installed),
        };
        console.list_item(&status.name, &line, status.needs_update);
    }

    if pending.is_empty() {
        console.success("All packages are up to date");
        return Ok(());
    }
    if dry_run {
        console.info(&format!("{} package(s) can be updated", pending.len()));
        return Ok(());
    }

    let mut failed = Vec::new();
    for status in pending {
        match installer.update(&status.name, "latest") {
            Ok(UpdateOutcome::Updated { .. }) => {}
            Ok(UpdateOutcome::UpToDate { installed }) => {
                console.skip(&format!("{} {} is already current", status.name, installed));
            }
            Err(e) => {
                console.error(&format!("{:#}", e));
                failed.push(status.name.clone());
            }
        }
    }

    if !failed.is_empty() {
        bail!("failed to update: {}", failed.join(", "));
    }
    Ok(())
}

fn list_packages(console: &Console, store: &InstallStore) -> Result<()> {
    let installed = store.list()?;
    if installed.is_empty() {
        console.info("No packages installed");
        return Ok(());
    }

    console.info(&format!("{} package(s) installed:", installed.len()));
    for record in &installed {
        let status = format!(
            "[{}, installed {}]",
            record.version(),
            record.updated_at.format("%Y-%m-%d")
        );
        console.list_item(record.name(), &status, true);
    }
    Ok(())
}

fn search_packages(
    console: &Console,
    catalog: &Catalog,
    store: &InstallStore,
    pattern: &str,
) -> Result<()> {
    let found = catalog.search(pattern);
    if found.is_empty() {
        console.info(&format!("No packages matching '{}'", pattern));
        return Ok(());
    }

    for entry in found {
        let latest = resolver::latest(&entry.releases).map(|r| r.version.as_str());
        let installed = store.get(&entry.name)?;
        let status = match (&installed, latest) {
            (Some(record), _) => format!("[installed: {}]", record.version()),
            (None, Some(v)) => format!("[available: {}]", v),
            (None, None) => "[no releases]".to_string(),
        };
        console.list_item(&entry.name, &status, installed.is_some());
        if !entry.description.is_empty() {
            console.detail(&entry.description);
        }
    }
    Ok(())
}

fn show_info(console: &Console, catalog: &Catalog, store: &InstallStore, name: &str) -> Result<()> {
    let Some(entry) = catalog.package(name) else {
        bail!("package '{}' not found in catalog", name);
    };

    console.action(&entry.name);
    if !entry.description.is_empty() {
        console.detail(&entry.description);
    }
    if !entry.homepage.is_empty() {
        console.detail(&entry.homepage);
    }

    let installed = store.get(name)?;
    if let Some(record) = &installed {
        console.info(&format!(
            "installed: {} ({})",
            record.version(),
            record.installed_at.format("%Y-%m-%d %H:%M")
        ));
        if let Some(location) = &record.context.location {
            console.detail(&format!("location: {}", location.display()));
        }
    }

    let latest = resolver::latest(&entry.releases).map(|r| r.version.clone());
    console.info("releases:");
    let mut releases: Vec<_> = entry.releases.iter().collect();
    releases.sort_by(|a, b| b.released_at.cmp(&a.released_at));
    for release in releases {
        let mut tags = vec![release.released_at.format("%Y-%m-%d").to_string()];
        if latest.as_deref() == Some(release.version.as_str()) {
            tags.push("latest".to_string());
        }
        if release.is_prerelease {
            tags.push("prerelease".to_string());
        }
        if release.is_deprecated {
            tags.push("deprecated".to_string());
        }
        let current = installed
            .as_ref()
            .is_some_and(|r| r.version() == release.version);
        console.list_item(&release.version, &format!("[{}]", tags.join(", ")), current);
    }
    Ok(())
}

fn show_history(console: &Console, store: &InstallStore, name: Option<&str>) -> Result<()> {
    let entries = store.history(name)?;
    if entries.is_empty() {
        console.info("No history");
        return Ok(());
    }

    for entry in entries {
        let version = match &entry.previous_version {
            Some(prev) => format!("{} -> {}", prev, entry.version),
            None => entry.version.clone(),
        };
        let mut status = format!(
            "{} {} {}",
            entry.performed_at.format("%Y-%m-%d %H:%M"),
            entry.action,
            version
        );
        if let Some(err) = &entry.error {
            status.push_str(&format!(" (failed: {})", err));
        }
        console.list_item(&entry.package, &status, entry.success);
    }
    Ok(())
}
