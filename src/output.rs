//! Colored console output and progress reporting.
//!
//! Uses owo-colors for terminal colors and indicatif for progress bars.
//! Whether color is emitted is decided once by the caller through
//! [`ColorChoice`] and carried in a [`Console`] value.

use std::io::IsTerminal;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::{OwoColorize, Style};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ColorChoice {
    /// Color when stdout is a terminal and `NO_COLOR` is unset.
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    pub fn enabled(self) -> bool {
        match self {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => {
                std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
            }
        }
    }
}

/// Console printer.
#[derive(Debug, Clone, Copy)]
pub struct Console {
    color: bool,
}

impl Default for Console {
    fn default() -> Self {
        Self::new(ColorChoice::Auto)
    }
}

impl Console {
    pub fn new(choice: ColorChoice) -> Self {
        Self {
            color: choice.enabled(),
        }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    fn paint(&self, text: &str, style: Style) -> String {
        if self.color {
            text.style(style).to_string()
        } else {
            text.to_string()
        }
    }

    /// Print an action header (blue, bold)
    /// Example: "==> Installing ripgrep"
    pub fn action(&self, message: &str) {
        println!(
            "{} {}",
            self.paint("==>", Style::new().blue().bold()),
            self.paint(message, Style::new().bold())
        );
    }

    /// Print a sub-action (cyan arrow)
    /// Example: "  -> extract"
    pub fn sub_action(&self, step: &str) {
        println!("  {} {}", self.paint("->", Style::new().cyan()), step);
    }

    /// Print a detail line (dimmed)
    pub fn detail(&self, message: &str) {
        println!("     {}", self.paint(message, Style::new().dimmed()));
    }

    /// Print a success message (green)
    pub fn success(&self, message: &str) {
        println!(
            "{} {}",
            self.paint("==>", Style::new().green().bold()),
            self.paint(message, Style::new().green())
        );
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", self.paint("::", Style::new().cyan()), message);
    }

    pub fn warning(&self, message: &str) {
        eprintln!(
            "{} {}",
            self.paint("warning:", Style::new().yellow().bold()),
            self.paint(message, Style::new().yellow())
        );
    }

    pub fn error(&self, message: &str) {
        eprintln!(
            "{} {}",
            self.paint("error:", Style::new().red().bold()),
            self.paint(message, Style::new().red())
        );
    }

    /// Print a skip message (dimmed)
    /// Example: "==> ripgrep already up to date"
    pub fn skip(&self, message: &str) {
        println!(
            "{} {}",
            self.paint("==>", Style::new().dimmed()),
            self.paint(message, Style::new().dimmed())
        );
    }

    /// Print a package line in list output
    pub fn list_item(&self, name: &str, status: &str, highlight: bool) {
        let name = if highlight {
            self.paint(name, Style::new().green())
        } else {
            name.to_string()
        };
        println!("  {} {}", name, self.paint(status, Style::new().dimmed()));
    }
}

/// Create a download progress bar
pub fn download_progress(total_size: u64) -> ProgressBar {
    let pb = ProgressBar::new(total_size);
    let style = ProgressStyle::default_bar()
        .template("     {spinner:.cyan} [{bar:30.cyan/dim}] {bytes}/{total_bytes} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━╸━");
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Create a simple spinner for operations
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("     {spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}
