//! Command line arguments

use crate::core::logging::LogFormat;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Directory and file names under the platform configuration directory
const APP_DIR: &str = "modhost";
const CONFIG_FILE: &str = "modhost.toml";
const STORE_FILE: &str = "store.toml";

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "modhost")]
#[command(about = "In-process module host")]
#[command(version)]
pub struct Args {
    /// Host configuration file (defaults to <config dir>/modhost/modhost.toml)
    #[arg(long = "config-file", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Module configuration and parameter store
    #[arg(long = "store", value_name = "FILE")]
    pub store: Option<PathBuf>,

    /// Builtin modules not to load (comma separated)
    #[arg(long = "exclude", value_name = "LIST", value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// List the builtin modules and exit
    #[arg(long = "list-modules")]
    pub list_modules: bool,

    /// Stop after this many seconds instead of waiting for a signal
    #[arg(long = "run-for", value_name = "SECONDS")]
    pub run_for: Option<u64>,

    /// Force colored output
    #[arg(long = "color")]
    pub color: bool,

    /// Disable colored output
    #[arg(long = "no-color", conflicts_with = "color")]
    pub no_color: bool,

    /// Log level
    #[arg(long = "log-level", value_name = "LEVEL", value_parser = ["trace", "debug", "info", "warn", "error", "off"])]
    pub log_level: Option<String>,

    /// Log file path (use 'none' to disable file logging)
    #[arg(long = "log-file", value_name = "FILE")]
    pub log_file: Option<String>,

    /// Log output format
    #[arg(long = "log-format", value_name = "FORMAT", value_parser = ["text", "ext", "json"])]
    pub log_format: Option<String>,
}

fn app_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR))
}

impl Args {
    /// Explicit configuration file, or the default location when it exists
    pub fn config_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config_file {
            return Some(path.clone());
        }
        app_dir()
            .map(|dir| dir.join(CONFIG_FILE))
            .filter(|path| path.exists())
    }

    /// Store file; `None` only when no platform configuration directory exists
    pub fn store_path(&self) -> Option<PathBuf> {
        self.store
            .clone()
            .or_else(|| app_dir().map(|dir| dir.join(STORE_FILE)))
    }

    pub fn log_format(&self) -> LogFormat {
        self.log_format
            .as_deref()
            .and_then(LogFormat::parse)
            .unwrap_or_default()
    }

    pub fn run_for(&self) -> Option<Duration> {
        self.run_for.map(Duration::from_secs)
    }

    /// Colour decision: explicit flags win, then `NO_COLOR`, then stdout
    pub fn use_color(&self) -> bool {
        use std::io::IsTerminal;

        if self.color {
            return true;
        }
        if self.no_color || std::env::var_os("NO_COLOR").is_some() {
            return false;
        }
        std::io::stdout().is_terminal()
    }
}
