//! Configuration management for the widget language server.
//!
//! Handles:
//! - Command-line argument parsing
//! - User settings (`settings.toml`) for project discovery

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;

use crate::error::Error;

/// Command-line arguments for the project inspector
#[derive(Debug, Parser)]
#[command(name = "widget-project")]
#[command(about = "Show how widget source files map to projects")]
#[command(version)]
pub struct Args {
    /// Workspace root bounding the configuration search
    #[arg(long, help = "Workspace root (defaults to the current directory)")]
    pub workspace_root: Option<PathBuf>,

    /// Settings file overriding the user default
    #[arg(long, help = "Path to a settings.toml file")]
    pub settings: Option<PathBuf>,

    /// Log level for the inspector
    #[arg(
        long,
        default_value = "info",
        help = "Log level (trace, debug, info, warn, error)"
    )]
    pub log_level: String,

    /// Source files to inspect
    pub files: Vec<PathBuf>,
}

/// User settings controlling project discovery
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Configuration file names, tried in order in each directory
    pub config_file_names: Vec<String>,
    /// Package whose typings seed every project's options
    pub runtime_package: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_file_names: vec!["tsconfig.json".to_string(), "jsconfig.json".to_string()],
            runtime_package: "widget".to_string(),
        }
    }
}

impl Settings {
    /// Parse settings from TOML text
    pub fn parse(content: &str, source: &Path) -> crate::error::Result<Self> {
        toml::from_str(content).map_err(|source_err| Error::Settings {
            path: source.to_path_buf(),
            source: source_err,
        })
    }

    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        Ok(Self::parse(&content, path)?)
    }

    /// Default user settings location: `~/.config/widget-ls/settings.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("widget-ls").join("settings.toml"))
    }
}

/// Combined configuration from all sources
#[derive(Debug, Clone)]
pub struct Config {
    pub workspace_root: PathBuf,
    pub settings: Settings,
    /// Settings file actually read, if any
    pub settings_path: Option<PathBuf>,
    pub log_level: String,
    pub files: Vec<PathBuf>,
}

impl Config {
    /// Create configuration from command-line arguments
    pub fn from_args_and_env() -> Result<Self> {
        Self::from_args(Args::parse())
    }

    /// Create configuration from explicit arguments (useful for testing)
    ///
    /// An explicit `--settings` file must exist; the user default is only
    /// read when present.
    pub fn from_args(args: Args) -> Result<Self> {
        let workspace_root = match args.workspace_root {
            Some(root) => root,
            None => std::env::current_dir().context("Cannot determine current directory")?,
        };

        let settings_path = match args.settings {
            Some(path) => Some(path),
            None => Settings::default_path().filter(|path| path.is_file()),
        };
        let settings = match &settings_path {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };

        Ok(Config {
            workspace_root,
            settings,
            settings_path,
            log_level: args.log_level,
            files: args.files,
        })
    }

    /// Default configuration for a workspace
    pub fn for_workspace(workspace_root: impl Into<PathBuf>) -> Self {
        Config {
            workspace_root: workspace_root.into(),
            settings: Settings::default(),
            settings_path: None,
            log_level: "info".to_string(),
            files: Vec::new(),
        }
    }
}
