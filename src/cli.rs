//! Project inspector
//!
//! Prints, for each file given on the command line, the project that
//! governs it and the merged configuration a session would be built from.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use crate::config::Config;
use crate::host::fs::{FileSystem, OsFileSystem};
use crate::host::paths;
use crate::project::config_loader::{ConfigLoader, ProjectConfig};
use crate::project::registry::ProjectKey;

/// Inspection result for one file
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub file: PathBuf,
    pub project: String,
    pub templated: bool,
    pub configuration: ProjectConfig,
}

/// Run the inspector with configuration from the command line
pub fn run() -> Result<()> {
    let config = Config::from_args_and_env()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_level.as_str()),
    )
    .init();

    if let Some(path) = &config.settings_path {
        log::info!("Using settings from {}", path.display());
    }

    let reports = inspect(&config, Arc::new(OsFileSystem));
    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}

/// Resolve and load the project of every configured file
///
/// Each project is loaded once no matter how many files share it.
pub fn inspect(config: &Config, fs: Arc<dyn FileSystem>) -> Vec<FileReport> {
    let loader = ConfigLoader::from_settings(fs, &config.settings);
    let mut projects: HashMap<ProjectKey, ProjectConfig> = HashMap::new();

    config
        .files
        .iter()
        .map(|file| {
            let file = absolute(&config.workspace_root, file);
            let key = match loader.find_governing_config(&file, &config.workspace_root) {
                Some(path) => ProjectKey::new(path),
                None => ProjectKey::global(),
            };
            let configuration = projects
                .entry(key.clone())
                .or_insert_with(|| {
                    loader.load_compiler_options_and_root_files(
                        key.config_path(),
                        &config.workspace_root,
                    )
                })
                .clone();
            FileReport {
                templated: paths::is_templated_file(&file),
                project: key.to_string(),
                file,
                configuration,
            }
        })
        .collect()
}

fn absolute(root: &Path, file: &Path) -> PathBuf {
    paths::normalize(&root.join(file))
}
