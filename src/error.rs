//! Error types for project sessions

use std::path::PathBuf;

use thiserror::Error;

/// Result type for session operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading projects or driving their engines
#[derive(Debug, Error)]
pub enum Error {
    /// Project configuration could not be read
    #[error("Cannot read project configuration: {}", path.display())]
    ConfigRead { path: PathBuf },

    /// Project configuration is not valid JSON (comments allowed)
    #[error("Invalid project configuration {}: {message}", path.display())]
    ConfigParse { path: PathBuf, message: String },

    /// `extends` chain loops back on itself
    #[error("Configuration {} extends itself", path.display())]
    ConfigCycle { path: PathBuf },

    /// The engine factory refused to build an engine
    #[error("Failed to start analysis engine for project {project}: {source}")]
    EngineStart {
        project: String,
        #[source]
        source: anyhow::Error,
    },

    /// Server settings file is malformed
    #[error("Invalid settings file {}: {source}", path.display())]
    Settings {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
