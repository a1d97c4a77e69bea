//! Widget Language Server core
//!
//! Project-scoped analysis sessions for `.widget` component files.
//!
//! This library provides:
//! - Project configuration discovery and merging
//! - Versioned document snapshots kept in sync with the editor
//! - Module resolution that maps templated components to analyzable source
//! - A registry of per-project sessions, each owning one analysis engine

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod host;
pub mod project;

// Re-exports for clean public API
pub use config::{Config, Settings};
pub use self::core::{AnalysisSession, Document, DocumentSnapshot, ScriptKind};
pub use error::{Error, Result};
pub use host::{Conversion, EngineFactory, EngineHandle, EngineHost, FileSystem, Preprocessor};
pub use project::{CompilerOptions, ConfigLoader, ProjectKey, ProjectServiceRegistry};
