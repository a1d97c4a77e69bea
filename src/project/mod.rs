//! Project Management
//!
//! Configuration discovery and merging, and the registry that maps each
//! project to its analysis session.

pub mod config_loader;
pub mod options;
pub mod package;
pub mod pattern;
pub mod registry;

pub use config_loader::{ConfigLoader, ProjectConfig};
pub use options::CompilerOptions;
pub use package::{NodeModulesLocator, PackageInfo, PackageLocator};
pub use registry::{ProjectKey, ProjectServiceRegistry, RegistryEvent, SharedSession};
