//! Host Integration
//!
//! Contracts with the outside world: the filesystem, the analysis engine and
//! the templated-source preprocessor.

pub mod engine;
pub mod fs;
pub mod paths;
pub mod preprocess;

pub use engine::{EngineFactory, EngineHandle, EngineHost};
pub use fs::{FileSystem, MemoryFileSystem, OsFileSystem};
pub use preprocess::{Conversion, Preprocessor};
