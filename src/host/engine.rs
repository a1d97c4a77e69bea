//! Engine Contract
//!
//! The analysis engine is an external closed box. It is constructed against
//! an [`EngineHost`] and pulls everything it knows about the project through
//! that host's named callbacks.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::document::{DocumentSnapshot, ScriptKind};
use crate::core::resolver::ResolvedModule;
use crate::project::options::CompilerOptions;

/// Callbacks an engine uses to read project state
pub trait EngineHost: Send + Sync {
    fn compilation_settings(&self) -> CompilerOptions;

    /// Root files plus every tracked document
    fn script_file_names(&self) -> Vec<PathBuf>;

    /// Version string the engine compares to detect changes
    fn script_version(&self, path: &Path) -> String;

    fn script_snapshot(&self, path: &Path) -> Option<Arc<DocumentSnapshot>>;

    fn script_kind(&self, path: &Path) -> ScriptKind;

    fn current_directory(&self) -> PathBuf;

    /// One entry per specifier, in input order
    fn resolve_module_names(
        &self,
        specifiers: &[String],
        containing_file: &Path,
    ) -> Vec<Option<ResolvedModule>>;

    fn file_exists(&self, path: &Path) -> bool;

    fn read_file(&self, path: &Path) -> Option<String>;

    fn read_directory(&self, dir: &Path, extensions: &[&str]) -> Vec<PathBuf>;

    fn get_directories(&self, dir: &Path) -> Vec<PathBuf>;

    fn directory_exists(&self, path: &Path) -> bool;
}

/// Builds engine instances bound to a host
pub trait EngineFactory: Send + Sync {
    type Engine: Send + Sync;

    fn create_engine(&self, host: Arc<dyn EngineHost>) -> anyhow::Result<Self::Engine>;
}

/// Shared handle to a live engine
///
/// Two handles are equal only when they point at the same engine instance.
pub struct EngineHandle<E> {
    engine: Arc<E>,
    generation: u64,
}

impl<E> EngineHandle<E> {
    pub(crate) fn new(engine: E, generation: u64) -> Self {
        Self {
            engine: Arc::new(engine),
            generation,
        }
    }

    /// How many engines this session built before this one
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl<E> std::ops::Deref for EngineHandle<E> {
    type Target = E;

    fn deref(&self) -> &E {
        &self.engine
    }
}

impl<E> Clone for EngineHandle<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            generation: self.generation,
        }
    }
}

impl<E> PartialEq for EngineHandle<E> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.engine, &other.engine)
    }
}

impl<E> Eq for EngineHandle<E> {}

impl<E> fmt::Debug for EngineHandle<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_compare_by_identity() {
        let first = EngineHandle::new(7u32, 0);
        let second = EngineHandle::new(7u32, 0);

        assert_eq!(first, first.clone());
        assert_ne!(first, second);
        assert_eq!(*first, 7);
        assert_eq!(second.generation(), 0);
    }
}
