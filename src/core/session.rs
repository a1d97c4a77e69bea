//! Analysis Sessions
//!
//! One session binds a project to one live engine. It owns the snapshot
//! store and resolver the engine reads through its host, and rebuilds the
//! engine when a file's script kind changes underneath it.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::document::{
    Document, DocumentFactory, DocumentSnapshot, DocumentSnapshotStore, ScriptKind,
    SnapshotOrigin,
};
use crate::core::resolver::{ModuleResolver, ResolvedModule, TemplatedFileSystem};
use crate::error::{Error, Result};
use crate::host::engine::{EngineFactory, EngineHandle, EngineHost};
use crate::host::fs::FileSystem;
use crate::host::paths;
use crate::host::preprocess::Preprocessor;
use crate::project::config_loader::ProjectConfig;
use crate::project::options::CompilerOptions;
use crate::project::registry::ProjectKey;

/// Everything a session needs besides its engine factory
pub struct SessionParts {
    pub project: ProjectConfig,
    pub fs: Arc<dyn FileSystem>,
    pub preprocessor: Arc<dyn Preprocessor>,
    pub document_factory: DocumentFactory,
}

/// The engine-facing side of a session
///
/// Engines hold an `Arc` to this and call back into it; the session updates
/// the snapshot store behind it.
pub struct SessionHost {
    project: ProjectConfig,
    resolver: ModuleResolver,
    preprocessor: Arc<dyn Preprocessor>,
    document_factory: DocumentFactory,
    store: RwLock<DocumentSnapshotStore>,
}

impl SessionHost {
    fn new(parts: SessionParts) -> Self {
        let templated = TemplatedFileSystem::new(parts.fs, Arc::clone(&parts.preprocessor));
        Self {
            project: parts.project,
            resolver: ModuleResolver::new(Arc::new(templated)),
            preprocessor: parts.preprocessor,
            document_factory: parts.document_factory,
            store: RwLock::new(DocumentSnapshotStore::new()),
        }
    }

    /// Tracked snapshot, loading it from disk on first use
    fn snapshot_or_load(&self, path: &Path) -> Option<Arc<DocumentSnapshot>> {
        let path = paths::to_real_path(path);
        if let Some(snapshot) = self.store.read().get(&path) {
            return Some(snapshot);
        }
        self.store.write().get_or_load(&path, || {
            DocumentSnapshot::load(
                &path,
                self.resolver.file_system(),
                &self.document_factory,
                self.preprocessor.as_ref(),
            )
        })
    }

    /// Tracked snapshot without touching disk
    pub fn snapshot(&self, path: &Path) -> Option<Arc<DocumentSnapshot>> {
        self.store.read().get(path)
    }

    pub fn tracked_paths(&self) -> Vec<PathBuf> {
        self.store.read().paths()
    }
}

impl EngineHost for SessionHost {
    fn compilation_settings(&self) -> CompilerOptions {
        self.project.compiler_options.clone()
    }

    fn script_file_names(&self) -> Vec<PathBuf> {
        let tracked = self.tracked_paths();
        let mut seen = HashSet::new();
        self.project
            .root_files
            .iter()
            .cloned()
            .chain(tracked)
            .filter(|path| seen.insert(path.clone()))
            .collect()
    }

    fn script_version(&self, path: &Path) -> String {
        match self.snapshot_or_load(path) {
            Some(snapshot) => match snapshot.origin {
                SnapshotOrigin::Editor => snapshot.version.to_string(),
                SnapshotOrigin::Disk => format!("disk:{}", snapshot.version),
            },
            None => String::new(),
        }
    }

    fn script_snapshot(&self, path: &Path) -> Option<Arc<DocumentSnapshot>> {
        self.snapshot_or_load(path)
    }

    fn script_kind(&self, path: &Path) -> ScriptKind {
        self.snapshot_or_load(path)
            .map(|snapshot| snapshot.script_kind)
            .unwrap_or_else(|| ScriptKind::from_path(path))
    }

    fn current_directory(&self) -> PathBuf {
        self.project.directory.clone()
    }

    fn resolve_module_names(
        &self,
        specifiers: &[String],
        containing_file: &Path,
    ) -> Vec<Option<ResolvedModule>> {
        self.resolver.resolve_module_names(
            specifiers,
            containing_file,
            &self.project.compiler_options,
            &|path| self.script_kind(path),
        )
    }

    fn file_exists(&self, path: &Path) -> bool {
        if paths::is_converted_path(path) {
            let real = paths::to_real_path(path);
            if self.store.read().contains(&real) {
                return true;
            }
        }
        self.resolver.file_system().file_exists(path)
    }

    /// Converted paths are served from the snapshot store so open documents
    /// read back as the editor has them
    fn read_file(&self, path: &Path) -> Option<String> {
        if paths::is_converted_path(path) {
            return self
                .snapshot_or_load(path)
                .map(|snapshot| snapshot.analyzable_text.clone());
        }
        self.resolver.file_system().read_file(path)
    }

    fn read_directory(&self, dir: &Path, extensions: &[&str]) -> Vec<PathBuf> {
        self.resolver.file_system().read_directory(dir, extensions)
    }

    fn get_directories(&self, dir: &Path) -> Vec<PathBuf> {
        self.resolver.file_system().get_directories(dir)
    }

    fn directory_exists(&self, path: &Path) -> bool {
        self.resolver.file_system().directory_exists(path)
    }
}

/// Lifecycle of a session's engine
///
/// There is a single state; the only transition replaces the live handle
/// with a fresh one when a file's script kind changes.
pub enum EngineState<E> {
    Active(EngineHandle<E>),
}

impl<E> EngineState<E> {
    pub fn handle(&self) -> &EngineHandle<E> {
        match self {
            EngineState::Active(handle) => handle,
        }
    }

    /// A restart is needed only when a known file changes script kind
    pub fn requires_restart(previous: Option<ScriptKind>, next: ScriptKind) -> bool {
        previous.is_some_and(|previous| previous != next)
    }
}

/// A project bound to a live engine
pub struct AnalysisSession<F: EngineFactory> {
    key: ProjectKey,
    host: Arc<SessionHost>,
    factory: Arc<F>,
    state: EngineState<F::Engine>,
    /// Kinds the live engine last saw for documents deleted since it started
    retired_kinds: HashMap<PathBuf, ScriptKind>,
}

impl<F: EngineFactory> AnalysisSession<F> {
    /// Create the session and its first engine
    pub fn new(key: ProjectKey, parts: SessionParts, factory: Arc<F>) -> Result<Self> {
        let host = Arc::new(SessionHost::new(parts));
        let handle = Self::start_engine(&key, &host, factory.as_ref(), 0)?;
        Ok(Self {
            key,
            host,
            factory,
            state: EngineState::Active(handle),
            retired_kinds: HashMap::new(),
        })
    }

    fn start_engine(
        key: &ProjectKey,
        host: &Arc<SessionHost>,
        factory: &F,
        generation: u64,
    ) -> Result<EngineHandle<F::Engine>> {
        let engine_host: Arc<dyn EngineHost> = Arc::clone(host) as Arc<dyn EngineHost>;
        let engine = factory
            .create_engine(engine_host)
            .map_err(|source| Error::EngineStart {
                project: key.to_string(),
                source,
            })?;
        Ok(EngineHandle::new(engine, generation))
    }

    /// The live engine
    pub fn engine_handle(&self) -> EngineHandle<F::Engine> {
        self.state.handle().clone()
    }

    /// Publish new editor content for a document
    ///
    /// Re-sending a version already published by the editor is a no-op that
    /// returns the current handle. If the document's script kind differs from
    /// what the engine last saw, the snapshot is published and the engine is
    /// rebuilt against it; on failure the previous engine and snapshot are
    /// put back.
    pub fn update_document(&mut self, document: Document) -> Result<EngineHandle<F::Engine>> {
        let previous = self.host.store.read().get(document.file_path());
        if let Some(previous) = &previous {
            if previous.origin == SnapshotOrigin::Editor && previous.version == document.version {
                log::debug!(
                    "{} v{} already published",
                    document.path.display(),
                    document.version
                );
                return Ok(self.engine_handle());
            }
        }

        let previous_kind = previous
            .map(|snapshot| snapshot.script_kind)
            .or_else(|| self.retired_kinds.get(document.file_path()).copied());
        let snapshot = Arc::new(DocumentSnapshot::from_document(
            document,
            SnapshotOrigin::Editor,
            self.host.preprocessor.as_ref(),
        ));
        let path = snapshot.path.clone();
        let next_kind = snapshot.script_kind;
        let replaced = self.host.store.write().set(snapshot);

        if EngineState::<F::Engine>::requires_restart(previous_kind, next_kind) {
            let generation = self.state.handle().generation() + 1;
            log::info!(
                "Script kind of {} changed, restarting engine for project {} (generation {})",
                path.display(),
                self.key,
                generation
            );
            match Self::start_engine(&self.key, &self.host, self.factory.as_ref(), generation) {
                Ok(handle) => {
                    self.state = EngineState::Active(handle);
                    self.retired_kinds.clear();
                }
                Err(e) => {
                    let mut store = self.host.store.write();
                    match replaced {
                        Some(replaced) => {
                            store.set(replaced);
                        }
                        None => {
                            store.remove(&path);
                        }
                    }
                    return Err(e);
                }
            }
        }

        self.retired_kinds.remove(&path);
        Ok(self.engine_handle())
    }

    /// Stop tracking a document
    ///
    /// Later reads fall back to disk and resolutions mentioning the path are
    /// probed again.
    pub fn delete_document(&mut self, path: &Path) {
        let removed = self.host.store.write().remove(path);
        if let Some(snapshot) = &removed {
            self.retired_kinds.insert(snapshot.path.clone(), snapshot.script_kind);
        }
        let purged = self.host.resolver.purge(path);
        log::debug!(
            "Deleted {} (tracked: {}, resolutions purged: {})",
            path.display(),
            removed.is_some(),
            purged
        );
    }

    pub fn project_key(&self) -> &ProjectKey {
        &self.key
    }

    /// Governing configuration file, `None` for the global project
    pub fn project_config_path(&self) -> Option<&Path> {
        self.host.project.config_path.as_deref()
    }

    pub fn compiler_options(&self) -> &CompilerOptions {
        &self.host.project.compiler_options
    }

    pub fn root_files(&self) -> &[PathBuf] {
        &self.host.project.root_files
    }

    /// Tracked snapshot of `path`, if any
    pub fn snapshot(&self, path: &Path) -> Option<Arc<DocumentSnapshot>> {
        self.host.snapshot(path)
    }

    pub fn host(&self) -> Arc<SessionHost> {
        Arc::clone(&self.host)
    }

    /// Factory used for restarts
    pub fn factory(&self) -> &F {
        &self.factory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::document::default_document_factory;
    use crate::host::fs::MemoryFileSystem;
    use crate::host::preprocess::Conversion;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFactory {
        built: AtomicUsize,
    }

    impl EngineFactory for CountingFactory {
        type Engine = Arc<dyn EngineHost>;

        fn create_engine(&self, host: Arc<dyn EngineHost>) -> anyhow::Result<Self::Engine> {
            self.built.fetch_add(1, Ordering::SeqCst);
            Ok(host)
        }
    }

    fn lang_preprocessor(_: &Path, source: &str) -> Conversion {
        let kind = if source.contains("lang=\"ts\"") {
            ScriptKind::Tsx
        } else {
            ScriptKind::Jsx
        };
        Conversion::converted(format!("/*converted*/{}", source), kind)
    }

    fn session(fs: MemoryFileSystem, root_files: Vec<PathBuf>) -> AnalysisSession<CountingFactory> {
        let mut options = CompilerOptions::new();
        options.set("noEmit", true);
        let parts = SessionParts {
            project: ProjectConfig {
                config_path: Some(PathBuf::from("/p/tsconfig.json")),
                directory: PathBuf::from("/p"),
                compiler_options: options,
                root_files,
            },
            fs: Arc::new(fs),
            preprocessor: Arc::new(lang_preprocessor),
            document_factory: default_document_factory(),
        };
        let factory = Arc::new(CountingFactory {
            built: AtomicUsize::new(0),
        });
        AnalysisSession::new(ProjectKey::new("/p/tsconfig.json"), parts, factory)
            .expect("session starts")
    }

    #[test]
    fn test_same_version_is_a_no_op() {
        let mut session = session(MemoryFileSystem::new(), vec![]);
        let first = session
            .update_document(Document::new("/p/a.ts", 1, "let a = 1;"))
            .expect("update");
        let snapshot = session.snapshot(Path::new("/p/a.ts")).expect("tracked");

        let second = session
            .update_document(Document::new("/p/a.ts", 1, "ignored"))
            .expect("update");
        assert_eq!(first, second);
        let unchanged = session.snapshot(Path::new("/p/a.ts")).expect("tracked");
        assert!(Arc::ptr_eq(&snapshot, &unchanged));
    }

    #[test]
    fn test_kind_change_restarts_engine() {
        let mut session = session(MemoryFileSystem::new(), vec![]);
        let path = Path::new("/p/App.widget");

        let h1 = session
            .update_document(Document::new(path, 1, "<script></script>"))
            .expect("update");
        let h1_again = session
            .update_document(Document::new(path, 2, "<script></script><div/>"))
            .expect("update");
        assert_eq!(h1, h1_again);

        let h2 = session
            .update_document(Document::new(path, 3, "<script lang=\"ts\"></script>"))
            .expect("update");
        assert_ne!(h1, h2);
        assert_eq!(h2.generation(), 1);
        assert_eq!(session.factory.built.load(Ordering::SeqCst), 2);
        assert_eq!(
            session.snapshot(path).map(|s| s.script_kind),
            Some(ScriptKind::Tsx)
        );
    }

    #[test]
    fn test_disk_snapshot_is_replaced_by_editor_content() {
        let fs = MemoryFileSystem::with_files([("/p/a.ts", "from disk")]);
        let mut session = session(fs, vec![PathBuf::from("/p/a.ts")]);
        let host = session.host();

        assert_eq!(host.script_version(Path::new("/p/a.ts")), "disk:0");
        session
            .update_document(Document::new("/p/a.ts", 0, "from editor"))
            .expect("update");

        let snapshot = session.snapshot(Path::new("/p/a.ts")).expect("tracked");
        assert_eq!(snapshot.analyzable_text, "from editor");
        assert_eq!(host.script_version(Path::new("/p/a.ts")), "0");
    }

    #[test]
    fn test_host_lists_root_and_tracked_files_once() {
        let mut session = session(
            MemoryFileSystem::new(),
            vec![PathBuf::from("/p/a.ts"), PathBuf::from("/p/b.ts")],
        );
        session
            .update_document(Document::new("/p/b.ts", 1, ""))
            .expect("update");
        session
            .update_document(Document::new("/p/c.ts", 1, ""))
            .expect("update");

        assert_eq!(
            session.host().script_file_names(),
            vec![
                PathBuf::from("/p/a.ts"),
                PathBuf::from("/p/b.ts"),
                PathBuf::from("/p/c.ts"),
            ]
        );
        assert_eq!(session.host().compilation_settings().get_bool("noEmit"), Some(true));
        assert_eq!(session.host().current_directory(), PathBuf::from("/p"));
    }

    #[test]
    fn test_delete_falls_back_to_disk() {
        let fs = MemoryFileSystem::with_files([("/p/App.widget", "<script lang=\"ts\"></script>")]);
        let mut session = session(fs, vec![]);
        let path = Path::new("/p/App.widget");

        session
            .update_document(Document::new(path, 4, "<script lang=\"ts\">edited</script>"))
            .expect("update");
        session.delete_document(path);
        assert!(session.snapshot(path).is_none());

        let host = session.host();
        let reloaded = host.script_snapshot(path).expect("read from disk");
        assert_eq!(reloaded.origin, SnapshotOrigin::Disk);
        assert!(!reloaded.analyzable_text.contains("edited"));
        assert_eq!(host.script_kind(Path::new("/p/App.widget.ts")), ScriptKind::Tsx);
    }
}
