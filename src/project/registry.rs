//! Project Service Registry
//!
//! Maps project keys to their analysis sessions. The registry is an explicit
//! context object: whoever dispatches editor requests owns it and passes it
//! to the code that needs project resolution.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::Config;
use crate::core::document::DocumentFactory;
use crate::core::session::{AnalysisSession, SessionParts};
use crate::error::Result;
use crate::host::engine::EngineFactory;
use crate::host::fs::FileSystem;
use crate::host::preprocess::Preprocessor;
use crate::project::config_loader::ConfigLoader;

/// Identity of a project: its governing configuration file, or none
///
/// Keys compare case-insensitively because editors hand over paths with
/// inconsistent casing.
#[derive(Debug, Clone)]
pub struct ProjectKey {
    config_path: Option<PathBuf>,
    folded: String,
}

impl ProjectKey {
    /// Key for a configuration file; an empty path is the global project
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        let config_path = config_path.into();
        if config_path.as_os_str().is_empty() {
            return Self::global();
        }
        let folded = config_path.to_string_lossy().to_lowercase();
        Self {
            config_path: Some(config_path),
            folded,
        }
    }

    /// The project of files no configuration governs
    pub fn global() -> Self {
        Self {
            config_path: None,
            folded: String::new(),
        }
    }

    pub fn is_global(&self) -> bool {
        self.config_path.is_none()
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}

impl PartialEq for ProjectKey {
    fn eq(&self, other: &Self) -> bool {
        self.folded == other.folded
    }
}

impl Eq for ProjectKey {}

impl Hash for ProjectKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.folded.hash(state);
    }
}

impl fmt::Display for ProjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.config_path {
            Some(path) => write!(f, "{}", path.display()),
            None => write!(f, "<global>"),
        }
    }
}

/// Something observable happened to the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    SessionCreated {
        key: ProjectKey,
        root_files: usize,
    },
    SessionClosed {
        key: ProjectKey,
    },
}

type Listener = Box<dyn Fn(&RegistryEvent) + Send + Sync>;

/// A session behind its own lock
///
/// Holding the lock covers the whole inspect-decide-publish sequence of an
/// update, so concurrent updates to one project cannot interleave.
pub type SharedSession<F> = Arc<Mutex<AnalysisSession<F>>>;

/// One session per project key, created on first use
///
/// Sessions are never evicted on their own; [`close_session`] drops one
/// explicitly.
///
/// [`close_session`]: ProjectServiceRegistry::close_session
pub struct ProjectServiceRegistry<F: EngineFactory> {
    workspace_root: PathBuf,
    loader: ConfigLoader,
    preprocessor: Arc<dyn Preprocessor>,
    factory: Arc<F>,
    sessions: HashMap<ProjectKey, SharedSession<F>>,
    listeners: Vec<Listener>,
}

impl<F: EngineFactory> ProjectServiceRegistry<F> {
    pub fn new(
        workspace_root: impl Into<PathBuf>,
        loader: ConfigLoader,
        preprocessor: Arc<dyn Preprocessor>,
        factory: F,
    ) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            loader,
            preprocessor,
            factory: Arc::new(factory),
            sessions: HashMap::new(),
            listeners: Vec::new(),
        }
    }

    /// Registry for a configured workspace
    pub fn from_config(
        config: &Config,
        fs: Arc<dyn FileSystem>,
        preprocessor: Arc<dyn Preprocessor>,
        factory: F,
    ) -> Self {
        let loader = ConfigLoader::from_settings(fs, &config.settings);
        Self::new(config.workspace_root.clone(), loader, preprocessor, factory)
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Register a callback for registry events
    pub fn subscribe(&mut self, listener: impl Fn(&RegistryEvent) + Send + Sync + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn emit(&self, event: RegistryEvent) {
        for listener in &self.listeners {
            listener(&event);
        }
    }

    /// Key of the project governing `path`
    pub fn resolve_project_key(&self, path: &Path, workspace_root: &Path) -> ProjectKey {
        match self.loader.find_governing_config(path, workspace_root) {
            Some(config_path) => ProjectKey::new(config_path),
            None => ProjectKey::global(),
        }
    }

    /// The session for `key`, creating it on first use
    pub fn get_or_create_session(
        &mut self,
        key: &ProjectKey,
        document_factory: DocumentFactory,
    ) -> Result<SharedSession<F>> {
        if let Some(session) = self.sessions.get(key) {
            return Ok(Arc::clone(session));
        }

        let project = self
            .loader
            .load_compiler_options_and_root_files(key.config_path(), &self.workspace_root);
        let root_files = project.root_files.len();
        let parts = SessionParts {
            project,
            fs: Arc::clone(self.loader.file_system()),
            preprocessor: Arc::clone(&self.preprocessor),
            document_factory,
        };
        let session = AnalysisSession::new(key.clone(), parts, Arc::clone(&self.factory))?;
        let session = Arc::new(Mutex::new(session));
        self.sessions.insert(key.clone(), Arc::clone(&session));

        log::info!(
            "Initialized analysis session for project {} ({} root files)",
            key,
            root_files
        );
        self.emit(RegistryEvent::SessionCreated {
            key: key.clone(),
            root_files,
        });
        Ok(session)
    }

    /// Resolve the project of `path` within the workspace and return its session
    pub fn session_for_path(
        &mut self,
        path: &Path,
        document_factory: DocumentFactory,
    ) -> Result<SharedSession<F>> {
        let key = self.resolve_project_key(path, &self.workspace_root);
        self.get_or_create_session(&key, document_factory)
    }

    pub fn session(&self, key: &ProjectKey) -> Option<SharedSession<F>> {
        self.sessions.get(key).cloned()
    }

    /// Drop a session; outstanding handles keep it alive until released
    pub fn close_session(&mut self, key: &ProjectKey) -> bool {
        if self.sessions.remove(key).is_none() {
            return false;
        }
        log::info!("Closed analysis session for project {}", key);
        self.emit(RegistryEvent::SessionClosed { key: key.clone() });
        true
    }

    /// Keys of all live sessions
    pub fn sessions(&self) -> Vec<ProjectKey> {
        self.sessions.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
