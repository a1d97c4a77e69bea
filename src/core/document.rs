//! Document Snapshots
//!
//! Immutable, versioned views of tracked files and the store that holds
//! exactly one of them per path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::host::fs::FileSystem;
use crate::host::paths;
use crate::host::preprocess::{self, Preprocessor};

/// An editor document handed to a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub path: PathBuf,
    pub version: i32,
    pub content: String,
}

impl Document {
    pub fn new(path: impl Into<PathBuf>, version: i32, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            version,
            content: content.into(),
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.path
    }
}

/// Builds a [`Document`] for a file that is not open in the editor
pub type DocumentFactory = Arc<dyn Fn(&Path, String) -> Document + Send + Sync>;

/// Factory that wraps disk content as a version-0 document
pub fn default_document_factory() -> DocumentFactory {
    Arc::new(|path: &Path, content: String| Document::new(path, 0, content))
}

/// Syntax dialect the engine parses a file as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptKind {
    Unknown,
    Js,
    Jsx,
    Ts,
    Tsx,
    Json,
}

impl ScriptKind {
    /// Classify a plain script file by its extension
    pub fn from_path(path: &Path) -> Self {
        let name = path.to_string_lossy();
        if name.ends_with(".d.ts") {
            return ScriptKind::Ts;
        }
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("ts" | "mts" | "cts") => ScriptKind::Ts,
            Some("tsx") => ScriptKind::Tsx,
            Some("js" | "mjs" | "cjs") => ScriptKind::Js,
            Some("jsx") => ScriptKind::Jsx,
            Some("json") => ScriptKind::Json,
            _ => ScriptKind::Unknown,
        }
    }

    /// Extension the engine associates with this kind
    pub fn extension(self) -> &'static str {
        match self {
            ScriptKind::Ts => ".ts",
            ScriptKind::Tsx => ".tsx",
            ScriptKind::Js => ".js",
            ScriptKind::Jsx => ".jsx",
            ScriptKind::Json => ".json",
            ScriptKind::Unknown => "",
        }
    }
}

/// Where a snapshot's content came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOrigin {
    /// Authoritative content pushed by the editor
    Editor,
    /// Read from disk on demand
    Disk,
}

/// Immutable analyzable view of one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSnapshot {
    pub path: PathBuf,
    pub version: i32,
    pub analyzable_text: String,
    pub script_kind: ScriptKind,
    pub origin: SnapshotOrigin,
    /// Whether preprocessing succeeded; always true for plain scripts
    pub converted: bool,
}

impl DocumentSnapshot {
    /// Build a snapshot, routing templated files through the preprocessor
    pub fn from_document(
        document: Document,
        origin: SnapshotOrigin,
        preprocessor: &dyn Preprocessor,
    ) -> Self {
        let Document {
            path,
            version,
            content,
        } = document;

        if paths::is_templated_file(&path) {
            let conversion = preprocess::convert(preprocessor, &path, &content);
            return Self {
                path,
                version,
                analyzable_text: conversion.analyzable_text,
                script_kind: conversion.script_kind,
                origin,
                converted: conversion.ok,
            };
        }

        let script_kind = ScriptKind::from_path(&path);
        Self {
            path,
            version,
            analyzable_text: content,
            script_kind,
            origin,
            converted: true,
        }
    }

    /// Build a snapshot for a file that is not open in the editor
    pub fn load(
        path: &Path,
        fs: &dyn FileSystem,
        factory: &DocumentFactory,
        preprocessor: &dyn Preprocessor,
    ) -> Option<Self> {
        let content = fs.read_file(path)?;
        let document = factory(path, content);
        Some(Self::from_document(
            document,
            SnapshotOrigin::Disk,
            preprocessor,
        ))
    }
}

/// One snapshot per tracked path
///
/// Snapshots are shared as `Arc`s and never mutated: `set` swaps the entry
/// wholesale, so earlier holders keep the view they were given.
#[derive(Debug, Default)]
pub struct DocumentSnapshotStore {
    snapshots: HashMap<PathBuf, Arc<DocumentSnapshot>>,
}

impl DocumentSnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &Path) -> Option<Arc<DocumentSnapshot>> {
        self.snapshots.get(path).cloned()
    }

    /// Publish a snapshot under its own path, returning the one it replaced
    pub fn set(&mut self, snapshot: Arc<DocumentSnapshot>) -> Option<Arc<DocumentSnapshot>> {
        log::debug!(
            "Publishing snapshot {} v{}",
            snapshot.path.display(),
            snapshot.version
        );
        self.snapshots.insert(snapshot.path.clone(), snapshot)
    }

    pub fn remove(&mut self, path: &Path) -> Option<Arc<DocumentSnapshot>> {
        self.snapshots.remove(path)
    }

    /// Return the tracked snapshot, or build and track one with `load`
    pub fn get_or_load(
        &mut self,
        path: &Path,
        load: impl FnOnce() -> Option<DocumentSnapshot>,
    ) -> Option<Arc<DocumentSnapshot>> {
        if let Some(existing) = self.snapshots.get(path) {
            return Some(Arc::clone(existing));
        }
        let snapshot = Arc::new(load()?);
        self.snapshots
            .insert(path.to_path_buf(), Arc::clone(&snapshot));
        Some(snapshot)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.snapshots.contains_key(path)
    }

    /// Tracked paths in sorted order
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.snapshots.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
