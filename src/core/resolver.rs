//! Module Resolution
//!
//! Node-style resolution over a filesystem view in which every templated
//! component `Foo.widget` also appears as its converted twin
//! `Foo.widget.ts`. Resolutions that land on a converted path are rewritten
//! back to the real templated file before the engine sees them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;

use crate::core::document::ScriptKind;
use crate::host::fs::FileSystem;
use crate::host::paths;
use crate::host::preprocess::{self, Preprocessor};
use crate::project::options::CompilerOptions;

/// Extensions appended to extensionless specifiers, in probe order
const PROBE_EXTENSIONS: [&str; 5] = [".ts", ".tsx", ".d.ts", ".js", ".jsx"];

/// Extensions a specifier may already carry
const KNOWN_EXTENSIONS: [&str; 8] = [".ts", ".tsx", ".d.ts", ".js", ".jsx", ".mjs", ".cjs", ".json"];

/// A successfully resolved import
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModule {
    pub resolved_file_name: PathBuf,
    /// Extension the engine should treat the file as having
    pub extension: String,
    pub is_external_library_import: bool,
}

/// Filesystem view that makes converted paths of templated files exist
pub struct TemplatedFileSystem {
    inner: Arc<dyn FileSystem>,
    preprocessor: Arc<dyn Preprocessor>,
}

impl TemplatedFileSystem {
    pub fn new(inner: Arc<dyn FileSystem>, preprocessor: Arc<dyn Preprocessor>) -> Self {
        Self {
            inner,
            preprocessor,
        }
    }
}

impl FileSystem for TemplatedFileSystem {
    fn file_exists(&self, path: &Path) -> bool {
        if paths::is_converted_path(path) {
            return self.inner.file_exists(&paths::to_real_path(path));
        }
        self.inner.file_exists(path)
    }

    fn read_file(&self, path: &Path) -> Option<String> {
        if paths::is_converted_path(path) {
            let real = paths::to_real_path(path);
            let source = self.inner.read_file(&real)?;
            let conversion = preprocess::convert(self.preprocessor.as_ref(), &real, &source);
            return Some(conversion.analyzable_text);
        }
        self.inner.read_file(path)
    }

    fn read_directory(&self, dir: &Path, extensions: &[&str]) -> Vec<PathBuf> {
        self.inner.read_directory(dir, extensions)
    }

    fn get_directories(&self, dir: &Path) -> Vec<PathBuf> {
        self.inner.get_directories(dir)
    }

    fn directory_exists(&self, path: &Path) -> bool {
        self.inner.directory_exists(path)
    }
}

/// Outcome of the default resolution step, before templated rewriting
#[derive(Debug, Clone, PartialEq, Eq)]
struct Resolution {
    path: PathBuf,
    external: bool,
}

type CacheKey = (String, PathBuf);

#[derive(Debug, Deserialize)]
struct PackageManifest {
    types: Option<String>,
    typings: Option<String>,
    main: Option<String>,
}

/// Resolves import specifiers and remembers the answers
///
/// Unresolved specifiers are cached too. Entries live until [`purge`] is
/// called for a path they mention.
///
/// [`purge`]: ModuleResolver::purge
pub struct ModuleResolver {
    fs: Arc<TemplatedFileSystem>,
    cache: RwLock<HashMap<CacheKey, Option<Resolution>>>,
}

impl ModuleResolver {
    pub fn new(fs: Arc<TemplatedFileSystem>) -> Self {
        Self {
            fs,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// The templated filesystem view probes go through
    pub fn file_system(&self) -> &TemplatedFileSystem {
        &self.fs
    }

    /// Resolve a batch of specifiers imported by `containing_file`
    ///
    /// The output has one entry per specifier, in input order. `kind_of`
    /// reports the script kind of a templated file so the rewritten
    /// resolution carries the right extension.
    pub fn resolve_module_names(
        &self,
        specifiers: &[String],
        containing_file: &Path,
        options: &CompilerOptions,
        kind_of: &dyn Fn(&Path) -> ScriptKind,
    ) -> Vec<Option<ResolvedModule>> {
        specifiers
            .iter()
            .map(|specifier| {
                let resolution = self.resolve_cached(specifier, containing_file, options)?;
                Some(Self::to_resolved_module(resolution, kind_of))
            })
            .collect()
    }

    fn resolve_cached(
        &self,
        specifier: &str,
        containing_file: &Path,
        options: &CompilerOptions,
    ) -> Option<Resolution> {
        let key = (specifier.to_string(), containing_file.to_path_buf());
        if let Some(cached) = self.cache.read().get(&key) {
            log::debug!(
                "Resolution cache hit: '{}' from {}",
                specifier,
                containing_file.display()
            );
            return cached.clone();
        }

        let resolution = self.resolve_default(specifier, containing_file, options);
        if resolution.is_none() {
            log::debug!(
                "Cannot resolve '{}' from {}",
                specifier,
                containing_file.display()
            );
        }
        self.cache.write().insert(key, resolution.clone());
        resolution
    }

    fn to_resolved_module(
        resolution: Resolution,
        kind_of: &dyn Fn(&Path) -> ScriptKind,
    ) -> ResolvedModule {
        if paths::is_converted_path(&resolution.path) {
            let real = paths::to_real_path(&resolution.path);
            let extension = match kind_of(&real) {
                ScriptKind::Unknown => ScriptKind::Jsx.extension(),
                kind => kind.extension(),
            };
            return ResolvedModule {
                resolved_file_name: real,
                extension: extension.to_string(),
                is_external_library_import: resolution.external,
            };
        }

        ResolvedModule {
            extension: extension_of(&resolution.path),
            resolved_file_name: resolution.path,
            is_external_library_import: resolution.external,
        }
    }

    /// Drop every cache entry that mentions `path`
    ///
    /// Both entries imported from `path` and entries that resolved to it (or
    /// to its converted twin) are removed. Returns how many were dropped.
    pub fn purge(&self, path: &Path) -> usize {
        let mut cache = self.cache.write();
        let before = cache.len();
        cache.retain(|(_, containing), resolution| {
            if containing == path || paths::to_real_path(containing) == path {
                return false;
            }
            match resolution {
                Some(resolution) => {
                    resolution.path != path && paths::to_real_path(&resolution.path) != path
                }
                None => true,
            }
        });
        let dropped = before - cache.len();
        if dropped > 0 {
            log::debug!(
                "Purged {} resolution(s) mentioning {}",
                dropped,
                path.display()
            );
        }
        dropped
    }

    pub fn cached_len(&self) -> usize {
        self.cache.read().len()
    }

    fn resolve_default(
        &self,
        specifier: &str,
        containing_file: &Path,
        options: &CompilerOptions,
    ) -> Option<Resolution> {
        let directory = containing_file.parent().unwrap_or(Path::new("/"));

        if is_relative(specifier) || Path::new(specifier).is_absolute() {
            let base = paths::normalize(&directory.join(specifier));
            return self.load_file_or_directory(&base).map(|path| Resolution {
                path,
                external: false,
            });
        }

        if let Some(base_url) = options.base_url() {
            let base = paths::normalize(&base_url.join(specifier));
            if let Some(path) = self.load_file_or_directory(&base) {
                return Some(Resolution {
                    path,
                    external: false,
                });
            }
        }

        self.load_node_modules(specifier, directory)
            .map(|path| Resolution {
                path,
                external: true,
            })
    }

    fn load_file_or_directory(&self, base: &Path) -> Option<PathBuf> {
        self.load_as_file(base)
            .or_else(|| self.load_as_directory(base))
    }

    fn load_as_file(&self, base: &Path) -> Option<PathBuf> {
        let name = base.to_string_lossy();

        // `./foo.js` may name a `./foo.ts` source
        for (js, ts) in [(".js", ".ts"), (".jsx", ".tsx")] {
            if let Some(stem) = name.strip_suffix(js) {
                let candidate = PathBuf::from(format!("{}{}", stem, ts));
                if self.fs.file_exists(&candidate) {
                    return Some(candidate);
                }
            }
        }

        if KNOWN_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) && self.fs.file_exists(base) {
            return Some(base.to_path_buf());
        }

        PROBE_EXTENSIONS
            .iter()
            .map(|ext| PathBuf::from(format!("{}{}", name, ext)))
            .find(|candidate| self.fs.file_exists(candidate))
    }

    fn load_as_directory(&self, dir: &Path) -> Option<PathBuf> {
        let manifest_path = dir.join("package.json");
        if let Some(manifest) = self
            .fs
            .read_file(&manifest_path)
            .and_then(|raw| serde_json::from_str::<PackageManifest>(&raw).ok())
        {
            let entry = manifest.types.or(manifest.typings).or(manifest.main);
            if let Some(entry) = entry {
                let target = paths::normalize(&dir.join(entry));
                if let Some(found) = self.load_as_file(&target) {
                    return Some(found);
                }
            }
        }

        self.load_as_file(&dir.join("index"))
    }

    fn load_node_modules(&self, specifier: &str, start: &Path) -> Option<PathBuf> {
        let types_name = types_package_name(specifier);
        for ancestor in start.ancestors() {
            let node_modules = ancestor.join("node_modules");
            if !self.fs.directory_exists(&node_modules) {
                continue;
            }
            if let Some(found) = self.load_file_or_directory(&node_modules.join(specifier)) {
                return Some(found);
            }
            let types = node_modules.join("@types").join(&types_name);
            if let Some(found) = self.load_file_or_directory(&types) {
                return Some(found);
            }
        }
        None
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
}

/// `@scope/pkg` → `scope__pkg`, the `@types` naming convention
fn types_package_name(specifier: &str) -> String {
    match specifier.strip_prefix('@') {
        Some(scoped) => scoped.replacen('/', "__", 1),
        None => specifier.to_string(),
    }
}

fn extension_of(path: &Path) -> String {
    let name = path.to_string_lossy();
    if name.ends_with(".d.ts") {
        return ".d.ts".to_string();
    }
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default()
}
