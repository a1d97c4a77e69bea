//! Installed Package Lookup
//!
//! Finds where a package is installed relative to a project so its declared
//! typings can seed the baseline compiler options.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use crate::host::fs::FileSystem;
use crate::host::paths;

/// Where a package lives and what typings it declares
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    pub name: String,
    pub location: PathBuf,
    pub types_path: Option<PathBuf>,
}

/// Looks up installed packages
pub trait PackageLocator: Send + Sync {
    fn locate(&self, name: &str, from: &Path) -> Option<PackageInfo>;
}

#[derive(Debug, Deserialize)]
struct Manifest {
    types: Option<String>,
    typings: Option<String>,
}

/// Walks `node_modules` directories upward from the starting directory
pub struct NodeModulesLocator {
    fs: Arc<dyn FileSystem>,
}

impl NodeModulesLocator {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }
}

impl PackageLocator for NodeModulesLocator {
    fn locate(&self, name: &str, from: &Path) -> Option<PackageInfo> {
        from.ancestors().find_map(|dir| {
            let location = dir.join("node_modules").join(name);
            let raw = self.fs.read_file(&location.join("package.json"))?;
            let manifest: Manifest = match serde_json::from_str(&raw) {
                Ok(manifest) => manifest,
                Err(e) => {
                    log::warn!("Ignoring malformed manifest for package '{}': {}", name, e);
                    return None;
                }
            };
            let types_path = manifest
                .types
                .or(manifest.typings)
                .map(|types| paths::normalize(&location.join(types)));
            Some(PackageInfo {
                name: name.to_string(),
                location,
                types_path,
            })
        })
    }
}

/// Locator that never finds anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPackages;

impl PackageLocator for NoPackages {
    fn locate(&self, _name: &str, _from: &Path) -> Option<PackageInfo> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::fs::MemoryFileSystem;

    #[test]
    fn test_locates_nearest_install() {
        let fs = Arc::new(MemoryFileSystem::with_files([
            ("/ws/node_modules/widget/package.json", r#"{ "types": "./types/index.d.ts" }"#),
            ("/ws/app/node_modules/widget/package.json", r#"{ "typings": "shims.d.ts" }"#),
        ]));
        let locator = NodeModulesLocator::new(fs);

        let nested = locator
            .locate("widget", Path::new("/ws/app/src"))
            .expect("nested install");
        assert_eq!(nested.location, PathBuf::from("/ws/app/node_modules/widget"));
        assert_eq!(
            nested.types_path,
            Some(PathBuf::from("/ws/app/node_modules/widget/shims.d.ts"))
        );

        let outer = locator.locate("widget", Path::new("/ws/lib")).expect("outer install");
        assert_eq!(
            outer.types_path,
            Some(PathBuf::from("/ws/node_modules/widget/types/index.d.ts"))
        );

        assert!(locator.locate("missing", Path::new("/ws/app")).is_none());
        assert!(NoPackages.locate("widget", Path::new("/ws")).is_none());
    }
}
