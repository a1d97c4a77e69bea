//! Project Configuration Loading
//!
//! Handles:
//! - Finding the configuration file that governs a source file
//! - Parsing it (comments and trailing commas allowed) and following `extends`
//! - Layering options: baseline < project file < forced overrides
//! - Expanding `files`/`include`/`exclude` into the root file list

use std::collections::HashSet;
use std::iter::Peekable;
use std::path::{Path, PathBuf};
use std::str::Chars;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::host::fs::FileSystem;
use crate::host::paths;
use crate::project::options::CompilerOptions;
use crate::project::package::{NodeModulesLocator, PackageLocator};
use crate::project::pattern::PathPattern;

/// Extensions admitted as root files
const ROOT_EXTENSIONS: [&str; 6] = [".ts", ".tsx", ".d.ts", ".js", ".jsx", ".widget"];

/// Directories excluded when a project file names none
const DEFAULT_EXCLUDES: [&str; 3] = ["node_modules", "bower_components", "jspm_packages"];

/// Options holding paths relative to the file that declares them
const PATH_OPTIONS: [&str; 3] = ["baseUrl", "rootDir", "outDir"];

/// Fully merged configuration of one project
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    /// `None` for the global project
    pub config_path: Option<PathBuf>,
    /// Directory relative paths are resolved against
    pub directory: PathBuf,
    pub compiler_options: CompilerOptions,
    pub root_files: Vec<PathBuf>,
}

/// Raw project file as written on disk
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProjectFile {
    #[serde(default)]
    compiler_options: CompilerOptions,
    extends: Option<String>,
    files: Option<Vec<String>>,
    include: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
}

/// A project file with its `extends` chain folded in
///
/// Paths and patterns are absolute, since each level of the chain is
/// relative to its own directory.
#[derive(Debug, Default)]
struct ParsedProjectFile {
    options: CompilerOptions,
    files: Option<Vec<PathBuf>>,
    include: Option<Vec<PathPattern>>,
    exclude: Option<Vec<PathPattern>>,
}

/// Options every project starts from
pub fn baseline_options() -> CompilerOptions {
    let mut options = CompilerOptions::new();
    options
        .set("allowNonTsExtensions", true)
        .set("allowJs", true)
        .set("target", "ESNext")
        .set("module", "ESNext")
        .set("moduleResolution", "node")
        .set("jsx", "preserve");
    options
}

/// Options no project file can override
pub fn forced_options() -> CompilerOptions {
    let mut options = CompilerOptions::new();
    options
        .set("noEmit", true)
        .set("declaration", false)
        .set("skipLibCheck", true)
        .set("jsx", "preserve")
        .set("allowNonTsExtensions", true);
    options
}

/// Locates and merges project configuration
pub struct ConfigLoader {
    fs: Arc<dyn FileSystem>,
    config_file_names: Vec<String>,
    runtime_package: String,
    packages: Arc<dyn PackageLocator>,
}

impl ConfigLoader {
    /// Loader with default settings, finding packages on `fs`
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self::from_settings(fs, &Settings::default())
    }

    pub fn from_settings(fs: Arc<dyn FileSystem>, settings: &Settings) -> Self {
        let packages = Arc::new(NodeModulesLocator::new(Arc::clone(&fs)));
        Self {
            fs,
            config_file_names: settings.config_file_names.clone(),
            runtime_package: settings.runtime_package.clone(),
            packages,
        }
    }

    pub fn with_package_locator(mut self, packages: Arc<dyn PackageLocator>) -> Self {
        self.packages = packages;
        self
    }

    pub fn file_system(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// Nearest configuration file at or above `path`, not leaving
    /// `workspace_root`
    ///
    /// Within one directory the configured file names are tried in order.
    pub fn find_governing_config(&self, path: &Path, workspace_root: &Path) -> Option<PathBuf> {
        let start = if self.fs.directory_exists(path) {
            path
        } else {
            path.parent()?
        };

        for dir in start.ancestors() {
            if !dir.starts_with(workspace_root) {
                break;
            }
            for name in &self.config_file_names {
                let candidate = dir.join(name);
                if self.fs.file_exists(&candidate) {
                    return Some(candidate);
                }
            }
        }
        None
    }

    /// Merge options and collect root files for a project
    ///
    /// `config_path` of `None` is the global project: baseline and forced
    /// options only, no root files. An unreadable or malformed project file
    /// degrades to the same result.
    pub fn load_compiler_options_and_root_files(
        &self,
        config_path: Option<&Path>,
        workspace_root: &Path,
    ) -> ProjectConfig {
        let directory = config_path
            .and_then(Path::parent)
            .unwrap_or(workspace_root)
            .to_path_buf();
        let baseline = self.seeded_baseline(&directory);

        let (user_options, root_files) = match config_path {
            Some(path) => match self.parse_project_file(path) {
                Ok(parsed) => {
                    let root_files = self.collect_root_files(&parsed, &directory);
                    (parsed.options, root_files)
                }
                Err(e) => {
                    log::warn!("{}; using baseline options", e);
                    (CompilerOptions::new(), Vec::new())
                }
            },
            None => (CompilerOptions::new(), Vec::new()),
        };

        if config_path.is_some() && user_options.is_empty() {
            log::debug!("Project {} sets no compiler options", directory.display());
        }
        let compiler_options =
            CompilerOptions::layered([&baseline, &user_options, &forced_options()]);

        log::debug!(
            "Loaded project {} with {} option(s) and {} root file(s)",
            directory.display(),
            compiler_options.len(),
            root_files.len()
        );

        ProjectConfig {
            config_path: config_path.map(Path::to_path_buf),
            directory,
            compiler_options,
            root_files,
        }
    }

    fn seeded_baseline(&self, directory: &Path) -> CompilerOptions {
        let mut options = baseline_options();
        if let Some(types) = self
            .packages
            .locate(&self.runtime_package, directory)
            .and_then(|package| package.types_path)
        {
            options.set("types", json!([types.to_string_lossy()]));
        }
        options
    }

    fn parse_project_file(&self, path: &Path) -> Result<ParsedProjectFile> {
        let mut visited = HashSet::new();
        self.parse_chain(path, &mut visited)
    }

    fn parse_chain(&self, path: &Path, visited: &mut HashSet<PathBuf>) -> Result<ParsedProjectFile> {
        if !visited.insert(path.to_path_buf()) {
            return Err(Error::ConfigCycle {
                path: path.to_path_buf(),
            });
        }

        let raw = self.fs.read_file(path).ok_or_else(|| Error::ConfigRead {
            path: path.to_path_buf(),
        })?;
        let raw: RawProjectFile =
            serde_json::from_str(&strip_json_comments(&raw)).map_err(|e| Error::ConfigParse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        let dir = path.parent().unwrap_or(Path::new("/"));

        let mut parsed = match &raw.extends {
            Some(extends) => {
                let base = self
                    .resolve_extends(extends, dir)
                    .ok_or_else(|| Error::ConfigRead {
                        path: dir.join(extends),
                    })?;
                self.parse_chain(&base, visited)?
            }
            None => ParsedProjectFile::default(),
        };

        let mut options = raw.compiler_options;
        for key in PATH_OPTIONS {
            if let Some(relative) = options.get_str(key).map(str::to_string) {
                let absolute = paths::normalize(&dir.join(relative));
                options.set(key, absolute.to_string_lossy().into_owned());
            }
        }
        parsed.options.merge(&options);

        if let Some(files) = raw.files {
            parsed.files = Some(
                files
                    .iter()
                    .map(|file| paths::normalize(&dir.join(file)))
                    .collect(),
            );
        }
        if let Some(include) = raw.include {
            parsed.include = Some(compile_patterns(path, dir, &include, PathPattern::include)?);
        }
        if let Some(exclude) = raw.exclude {
            parsed.exclude = Some(compile_patterns(path, dir, &exclude, PathPattern::exclude)?);
        }

        Ok(parsed)
    }

    fn resolve_extends(&self, extends: &str, dir: &Path) -> Option<PathBuf> {
        let with_json = |path: PathBuf| -> Option<PathBuf> {
            if self.fs.file_exists(&path) {
                return Some(path);
            }
            let mut json = path.into_os_string();
            json.push(".json");
            let json = PathBuf::from(json);
            self.fs.file_exists(&json).then_some(json)
        };

        if extends.starts_with('.') || Path::new(extends).is_absolute() {
            return with_json(paths::normalize(&dir.join(extends)));
        }

        // Shared configuration published as a package
        dir.ancestors().find_map(|ancestor| {
            let candidate = ancestor.join("node_modules").join(extends);
            with_json(candidate.clone()).or_else(|| with_json(candidate.join("tsconfig.json")))
        })
    }

    fn collect_root_files(&self, parsed: &ParsedProjectFile, dir: &Path) -> Vec<PathBuf> {
        let mut root_files: Vec<PathBuf> = parsed.files.clone().unwrap_or_default();

        let default_include;
        let include: &[PathPattern] = match (&parsed.include, &parsed.files) {
            (Some(include), _) => include.as_slice(),
            (None, Some(_)) => &[],
            (None, None) => {
                default_include = compile_defaults(dir, &["**/*"], PathPattern::include);
                default_include.as_slice()
            }
        };

        let mut exclude = match &parsed.exclude {
            Some(exclude) => exclude.clone(),
            None => compile_defaults(dir, &DEFAULT_EXCLUDES, PathPattern::exclude),
        };
        if let Some(out_dir) = parsed.options.get_str("outDir") {
            exclude.extend(compile_defaults(Path::new(out_dir), &[""], PathPattern::exclude));
        }

        let mut seen: HashSet<PathBuf> = root_files.iter().cloned().collect();
        let mut listed_bases = HashSet::new();
        for pattern in include {
            if !listed_bases.insert(pattern.base().to_path_buf()) {
                continue;
            }
            let mut matched: Vec<PathBuf> = self
                .fs
                .read_directory(pattern.base(), &ROOT_EXTENSIONS)
                .into_iter()
                .filter(|file| include.iter().any(|p| p.is_match(file)))
                .filter(|file| !exclude.iter().any(|p| p.is_match(file)))
                .filter(|file| seen.insert(file.clone()))
                .collect();
            matched.sort();
            root_files.extend(matched);
        }
        root_files
    }
}

fn compile_patterns(
    config_path: &Path,
    dir: &Path,
    patterns: &[String],
    compile: fn(&Path, &str) -> std::result::Result<PathPattern, regex::Error>,
) -> Result<Vec<PathPattern>> {
    patterns
        .iter()
        .map(|pattern| {
            compile(dir, pattern).map_err(|e| Error::ConfigParse {
                path: config_path.to_path_buf(),
                message: format!("invalid pattern '{}': {}", pattern, e),
            })
        })
        .collect()
}

fn compile_defaults(
    dir: &Path,
    patterns: &[&str],
    compile: fn(&Path, &str) -> std::result::Result<PathPattern, regex::Error>,
) -> Vec<PathPattern> {
    patterns
        .iter()
        .filter_map(|pattern| compile(dir, pattern).ok())
        .collect()
}

/// Remove `//` and `/* */` comments and trailing commas outside strings
fn strip_json_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut previous = '\0';
                for next in chars.by_ref() {
                    if previous == '*' && next == '/' {
                        break;
                    }
                    previous = next;
                }
                out.push(' ');
            }
            ',' => {
                if !matches!(next_significant(chars.clone()), Some('}' | ']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// First character after whitespace and comments
fn next_significant(mut chars: Peekable<Chars<'_>>) -> Option<char> {
    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '/' if chars.peek() == Some(&'/') => {
                chars.find(|&next| next == '\n')?;
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut previous = '\0';
                for next in chars.by_ref() {
                    if previous == '*' && next == '/' {
                        break;
                    }
                    previous = next;
                }
            }
            other => return Some(other),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::fs::MemoryFileSystem;
    use crate::project::package::NoPackages;

    fn loader(files: &[(&str, &str)]) -> ConfigLoader {
        let fs = Arc::new(MemoryFileSystem::with_files(files.iter().copied()));
        ConfigLoader::new(fs).with_package_locator(Arc::new(NoPackages))
    }

    #[test]
    fn test_strip_json_comments() {
        let source = r#"{
            // line comment
            "a": "http://x", /* block */
            "b": [1, 2,],
            "c": "quote \" // not a comment",
        }"#;
        let value: serde_json::Value =
            serde_json::from_str(&strip_json_comments(source)).expect("valid json");
        assert_eq!(value["a"], "http://x");
        assert_eq!(value["b"], json!([1, 2]));
        assert_eq!(value["c"], "quote \" // not a comment");
    }

    #[test]
    fn test_nearest_config_wins() {
        let loader = loader(&[
            ("/ws/tsconfig.json", "{}"),
            ("/ws/pkg/jsconfig.json", "{}"),
            ("/ws/pkg/src/a.ts", ""),
            ("/ws/other/b.ts", ""),
        ]);
        let root = Path::new("/ws");

        assert_eq!(
            loader.find_governing_config(Path::new("/ws/pkg/src/a.ts"), root),
            Some(PathBuf::from("/ws/pkg/jsconfig.json"))
        );
        assert_eq!(
            loader.find_governing_config(Path::new("/ws/other/b.ts"), root),
            Some(PathBuf::from("/ws/tsconfig.json"))
        );
    }

    #[test]
    fn test_search_stops_at_workspace_root() {
        let loader = loader(&[("/tsconfig.json", "{}"), ("/ws/src/a.ts", "")]);
        assert_eq!(
            loader.find_governing_config(Path::new("/ws/src/a.ts"), Path::new("/ws")),
            None
        );
    }

    #[test]
    fn test_forced_options_beat_user_options() {
        let loader = loader(&[(
            "/p/tsconfig.json",
            r#"{ "compilerOptions": { "noEmit": false, "strict": true, "jsx": "react", "target": "ES2020" } }"#,
        )]);
        let project = loader
            .load_compiler_options_and_root_files(Some(Path::new("/p/tsconfig.json")), Path::new("/p"));

        let options = &project.compiler_options;
        assert_eq!(options.get_bool("noEmit"), Some(true));
        assert_eq!(options.get_str("jsx"), Some("preserve"));
        assert_eq!(options.get_bool("strict"), Some(true));
        assert_eq!(options.get_str("target"), Some("ES2020"));
        assert_eq!(options.get_bool("allowJs"), Some(true));
    }

    #[test]
    fn test_malformed_config_falls_back_to_baseline() {
        let loader = loader(&[("/p/tsconfig.json", "{ not json"), ("/p/a.ts", "")]);
        let project = loader
            .load_compiler_options_and_root_files(Some(Path::new("/p/tsconfig.json")), Path::new("/p"));

        assert!(project.root_files.is_empty());
        assert_eq!(
            project.compiler_options,
            CompilerOptions::layered([&baseline_options(), &forced_options()])
        );
    }

    #[test]
    fn test_global_project_has_no_root_files() {
        let loader = loader(&[("/ws/a.ts", "")]);
        let project = loader.load_compiler_options_and_root_files(None, Path::new("/ws"));
        assert!(project.config_path.is_none());
        assert_eq!(project.directory, PathBuf::from("/ws"));
        assert!(project.root_files.is_empty());
        assert_eq!(project.compiler_options.get_bool("skipLibCheck"), Some(true));
    }

    #[test]
    fn test_default_include_and_exclude() {
        let loader = loader(&[
            ("/p/tsconfig.json", "{}"),
            ("/p/src/main.ts", ""),
            ("/p/src/App.widget", ""),
            ("/p/src/style.css", ""),
            ("/p/node_modules/lib/index.d.ts", ""),
        ]);
        let project = loader
            .load_compiler_options_and_root_files(Some(Path::new("/p/tsconfig.json")), Path::new("/p"));

        assert_eq!(
            project.root_files,
            vec![
                PathBuf::from("/p/src/App.widget"),
                PathBuf::from("/p/src/main.ts"),
            ]
        );
    }

    #[test]
    fn test_files_include_exclude_and_out_dir() {
        let loader = loader(&[
            (
                "/p/tsconfig.json",
                r#"{
                    "compilerOptions": { "outDir": "./dist", "baseUrl": "." },
                    "files": ["types/env.d.ts"],
                    "include": ["src", "dist"],
                    "exclude": ["**/*.spec.ts"]
                }"#,
            ),
            ("/p/types/env.d.ts", ""),
            ("/p/src/a.ts", ""),
            ("/p/src/a.spec.ts", ""),
            ("/p/dist/a.js", ""),
        ]);
        let project = loader
            .load_compiler_options_and_root_files(Some(Path::new("/p/tsconfig.json")), Path::new("/p"));

        assert_eq!(
            project.root_files,
            vec![PathBuf::from("/p/types/env.d.ts"), PathBuf::from("/p/src/a.ts")]
        );
        assert_eq!(project.compiler_options.get_str("outDir"), Some("/p/dist"));
        assert_eq!(project.compiler_options.get_str("baseUrl"), Some("/p"));
    }

    #[test]
    fn test_extends_chain_merges_child_last() {
        let loader = loader(&[
            (
                "/p/base/tsconfig.base.json",
                r#"{ "compilerOptions": { "strict": true, "baseUrl": "." }, "include": ["shared"] }"#,
            ),
            (
                "/p/app/tsconfig.json",
                r#"{ "extends": "../base/tsconfig.base", "compilerOptions": { "strict": false } }"#,
            ),
            ("/p/base/shared/util.ts", ""),
            ("/p/app/src/main.ts", ""),
        ]);
        let project = loader.load_compiler_options_and_root_files(
            Some(Path::new("/p/app/tsconfig.json")),
            Path::new("/p"),
        );

        assert_eq!(project.compiler_options.get_bool("strict"), Some(false));
        assert_eq!(project.compiler_options.get_str("baseUrl"), Some("/p/base"));
        assert_eq!(project.root_files, vec![PathBuf::from("/p/base/shared/util.ts")]);
    }

    #[test]
    fn test_extends_cycle_degrades() {
        let loader = loader(&[
            ("/p/a.json", r#"{ "extends": "./b.json", "compilerOptions": { "strict": true } }"#),
            ("/p/b.json", r#"{ "extends": "./a.json" }"#),
        ]);
        let project =
            loader.load_compiler_options_and_root_files(Some(Path::new("/p/a.json")), Path::new("/p"));
        assert_eq!(project.compiler_options.get_bool("strict"), None);
    }

    #[test]
    fn test_runtime_package_types_seed_baseline() {
        let fs = Arc::new(MemoryFileSystem::with_files([
            ("/p/tsconfig.json", "{}"),
            ("/p/node_modules/widget/package.json", r#"{ "types": "index.d.ts" }"#),
        ]));
        let loader = ConfigLoader::new(fs);
        let project = loader
            .load_compiler_options_and_root_files(Some(Path::new("/p/tsconfig.json")), Path::new("/p"));

        assert_eq!(
            project.compiler_options.get("types"),
            Some(&json!(["/p/node_modules/widget/index.d.ts"]))
        );
    }
}
