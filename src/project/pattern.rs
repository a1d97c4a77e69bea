//! Include/Exclude Patterns
//!
//! Glob patterns from project files (`src/**/*`, `*.spec.ts`, `dist`)
//! compiled to anchored regexes over absolute, slash-separated paths.

use std::path::{Path, PathBuf};

use regex::Regex;

use crate::host::paths;

/// A compiled `include` or `exclude` entry
#[derive(Debug, Clone)]
pub struct PathPattern {
    regex: Regex,
    base: PathBuf,
}

fn has_wildcard(segment: &str) -> bool {
    segment.contains(['*', '?'])
}

fn to_slashes(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

impl PathPattern {
    /// Compile an include pattern rooted at `dir`
    ///
    /// A final segment without wildcards or an extension names a directory
    /// and matches everything beneath it.
    pub fn include(dir: &Path, pattern: &str) -> Result<Self, regex::Error> {
        let mut absolute = to_slashes(&paths::normalize(&dir.join(pattern)));
        let last = absolute.rsplit('/').next().unwrap_or_default();
        if !has_wildcard(last) && !last.contains('.') {
            absolute.push_str("/**/*");
        }
        Self::compile(&absolute, "$")
    }

    /// Compile an exclude pattern rooted at `dir`; it also matches anything
    /// beneath a matched directory
    pub fn exclude(dir: &Path, pattern: &str) -> Result<Self, regex::Error> {
        let absolute = to_slashes(&paths::normalize(&dir.join(pattern)));
        Self::compile(absolute.trim_end_matches('/'), "(?:/.*)?$")
    }

    fn compile(pattern: &str, suffix: &str) -> Result<Self, regex::Error> {
        let segments: Vec<&str> = pattern.split('/').collect();
        let mut source = String::from("^");
        let mut base = Vec::new();
        let mut literal = true;

        for (i, segment) in segments.iter().enumerate() {
            let is_last = i + 1 == segments.len();
            if *segment == "**" {
                literal = false;
                source.push_str("(?:[^/]*/)*");
                continue;
            }
            if has_wildcard(segment) {
                literal = false;
            }
            if literal && !is_last {
                base.push(*segment);
            }
            for c in segment.chars() {
                match c {
                    '*' => source.push_str("[^/]*"),
                    '?' => source.push_str("[^/]"),
                    other => source.push_str(&regex::escape(&other.to_string())),
                }
            }
            if !is_last {
                source.push('/');
            }
        }
        source.push_str(suffix);

        let base = if base.len() == 1 && base[0].is_empty() {
            PathBuf::from("/")
        } else {
            PathBuf::from(base.join("/"))
        };

        Ok(Self {
            regex: Regex::new(&source)?,
            base,
        })
    }

    pub fn is_match(&self, path: &Path) -> bool {
        self.regex.is_match(&to_slashes(path))
    }

    /// Deepest directory that contains every match
    pub fn base(&self) -> &Path {
        &self.base
    }
}
