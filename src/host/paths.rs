//! Templated File Paths
//!
//! The engine only understands ordinary script files, so every templated
//! component `Foo.widget` is presented to it under the converted path
//! `Foo.widget.ts`. These helpers translate between the two spellings.

use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

/// Extension of templated component files, without the dot
pub const TEMPLATED_EXTENSION: &str = "widget";

static CONVERTED_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<real>.+\.widget)\.ts$").expect("converted path pattern is valid")
});

/// Whether `path` names a templated component file
pub fn is_templated_file(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some(TEMPLATED_EXTENSION)
}

/// Whether `path` is the converted spelling of a templated file
pub fn is_converted_path(path: &Path) -> bool {
    path.to_str().is_some_and(|p| CONVERTED_PATH.is_match(p))
}

/// `Foo.widget.ts` → `Foo.widget`; other paths are returned unchanged
pub fn to_real_path(path: &Path) -> PathBuf {
    path.to_str()
        .and_then(|p| CONVERTED_PATH.captures(p))
        .and_then(|captures| captures.name("real"))
        .map(|real| PathBuf::from(real.as_str()))
        .unwrap_or_else(|| path.to_path_buf())
}

/// Lexically resolve `.` and `..` components without touching disk
pub fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => normalized.push(component),
            },
            other => normalized.push(other),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templated_detection() {
        assert!(is_templated_file(Path::new("/proj/src/App.widget")));
        assert!(!is_templated_file(Path::new("/proj/src/App.widget.ts")));
        assert!(!is_templated_file(Path::new("/proj/src/app.ts")));
    }

    #[test]
    fn test_converted_round_trip() {
        let real = Path::new("/proj/src/App.widget");
        let converted = Path::new("/proj/src/App.widget.ts");
        assert!(is_converted_path(converted));
        assert_eq!(to_real_path(converted), real);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize(Path::new("/proj/src/../lib/./util.ts")),
            PathBuf::from("/proj/lib/util.ts")
        );
        assert_eq!(normalize(Path::new("a/../../b")), PathBuf::from("../b"));
        assert_eq!(normalize(Path::new("../../b")), PathBuf::from("../../b"));
        assert_eq!(normalize(Path::new("/../b")), PathBuf::from("/b"));
    }

    #[test]
    fn test_plain_paths_untouched() {
        let plain = Path::new("/proj/src/main.ts");
        assert!(!is_converted_path(plain));
        assert_eq!(to_real_path(plain), plain);
        assert!(!is_converted_path(Path::new("/proj/src/App.widget.tsx")));
    }
}
