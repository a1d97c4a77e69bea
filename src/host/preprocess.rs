//! Templated Source Preprocessing
//!
//! Contract for the external step that turns a templated component into
//! text the engine can analyze.

use std::path::Path;

use crate::core::document::ScriptKind;

/// Result of converting one templated file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    pub analyzable_text: String,
    pub script_kind: ScriptKind,
    pub ok: bool,
}

impl Conversion {
    /// A successful conversion
    pub fn converted(analyzable_text: impl Into<String>, script_kind: ScriptKind) -> Self {
        Self {
            analyzable_text: analyzable_text.into(),
            script_kind,
            ok: true,
        }
    }

    /// A failed conversion: empty text so the file contributes nothing
    pub fn failed(script_kind: ScriptKind) -> Self {
        Self {
            analyzable_text: String::new(),
            script_kind,
            ok: false,
        }
    }
}

/// Converts templated component source into analyzable text
///
/// Implementations must not panic on malformed input; they report failure
/// through [`Conversion::ok`] instead.
pub trait Preprocessor: Send + Sync {
    fn preprocess(&self, path: &Path, source: &str) -> Conversion;
}

impl<F> Preprocessor for F
where
    F: Fn(&Path, &str) -> Conversion + Send + Sync,
{
    fn preprocess(&self, path: &Path, source: &str) -> Conversion {
        self(path, source)
    }
}

/// Run the preprocessor and enforce the failure contract
///
/// A failed conversion always yields empty analyzable text, even if the
/// collaborator returned partial output.
pub fn convert(preprocessor: &dyn Preprocessor, path: &Path, source: &str) -> Conversion {
    let conversion = preprocessor.preprocess(path, source);
    if conversion.ok {
        return conversion;
    }
    log::warn!(
        "Preprocessing failed for {}, analyzing it as empty",
        path.display()
    );
    Conversion::failed(conversion.script_kind)
}
