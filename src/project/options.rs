//! Compiler Options
//!
//! The engine's options are an open-ended JSON object. This wrapper keeps
//! them that way while offering typed accessors for the handful of keys the
//! session itself reads.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Compiler options as one flat JSON object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompilerOptions(Map<String, Value>);

impl CompilerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `layers` in order; later layers win key by key
    pub fn layered<'a>(layers: impl IntoIterator<Item = &'a CompilerOptions>) -> Self {
        let mut merged = Self::new();
        for layer in layers {
            merged.merge(layer);
        }
        merged
    }

    /// Overwrite every key present in `other`
    pub fn merge(&mut self, other: &CompilerOptions) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// `baseUrl`, already absolute once loaded from a project file
    pub fn base_url(&self) -> Option<PathBuf> {
        self.get_str("baseUrl").map(PathBuf::from)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for CompilerOptions {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_later_layers_win() {
        assert!(CompilerOptions::layered([]).is_empty());

        let mut baseline = CompilerOptions::new();
        baseline.set("strict", false).set("target", "ESNext");
        let mut user = CompilerOptions::new();
        user.set("strict", true);
        let mut forced = CompilerOptions::new();
        forced.set("target", "ES2022");

        let merged = CompilerOptions::layered([&baseline, &user, &forced]);
        assert_eq!(merged.get_bool("strict"), Some(true));
        assert_eq!(merged.get_str("target"), Some("ES2022"));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let mut options = CompilerOptions::new();
        options.set("noEmit", true).set("types", json!(["widget"]));

        let value = serde_json::to_value(&options).expect("serialize");
        assert_eq!(value, json!({ "noEmit": true, "types": ["widget"] }));

        let back: CompilerOptions = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, options);
    }
}
