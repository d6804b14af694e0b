//! Cache namespaces, fingerprints and key derivation

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;

/// The three cache namespaces, each stored in its own subdirectory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    /// LLM prompt responses
    Llm,
    /// Upstream API responses
    Api,
    /// Generated reports
    Reports,
}

impl Namespace {
    /// All namespaces, in directory order
    pub const ALL: [Namespace; 3] = [Namespace::Llm, Namespace::Api, Namespace::Reports];

    /// Directory name for this namespace
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Llm => "llm",
            Namespace::Api => "api",
            Namespace::Reports => "reports",
        }
    }

    /// Parses a namespace name as used on disk and on the command line
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "llm" => Some(Namespace::Llm),
            "api" => Some(Namespace::Api),
            "reports" | "report" => Some(Namespace::Reports),
            _ => None,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied key material from which a cache key is derived
///
/// Mappings are canonicalized with sorted keys, so two mappings with the same
/// entries always produce the same key regardless of insertion order.
#[derive(Debug, Clone, PartialEq)]
pub enum Fingerprint {
    /// Free-form text, e.g. an LLM prompt
    Text(String),
    /// Structured parameters, e.g. `{"ticker": "AAPL"}`
    Fields(Map<String, Value>),
}

impl Fingerprint {
    /// Builds a fingerprint from an arbitrary JSON value
    ///
    /// Objects become [`Fingerprint::Fields`], strings stay text, and every
    /// other value is stringified.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Fingerprint::Fields(map),
            Value::String(s) => Fingerprint::Text(s),
            other => Fingerprint::Text(other.to_string()),
        }
    }

    /// Canonical text form that gets hashed
    pub fn canonical(&self) -> String {
        match self {
            Fingerprint::Text(text) => text.clone(),
            Fingerprint::Fields(map) => {
                let mut out = String::new();
                write_canonical_object(map, &mut out);
                out
            }
        }
    }

    /// Derives the cache key for this fingerprint within `namespace`
    pub fn key(&self, namespace: Namespace) -> String {
        let mut hasher = Sha256::new();
        hasher.update(namespace.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(self.canonical().as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl From<&str> for Fingerprint {
    fn from(text: &str) -> Self {
        Fingerprint::Text(text.to_string())
    }
}

impl From<String> for Fingerprint {
    fn from(text: String) -> Self {
        Fingerprint::Text(text)
    }
}

impl From<Map<String, Value>> for Fingerprint {
    fn from(map: Map<String, Value>) -> Self {
        Fingerprint::Fields(map)
    }
}

impl From<Value> for Fingerprint {
    fn from(value: Value) -> Self {
        Fingerprint::from_value(value)
    }
}

/// Writes `value` as compact JSON with object keys sorted at every depth
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => write_canonical_object(map, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn write_canonical_object(map: &Map<String, Value>, out: &mut String) {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();

    out.push('{');
    for (i, key) in keys.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&Value::String(key.clone()).to_string());
        out.push(':');
        write_canonical(&map[key], out);
    }
    out.push('}');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_ignores_mapping_order() {
        let a = Fingerprint::from(json!({"a": 1, "b": 2}));
        let b = Fingerprint::from(json!({"b": 2, "a": 1}));

        assert_eq!(a.key(Namespace::Api), b.key(Namespace::Api));
    }

    #[test]
    fn test_key_ignores_nested_mapping_order() {
        let a = Fingerprint::from(json!({"api": "finnhub", "params": {"ticker": "AAPL", "range": "1d"}}));
        let b = Fingerprint::from(json!({"params": {"range": "1d", "ticker": "AAPL"}, "api": "finnhub"}));

        assert_eq!(a.canonical(), b.canonical());
        assert_eq!(a.key(Namespace::Api), b.key(Namespace::Api));
    }

    #[test]
    fn test_key_differs_by_namespace() {
        let fp = Fingerprint::from("same prompt");
        assert_ne!(fp.key(Namespace::Llm), fp.key(Namespace::Reports));
    }

    #[test]
    fn test_key_differs_by_content() {
        let a = Fingerprint::from(json!({"ticker": "AAPL"}));
        let b = Fingerprint::from(json!({"ticker": "MSFT"}));
        assert_ne!(a.key(Namespace::Api), b.key(Namespace::Api));
    }

    #[test]
    fn test_key_is_sha256_hex() {
        let key = Fingerprint::from("prompt").key(Namespace::Llm);
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_canonical_form_is_compact_sorted_json() {
        let fp = Fingerprint::from(json!({"b": [1, {"d": 4, "c": 3}], "a": "x"}));
        assert_eq!(fp.canonical(), r#"{"a":"x","b":[1,{"c":3,"d":4}]}"#);
    }

    #[test]
    fn test_from_value_stringifies_scalars() {
        assert_eq!(Fingerprint::from(json!(42)), Fingerprint::Text("42".to_string()));
        assert_eq!(
            Fingerprint::from(json!("AAPL")),
            Fingerprint::Text("AAPL".to_string())
        );
    }

    #[test]
    fn test_namespace_from_str() {
        assert_eq!(Namespace::from_str("llm"), Some(Namespace::Llm));
        assert_eq!(Namespace::from_str("API"), Some(Namespace::Api));
        assert_eq!(Namespace::from_str("reports"), Some(Namespace::Reports));
        assert_eq!(Namespace::from_str("embeddings"), None);
    }
}
