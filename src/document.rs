//! Structured document model.
//!
//! A [`Document`] is the decoded, in-memory form of a flow record's content.
//! It is a closed tagged variant so transforms can match on it exhaustively.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value as JsonValue};
use std::fmt;

/// Mapping type used by [`Document::Mapping`].
///
/// Keeps insertion order for encoding. Equality ignores key order.
pub type Mapping = IndexMap<String, Document>;

/// Structured document decoded from a record's byte content.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Document {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Sequence(Vec<Document>),
    Mapping(Mapping),
}

impl Document {
    /// Create an empty mapping document.
    pub fn mapping() -> Self {
        Document::Mapping(Mapping::new())
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Document::Null => "null",
            Document::Bool(_) => "bool",
            Document::Number(_) => "number",
            Document::String(_) => "string",
            Document::Sequence(_) => "sequence",
            Document::Mapping(_) => "mapping",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Document::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Document::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Document::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Document::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Document::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&Vec<Document>> {
        match self {
            Document::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Get a direct child of a mapping by key.
    pub fn get(&self, key: &str) -> Option<&Document> {
        self.as_mapping().and_then(|m| m.get(key))
    }

    /// Look up a nested value by dotted path.
    ///
    /// Segments address mapping keys; numeric segments also index into
    /// sequences. A key that literally contains dots is tried first, so
    /// `{"a.b": 1}` resolves `a.b` without descending.
    ///
    /// # Example
    /// ```
    /// use flowstep::Document;
    /// use serde_json::json;
    ///
    /// let doc = Document::from(json!({"user": {"tags": ["x", "y"]}}));
    /// assert_eq!(doc.lookup("user.tags.1").and_then(|d| d.as_str()), Some("y"));
    /// ```
    pub fn lookup(&self, path: &str) -> Option<&Document> {
        if let Some(value) = self.get(path) {
            return Some(value);
        }

        let mut current = self;
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            current = match current {
                Document::Mapping(m) => m.get(segment)?,
                Document::Sequence(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Render a scalar the way templates expect it.
    ///
    /// Strings render without quotes, null renders empty, containers render
    /// as compact JSON.
    pub fn to_plain_string(&self) -> String {
        match self {
            Document::Null => String::new(),
            Document::Bool(b) => b.to_string(),
            Document::Number(n) => n.to_string(),
            Document::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => write!(f, "{}", json),
            Err(_) => write!(f, "<{}>", self.kind()),
        }
    }
}

impl From<JsonValue> for Document {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Document::Null,
            JsonValue::Bool(b) => Document::Bool(b),
            JsonValue::Number(n) => Document::Number(n),
            JsonValue::String(s) => Document::String(s),
            JsonValue::Array(items) => {
                Document::Sequence(items.into_iter().map(Document::from).collect())
            }
            JsonValue::Object(map) => Document::Mapping(
                map.into_iter()
                    .map(|(k, v)| (k, Document::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<Document> for JsonValue {
    fn from(document: Document) -> Self {
        match document {
            Document::Null => JsonValue::Null,
            Document::Bool(b) => JsonValue::Bool(b),
            Document::Number(n) => JsonValue::Number(n),
            Document::String(s) => JsonValue::String(s),
            Document::Sequence(items) => {
                JsonValue::Array(items.into_iter().map(JsonValue::from).collect())
            }
            Document::Mapping(map) => JsonValue::Object(
                map.into_iter()
                    .map(|(k, v)| (k, JsonValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Document {
    fn from(s: &str) -> Self {
        Document::String(s.to_string())
    }
}

impl From<String> for Document {
    fn from(s: String) -> Self {
        Document::String(s)
    }
}

impl From<bool> for Document {
    fn from(b: bool) -> Self {
        Document::Bool(b)
    }
}

impl From<i64> for Document {
    fn from(n: i64) -> Self {
        Document::Number(n.into())
    }
}

impl From<Vec<Document>> for Document {
    fn from(items: Vec<Document>) -> Self {
        Document::Sequence(items)
    }
}

impl From<Mapping> for Document {
    fn from(map: Mapping) -> Self {
        Document::Mapping(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mapping_equality_ignores_key_order() {
        let a = Document::from(json!({"a": 1, "b": [2, 3]}));
        let b: Document = serde_json::from_str(r#"{"b":[2,3],"a":1}"#).unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn test_sequence_order_matters() {
        let a = Document::from(json!([1, 2]));
        let b = Document::from(json!([2, 1]));

        assert_ne!(a, b);
    }

    #[test]
    fn test_untagged_deserialize_variants() {
        let doc: Document =
            serde_json::from_str(r#"{"n": null, "t": true, "i": -4, "f": 1.5, "s": "x", "l": []}"#)
                .unwrap();

        assert!(doc.get("n").unwrap().is_null());
        assert_eq!(doc.get("t"), Some(&Document::Bool(true)));
        assert_eq!(doc.get("i").and_then(|d| d.as_i64()), Some(-4));
        assert_eq!(doc.get("f").unwrap().kind(), "number");
        assert_eq!(doc.get("s").and_then(|d| d.as_str()), Some("x"));
        assert_eq!(doc.get("l"), Some(&Document::Sequence(vec![])));
    }

    #[test]
    fn test_json_value_conversion_preserves_structure() {
        let value = json!({"a": {"b": [1, "two", null, false]}});
        let doc = Document::from(value.clone());

        assert_eq!(JsonValue::from(doc), value);
    }

    #[test]
    fn test_lookup_dotted_path() {
        let doc = Document::from(json!({
            "order": {"lines": [{"sku": "A1"}, {"sku": "B2"}]},
            "flat.key": "direct"
        }));

        assert_eq!(doc.lookup("order.lines.1.sku").and_then(|d| d.as_str()), Some("B2"));
        assert_eq!(doc.lookup("flat.key").and_then(|d| d.as_str()), Some("direct"));
        assert!(doc.lookup("order.missing").is_none());
        assert!(doc.lookup("order.lines.x").is_none());
    }

    #[test]
    fn test_plain_string_rendering() {
        assert_eq!(Document::Null.to_plain_string(), "");
        assert_eq!(Document::from("abc").to_plain_string(), "abc");
        assert_eq!(Document::from(42_i64).to_plain_string(), "42");
        assert_eq!(Document::from(json!([1, 2])).to_plain_string(), "[1,2]");
    }
}
