use std::collections::HashSet;

use crate::document::Document;
use crate::transform_registry::{Transform, TransformArgs, TransformError};
use super::{optional_str, string_list};

/// How key values are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyComparison {
    /// Compare the text form of each value, so `1` and `"1"` are equal
    #[default]
    Text,
    /// Compare values with their types, so `1` and `"1"` differ
    Typed,
}

impl KeyComparison {
    pub fn parse(s: &str) -> Result<Self, TransformError> {
        match s.to_lowercase().as_str() {
            "text" => Ok(KeyComparison::Text),
            "typed" => Ok(KeyComparison::Typed),
            _ => Err(TransformError::InvalidArgs(format!(
                "Unknown comparison '{}' (expected text or typed)",
                s
            ))),
        }
    }

    fn key_part(self, value: Option<&Document>) -> String {
        match self {
            KeyComparison::Typed => value.unwrap_or(&Document::Null).to_string(),
            KeyComparison::Text => match value {
                None | Some(Document::Null) => "None".to_string(),
                Some(Document::Bool(true)) => "True".to_string(),
                Some(Document::Bool(false)) => "False".to_string(),
                Some(other) => other.to_plain_string(),
            },
        }
    }
}

/// Removes duplicate items from a top-level sequence.
///
/// Two items are duplicates when they have equal values for every key in
/// `keys` (a missing key counts as null). The last occurrence is kept and
/// the relative order of kept items is preserved. Every item must be a
/// mapping. Documents that are not sequences pass through unchanged.
#[derive(Debug, Clone)]
pub struct RemoveDuplicates {
    keys: Vec<String>,
    comparison: KeyComparison,
}

impl RemoveDuplicates {
    pub fn new(keys: Vec<String>) -> Result<Self, TransformError> {
        if keys.is_empty() {
            return Err(TransformError::InvalidArgs(
                "At least one key is required".to_string(),
            ));
        }
        Ok(Self {
            keys,
            comparison: KeyComparison::default(),
        })
    }

    pub fn with_comparison(mut self, comparison: KeyComparison) -> Self {
        self.comparison = comparison;
        self
    }

    /// Arguments: `keys` as a list or a comma-separated string, optional
    /// `compare` (`text` or `typed`).
    pub fn from_args(args: &TransformArgs) -> Result<Self, TransformError> {
        let transform = Self::new(string_list(args, "keys")?)?;
        match optional_str(args, "compare")? {
            Some(compare) => Ok(transform.with_comparison(KeyComparison::parse(&compare)?)),
            None => Ok(transform),
        }
    }

    fn key_of(&self, index: usize, item: &Document) -> Result<Vec<String>, TransformError> {
        let map = item.as_mapping().ok_or_else(|| {
            TransformError::ExecutionError(format!(
                "remove_duplicates: item {} is a {}, expected mapping",
                index,
                item.kind()
            ))
        })?;

        Ok(self
            .keys
            .iter()
            .map(|k| self.comparison.key_part(map.get(k)))
            .collect())
    }
}

impl Transform for RemoveDuplicates {
    fn apply(&self, document: Document) -> Result<Document, TransformError> {
        let items = match document {
            Document::Sequence(items) => items,
            other => return Ok(other),
        };

        let mut seen = HashSet::with_capacity(items.len());
        let mut kept = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate().rev() {
            if seen.insert(self.key_of(index, &item)?) {
                kept.push(item);
            }
        }
        kept.reverse();

        Ok(Document::Sequence(kept))
    }

    fn name(&self) -> &str {
        "remove_duplicates"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn by_id() -> RemoveDuplicates {
        RemoveDuplicates::new(vec!["id".to_string()]).unwrap()
    }

    #[test]
    fn test_keeps_last_occurrence_in_order() {
        let input = Document::from(json!([
            {"id": 1, "v": "a"},
            {"id": 2, "v": "b"},
            {"id": 1, "v": "c"},
            {"id": 3, "v": "d"}
        ]));

        let output = by_id().apply(input).unwrap();

        assert_eq!(output, Document::from(json!([
            {"id": 2, "v": "b"},
            {"id": 1, "v": "c"},
            {"id": 3, "v": "d"}
        ])));
    }

    #[test]
    fn test_composite_keys_and_missing_values() {
        let transform = RemoveDuplicates::new(vec!["a".to_string(), "b".to_string()]).unwrap();
        let input = Document::from(json!([
            {"a": 1, "b": 1},
            {"a": 1, "b": 2},
            {"a": 1},
            {"a": 1, "b": null}
        ]));

        let output = transform.apply(input).unwrap();

        assert_eq!(output.as_sequence().unwrap().len(), 3);
    }

    #[test]
    fn test_text_comparison_matches_number_and_string() {
        let input = Document::from(json!([{"id": 1, "v": "a"}, {"id": "1", "v": "b"}]));

        let output = by_id().apply(input).unwrap();

        assert_eq!(output, Document::from(json!([{"id": "1", "v": "b"}])));
    }

    #[test]
    fn test_typed_comparison_keeps_number_and_string() {
        let transform = by_id().with_comparison(KeyComparison::Typed);
        let input = Document::from(json!([{"id": 1}, {"id": "1"}]));

        assert_eq!(transform.apply(input).unwrap().as_sequence().unwrap().len(), 2);
    }

    #[test]
    fn test_compare_argument() {
        let args: TransformArgs =
            serde_json::from_value(json!({"keys": "id", "compare": "typed"})).unwrap();
        let transform = RemoveDuplicates::from_args(&args).unwrap();
        assert_eq!(transform.comparison, KeyComparison::Typed);

        let args: TransformArgs =
            serde_json::from_value(json!({"keys": "id", "compare": "loose"})).unwrap();
        assert!(RemoveDuplicates::from_args(&args).is_err());
    }

    #[test]
    fn test_non_mapping_items_are_rejected() {
        let input = Document::from(json!([1, 2, 3, "x"]));

        let err = by_id().apply(input).unwrap_err();

        assert_eq!(
            err,
            TransformError::ExecutionError(
                "remove_duplicates: item 3 is a string, expected mapping".to_string()
            )
        );
    }

    #[test]
    fn test_non_sequence_unchanged() {
        let input = Document::from(json!({"id": 1}));

        assert_eq!(by_id().apply(input.clone()).unwrap(), input);
    }

    #[test]
    fn test_requires_keys() {
        assert!(RemoveDuplicates::new(Vec::new()).is_err());
    }
}
