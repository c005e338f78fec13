//! Built-in transforms.
//!
//! Each transform is a plain struct implementing [`Transform`] plus a
//! `from_args` constructor used by the registry.

pub mod add_field;
pub mod chain;
pub mod dedupe;
pub mod identity;
pub mod key_case;
pub mod template;
pub mod uuid_field;

pub use add_field::AddField;
pub use chain::Chain;
pub use dedupe::{KeyComparison, RemoveDuplicates};
pub use identity::Identity;
pub use key_case::{ConvertKeyCase, KeyCase};
pub use template::{DateSettings, Template, TimestampUnits};
pub use uuid_field::AddUuidField;

use serde_json::Value;

use crate::document::Document;
use crate::transform_registry::{Transform, TransformArgs, TransformError, TransformRegistry};

/// Register every built-in transform factory.
pub fn register_builtins(registry: &mut TransformRegistry) {
    registry.register("identity", Box::new(|_args: &TransformArgs| -> Result<Box<dyn Transform>, TransformError> {
        Ok(Box::new(Identity))
    }));
    registry.register("convert_key_case", Box::new(|args: &TransformArgs| -> Result<Box<dyn Transform>, TransformError> {
        Ok(Box::new(ConvertKeyCase::from_args(args)?))
    }));
    registry.register("add_field", Box::new(|args: &TransformArgs| -> Result<Box<dyn Transform>, TransformError> {
        Ok(Box::new(AddField::from_args(args)?))
    }));
    registry.register("add_uuid_field", Box::new(|args: &TransformArgs| -> Result<Box<dyn Transform>, TransformError> {
        Ok(Box::new(AddUuidField::from_args(args)?))
    }));
    registry.register("remove_duplicates", Box::new(|args: &TransformArgs| -> Result<Box<dyn Transform>, TransformError> {
        Ok(Box::new(RemoveDuplicates::from_args(args)?))
    }));
}

/// Apply `f` to a top-level mapping, or to every mapping in a top-level
/// sequence. Anything else is an execution error.
pub(crate) fn for_each_mapping<F>(
    document: Document,
    transform_name: &str,
    mut f: F,
) -> Result<Document, TransformError>
where
    F: FnMut(&mut crate::document::Mapping) -> Result<(), TransformError>,
{
    match document {
        Document::Mapping(mut map) => {
            f(&mut map)?;
            Ok(Document::Mapping(map))
        }
        Document::Sequence(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (index, item) in items.into_iter().enumerate() {
                match item {
                    Document::Mapping(mut map) => {
                        f(&mut map)?;
                        out.push(Document::Mapping(map));
                    }
                    other => {
                        return Err(TransformError::ExecutionError(format!(
                            "{}: item {} is a {}, expected mapping",
                            transform_name,
                            index,
                            other.kind()
                        )));
                    }
                }
            }
            Ok(Document::Sequence(out))
        }
        other => Err(TransformError::ExecutionError(format!(
            "{}: expected mapping or sequence of mappings, got {}",
            transform_name,
            other.kind()
        ))),
    }
}

pub(crate) fn required_str(args: &TransformArgs, key: &str) -> Result<String, TransformError> {
    match optional_str(args, key)? {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(TransformError::InvalidArgs(format!("Missing '{}'", key))),
    }
}

pub(crate) fn optional_str(args: &TransformArgs, key: &str) -> Result<Option<String>, TransformError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(TransformError::InvalidArgs(format!(
            "'{}' must be a string, got {}",
            key, other
        ))),
    }
}

/// Booleans also accept the strings "true"/"false" (any case).
pub(crate) fn optional_bool(args: &TransformArgs, key: &str) -> Result<Option<bool>, TransformError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(Value::String(s)) => match s.to_lowercase().as_str() {
            "true" => Ok(Some(true)),
            "false" => Ok(Some(false)),
            _ => Err(TransformError::InvalidArgs(format!(
                "'{}' must be true or false, got '{}'",
                key, s
            ))),
        },
        Some(other) => Err(TransformError::InvalidArgs(format!(
            "'{}' must be a boolean, got {}",
            key, other
        ))),
    }
}

/// A list of strings, given either as a sequence or a comma-separated string.
pub(crate) fn string_list(args: &TransformArgs, key: &str) -> Result<Vec<String>, TransformError> {
    let items: Vec<String> = match args.get(key) {
        Some(Value::String(s)) => s.split(',').map(|k| k.trim().to_string()).collect(),
        Some(Value::Array(values)) => values
            .iter()
            .map(|v| match v {
                Value::String(s) => Ok(s.trim().to_string()),
                other => Err(TransformError::InvalidArgs(format!(
                    "'{}' entries must be strings, got {}",
                    key, other
                ))),
            })
            .collect::<Result<_, _>>()?,
        None | Some(Value::Null) => Vec::new(),
        Some(other) => {
            return Err(TransformError::InvalidArgs(format!(
                "'{}' must be a list or comma-separated string, got {}",
                key, other
            )))
        }
    };

    Ok(items.into_iter().filter(|k| !k.is_empty()).collect())
}
