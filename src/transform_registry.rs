//! Transform trait and registry.
//!
//! A [`Transform`] maps one [`Document`] to another. It is the pluggable
//! business logic of a record transform stage. The [`TransformRegistry`]
//! builds transforms by name from configuration arguments, so a stage can be
//! assembled from YAML without evaluating any code at run time.

use std::collections::HashMap;
use std::fmt;
use serde_json::Value;

use crate::document::Document;
use crate::transforms;

/// Arguments passed to a transform factory.
pub type TransformArgs = HashMap<String, Value>;

/// Error type for transform operations
#[derive(Debug, Clone, PartialEq)]
pub enum TransformError {
    NotFound(String),
    InvalidArgs(String),
    ExecutionError(String),
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformError::NotFound(name) => write!(f, "Transform not found: {}", name),
            TransformError::InvalidArgs(msg) => write!(f, "Invalid arguments: {}", msg),
            TransformError::ExecutionError(msg) => write!(f, "Execution error: {}", msg),
        }
    }
}

impl std::error::Error for TransformError {}

/// Trait for document transforms
///
/// Implementations must be stateless across calls: the same transform value
/// is shared by every worker thread of a stage.
pub trait Transform: Send + Sync {
    /// Map the input document to the output document.
    ///
    /// # Returns
    ///
    /// * `Ok(document)` - The document to write back to the record
    /// * `Err(TransformError)` - The record is routed to failure
    fn apply(&self, document: Document) -> Result<Document, TransformError>;

    /// Name used in logs.
    fn name(&self) -> &str {
        "anonymous"
    }
}

/// Simple function-based implementation of Transform
impl<F> Transform for F
where
    F: Fn(Document) -> Result<Document, TransformError> + Send + Sync,
{
    fn apply(&self, document: Document) -> Result<Document, TransformError> {
        self(document)
    }
}

impl Transform for Box<dyn Transform> {
    fn apply(&self, document: Document) -> Result<Document, TransformError> {
        (**self).apply(document)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Builds a transform from its configuration arguments.
pub type TransformFactory =
    Box<dyn Fn(&TransformArgs) -> Result<Box<dyn Transform>, TransformError> + Send + Sync>;

/// Registry of transform factories keyed by name
pub struct TransformRegistry {
    factories: HashMap<String, TransformFactory>,
}

impl TransformRegistry {
    /// Create a new empty transform registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Create a registry with every built-in transform registered
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        transforms::register_builtins(&mut registry);
        registry
    }

    /// Register a transform factory
    ///
    /// Registering an existing name replaces the previous factory.
    ///
    /// # Example
    ///
    /// ```
    /// use flowstep::{Document, Transform, TransformArgs, TransformError, TransformRegistry};
    ///
    /// let mut registry = TransformRegistry::new();
    /// registry.register("drop_all", Box::new(|_args: &TransformArgs| -> Result<Box<dyn Transform>, TransformError> {
    ///     let transform = |_doc: Document| -> Result<Document, TransformError> {
    ///         Ok(Document::Null)
    ///     };
    ///     Ok(Box::new(transform) as Box<dyn Transform>)
    /// }));
    /// assert!(registry.has_transform("drop_all"));
    /// ```
    pub fn register(&mut self, name: impl Into<String>, factory: TransformFactory) {
        self.factories.insert(name.into(), factory);
    }

    /// Build a registered transform
    ///
    /// # Arguments
    ///
    /// * `name` - Name of the registered transform
    /// * `args` - Arguments for the transform's factory
    ///
    /// # Returns
    ///
    /// * `Ok(transform)` - Ready-to-use transform
    /// * `Err(TransformError::NotFound)` - No factory with that name
    /// * `Err(TransformError::InvalidArgs)` - Factory rejected the arguments
    pub fn build(
        &self,
        name: &str,
        args: &TransformArgs,
    ) -> Result<Box<dyn Transform>, TransformError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| TransformError::NotFound(name.to_string()))?;

        factory(args)
    }

    /// Check if a transform is registered
    pub fn has_transform(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Get a sorted list of all registered transform names
    pub fn list_transforms(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn count(&self) -> usize {
        self.factories.len()
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn uppercase_strings(doc: Document) -> Result<Document, TransformError> {
        match doc {
            Document::String(s) => Ok(Document::String(s.to_uppercase())),
            other => Err(TransformError::ExecutionError(format!(
                "expected string, got {}",
                other.kind()
            ))),
        }
    }

    #[test]
    fn test_function_is_a_transform() {
        let transform: Box<dyn Transform> = Box::new(uppercase_strings);

        assert_eq!(transform.apply(Document::from("hello")).unwrap(), Document::from("HELLO"));
        assert!(transform.apply(Document::Null).is_err());
    }

    #[test]
    fn test_register_and_build_transform() {
        let mut registry = TransformRegistry::new();

        registry.register("uppercase", Box::new(|_args: &TransformArgs| -> Result<Box<dyn Transform>, TransformError> {
            Ok(Box::new(uppercase_strings) as Box<dyn Transform>)
        }));

        let transform = registry.build("uppercase", &TransformArgs::new()).unwrap();
        assert_eq!(transform.apply(Document::from("abc")).unwrap(), Document::from("ABC"));
    }

    #[test]
    fn test_transform_not_found() {
        let registry = TransformRegistry::new();

        let result = registry.build("nonexistent", &TransformArgs::new());

        assert!(matches!(result, Err(TransformError::NotFound(_))));
    }

    #[test]
    fn test_builtins_registered() {
        let registry = TransformRegistry::with_builtins();

        for name in ["identity", "convert_key_case", "add_field", "add_uuid_field", "remove_duplicates"] {
            assert!(registry.has_transform(name), "missing builtin {}", name);
        }
        assert_eq!(registry.list_transforms().first().map(String::as_str), Some("add_field"));
    }

    #[test]
    fn test_factory_rejects_bad_args() {
        let registry = TransformRegistry::with_builtins();
        let mut args = TransformArgs::new();
        args.insert("case".to_string(), json!("shouting"));

        let result = registry.build("convert_key_case", &args);

        assert!(matches!(result, Err(TransformError::InvalidArgs(_))));
    }
}
