use crate::document::Document;
use crate::transform_registry::{Transform, TransformError};

/// Returns its input unchanged. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Transform for Identity {
    fn apply(&self, document: Document) -> Result<Document, TransformError> {
        Ok(document)
    }

    fn name(&self) -> &str {
        "identity"
    }
}
