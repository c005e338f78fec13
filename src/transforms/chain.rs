use crate::document::Document;
use crate::transform_registry::{Transform, TransformError};

/// Applies transforms in order. The first failing step aborts the chain.
///
/// An empty chain behaves like identity.
#[derive(Default)]
pub struct Chain {
    steps: Vec<Box<dyn Transform>>,
}

impl Chain {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn then(mut self, step: impl Transform + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn push(&mut self, step: Box<dyn Transform>) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Names of the steps, in order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }
}

impl Transform for Chain {
    fn apply(&self, document: Document) -> Result<Document, TransformError> {
        let mut current = document;
        for (index, step) in self.steps.iter().enumerate() {
            current = step.apply(current).map_err(|e| match e {
                TransformError::ExecutionError(msg) => TransformError::ExecutionError(format!(
                    "step {} ({}): {}",
                    index + 1,
                    step.name(),
                    msg
                )),
                other => other,
            })?;
        }
        Ok(current)
    }

    fn name(&self) -> &str {
        "chain"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::{ConvertKeyCase, Identity, KeyCase};
    use serde_json::json;

    #[test]
    fn test_empty_chain_is_identity() {
        let doc = Document::from(json!({"A": 1}));
        assert_eq!(Chain::new().apply(doc.clone()).unwrap(), doc);
    }

    #[test]
    fn test_steps_run_in_order() {
        let append = |doc: Document| -> Result<Document, TransformError> {
            let mut map = doc.as_mapping().cloned().unwrap_or_default();
            map.insert("Added".to_string(), Document::from(true));
            Ok(Document::Mapping(map))
        };
        let chain = Chain::new()
            .then(append)
            .then(ConvertKeyCase::new(KeyCase::Lower))
            .then(Identity);

        let output = chain.apply(Document::from(json!({"X": 1}))).unwrap();

        assert_eq!(output, Document::from(json!({"x": 1, "added": true})));
        assert_eq!(chain.step_names(), vec!["anonymous", "convert_key_case", "identity"]);
    }

    #[test]
    fn test_failure_names_step() {
        let fail = |_doc: Document| -> Result<Document, TransformError> {
            Err(TransformError::ExecutionError("nope".to_string()))
        };
        let chain = Chain::new().then(Identity).then(fail);

        let err = chain.apply(Document::Null).unwrap_err();

        assert_eq!(err, TransformError::ExecutionError("step 2 (anonymous): nope".to_string()));
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain").field("steps", &self.steps.len()).finish()
    }
}
