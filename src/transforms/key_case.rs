//! Recursive key case conversion.

use convert_case::{Case, Casing};

use crate::document::{Document, Mapping};
use crate::transform_registry::{Transform, TransformArgs, TransformError};
use super::{optional_bool, optional_str};

/// Target case for mapping keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCase {
    /// Plain lowercasing of the whole key (`userId` -> `userid`)
    Lower,
    /// Plain uppercasing of the whole key (`userId` -> `USERID`)
    Upper,
    Snake,
    Camel,
    Pascal,
    Kebab,
}

impl KeyCase {
    pub fn parse(s: &str) -> Result<Self, TransformError> {
        match s.to_lowercase().as_str() {
            "lower" => Ok(KeyCase::Lower),
            "upper" => Ok(KeyCase::Upper),
            "snake" => Ok(KeyCase::Snake),
            "camel" => Ok(KeyCase::Camel),
            "pascal" => Ok(KeyCase::Pascal),
            "kebab" => Ok(KeyCase::Kebab),
            _ => Err(TransformError::InvalidArgs(format!(
                "Unknown case '{}' (expected lower, upper, snake, camel, pascal or kebab)",
                s
            ))),
        }
    }

    pub fn convert(self, key: &str) -> String {
        match self {
            KeyCase::Lower => key.to_lowercase(),
            KeyCase::Upper => key.to_uppercase(),
            KeyCase::Snake => key.to_case(Case::Snake),
            KeyCase::Camel => key.to_case(Case::Camel),
            KeyCase::Pascal => key.to_case(Case::Pascal),
            KeyCase::Kebab => key.to_case(Case::Kebab),
        }
    }
}

/// Renames every mapping key, at any depth, to the target case.
///
/// Keys that collide after conversion keep the value of the last one.
#[derive(Debug, Clone)]
pub struct ConvertKeyCase {
    case: KeyCase,
}

impl ConvertKeyCase {
    pub fn new(case: KeyCase) -> Self {
        Self { case }
    }

    /// Build from `case: <name>` or the older `to_lower: true|false` flag.
    /// Defaults to lower case.
    pub fn from_args(args: &TransformArgs) -> Result<Self, TransformError> {
        let case = match (optional_str(args, "case")?, optional_bool(args, "to_lower")?) {
            (Some(case), _) => KeyCase::parse(&case)?,
            (None, Some(false)) => KeyCase::Upper,
            (None, _) => KeyCase::Lower,
        };
        Ok(Self::new(case))
    }

    fn convert(&self, document: Document) -> Document {
        match document {
            Document::Mapping(map) => {
                let mut out = Mapping::with_capacity(map.len());
                for (key, value) in map {
                    out.insert(self.case.convert(&key), self.convert(value));
                }
                Document::Mapping(out)
            }
            Document::Sequence(items) => {
                Document::Sequence(items.into_iter().map(|item| self.convert(item)).collect())
            }
            scalar => scalar,
        }
    }
}

impl Transform for ConvertKeyCase {
    fn apply(&self, document: Document) -> Result<Document, TransformError> {
        Ok(self.convert(document))
    }

    fn name(&self) -> &str {
        "convert_key_case"
    }
}
