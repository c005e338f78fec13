use crate::document::Document;
use crate::transform_registry::{Transform, TransformArgs, TransformError};
use super::template::{DateSettings, Template, TimestampUnits};
use super::{for_each_mapping, optional_str, required_str};

const DEFAULT_DATE_FORMAT: &str = "YYYY-MM-DD HH:mm:ss";

/// Adds a string field rendered from a template.
///
/// Applies to a top-level mapping, or to each mapping of a top-level
/// sequence. An existing field with the same name is overwritten.
#[derive(Debug, Clone)]
pub struct AddField {
    field: String,
    template: Template,
    dates: DateSettings,
}

impl AddField {
    pub fn new(field: impl Into<String>, template: Template, dates: DateSettings) -> Self {
        Self {
            field: field.into(),
            template,
            dates,
        }
    }

    /// Arguments: `field`, `template`, optional `default_date_format`.
    pub fn from_args(args: &TransformArgs) -> Result<Self, TransformError> {
        let field = required_str(args, "field")?;
        let template = Template::parse(&required_str(args, "template")?)?;
        let date_format = optional_str(args, "default_date_format")?
            .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string());

        Ok(Self::new(
            field,
            template,
            DateSettings::new(None, &date_format, TimestampUnits::default()),
        ))
    }
}

impl Transform for AddField {
    fn apply(&self, document: Document) -> Result<Document, TransformError> {
        for_each_mapping(document, "add_field", |map| {
            let value = self.template.render(&Document::Mapping(map.clone()), &self.dates);
            map.insert(self.field.clone(), Document::String(value));
            Ok(())
        })
    }

    fn name(&self) -> &str {
        "add_field"
    }
}
