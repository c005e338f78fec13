use md5::{Digest, Md5};
use uuid::Uuid;

use crate::document::Document;
use crate::transform_registry::{Transform, TransformArgs, TransformError};
use super::template::{DateSettings, Template, TimestampUnits};
use super::{for_each_mapping, optional_str, required_str};

const DEFAULT_INPUT_DATE_FORMAT: &str = "YYYY-MM-DD HH:mm:ss";
const DEFAULT_OUTPUT_DATE_FORMAT: &str = "YYYY-MM-DD";

/// Adds a deterministic UUID derived from a rendered template.
///
/// The UUID bytes are the MD5 digest of the rendered string, so the same
/// string always yields the same identifier across runs and pipelines.
#[derive(Debug, Clone)]
pub struct AddUuidField {
    field: String,
    debug_field: Option<String>,
    template: Template,
    dates: DateSettings,
}

impl AddUuidField {
    pub fn new(field: impl Into<String>, template: Template, dates: DateSettings) -> Self {
        Self {
            field: field.into(),
            debug_field: None,
            template,
            dates,
        }
    }

    /// Also store the rendered string under `field`, for tracing where a
    /// UUID came from.
    pub fn with_debug_field(mut self, field: impl Into<String>) -> Self {
        self.debug_field = Some(field.into());
        self
    }

    /// Arguments: `field`, `template`, optional `debug_field`,
    /// `input_date_format`, `output_date_format`, `timestamp_units`.
    pub fn from_args(args: &TransformArgs) -> Result<Self, TransformError> {
        let field = required_str(args, "field")?;
        let template = Template::parse(&required_str(args, "template")?)?;
        let input_format = optional_str(args, "input_date_format")?
            .unwrap_or_else(|| DEFAULT_INPUT_DATE_FORMAT.to_string());
        let output_format = optional_str(args, "output_date_format")?
            .unwrap_or_else(|| DEFAULT_OUTPUT_DATE_FORMAT.to_string());
        let units = match optional_str(args, "timestamp_units")? {
            Some(units) => TimestampUnits::parse(&units)?,
            None => TimestampUnits::default(),
        };

        let mut transform = Self::new(
            field,
            template,
            DateSettings::new(Some(&input_format), &output_format, units),
        );
        if let Some(debug_field) = optional_str(args, "debug_field")? {
            transform = transform.with_debug_field(debug_field);
        }
        Ok(transform)
    }

    /// UUID for an already rendered string: the MD5 digest of its UTF-8
    /// bytes, used as-is for the 16 UUID bytes.
    pub fn uuid_for(rendered: &str) -> Uuid {
        let digest = Md5::digest(rendered.as_bytes());
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest);
        Uuid::from_bytes(bytes)
    }
}

impl Transform for AddUuidField {
    fn apply(&self, document: Document) -> Result<Document, TransformError> {
        for_each_mapping(document, "add_uuid_field", |map| {
            let rendered = self.template.render(&Document::Mapping(map.clone()), &self.dates);
            if let Some(debug_field) = &self.debug_field {
                map.insert(debug_field.clone(), Document::String(rendered.clone()));
            }
            map.insert(
                self.field.clone(),
                Document::String(Self::uuid_for(&rendered).to_string()),
            );
            Ok(())
        })
    }

    fn name(&self) -> &str {
        "add_uuid_field"
    }
}
