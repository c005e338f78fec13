//! Document codecs.
//!
//! A codec turns a record's byte content into a [`Document`] and back. All
//! codecs use UTF-8 text. Encoding always produces a complete buffer, so a
//! caller can finish encoding before touching any output sink.

use crate::document::Document;
use serde::{Deserialize, Serialize};

/// Error type for codec operations
#[derive(Debug)]
pub enum CodecError {
    InvalidUtf8(std::str::Utf8Error),
    JsonError(serde_json::Error),
    YamlError(serde_yaml::Error),
}

impl From<std::str::Utf8Error> for CodecError {
    fn from(err: std::str::Utf8Error) -> Self {
        CodecError::InvalidUtf8(err)
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        CodecError::JsonError(err)
    }
}

impl From<serde_yaml::Error> for CodecError {
    fn from(err: serde_yaml::Error) -> Self {
        CodecError::YamlError(err)
    }
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecError::InvalidUtf8(e) => write!(f, "Invalid UTF-8: {}", e),
            CodecError::JsonError(e) => write!(f, "JSON error: {}", e),
            CodecError::YamlError(e) => write!(f, "YAML error: {}", e),
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CodecError::InvalidUtf8(e) => Some(e),
            CodecError::JsonError(e) => Some(e),
            CodecError::YamlError(e) => Some(e),
        }
    }
}

/// Converts between record bytes and documents.
pub trait Codec: Send + Sync {
    /// Decode a complete byte buffer into a document.
    fn decode(&self, bytes: &[u8]) -> Result<Document, CodecError>;

    /// Encode a document into a complete byte buffer.
    fn encode(&self, document: &Document) -> Result<Vec<u8>, CodecError>;

    /// Codec name for logging.
    fn name(&self) -> &'static str;
}

impl Codec for Box<dyn Codec> {
    fn decode(&self, bytes: &[u8]) -> Result<Document, CodecError> {
        (**self).decode(bytes)
    }

    fn encode(&self, document: &Document) -> Result<Vec<u8>, CodecError> {
        (**self).encode(document)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// JSON codec (the default document grammar).
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec {
    pub pretty: bool,
}

impl JsonCodec {
    pub fn new() -> Self {
        Self { pretty: false }
    }

    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl Codec for JsonCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Document, CodecError> {
        let text = std::str::from_utf8(bytes)?;
        Ok(serde_json::from_str(text)?)
    }

    fn encode(&self, document: &Document) -> Result<Vec<u8>, CodecError> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(document)?
        } else {
            serde_json::to_vec(document)?
        };
        Ok(bytes)
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

/// YAML codec.
///
/// Mapping keys must be strings; other YAML keys fail to decode.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlCodec;

impl Codec for YamlCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Document, CodecError> {
        let text = std::str::from_utf8(bytes)?;
        Ok(serde_yaml::from_str(text)?)
    }

    fn encode(&self, document: &Document) -> Result<Vec<u8>, CodecError> {
        Ok(serde_yaml::to_string(document)?.into_bytes())
    }

    fn name(&self) -> &'static str {
        "yaml"
    }
}

/// Content format selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Json,
    Yaml,
}

impl Format {
    /// Build the codec for this format.
    pub fn codec(self, pretty: bool) -> Box<dyn Codec> {
        match self {
            Format::Json => Box::new(JsonCodec { pretty }),
            Format::Yaml => Box::new(YamlCodec),
        }
    }
}


impl std::fmt::Debug for dyn Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Codec").field("name", &self.name()).finish()
    }
}
