//! Field templates.
//!
//! A template is literal text with `${...}` placeholders:
//!
//! - `${field}`, `${$.field}`, `${.field}` - value of a top-level field
//! - `${order.lines.0.sku}` - dotted path into nested mappings and sequences
//! - `${field:date}` - value rendered as a date with the default output format
//! - `${field:date("YYYY/MM/DD")}` - value rendered with an explicit format
//!
//! Date formats use Java-style tokens (`YYYY`, `MM`, `DD`, `HH`, `mm`, `ss`,
//! `SSS`, ...) and are converted to `chrono` format strings when the template
//! is parsed.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

use crate::document::Document;
use crate::transform_registry::TransformError;

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([^}]*)\}").expect("valid placeholder regex"))
}

fn date_fn_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^date\s*(?:\(\s*"([^"]*)"\s*\))?$"#).expect("valid date function regex")
    })
}

/// Units of integer Unix timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampUnits {
    Seconds,
    #[default]
    Milliseconds,
}

impl TimestampUnits {
    pub fn parse(s: &str) -> Result<Self, TransformError> {
        match s.to_lowercase().as_str() {
            "seconds" | "s" => Ok(TimestampUnits::Seconds),
            "milliseconds" | "ms" => Ok(TimestampUnits::Milliseconds),
            _ => Err(TransformError::InvalidArgs(format!(
                "Unknown timestamp units '{}' (expected seconds or milliseconds)",
                s
            ))),
        }
    }
}

/// How `:date` placeholders read and write dates.
#[derive(Debug, Clone)]
pub struct DateSettings {
    /// chrono format tried first when parsing string values
    input_format: Option<String>,
    /// chrono format used when a placeholder gives no explicit format
    output_format: String,
    pub timestamp_units: TimestampUnits,
}

impl DateSettings {
    /// Build settings from Java-style formats.
    pub fn new(
        input_format: Option<&str>,
        output_format: &str,
        timestamp_units: TimestampUnits,
    ) -> Self {
        Self {
            input_format: input_format.map(java_to_chrono_format),
            output_format: java_to_chrono_format(output_format),
            timestamp_units,
        }
    }

    /// Parse a document value into a timestamp.
    ///
    /// Integers (and all-digit strings) are Unix timestamps. Other strings are
    /// tried against the configured input format, RFC 3339, and a few common
    /// layouts.
    pub fn parse_value(&self, value: &Document) -> Option<NaiveDateTime> {
        match value {
            Document::Number(n) => n.as_i64().and_then(|ts| self.from_timestamp(ts)),
            Document::String(s) => {
                let s = s.trim();
                if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
                    return s.parse::<i64>().ok().and_then(|ts| self.from_timestamp(ts));
                }
                self.parse_str(s)
            }
            _ => None,
        }
    }

    fn from_timestamp(&self, ts: i64) -> Option<NaiveDateTime> {
        let dt = match self.timestamp_units {
            TimestampUnits::Seconds => DateTime::<Utc>::from_timestamp(ts, 0),
            TimestampUnits::Milliseconds => DateTime::<Utc>::from_timestamp_millis(ts),
        };
        dt.map(|dt| dt.naive_utc())
    }

    fn parse_str(&self, s: &str) -> Option<NaiveDateTime> {
        if let Some(format) = &self.input_format {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
                return Some(dt);
            }
            if let Ok(d) = NaiveDate::parse_from_str(s, format) {
                return d.and_hms_opt(0, 0, 0);
            }
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.naive_local());
        }

        const LAYOUTS: [&str; 4] = [
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M:%S",
        ];
        for layout in LAYOUTS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, layout) {
                return Some(dt);
            }
        }

        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    }

    /// Render a value as a date. Values that are not dates render as plain
    /// strings.
    fn render(&self, value: &Document, format: Option<&str>) -> String {
        match self.parse_value(value) {
            Some(dt) => dt
                .format(format.unwrap_or(&self.output_format))
                .to_string(),
            None => value.to_plain_string(),
        }
    }
}

/// Convert a Java-style date pattern to a chrono format string.
///
/// Unrecognised characters are copied literally; `%` is escaped.
pub fn java_to_chrono_format(pattern: &str) -> String {
    const TOKENS: [(&str, &str); 15] = [
        ("YYYY", "%Y"),
        ("yyyy", "%Y"),
        ("SSS", "%3f"),
        ("H24", "%H"),
        ("H12", "%I"),
        ("YY", "%y"),
        ("yy", "%y"),
        ("MM", "%m"),
        ("DD", "%d"),
        ("dd", "%d"),
        ("HH", "%H"),
        ("hh", "%I"),
        ("mm", "%M"),
        ("ss", "%S"),
        ("SS", "%3f"),
    ];

    let mut out = String::with_capacity(pattern.len() + 8);
    let mut rest = pattern;
    'outer: while let Some(c) = rest.chars().next() {
        for (token, replacement) in TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                out.push_str(replacement);
                rest = tail;
                continue 'outer;
            }
        }
        if c == '%' {
            out.push_str("%%");
        } else {
            out.push(c);
        }
        rest = &rest[c.len_utf8()..];
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
enum Part {
    Literal(String),
    Field {
        path: String,
        /// `Some(None)`: `:date` with default format
        date: Option<Option<String>>,
    },
}

/// A parsed template.
#[derive(Debug, Clone)]
pub struct Template {
    raw: String,
    parts: Vec<Part>,
}

impl Template {
    /// Parse a template, rejecting empty field names and unknown functions.
    pub fn parse(raw: &str) -> Result<Self, TransformError> {
        let mut parts = Vec::new();
        let mut last = 0;

        for caps in placeholder_regex().captures_iter(raw) {
            let (whole, expr) = match (caps.get(0), caps.get(1)) {
                (Some(whole), Some(expr)) => (whole, expr.as_str()),
                _ => continue,
            };
            if whole.start() > last {
                parts.push(Part::Literal(raw[last..whole.start()].to_string()));
            }
            last = whole.end();
            parts.push(parse_placeholder(expr)?);
        }

        if last < raw.len() {
            parts.push(Part::Literal(raw[last..].to_string()));
        }

        Ok(Self {
            raw: raw.to_string(),
            parts,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Field paths referenced by the template, in order.
    pub fn fields(&self) -> Vec<&str> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Field { path, .. } => Some(path.as_str()),
                Part::Literal(_) => None,
            })
            .collect()
    }

    /// Render the template against a document.
    ///
    /// Missing and null fields render as empty strings.
    pub fn render(&self, document: &Document, dates: &DateSettings) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(text) => out.push_str(text),
                Part::Field { path, date } => {
                    let value = match document.lookup(path) {
                        Some(v) if !v.is_null() => v,
                        _ => {
                            tracing::debug!("Template field '{}' not found in record", path);
                            continue;
                        }
                    };
                    match date {
                        Some(format) => out.push_str(&dates.render(value, format.as_deref())),
                        None => out.push_str(&value.to_plain_string()),
                    }
                }
            }
        }
        out
    }
}

fn parse_placeholder(expr: &str) -> Result<Part, TransformError> {
    let (field, function) = match expr.split_once(':') {
        Some((field, function)) => (field, Some(function.trim())),
        None => (expr, None),
    };

    let field = field.trim();
    let field = field.strip_prefix('$').unwrap_or(field);
    let field = field.strip_prefix('.').unwrap_or(field).trim();
    if field.is_empty() {
        return Err(TransformError::InvalidArgs(format!(
            "Empty field name in placeholder '${{{}}}'",
            expr
        )));
    }

    let date = match function {
        None => None,
        Some(function) => {
            let caps = date_fn_regex().captures(function).ok_or_else(|| {
                TransformError::InvalidArgs(format!("Unknown template function '{}'", function))
            })?;
            Some(caps.get(1).map(|m| java_to_chrono_format(m.as_str())))
        }
    };

    Ok(Part::Field {
        path: field.to_string(),
        date,
    })
}
