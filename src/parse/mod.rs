//! Parsers for the formats slicers leave on disk
//!
//! - **text**: encoding-tolerant file decoding
//! - **structured**: tolerant JSON and `key = value` parsing
//! - **markup**: slice_info and 3MF base-material XML
//! - **settings**: aligned per-slot arrays -> filament records

pub mod markup;
pub mod settings;
pub mod structured;
pub mod text;

use serde_json::Value;

use crate::filament::FilamentRecord;
use settings::{SettingsDoc, records_from_settings};

/// Shape detected by [`parse_any`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Structured,
    Markup,
    KeyValue,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Structured => "structured",
            Format::Markup => "markup",
            Format::KeyValue => "key_value",
        }
    }
}

/// Parse a settings blob of unknown shape, dispatching on its first
/// non-whitespace character
///
/// `Ok(vec![])` means the document parsed but carried no colors; `Err` holds
/// the parser's message.
pub fn parse_any(text: &str) -> (Format, Result<Vec<FilamentRecord>, String>) {
    match text.trim_start().chars().next() {
        Some('{') | Some('[') => (Format::Structured, parse_structured_records(text)),
        Some('<') => (Format::Markup, markup::slice_info_records(text)),
        _ => {
            let doc = SettingsDoc::Flat(structured::parse_key_values(text));
            (Format::KeyValue, Ok(records_from_settings(&doc)))
        }
    }
}

/// Structured blob -> records; arrays use their first object element
pub fn parse_structured_records(text: &str) -> Result<Vec<FilamentRecord>, String> {
    let value = structured::parse_structured(text)?;
    Ok(settings_doc(value)
        .map(|doc| records_from_settings(&doc))
        .unwrap_or_default())
}

/// View a parsed document as a settings blob
pub fn settings_doc(value: Value) -> Option<SettingsDoc> {
    match value {
        Value::Object(map) => Some(SettingsDoc::Structured(map)),
        Value::Array(items) => items.into_iter().find_map(|item| match item {
            Value::Object(map) => Some(SettingsDoc::Structured(map)),
            _ => None,
        }),
        _ => None,
    }
}
