//! Tolerant JSON and `key = value` parsing
//!
//! Slicer config files are mostly JSON, but in the wild they carry trailing
//! checksum footers, trailing commas and hand-added comment lines. Parsing
//! degrades through progressively looser interpretations before giving up.

use regex_lite::Regex;
use serde_json::{Deserializer, Value};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::debug;

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(\s*[}\]])").expect("static regex"));

/// Parse object/array JSON, tolerating trailing data, trailing commas and
/// `//` or `#` comment lines
///
/// On failure returns the message of the *first* (strict) parse error.
pub fn parse_structured(text: &str) -> Result<Value, String> {
    let first_error = match parse_strict(text) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    if let Some(value) = parse_leading(text) {
        debug!("Parsed leading JSON document, ignoring trailing data");
        return Ok(value);
    }

    let without_commas = strip_trailing_commas(text);
    if let Ok(value) = parse_strict(&without_commas) {
        debug!("Parsed JSON after stripping trailing commas");
        return Ok(value);
    }

    let without_comments = strip_trailing_commas(&strip_comment_lines(text));
    if let Ok(value) = parse_strict(&without_comments) {
        debug!("Parsed JSON after stripping comments and trailing commas");
        return Ok(value);
    }
    if let Some(value) = parse_leading(&without_comments) {
        debug!("Parsed leading JSON document after stripping comments");
        return Ok(value);
    }

    Err(first_error)
}

/// Parse `key = value` lines, skipping blanks and `#`/`;` comments
///
/// Later duplicates overwrite earlier ones.
pub fn parse_key_values(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with(';'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

fn parse_strict(text: &str) -> Result<Value, String> {
    match serde_json::from_str::<Value>(text) {
        Ok(value) if is_document(&value) => Ok(value),
        Ok(_) => Err("top-level value is not an object or array".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

/// First complete JSON value in `text`, ignoring whatever follows it
fn parse_leading(text: &str) -> Option<Value> {
    Deserializer::from_str(text)
        .into_iter::<Value>()
        .next()?
        .ok()
        .filter(is_document)
}

fn is_document(value: &Value) -> bool {
    value.is_object() || value.is_array()
}

fn strip_trailing_commas(text: &str) -> String {
    TRAILING_COMMA.replace_all(text, "$1").into_owned()
}

fn strip_comment_lines(text: &str) -> String {
    text.lines()
        .filter(|line| {
            let line = line.trim_start();
            !line.starts_with("//") && !line.starts_with('#')
        })
        .collect::<Vec<_>>()
        .join("\n")
}
