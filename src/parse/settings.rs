//! Aligned per-slot arrays in a settings blob
//!
//! Project settings store one array per property (`filament_colour`,
//! `filament_settings_id`, `filament_type`, ...) indexed by slot. The same
//! properties appear either as JSON arrays or as `;`-separated `key = value`
//! lines.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::color::normalize_color;
use crate::constants::keys;
use crate::filament::FilamentRecord;

/// A settings blob in either of its two on-disk shapes
#[derive(Debug, Clone)]
pub enum SettingsDoc {
    Structured(Map<String, Value>),
    Flat(BTreeMap<String, String>),
}

impl SettingsDoc {
    /// Items stored under `key`; `None` when the key is absent
    ///
    /// Color lists may also be comma-separated, names never are.
    pub fn list(&self, key: &str, allow_comma: bool) -> Option<Vec<String>> {
        match self {
            SettingsDoc::Structured(map) => match map.get(key)? {
                Value::Array(items) => Some(items.iter().map(scalar_to_string).collect()),
                Value::String(s) => Some(split_list(s, allow_comma)),
                Value::Null => None,
                other => Some(vec![scalar_to_string(other)]),
            },
            SettingsDoc::Flat(map) => map.get(key).map(|s| split_list(s, allow_comma)),
        }
    }

    /// First alias holding a non-empty list
    pub fn first_list(&self, aliases: &[&str], allow_comma: bool) -> Vec<String> {
        aliases
            .iter()
            .filter_map(|key| self.list(key, allow_comma))
            .find(|items| items.iter().any(|item| !item.is_empty()))
            .unwrap_or_default()
    }

    /// True when any color alias is present at all
    pub fn has_color_key(&self) -> bool {
        keys::COLOR.iter().any(|key| self.list(key, true).is_some())
    }
}

/// One record per non-empty normalized color, names/types/vendors aligned by
/// index
pub fn records_from_settings(doc: &SettingsDoc) -> Vec<FilamentRecord> {
    let colors = doc.first_list(keys::COLOR, true);
    let names = doc.first_list(keys::NAME, false);
    let types = doc.list(keys::TYPE, false).unwrap_or_default();
    let vendors = doc.list(keys::VENDOR, false).unwrap_or_default();

    colors
        .iter()
        .enumerate()
        .filter_map(|(index, raw)| {
            let color = normalize_color(raw);
            if color.is_empty() {
                return None;
            }
            let slot = index as u32 + 1;
            let material = types.get(index).map(String::as_str).unwrap_or_default();
            let vendor = vendors.get(index).map(String::as_str).unwrap_or_default();
            let name = names.get(index).map(String::as_str).unwrap_or_default();

            let mut record = FilamentRecord::new(slot, name, &color, material, vendor);
            if record.name.is_empty() {
                record.name = format!("{} #{}", record.material, slot);
            }
            Some(record)
        })
        .collect()
}

/// Split a `;` (and optionally `,`) separated list, trimming quotes
pub fn split_list(raw: &str, allow_comma: bool) -> Vec<String> {
    raw.split(|c| c == ';' || (allow_comma && c == ','))
        .map(|item| item.trim().trim_matches('"').trim().to_string())
        .collect()
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items.first().map(scalar_to_string).unwrap_or_default(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::structured::parse_key_values;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn structured(value: Value) -> SettingsDoc {
        match value {
            Value::Object(map) => SettingsDoc::Structured(map),
            _ => unreachable!("test documents are objects"),
        }
    }

    #[test]
    fn test_aligned_json_arrays() {
        let doc = structured(json!({
            "filament_colour": ["#FF0000", "#00ff00"],
            "filament_settings_id": ["Red PLA @ Printer X", "Green PLA"]
        }));
        let records = records_from_settings(&doc);
        assert_eq!(records.len(), 2);
        assert_eq!(
            (records[0].slot, records[0].name.as_str(), records[0].color.as_str(), records[0].material.as_str()),
            (1, "Red PLA", "#FF0000", "PLA")
        );
        assert_eq!(
            (records[1].slot, records[1].name.as_str(), records[1].color.as_str(), records[1].material.as_str()),
            (2, "Green PLA", "#00FF00", "PLA")
        );
    }

    #[test]
    fn test_flat_key_values_with_gaps() {
        let text = "filament_colour = #FF0000;;#0000FF\n\
                    filament_settings_id = \"Red\";\"Unused\";\"Blue\"\n\
                    filament_type = PLA;PLA;PETG\n\
                    filament_vendor = Acme;Acme;Generic\n";
        let doc = SettingsDoc::Flat(parse_key_values(text));
        let records = records_from_settings(&doc);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].slot, 1);
        assert_eq!(records[1].slot, 3);
        assert_eq!(records[1].name, "Blue");
        assert_eq!(records[1].material, "PETG");
        assert_eq!(records[1].vendor, "Generic");
    }

    #[test]
    fn test_color_aliases_and_missing_names() {
        let doc = structured(json!({
            "filament_colour": [],
            "filament_color": "#111111,#222222",
            "filament_type": ["ABS"]
        }));
        let records = records_from_settings(&doc);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "ABS #1");
        assert_eq!(records[1].name, "PLA #2");
        assert!(doc.has_color_key());
    }

    #[test]
    fn test_no_color_key() {
        let doc = structured(json!({"nozzle_diameter": ["0.4"]}));
        assert!(!doc.has_color_key());
        assert!(records_from_settings(&doc).is_empty());
    }
}
