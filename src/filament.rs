//! Filament records and the name/type heuristics shared by every source

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use crate::color::normalize_color;
use crate::constants::material;

/// One print-material slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilamentRecord {
    /// 1-based slot number, unique within one result
    pub slot: u32,
    pub name: String,
    /// `#RRGGBB` or empty when unknown
    pub color: String,
    /// Material code (`PLA`, `PETG`, ...)
    #[serde(rename = "type")]
    pub material: String,
    #[serde(default)]
    pub vendor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used: Option<bool>,
}

impl FilamentRecord {
    /// Build a record, normalizing the color and inferring the material when
    /// `material` is blank
    pub fn new(slot: u32, name: &str, color: &str, material: &str, vendor: &str) -> Self {
        let name = clean_preset_name(name);
        let material = match material.trim() {
            "" => infer_material(&name).to_string(),
            explicit => explicit.to_ascii_uppercase(),
        };
        Self {
            slot,
            name,
            color: normalize_color(color),
            material,
            vendor: vendor.trim().to_string(),
            used: None,
        }
    }

    pub fn with_used(mut self, used: Option<bool>) -> Self {
        self.used = used;
        self
    }
}

/// Strip a trailing `@ printer` qualifier and surrounding quotes/whitespace
///
/// `"Bambu PLA Basic @BBL X1C"` -> `"Bambu PLA Basic"`
pub fn clean_preset_name(name: &str) -> String {
    let unquoted = name.trim().trim_matches('"').trim();
    match unquoted.split_once('@') {
        Some((base, _)) => base.trim().to_string(),
        None => unquoted.to_string(),
    }
}

/// Guess the material code from free text by case-insensitive substring match
pub fn infer_material(text: &str) -> &'static str {
    let upper = text.to_ascii_uppercase();
    material::KNOWN_TYPES
        .iter()
        .copied()
        .find(|code| upper.contains(code))
        .unwrap_or(material::DEFAULT_TYPE)
}

/// Keep the first record for each slot number
pub fn retain_unique_slots(records: &mut Vec<FilamentRecord>) {
    let mut seen = HashSet::new();
    records.retain(|record| {
        let fresh = seen.insert(record.slot);
        if !fresh {
            debug!(slot = record.slot, name = %record.name, "Dropping record with duplicate slot");
        }
        fresh
    });
}
