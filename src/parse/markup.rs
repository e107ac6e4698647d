//! Markup (XML) sources: slice_info `<filament>` elements and the 3MF
//! `<basematerials>` table

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use regex_lite::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use tracing::debug;

use crate::color::normalize_color;
use crate::constants::keys;
use crate::filament::FilamentRecord;

static DEFAULT_NAMESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\s+xmlns\s*=\s*"[^"]*""#).expect("static regex"));

/// Records from every `<filament>` element of a slice_info document
///
/// Slot is the numeric `id` attribute when present. Elements without one
/// take their position, moved past any slot an explicit `id` already claims.
/// Elements without a usable color are skipped.
pub fn slice_info_records(xml: &str) -> Result<Vec<FilamentRecord>, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut elements = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if e.local_name().as_ref() == b"filament" {
                    elements.push(collect_attributes(e));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return partial_or_error(assign_slice_info_slots(elements), e),
            _ => {}
        }
    }

    Ok(assign_slice_info_slots(elements))
}

fn assign_slice_info_slots(elements: Vec<HashMap<String, String>>) -> Vec<FilamentRecord> {
    let colored: Vec<(u32, String, HashMap<String, String>)> = elements
        .into_iter()
        .zip(1u32..)
        .filter_map(|(attrs, position)| Some((position, element_color(&attrs)?, attrs)))
        .collect();

    let mut taken: HashSet<u32> = colored
        .iter()
        .filter_map(|(_, _, attrs)| explicit_id(attrs))
        .collect();

    colored
        .into_iter()
        .map(|(position, color, attrs)| {
            let slot = explicit_id(&attrs).unwrap_or_else(|| {
                let mut slot = position;
                while taken.contains(&slot) {
                    slot += 1;
                }
                taken.insert(slot);
                slot
            });
            slice_info_record(&attrs, slot, &color)
        })
        .collect()
}

fn element_color(attrs: &HashMap<String, String>) -> Option<String> {
    attrs
        .get("color")
        .or_else(|| attrs.get("colour"))
        .map(|raw| normalize_color(raw))
        .filter(|c| !c.is_empty())
}

fn explicit_id(attrs: &HashMap<String, String>) -> Option<u32> {
    attrs
        .get("id")
        .and_then(|id| id.trim().parse::<u32>().ok())
        .filter(|&id| id > 0)
}

fn slice_info_record(attrs: &HashMap<String, String>, slot: u32, color: &str) -> FilamentRecord {
    let material = attrs.get("type").map(|t| t.trim()).unwrap_or_default();
    let name = keys::SLICE_INFO_NAME
        .iter()
        .filter_map(|key| attrs.get(*key))
        .map(|name| name.trim())
        .find(|name| !name.is_empty())
        .map(str::to_string);

    let record = match name {
        Some(name) => FilamentRecord::new(slot, &name, color, material, ""),
        None => {
            let mut record = FilamentRecord::new(slot, "", color, material, "");
            record.name = format!("{} #{}", record.material, slot);
            record
        }
    };

    let used = ["used_g", "used_m"]
        .iter()
        .filter_map(|key| attrs.get(*key))
        .filter_map(|value| value.trim().parse::<f64>().ok())
        .reduce(f64::max)
        .map(|amount| amount > 0.0);

    record.with_used(used)
}

/// Records from the `<base>` children of every `<basematerials>` group
///
/// Slots are sequential across groups; `name` falls back to `Material {n}`.
pub fn base_material_records(
    xml: &str,
    max_namespace_substitutions: usize,
) -> Result<Vec<FilamentRecord>, String> {
    let simplified = strip_default_namespaces(xml, max_namespace_substitutions);
    let mut reader = Reader::from_str(&simplified);
    reader.config_mut().trim_text(true);

    let mut records = Vec::new();
    let mut in_basematerials = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"basematerials" => {
                in_basematerials = true;
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"basematerials" => {
                in_basematerials = false;
            }
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if in_basematerials && e.local_name().as_ref() == b"base" =>
            {
                let attrs = collect_attributes(e);
                let Some(color) = attrs
                    .get("displaycolor")
                    .map(|raw| normalize_color(raw))
                    .filter(|c| !c.is_empty())
                else {
                    continue;
                };
                let slot = records.len() as u32 + 1;
                let name = attrs
                    .get("name")
                    .map(|n| n.trim())
                    .filter(|n| !n.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Material {slot}"));
                records.push(FilamentRecord::new(slot, &name, &color, "", ""));
            }
            Ok(Event::Eof) => break,
            Err(e) => return partial_or_error(records, e),
            _ => {}
        }
    }

    Ok(records)
}

/// Remove up to `limit` default-namespace (`xmlns="..."`) declarations
pub fn strip_default_namespaces(xml: &str, limit: usize) -> String {
    if limit == 0 {
        return xml.to_string();
    }
    DEFAULT_NAMESPACE.replacen(xml, limit, "").into_owned()
}

fn collect_attributes(e: &BytesStart<'_>) -> HashMap<String, String> {
    e.attributes()
        .flatten()
        .filter_map(|attr| {
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr.unescape_value().ok()?.into_owned();
            Some((key, value))
        })
        .collect()
}

/// Malformed tails are common; keep whatever was read before the error
fn partial_or_error(
    records: Vec<FilamentRecord>,
    error: quick_xml::Error,
) -> Result<Vec<FilamentRecord>, String> {
    if records.is_empty() {
        Err(format!("XML parse error: {error}"))
    } else {
        debug!(error = %error, kept = records.len(), "XML error after usable records");
        Ok(records)
    }
}
