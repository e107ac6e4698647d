//! Filament extraction from a 3MF project archive
//!
//! A project archive can carry filament data in four places. They are tried
//! in a fixed order, most specific first:
//!
//! 1. `Metadata/project_settings.config`: aligned per-slot arrays
//! 2. `Metadata/slice_info.config`: `<filament>` elements from the last slice
//! 3. per-filament preset documents
//! 4. the `<basematerials>` table of `3D/3dmodel.model`, which every 3MF
//!    producer writes even without proprietary metadata

use serde_json::Value;
use std::fs::File;
use std::path::Path;
use tracing::debug;
use zip::ZipArchive;

use crate::color::normalize_value;
use crate::config::BridgeSettings;
use crate::constants::{archive, keys};
use crate::filament::FilamentRecord;
use crate::parse::markup::{base_material_records, slice_info_records};
use crate::parse::settings::{SettingsDoc, records_from_settings};
use crate::parse::structured::{parse_key_values, parse_structured};
use crate::parse::text::{decode_prefix, read_bounded};
use crate::parse::settings_doc;
use crate::trace::{Attempt, Trace, TraceStatus};

/// An open archive plus its entry names, in central-directory order
pub struct ArchiveEntries {
    archive: ZipArchive<File>,
    names: Vec<String>,
    max_chars: usize,
}

impl ArchiveEntries {
    pub fn open(path: &Path, max_chars: usize) -> Result<Self, String> {
        let file = File::open(path).map_err(|e| format!("archive open error: {e}"))?;
        let archive = ZipArchive::new(file).map_err(|e| format!("archive open error: {e}"))?;
        let names = archive
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .map(str::to_string)
            .collect();
        Ok(Self {
            archive,
            names,
            max_chars,
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// First entry whose lowercased name satisfies `predicate`
    fn find(&self, predicate: impl Fn(&str) -> bool) -> Option<String> {
        self.names
            .iter()
            .find(|name| predicate(name.to_lowercase().as_str()))
            .cloned()
    }

    /// Decode an entry as text, reading no more than the character cap
    /// needs; `None` when unreadable
    fn read(&mut self, name: &str) -> Option<String> {
        let entry = self
            .archive
            .by_name(name)
            .inspect_err(|e| debug!(entry = name, error = %e, "Cannot open archive entry"))
            .ok()?;
        let (bytes, truncated) = read_bounded(entry, self.max_chars)
            .inspect_err(|e| debug!(entry = name, error = %e, "Cannot read archive entry"))
            .ok()?;
        if truncated {
            debug!(entry = name, kept = bytes.len(), "Archive entry truncated at read limit");
        }
        decode_prefix(&bytes, self.max_chars, truncated)
    }
}

/// One place inside an archive that may hold filament data
pub trait SubSource {
    fn name(&self) -> &'static str;
    fn attempt(&self, entries: &mut ArchiveEntries, settings: &BridgeSettings) -> Attempt;
}

/// Project settings blob (JSON or `key = value`)
pub struct ProjectSettings;

/// Slice info markup
pub struct SliceInfo;

/// Per-filament preset documents
pub struct FilamentPresets;

/// 3MF core base-material table
pub struct BaseMaterials;

/// Sub-sources in priority order
pub const SUB_SOURCES: [&dyn SubSource; 4] =
    [&ProjectSettings, &SliceInfo, &FilamentPresets, &BaseMaterials];

/// Records from the first sub-source that yields any
pub struct Extraction {
    pub sub_source: &'static str,
    pub records: Vec<FilamentRecord>,
}

/// Try every sub-source of the archive at `path`, appending one trace entry
/// per attempt under `trace_prefix`
///
/// The archive handle is dropped before returning on every path.
pub fn extract(
    path: &Path,
    settings: &BridgeSettings,
    trace: &mut Trace,
    trace_prefix: &str,
) -> Option<Extraction> {
    let archive_detail = path.display().to_string();
    let mut entries = match ArchiveEntries::open(path, settings.max_text_chars) {
        Ok(entries) => entries,
        Err(error) => {
            debug!(path = %path.display(), error = %error, "Skipping archive");
            let attempt = Attempt::missed(TraceStatus::Unreadable)
                .with_detail("archive", archive_detail)
                .with_detail("error", error);
            trace.record(format!("{trace_prefix}.open"), &attempt);
            return None;
        }
    };

    for source in SUB_SOURCES {
        let attempt = source
            .attempt(&mut entries, settings)
            .with_detail("archive", archive_detail.clone());
        trace.record(format!("{trace_prefix}.{}", source.name()), &attempt);
        if let Attempt::Found { records, .. } = attempt {
            debug!(path = %path.display(), sub_source = source.name(), count = records.len(), "Archive yielded filaments");
            return Some(Extraction {
                sub_source: source.name(),
                records,
            });
        }
    }
    None
}

impl SubSource for ProjectSettings {
    fn name(&self) -> &'static str {
        "project_settings"
    }

    fn attempt(&self, entries: &mut ArchiveEntries, _settings: &BridgeSettings) -> Attempt {
        let Some(entry) = entries.find(|name| {
            name.contains(archive::PROJECT_SETTINGS_MARKER) && name.ends_with(archive::CONFIG_EXTENSION)
        }) else {
            return Attempt::missed(TraceStatus::Absent);
        };
        let Some(text) = entries.read(&entry) else {
            return Attempt::missed(TraceStatus::Unreadable).with_detail("entry", entry);
        };

        let doc = if text.trim_start().starts_with('{') {
            match parse_structured(&text) {
                Ok(value) => settings_doc(value),
                Err(error) => {
                    return Attempt::missed(TraceStatus::Malformed)
                        .with_detail("entry", entry)
                        .with_detail("error", error);
                }
            }
        } else {
            Some(SettingsDoc::Flat(parse_key_values(&text)))
        };

        match doc {
            Some(doc) if doc.has_color_key() => {
                Attempt::from_records(records_from_settings(&doc)).with_detail("entry", entry)
            }
            _ => Attempt::missed(TraceStatus::Empty)
                .with_detail("entry", entry)
                .with_detail("reason", "no color key"),
        }
    }
}

impl SubSource for SliceInfo {
    fn name(&self) -> &'static str {
        "slice_info"
    }

    fn attempt(&self, entries: &mut ArchiveEntries, _settings: &BridgeSettings) -> Attempt {
        let Some(entry) = entries.find(|name| {
            name.contains(archive::SLICE_INFO_MARKER) && name.ends_with(archive::CONFIG_EXTENSION)
        }) else {
            return Attempt::missed(TraceStatus::Absent);
        };
        match entries.read(&entry) {
            Some(text) => Attempt::from_parse(slice_info_records(&text)).with_detail("entry", entry),
            None => Attempt::missed(TraceStatus::Unreadable).with_detail("entry", entry),
        }
    }
}

impl SubSource for FilamentPresets {
    fn name(&self) -> &'static str {
        "filament_presets"
    }

    fn attempt(&self, entries: &mut ArchiveEntries, settings: &BridgeSettings) -> Attempt {
        let prefix = archive::FILAMENT_PRESET_PREFIX.to_lowercase();
        let mut documents: Vec<String> = entries
            .names()
            .iter()
            .filter(|name| name.to_lowercase().starts_with(&prefix))
            .cloned()
            .collect();
        if documents.is_empty() {
            documents = entries
                .names()
                .iter()
                .filter(|name| {
                    let lower = name.to_lowercase();
                    lower.contains(archive::FILAMENT_MARKER) && lower.ends_with(archive::JSON_EXTENSION)
                })
                .cloned()
                .collect();
        }
        if documents.is_empty() {
            return Attempt::missed(TraceStatus::Absent);
        }
        documents.truncate(settings.max_preset_documents);

        let mut records = Vec::new();
        let mut failures = 0usize;
        for (index, entry) in documents.iter().enumerate() {
            let parsed = entries
                .read(entry)
                .and_then(|text| parse_structured(&text).ok())
                .and_then(settings_doc);
            match parsed {
                Some(SettingsDoc::Structured(map)) => {
                    if let Some(record) = preset_document_record(&map, entry, index) {
                        records.push(record);
                    }
                }
                _ => failures += 1,
            }
        }

        let examined = documents.len();
        if records.is_empty() && failures == examined {
            return Attempt::missed(TraceStatus::Malformed)
                .with_detail("documents", examined)
                .with_detail("failures", failures);
        }
        Attempt::from_records(records)
            .with_detail("documents", examined)
            .with_detail("failures", failures)
    }
}

fn preset_document_record(
    map: &serde_json::Map<String, Value>,
    entry: &str,
    index: usize,
) -> Option<FilamentRecord> {
    let color = keys::COLOR
        .iter()
        .map(|key| normalize_value(map.get(*key)))
        .find(|color| !color.is_empty())?;

    let name = map
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| entry_stem(entry));
    let doc = SettingsDoc::Structured(map.clone());
    let first = |key: &str| {
        doc.list(key, false)
            .and_then(|items| items.into_iter().next())
            .unwrap_or_default()
    };

    Some(FilamentRecord::new(
        index as u32 + 1,
        &name,
        &color,
        &first(keys::TYPE),
        &first(keys::VENDOR),
    ))
}

fn entry_stem(entry: &str) -> String {
    let file = entry.rsplit('/').next().unwrap_or(entry);
    match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => file.to_string(),
    }
}

impl SubSource for BaseMaterials {
    fn name(&self) -> &'static str {
        "base_materials"
    }

    fn attempt(&self, entries: &mut ArchiveEntries, settings: &BridgeSettings) -> Attempt {
        let Some(entry) = entries
            .find(|name| name == archive::MODEL_ENTRY)
            .or_else(|| entries.find(|name| name.ends_with(archive::MODEL_EXTENSION)))
        else {
            return Attempt::missed(TraceStatus::Absent);
        };
        match entries.read(&entry) {
            Some(text) => Attempt::from_parse(base_material_records(
                &text,
                settings.max_namespace_substitutions,
            ))
            .with_detail("entry", entry),
            None => Attempt::missed(TraceStatus::Unreadable).with_detail("entry", entry),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn run(path: &Path) -> (Option<Extraction>, Trace) {
        let mut trace = Trace::new();
        let extraction = extract(path, &BridgeSettings::default(), &mut trace, "archive");
        (extraction, trace)
    }

    fn statuses(trace: &Trace) -> Vec<(String, TraceStatus)> {
        trace
            .entries()
            .iter()
            .map(|entry| (entry.name.clone(), entry.status))
            .collect()
    }

    #[test]
    fn test_project_settings_beats_base_materials() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("job.3mf");
        write_archive(
            &path,
            &[
                ("3D/3dmodel.model", MODEL_WITH_MATERIALS.as_bytes()),
                (
                    "Metadata/project_settings.config",
                    br##"{"filament_colour": ["#FF0000"], "filament_settings_id": ["Red PLA @ X"]}"##,
                ),
            ],
        );
        let (extraction, trace) = run(&path);
        let extraction = extraction.unwrap();
        assert_eq!(extraction.sub_source, "project_settings");
        assert_eq!(extraction.records[0].name, "Red PLA");
        assert_eq!(
            statuses(&trace),
            vec![("archive.project_settings".to_string(), TraceStatus::Ok)]
        );
    }

    #[test]
    fn test_falls_through_to_base_materials() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain.3mf");
        write_archive(
            &path,
            &[
                ("3D/3dmodel.model", MODEL_WITH_MATERIALS.as_bytes()),
                ("Metadata/project_settings.config", b"{\"layer_height\": \"0.2\"}"),
                ("Metadata/slice_info.config", b"<config><plate></config>"),
            ],
        );
        let (extraction, trace) = run(&path);
        let extraction = extraction.unwrap();
        assert_eq!(extraction.sub_source, "base_materials");
        assert_eq!(extraction.records[0].color, "#0000FF");
        assert_eq!(extraction.records[0].name, "Base Blue");
        assert_eq!(
            statuses(&trace),
            vec![
                ("archive.project_settings".to_string(), TraceStatus::Empty),
                ("archive.slice_info".to_string(), TraceStatus::Malformed),
                ("archive.filament_presets".to_string(), TraceStatus::Absent),
                ("archive.base_materials".to_string(), TraceStatus::Ok),
            ]
        );
    }

    #[test]
    fn test_key_value_project_settings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ini.3mf");
        write_archive(
            &path,
            &[(
                "Metadata/Project_Settings.config",
                b"; exported\nfilament_colour = #112233;#445566\nfilament_type = PETG;ASA\n",
            )],
        );
        let records = run(&path).0.unwrap().records;
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].material, "ASA");
        assert_eq!(records[1].name, "ASA #2");
    }

    #[test]
    fn test_filament_preset_documents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("presets.3mf");
        write_archive(
            &path,
            &[
                (
                    "Metadata/filament_settings_1.config",
                    br##"{"name": "Silk Gold", "filament_colour": ["#d4af37"], "filament_type": ["PLA"], "filament_vendor": ["Acme"]}"##,
                ),
                ("Metadata/filament_settings_2.config", b"broken"),
                (
                    "Metadata/filament_settings_3.config",
                    br##"{"filament_color": "#222", "filament_type": "TPU"}"##,
                ),
            ],
        );
        let records = run(&path).0.unwrap().records;
        assert_eq!(records.len(), 2);
        assert_eq!(
            (records[0].slot, records[0].name.as_str(), records[0].color.as_str(), records[0].vendor.as_str()),
            (1, "Silk Gold", "#D4AF37", "Acme")
        );
        assert_eq!(
            (records[1].slot, records[1].name.as_str(), records[1].material.as_str()),
            (3, "filament_settings_3", "TPU")
        );
    }

    #[test]
    fn test_loose_filament_json_fallback() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("loose.3mf");
        write_archive(
            &path,
            &[("Metadata/my_filament.json", br##"{"filament_colour": "#00ff00"}"##)],
        );
        let records = run(&path).0.unwrap().records;
        assert_eq!(records[0].name, "my_filament");
        assert_eq!(records[0].color, "#00FF00");
    }

    #[test]
    fn test_oversized_entry_is_read_up_to_cap() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("padded.3mf");
        let mut blob = br##"{"filament_colour": ["#abcdef"]}"##.to_vec();
        blob.extend(std::iter::repeat_n(b'x', 100_000));
        write_archive(&path, &[("Metadata/project_settings.config", blob.as_slice())]);

        let settings = BridgeSettings {
            max_text_chars: 1024,
            ..BridgeSettings::default()
        };
        let mut trace = Trace::new();
        let extraction = extract(&path, &settings, &mut trace, "archive").unwrap();
        assert_eq!(extraction.records[0].color, "#ABCDEF");
    }

    #[test]
    fn test_unopenable_archive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.3mf");
        std::fs::write(&path, b"definitely not a zip").unwrap();
        let (extraction, trace) = run(&path);
        assert!(extraction.is_none());
        assert_eq!(
            statuses(&trace),
            vec![("archive.open".to_string(), TraceStatus::Unreadable)]
        );
    }

    #[test]
    fn test_entry_stem() {
        assert_eq!(entry_stem("Metadata/filament_settings_3.config"), "filament_settings_3");
        assert_eq!(entry_stem("noext"), "noext");
    }
}
