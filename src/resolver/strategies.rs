//! The four top-level strategies, most authoritative first
//!
//! Each one returns an [`Attempt`]; strategies with sub-sources append their
//! own trace entries before the engine appends the strategy's summary entry.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;
use walkdir::WalkDir;

use super::{MainConfigState, ResolveContext};
use crate::archive;
use crate::candidates::collect_candidates;
use crate::color::normalize_color;
use crate::constants::{backup, keys};
use crate::filament::FilamentRecord;
use crate::parse::parse_any;
use crate::parse::settings::split_list;
use crate::parse::text::read_text;
use crate::trace::{Attempt, Trace, TraceStatus};

/// One data source in the cascade
pub trait Strategy {
    fn name(&self) -> &'static str;
    fn attempt(&self, ctx: &ResolveContext<'_>, trace: &mut Trace) -> Attempt;
}

/// Primary config blob (`<App>/<App>.conf`)
pub struct MainConfig;

/// Project files under the last autosave directory
pub struct BackupPath;

/// Settings blobs left in the slicer's temp working directory
pub struct TempDir;

/// Recent and well-known project archives
pub struct ArchiveScan;

/// Strategies in cascade order
pub const STRATEGIES: [&dyn Strategy; 4] = [&MainConfig, &BackupPath, &TempDir, &ArchiveScan];

impl Strategy for MainConfig {
    fn name(&self) -> &'static str {
        "main_config"
    }

    fn attempt(&self, ctx: &ResolveContext<'_>, _trace: &mut Trace) -> Attempt {
        let (path, config) = match ctx.main_config() {
            MainConfigState::Loaded { path, value } => (path, value),
            missing => return missing.as_attempt(),
        };

        let Some(selection) = global_selection(config).or_else(|| printer_selection(config)) else {
            return Attempt::missed(TraceStatus::Empty)
                .with_detail("path", path.display().to_string())
                .with_detail("reason", "no filament colors");
        };

        let slots = selection.colors.len().max(selection.names.len());
        let mut lookups = 0usize;
        let records: Vec<FilamentRecord> = (0..slots)
            .filter_map(|index| {
                let name = selection.names.get(index).map(String::as_str).unwrap_or_default();
                let mut color = selection
                    .colors
                    .get(index)
                    .map(|raw| normalize_color(raw))
                    .unwrap_or_default();
                if color.is_empty() && !name.is_empty() {
                    lookups += 1;
                    color = ctx.presets().lookup(name).unwrap_or_default().to_string();
                }
                if color.is_empty() && name.is_empty() {
                    return None;
                }
                let slot = index as u32 + 1;
                let mut record = FilamentRecord::new(slot, name, &color, "", "");
                if record.name.is_empty() {
                    record.name = format!("{} #{}", record.material, slot);
                }
                Some(record)
            })
            .collect();

        let base = if records.iter().any(|record| !record.color.is_empty()) {
            Attempt::from_records(records).via(selection.via)
        } else {
            Attempt::missed(TraceStatus::Empty).with_detail("reason", "no resolvable colors")
        };
        let mut attempt = base
            .with_detail("path", path.display().to_string())
            .with_detail("preset_lookups", lookups);
        if let Some((machine, kind)) = selection.machine {
            attempt = attempt
                .with_detail("machine", machine)
                .with_detail("match", kind.as_str());
        }
        attempt
    }
}

/// Color list plus aligned names picked out of the main config
struct Selection {
    colors: Vec<String>,
    names: Vec<String>,
    via: &'static str,
    machine: Option<(String, ProfileMatch)>,
}

/// How a per-printer entry was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileMatch {
    Exact,
    Prefix,
    /// No name matched; the last entry is assumed most recently used
    MostRecent,
}

impl ProfileMatch {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileMatch::Exact => "exact",
            ProfileMatch::Prefix => "prefix",
            ProfileMatch::MostRecent => "most_recent",
        }
    }
}

/// `presets.filament_colors` with `presets.filaments` or `filament`,
/// `filament_01`, ... names
fn global_selection(config: &Value) -> Option<Selection> {
    let presets = config.get("presets")?.as_object()?;
    let colors = string_list(presets.get("filament_colors")?, true);
    if colors.iter().all(|color| color.is_empty()) {
        return None;
    }
    let names = match presets.get("filaments") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().unwrap_or_default().trim().to_string())
            .collect(),
        _ => sequential_filaments(presets),
    };
    Some(Selection {
        colors,
        names,
        via: "presets",
        machine: None,
    })
}

/// Per-printer entry matching the active printer
fn printer_selection(config: &Value) -> Option<Selection> {
    let entries: Vec<&Map<String, Value>> = keys::PRINTER_PRESETS
        .iter()
        .filter_map(|key| config.get(*key)?.as_array())
        .find(|items| !items.is_empty())?
        .iter()
        .filter_map(Value::as_object)
        .collect();
    let active = config
        .get("presets")
        .and_then(|presets| presets.get("machine"))
        .and_then(Value::as_str);

    let (entry, kind) = select_printer_profile(&entries, active)?;
    let colors = entry
        .get("filament_colors")
        .map(|value| string_list(value, true))
        .unwrap_or_default();
    debug!(machine = machine_name(entry), kind = kind.as_str(), "Selected printer preset entry");
    Some(Selection {
        colors,
        names: sequential_filaments(entry),
        via: "printer_presets",
        machine: Some((machine_name(entry).to_string(), kind)),
    })
}

/// Pick the entry for `active`: exact name, then normalized prefix, then the
/// last entry
pub fn select_printer_profile<'a>(
    entries: &[&'a Map<String, Value>],
    active: Option<&str>,
) -> Option<(&'a Map<String, Value>, ProfileMatch)> {
    let last = *entries.last()?;
    let Some(active) = active.map(str::trim).filter(|active| !active.is_empty()) else {
        return Some((last, ProfileMatch::MostRecent));
    };

    if let Some(entry) = entries.iter().find(|entry| machine_name(entry) == active) {
        return Some((*entry, ProfileMatch::Exact));
    }

    let active_lower = active.to_lowercase();
    let stripped = strip_profile_suffix(active).to_lowercase();
    let named = || {
        entries
            .iter()
            .map(|entry| (*entry, machine_name(entry).to_lowercase()))
            .filter(|(_, machine)| !machine.is_empty())
    };
    if let Some((entry, _)) = named().find(|(_, machine)| *machine == stripped) {
        return Some((entry, ProfileMatch::Prefix));
    }
    if let Some((entry, _)) = named().find(|(_, machine)| active_lower.starts_with(machine.as_str())) {
        return Some((entry, ProfileMatch::Prefix));
    }

    Some((last, ProfileMatch::MostRecent))
}

/// `"Printer_A_0.4"` -> `"Printer_A"`, `"X1C @ 0.4"` -> `"X1C"`
fn strip_profile_suffix(name: &str) -> &str {
    if let Some((base, _)) = name.split_once('@') {
        return base.trim();
    }
    match name.rsplit_once('_') {
        Some((base, _)) if !base.is_empty() => base.trim(),
        _ => name.trim(),
    }
}

fn machine_name(entry: &Map<String, Value>) -> &str {
    entry
        .get("machine")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default()
}

/// `filament`, `filament_01`, `filament_02`, ... until the first gap
fn sequential_filaments(map: &Map<String, Value>) -> Vec<String> {
    let mut names = Vec::new();
    let Some(first) = map.get("filament").and_then(Value::as_str) else {
        return names;
    };
    names.push(first.trim().to_string());
    for index in 1.. {
        match map.get(&format!("filament_{index:02}")).and_then(Value::as_str) {
            Some(name) => names.push(name.trim().to_string()),
            None => break,
        }
    }
    names
}

/// A delimited string or an array of strings
fn string_list(value: &Value, allow_comma: bool) -> Vec<String> {
    match value {
        Value::String(raw) => split_list(raw, allow_comma),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().unwrap_or_default().trim().to_string())
            .collect(),
        _ => Vec::new(),
    }
}

impl Strategy for BackupPath {
    fn name(&self) -> &'static str {
        "backup_path"
    }

    fn attempt(&self, ctx: &ResolveContext<'_>, trace: &mut Trace) -> Attempt {
        let Some(config) = ctx.main_config().value() else {
            return Attempt::missed(TraceStatus::Absent).with_detail("reason", "main config unavailable");
        };
        let backup_dir = config
            .get("app")
            .and_then(|app| app.get(keys::LAST_BACKUP_PATH))
            .or_else(|| config.get(keys::LAST_BACKUP_PATH))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);
        let Some(backup_dir) = backup_dir else {
            return Attempt::missed(TraceStatus::Absent).with_detail("reason", "no last_backup_path");
        };
        let dir_detail = backup_dir.display().to_string();
        if !backup_dir.is_dir() {
            return Attempt::missed(TraceStatus::Absent).with_detail("path", dir_detail);
        }

        let metadata = backup_dir.join(backup::METADATA_DIR);
        let files = [
            ("project_settings", backup::PROJECT_SETTINGS),
            ("slice_info", backup::SLICE_INFO),
        ];
        let mut statuses = Vec::with_capacity(files.len());
        for (label, file) in files {
            let path = metadata.join(file);
            let attempt = parse_file(&path, ctx.settings.max_text_chars);
            trace.record(format!("{}.{label}", self.name()), &attempt);
            if attempt.is_found() {
                return attempt.via(label).with_detail("path", dir_detail);
            }
            statuses.push(attempt.status());
        }
        Attempt::missed(summarize(&statuses)).with_detail("path", dir_detail)
    }
}

impl Strategy for TempDir {
    fn name(&self) -> &'static str {
        "temp_dir"
    }

    fn attempt(&self, ctx: &ResolveContext<'_>, _trace: &mut Trace) -> Attempt {
        let dirs: Vec<PathBuf> = ctx
            .locations
            .slicer_temp_dirs(ctx.slicer)
            .into_iter()
            .filter(|dir| dir.is_dir())
            .collect();
        if dirs.is_empty() {
            return Attempt::missed(TraceStatus::Absent);
        }
        let dirs_detail: Vec<Value> = dirs
            .iter()
            .map(|dir| Value::from(dir.display().to_string()))
            .collect();

        let files = newest_config_files(&dirs, ctx.settings.max_temp_files);
        if files.is_empty() {
            return Attempt::missed(TraceStatus::Absent).with_detail("dirs", dirs_detail);
        }

        let mut statuses = Vec::with_capacity(files.len());
        for (index, path) in files.iter().enumerate() {
            let attempt = parse_file(path, ctx.settings.max_text_chars);
            if attempt.is_found() {
                return attempt
                    .with_detail("path", path.display().to_string())
                    .with_detail("examined", index + 1);
            }
            statuses.push(attempt.status());
        }
        Attempt::missed(summarize(&statuses))
            .with_detail("dirs", dirs_detail)
            .with_detail("examined", files.len())
    }
}

/// `.config` files below `dirs`, newest first, at most `limit`
fn newest_config_files(dirs: &[PathBuf], limit: usize) -> Vec<PathBuf> {
    let mut files: Vec<(SystemTime, PathBuf)> = dirs
        .iter()
        .flat_map(|dir| WalkDir::new(dir).into_iter().filter_map(|entry| entry.ok()))
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("config"))
        })
        .map(|entry| {
            let modified = entry
                .metadata()
                .ok()
                .and_then(|meta| meta.modified().ok())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, entry.into_path())
        })
        .collect();
    files.sort_by(|(a_time, a_path), (b_time, b_path)| {
        b_time.cmp(a_time).then_with(|| a_path.cmp(b_path))
    });
    files.dedup_by(|a, b| a.1 == b.1);
    files.truncate(limit);
    files.into_iter().map(|(_, path)| path).collect()
}

impl Strategy for ArchiveScan {
    fn name(&self) -> &'static str {
        "archive_scan"
    }

    fn attempt(&self, ctx: &ResolveContext<'_>, trace: &mut Trace) -> Attempt {
        let candidates = collect_candidates(ctx.slicer, ctx.locations, ctx.main_config().value());
        if candidates.is_empty() {
            return Attempt::missed(TraceStatus::Absent);
        }
        let total = candidates.len();

        let mut examined = 0usize;
        for path in candidates.iter().take(ctx.settings.max_archives) {
            examined += 1;
            if let Some(extraction) = archive::extract(path, ctx.settings, trace, self.name()) {
                return Attempt::from_records(extraction.records)
                    .via(extraction.sub_source)
                    .with_detail("archive", path.display().to_string())
                    .with_detail("examined", examined);
            }
        }
        Attempt::missed(TraceStatus::Empty)
            .with_detail("candidates", total)
            .with_detail("examined", examined)
    }
}

/// Read and parse one settings file of unknown shape
fn parse_file(path: &Path, max_chars: usize) -> Attempt {
    let path_detail = path.display().to_string();
    if !path.is_file() {
        return Attempt::missed(TraceStatus::Absent).with_detail("path", path_detail);
    }
    let Some(text) = read_text(path, max_chars) else {
        debug!(path = %path.display(), "Unreadable settings file");
        return Attempt::missed(TraceStatus::Unreadable).with_detail("path", path_detail);
    };
    let (format, parsed) = parse_any(&text);
    if let Err(error) = &parsed {
        debug!(path = %path.display(), format = format.as_str(), error = %error, "Malformed settings file");
    }
    Attempt::from_parse(parsed)
        .with_detail("path", path_detail)
        .with_detail("format", format.as_str())
}

/// Most informative status of several misses: the first that is not `absent`
fn summarize(statuses: &[TraceStatus]) -> TraceStatus {
    statuses
        .iter()
        .copied()
        .find(|status| *status != TraceStatus::Absent)
        .unwrap_or(TraceStatus::Absent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entries(value: &Value) -> Vec<&Map<String, Value>> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|entry| entry.as_object().unwrap())
            .collect()
    }

    fn profiles() -> Value {
        json!([
            {"machine": "Printer_A"},
            {"machine": "Printer_B"},
            {"machine": "Printer_C 0.6"}
        ])
    }

    #[test]
    fn test_select_exact_match() {
        let profiles = profiles();
        let (entry, kind) = select_printer_profile(&entries(&profiles), Some("Printer_B")).unwrap();
        assert_eq!(machine_name(entry), "Printer_B");
        assert_eq!(kind, ProfileMatch::Exact);
    }

    #[test]
    fn test_select_prefix_match_strips_suffix() {
        let profiles = profiles();
        let (entry, kind) = select_printer_profile(&entries(&profiles), Some("Printer_A_0.4")).unwrap();
        assert_eq!(machine_name(entry), "Printer_A");
        assert_eq!(kind, ProfileMatch::Prefix);

        let (entry, _) = select_printer_profile(&entries(&profiles), Some("printer_b @ 0.2 nozzle")).unwrap();
        assert_eq!(machine_name(entry), "Printer_B");
    }

    #[test]
    fn test_select_active_starting_with_entry_name() {
        let profiles = json!([{"machine": "X1C"}, {"machine": "P1S"}]);
        let (entry, kind) = select_printer_profile(&entries(&profiles), Some("X1C 0.4 nozzle")).unwrap();
        assert_eq!(machine_name(entry), "X1C");
        assert_eq!(kind, ProfileMatch::Prefix);
    }

    #[test]
    fn test_select_falls_back_to_last_entry() {
        let profiles = profiles();
        let (entry, kind) = select_printer_profile(&entries(&profiles), Some("Voron")).unwrap();
        assert_eq!(machine_name(entry), "Printer_C 0.6");
        assert_eq!(kind, ProfileMatch::MostRecent);

        let (_, kind) = select_printer_profile(&entries(&profiles), None).unwrap();
        assert_eq!(kind, ProfileMatch::MostRecent);
        assert!(select_printer_profile(&[], Some("Printer_A")).is_none());
    }

    #[test]
    fn test_sequential_filaments_stop_at_gap() {
        let map = json!({
            "filament": "Red PLA",
            "filament_01": "Blue PETG",
            "filament_03": "Orphan"
        });
        assert_eq!(
            sequential_filaments(map.as_object().unwrap()),
            vec!["Red PLA".to_string(), "Blue PETG".to_string()]
        );
    }

    #[test]
    fn test_summarize_prefers_informative_status() {
        assert_eq!(summarize(&[TraceStatus::Absent, TraceStatus::Malformed]), TraceStatus::Malformed);
        assert_eq!(summarize(&[TraceStatus::Absent, TraceStatus::Absent]), TraceStatus::Absent);
        assert_eq!(summarize(&[]), TraceStatus::Absent);
    }
}
