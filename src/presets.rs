//! Preset name -> color index
//!
//! When a config names a filament preset but carries no color for it, the
//! color comes from the preset document itself. Roots are walked in priority
//! order (user, vendor/system, installation) and the first color seen for a
//! name wins. Rebuilt for every resolution call.

use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::color::{normalize_color, normalize_value};
use crate::config::{BridgeSettings, Locations};
use crate::constants::keys;
use crate::filament::clean_preset_name;
use crate::parse::settings::split_list;
use crate::parse::structured::{parse_key_values, parse_structured};
use crate::parse::text::read_text;
use crate::slicer::Slicer;

#[derive(Debug, Clone, Default)]
pub struct PresetIndex {
    colors: HashMap<String, String>,
}

impl PresetIndex {
    /// Walk every preset root for `slicer`
    pub fn build(slicer: Slicer, locations: &Locations, settings: &BridgeSettings) -> Self {
        let mut index = Self::default();
        let roots = preset_roots(slicer, locations);
        for root in &roots {
            index.index_root(root, settings);
        }
        debug!(slicer = %slicer, roots = roots.len(), keys = index.len(), "Built preset index");
        index
    }

    /// Register `name` (plus lowercase and `@`-stripped variants); existing
    /// keys are kept
    pub fn insert(&mut self, name: &str, color: &str) {
        let name = name.trim();
        if name.is_empty() || color.is_empty() {
            return;
        }
        let base = clean_preset_name(name);
        for key in [
            name.to_string(),
            name.to_lowercase(),
            base.clone(),
            base.to_lowercase(),
        ] {
            if !key.is_empty() {
                self.colors.entry(key).or_insert_with(|| color.to_string());
            }
        }
    }

    /// Color for a preset name, trying the same variants `insert` registers
    pub fn lookup(&self, name: &str) -> Option<&str> {
        let name = name.trim();
        let base = clean_preset_name(name);
        [
            name.to_string(),
            name.to_lowercase(),
            base.clone(),
            base.to_lowercase(),
        ]
        .iter()
        .find_map(|key| self.colors.get(key))
        .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    fn index_root(&mut self, root: &Path, settings: &BridgeSettings) {
        let walker = WalkDir::new(root)
            .max_depth(settings.preset_scan_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file());

        for entry in walker {
            let path = entry.path();
            match extension(path).as_deref() {
                Some("json") => self.index_json(path, settings.max_text_chars),
                // Legacy presets without a JSON sibling
                Some("ini") if !path.with_extension("json").is_file() => {
                    self.index_ini(path, settings.max_text_chars);
                }
                _ => {}
            }
        }
    }

    fn index_json(&mut self, path: &Path, max_chars: usize) {
        let parsed = read_text(path, max_chars).and_then(|text| parse_structured(&text).ok());
        if let Some(Value::Object(map)) = parsed {
            let name = map
                .get("name")
                .and_then(Value::as_str)
                .or_else(|| {
                    keys::PRESET_SETTING_ID
                        .iter()
                        .find_map(|key| map.get(*key).and_then(Value::as_str))
                })
                .map(str::to_string)
                .unwrap_or_else(|| file_stem(path));
            let color = keys::PRESET_COLOR
                .iter()
                .map(|key| normalize_value(map.get(*key)))
                .find(|color| !color.is_empty());
            if let Some(color) = color {
                self.insert(&name, &color);
                return;
            }
        }

        let sibling = path.with_extension("ini");
        if sibling.is_file() {
            self.index_ini(&sibling, max_chars);
        }
    }

    fn index_ini(&mut self, path: &Path, max_chars: usize) {
        let Some(text) = read_text(path, max_chars) else {
            return;
        };
        let map = parse_key_values(&text);
        let name = ["name"]
            .iter()
            .chain(keys::PRESET_SETTING_ID)
            .find_map(|key| map.get(*key))
            .map(|name| name.trim_matches('"').to_string())
            .unwrap_or_else(|| file_stem(path));
        let color = keys::PRESET_COLOR
            .iter()
            .filter_map(|key| map.get(*key))
            .filter_map(|raw| split_list(raw, true).into_iter().next())
            .map(|raw| normalize_color(&raw))
            .find(|color| !color.is_empty());
        if let Some(color) = color {
            self.insert(&name, &color);
        }
    }
}

/// Preset directories in priority order: user, system/vendor, installation
pub fn preset_roots(slicer: Slicer, locations: &Locations) -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Some(data) = locations.slicer_data_dir(slicer) {
        for profile in sorted_subdirs(&data.join("user")) {
            let filament = profile.join("filament");
            roots.push(filament.join("base"));
            roots.push(filament);
        }
        for vendor in sorted_subdirs(&data.join("system")) {
            roots.push(vendor.join("filament"));
        }
    }
    if let Some(profiles) = slicer.install_profiles_dir(locations) {
        for vendor in sorted_subdirs(&profiles) {
            roots.push(vendor.join("filament"));
        }
    }
    roots.retain(|root| root.is_dir());
    roots
}

fn sorted_subdirs(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();
    dirs
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn locations(root: &Path) -> Locations {
        Locations {
            config_root: Some(root.to_path_buf()),
            ..Locations::default()
        }
    }

    #[test]
    fn test_insert_registers_variants_first_wins() {
        let mut index = PresetIndex::default();
        index.insert("Bambu PLA Basic @BBL X1C", "#FFFFFF");
        index.insert("Bambu PLA Basic", "#000000");
        assert_eq!(index.lookup("Bambu PLA Basic @BBL X1C"), Some("#FFFFFF"));
        assert_eq!(index.lookup("bambu pla basic"), Some("#FFFFFF"));
        assert_eq!(index.lookup("Bambu PLA Basic @BBL A1"), Some("#FFFFFF"));
        assert_eq!(index.lookup("Unknown"), None);
    }

    #[test]
    fn test_user_presets_beat_system_presets() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("BambuStudio");
        write(
            &data.join("user/123/filament/My Silk.json"),
            r##"{"name": "My Silk @BBL X1C", "filament_colour": ["#c0c0c0"]}"##,
        );
        write(
            &data.join("system/BBL/filament/My Silk.json"),
            r##"{"name": "My Silk", "default_filament_colour": "#ff0000"}"##,
        );
        write(
            &data.join("system/BBL/filament/Generic PETG.json"),
            r##"{"filament_settings_id": ["Generic PETG"], "color": "#0f0",}"##,
        );

        let index = PresetIndex::build(Slicer::Bambu, &locations(dir.path()), &BridgeSettings::default());
        assert_eq!(index.lookup("My Silk"), Some("#C0C0C0"));
        assert_eq!(index.lookup("Generic PETG"), Some("#00FF00"));
    }

    #[test]
    fn test_name_falls_back_to_file_stem_and_ini_sibling() {
        let dir = TempDir::new().unwrap();
        let filament = dir.path().join("OrcaSlicer/system/Generic/filament");
        write(&filament.join("Stem Named.json"), r##"{"filament_colour": "#123456"}"##);
        write(&filament.join("Legacy.json"), "not json at all");
        write(&filament.join("Legacy.ini"), "name = Legacy TPU\nfilament_colour = #abcdef;#000000\n");
        write(&filament.join("Lonely.ini"), "filament_colour = \"#FEDCBA\"\n");

        let index = PresetIndex::build(Slicer::Orca, &locations(dir.path()), &BridgeSettings::default());
        assert_eq!(index.lookup("Stem Named"), Some("#123456"));
        assert_eq!(index.lookup("legacy tpu"), Some("#ABCDEF"));
        assert_eq!(index.lookup("Lonely"), Some("#FEDCBA"));
    }

    #[test]
    fn test_install_profiles_rank_below_user_presets() {
        let dir = TempDir::new().unwrap();
        let install = dir.path().join("programs").join("OrcaSlicer");
        write(&install.join("orca-slicer.exe"), "");
        let vendor = install.join("resources/profiles/Generic/filament");
        write(&vendor.join("Generic ASA.json"), r##"{"name": "Generic ASA", "filament_colour": ["#101010"]}"##);
        write(&vendor.join("Shared PLA.json"), r##"{"name": "Shared PLA", "filament_colour": ["#202020"]}"##);
        write(
            &dir.path().join("OrcaSlicer/user/default/filament/Shared PLA.json"),
            r##"{"name": "Shared PLA", "filament_colour": ["#303030"]}"##,
        );

        let locations = Locations {
            config_root: Some(dir.path().to_path_buf()),
            program_dirs: vec![dir.path().join("programs")],
            ..Locations::default()
        };
        let roots = preset_roots(Slicer::Orca, &locations);
        assert_eq!(roots.last(), Some(&vendor));

        let index = PresetIndex::build(Slicer::Orca, &locations, &BridgeSettings::default());
        assert_eq!(index.lookup("Generic ASA"), Some("#101010"));
        assert_eq!(index.lookup("Shared PLA"), Some("#303030"));
    }

    #[test]
    fn test_missing_roots_give_empty_index() {
        let index = PresetIndex::build(Slicer::Bambu, &Locations::default(), &BridgeSettings::default());
        assert!(index.is_empty());
    }
}
