//! Application-wide constants
//!
//! File names, key aliases and limits used by the resolver. Slicers rename
//! keys between releases, so most lookups go through an alias list rather than
//! a single key.

/// Bridge application identity
pub mod app {
    /// Human-readable application name
    pub const NAME: &str = "Keycap Slicer Bridge";

    /// Directory under the user config dir holding `config.json`
    pub const CONFIG_DIR: &str = "slicer-bridge";

    /// Settings file name
    pub const CONFIG_FILENAME: &str = "config.json";
}

/// Default limits (overridable through `BridgeSettings`)
pub mod limits {
    /// Archives examined by the archive scan, newest first
    pub const MAX_ARCHIVES: usize = 20;

    /// Characters kept from any decoded text file
    pub const MAX_TEXT_CHARS: usize = 2_000_000;

    /// Per-filament preset documents read from one archive
    pub const MAX_PRESET_DOCUMENTS: usize = 32;

    /// `xmlns="..."` declarations stripped from a model document
    pub const MAX_NAMESPACE_SUBSTITUTIONS: usize = 3;

    /// Config files examined in the slicer temp directory
    pub const MAX_TEMP_FILES: usize = 200;

    /// Directory depth walked below each preset root
    pub const PRESET_SCAN_DEPTH: usize = 2;
}

/// Key aliases found in slicer settings documents
pub mod keys {
    /// Per-slot color arrays, most specific first
    pub const COLOR: &[&str] = &[
        "filament_colour",
        "filament_color",
        "filament_colors",
        "default_filament_colour",
    ];

    /// Per-slot preset names
    pub const NAME: &[&str] = &["filament_settings_id", "filament_name", "filament_preset"];

    /// Per-slot material codes
    pub const TYPE: &str = "filament_type";

    /// Per-slot vendor names
    pub const VENDOR: &str = "filament_vendor";

    /// Color keys inside a single preset document
    pub const PRESET_COLOR: &[&str] = &[
        "default_filament_colour",
        "filament_colour",
        "filament_color",
        "color",
    ];

    /// Fallback name keys inside a single preset document
    pub const PRESET_SETTING_ID: &[&str] = &["setting_id", "filament_settings_id"];

    /// Name attributes on a slice_info `<filament>` element
    pub const SLICE_INFO_NAME: &[&str] = &["name", "filament_name", "settings_id"];

    /// Per-printer preset lists in the main config blob
    pub const PRINTER_PRESETS: &[&str] = &["orca_presets", "printer_presets"];

    /// Recent project list in the main config blob
    pub const RECENT_PROJECTS: &str = "recent_projects";

    /// Last backup directory in the main config blob
    pub const LAST_BACKUP_PATH: &str = "last_backup_path";
}

/// Entry names inside a 3MF archive
pub mod archive {
    /// Project settings blob marker
    pub const PROJECT_SETTINGS_MARKER: &str = "project_settings";

    /// Slice info blob marker
    pub const SLICE_INFO_MARKER: &str = "slice_info";

    /// Extension shared by the Metadata config blobs
    pub const CONFIG_EXTENSION: &str = ".config";

    /// Per-filament preset document prefix
    pub const FILAMENT_PRESET_PREFIX: &str = "Metadata/filament_settings";

    /// Marker for loose per-filament preset documents
    pub const FILAMENT_MARKER: &str = "filament";

    /// Structured preset document extension
    pub const JSON_EXTENSION: &str = ".json";

    /// Canonical 3D model part
    pub const MODEL_ENTRY: &str = "3d/3dmodel.model";

    /// Extension of any model part
    pub const MODEL_EXTENSION: &str = ".model";

    /// Project file extension searched by the candidate collector
    pub const PROJECT_EXTENSION: &str = "3mf";
}

/// Backup directory layout used by the slicers' autosave
pub mod backup {
    /// Metadata subdirectory inside a backup folder
    pub const METADATA_DIR: &str = "Metadata";

    /// Settings blob file name
    pub const PROJECT_SETTINGS: &str = "project_settings.config";

    /// Slice info file name
    pub const SLICE_INFO: &str = "slice_info.config";
}

/// Material heuristics
pub mod material {
    /// Codes matched by substring, in priority order (PETG before PET)
    pub const KNOWN_TYPES: &[&str] = &[
        "PETG", "PLA", "ABS", "ASA", "TPU", "PC", "PA", "PVA", "HIPS", "PET", "PP",
    ];

    /// Type assumed when nothing matches
    pub const DEFAULT_TYPE: &str = "PLA";
}
