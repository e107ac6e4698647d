//! Supported slicers and installation detection

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;

use crate::config::Locations;

/// Target slicer application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Slicer {
    Bambu,
    Orca,
}

impl Slicer {
    pub const ALL: [Slicer; 2] = [Slicer::Bambu, Slicer::Orca];

    /// Parse a target identifier (case-insensitive, a few aliases)
    pub fn from_id(id: &str) -> Option<Self> {
        match id.trim().to_ascii_lowercase().as_str() {
            "bambu" | "bambustudio" | "bambu-studio" | "bambu_studio" => Some(Slicer::Bambu),
            "orca" | "orcaslicer" | "orca-slicer" | "orca_slicer" => Some(Slicer::Orca),
            _ => None,
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Slicer::Bambu => "bambu",
            Slicer::Orca => "orca",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Slicer::Bambu => "Bambu Studio",
            Slicer::Orca => "OrcaSlicer",
        }
    }

    /// Directory under the config root holding the slicer's data
    pub fn data_dir_name(&self) -> &'static str {
        match self {
            Slicer::Bambu => "BambuStudio",
            Slicer::Orca => "OrcaSlicer",
        }
    }

    /// Main config blob file name
    pub fn config_file_name(&self) -> &'static str {
        match self {
            Slicer::Bambu => "BambuStudio.conf",
            Slicer::Orca => "OrcaSlicer.conf",
        }
    }

    /// Working directories the slicer creates under the temp root
    pub fn temp_dir_names(&self) -> &'static [&'static str] {
        match self {
            Slicer::Bambu => &["bamboo_model"],
            // Orca inherited Bambu's temp layout and kept the old name around
            Slicer::Orca => &["orcaslicer_model", "orca_model", "bamboo_model"],
        }
    }

    /// Installation folder names under the program directories
    fn install_dir_name(&self) -> &'static str {
        match self {
            Slicer::Bambu => "Bambu Studio",
            Slicer::Orca => "OrcaSlicer",
        }
    }

    /// Executable file names, Windows first
    fn executable_names(&self) -> &'static [&'static str] {
        match self {
            Slicer::Bambu => &["bambu-studio.exe", "bambu-studio"],
            Slicer::Orca => &["orca-slicer.exe", "orca-slicer"],
        }
    }

    /// Find the slicer executable: fixed install locations first, then `PATH`
    pub fn locate(&self, locations: &Locations) -> Option<PathBuf> {
        let fixed = locations.program_dirs.iter().flat_map(|dir| {
            self.executable_names()
                .iter()
                .map(move |exe| dir.join(self.install_dir_name()).join(exe))
        });
        for candidate in fixed {
            if candidate.is_file() {
                debug!(slicer = self.id(), path = %candidate.display(), "Found slicer executable");
                return Some(candidate);
            }
        }

        if !locations.search_path {
            return None;
        }
        self.executable_names()
            .iter()
            .find_map(|exe| which::which(exe).ok())
            .inspect(|path| debug!(slicer = self.id(), path = %path.display(), "Found slicer on PATH"))
    }

    /// Installation `resources/profiles` directory, when installed
    pub fn install_profiles_dir(&self, locations: &Locations) -> Option<PathBuf> {
        let exe = self.locate(locations)?;
        let dir = exe.parent()?.join("resources").join("profiles");
        dir.is_dir().then_some(dir)
    }
}

impl std::fmt::Display for Slicer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Availability of one slicer, as reported by the health endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlicerReport {
    pub name: &'static str,
    pub available: bool,
    pub path: String,
}

/// Detect every supported slicer
pub fn detect_all(locations: &Locations) -> BTreeMap<Slicer, SlicerReport> {
    Slicer::ALL
        .iter()
        .map(|slicer| {
            let path = slicer.locate(locations);
            let report = SlicerReport {
                name: slicer.display_name(),
                available: path.is_some(),
                path: path.map(|p| p.display().to_string()).unwrap_or_default(),
            };
            (*slicer, report)
        })
        .collect()
}
