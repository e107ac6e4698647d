//! Filesystem roots the resolver reads from
//!
//! Captured once from the environment so a resolution call never consults
//! env vars halfway through. Tests build these explicitly.

use std::env;
use std::path::{Path, PathBuf};

use crate::slicer::Slicer;

/// Read-only roots handed to the resolver
#[derive(Debug, Clone, Default)]
pub struct Locations {
    /// Per-user application data root (`%APPDATA%`, `~/.config`)
    pub config_root: Option<PathBuf>,
    /// User profile root (`%USERPROFILE%`, `$HOME`)
    pub home: Option<PathBuf>,
    /// Temp root (`%TEMP%`)
    pub temp: Option<PathBuf>,
    /// Directories holding slicer installations, in search order
    pub program_dirs: Vec<PathBuf>,
    /// Fall back to a `PATH` search when locating executables
    pub search_path: bool,
}

impl Locations {
    pub fn from_env() -> Self {
        let config_root = env_path("APPDATA").or_else(dirs::config_dir);
        let home = env_path("USERPROFILE").or_else(dirs::home_dir);
        let temp = env_path("TEMP")
            .or_else(|| env_path("TMP"))
            .or_else(|| Some(env::temp_dir()));

        let mut program_dirs: Vec<PathBuf> = ["ProgramFiles", "ProgramFiles(x86)"]
            .iter()
            .filter_map(|var| env_path(var))
            .collect();
        if let Some(local) = env_path("LOCALAPPDATA").or_else(dirs::data_local_dir) {
            program_dirs.push(local.join("Programs"));
        }
        program_dirs.dedup();

        Self {
            config_root,
            home,
            temp,
            program_dirs,
            search_path: true,
        }
    }

    /// `<config_root>/<SlicerDir>`
    pub fn slicer_data_dir(&self, slicer: Slicer) -> Option<PathBuf> {
        self.config_root
            .as_deref()
            .map(|root| root.join(slicer.data_dir_name()))
    }

    /// `<config_root>/<SlicerDir>/<Slicer>.conf`
    pub fn main_config_file(&self, slicer: Slicer) -> Option<PathBuf> {
        self.slicer_data_dir(slicer)
            .map(|dir| dir.join(slicer.config_file_name()))
    }

    /// Slicer working directories under the temp root
    pub fn slicer_temp_dirs(&self, slicer: Slicer) -> Vec<PathBuf> {
        let Some(temp) = self.temp.as_deref() else {
            return Vec::new();
        };
        slicer
            .temp_dir_names()
            .iter()
            .map(|name| temp.join(name))
            .collect()
    }

    /// Well-known folders where users keep project files, shallow-scanned
    pub fn project_folders(&self, slicer: Slicer) -> Vec<PathBuf> {
        let mut folders = Vec::new();
        if let Some(data) = self.slicer_data_dir(slicer) {
            folders.push(data.join("projects"));
            folders.push(data.join("cache"));
        }
        if let Some(home) = self.home.as_deref() {
            folders.extend(user_folders(home));
        }
        folders
    }
}

fn user_folders(home: &Path) -> impl Iterator<Item = PathBuf> + '_ {
    ["Desktop", "Documents", "Downloads", "3D Objects"]
        .into_iter()
        .map(move |name| home.join(name))
}

fn env_path(var: &str) -> Option<PathBuf> {
    env::var_os(var)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locations() -> Locations {
        Locations {
            config_root: Some(PathBuf::from("/roaming")),
            home: Some(PathBuf::from("/home/user")),
            temp: Some(PathBuf::from("/tmp")),
            ..Locations::default()
        }
    }

    #[test]
    fn test_main_config_file() {
        assert_eq!(
            locations().main_config_file(Slicer::Bambu),
            Some(PathBuf::from("/roaming/BambuStudio/BambuStudio.conf"))
        );
        assert_eq!(Locations::default().main_config_file(Slicer::Orca), None);
    }

    #[test]
    fn test_orca_temp_aliases() {
        let dirs = locations().slicer_temp_dirs(Slicer::Orca);
        assert_eq!(dirs.len(), 3);
        assert_eq!(dirs[0], PathBuf::from("/tmp/orcaslicer_model"));
    }

    #[test]
    fn test_project_folders_order() {
        let folders = locations().project_folders(Slicer::Bambu);
        assert_eq!(folders[0], PathBuf::from("/roaming/BambuStudio/projects"));
        assert_eq!(folders.last(), Some(&PathBuf::from("/home/user/3D Objects")));
        assert_eq!(folders.len(), 6);
    }
}
