//! Candidate project archives, newest first
//!
//! Sources: the slicer's recent-project list plus a shallow scan of the
//! folders users usually save projects to. Anything missing or unreadable is
//! skipped without complaint.

use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

use crate::config::Locations;
use crate::constants::{archive, keys};
use crate::slicer::Slicer;

/// Collect `.3mf` files, deduplicated by case-normalized absolute path and
/// sorted newest-modified first
pub fn collect_candidates(
    slicer: Slicer,
    locations: &Locations,
    main_config: Option<&Value>,
) -> Vec<PathBuf> {
    let mut paths = main_config.map(recent_projects).unwrap_or_default();
    for folder in locations.project_folders(slicer) {
        paths.extend(scan_folder(&folder));
    }

    let mut seen = HashSet::new();
    let mut candidates: Vec<(SystemTime, PathBuf)> = paths
        .into_iter()
        .filter(|path| is_project_file(path))
        .filter_map(|path| {
            let modified = fs::metadata(&path)
                .ok()
                .filter(|meta| meta.is_file())?
                .modified()
                .unwrap_or(SystemTime::UNIX_EPOCH);
            seen.insert(dedup_key(&path)).then_some((modified, path))
        })
        .collect();

    candidates.sort_by(|(a_time, a_path), (b_time, b_path)| {
        b_time.cmp(a_time).then_with(|| a_path.cmp(b_path))
    });
    debug!(slicer = %slicer, count = candidates.len(), "Collected candidate archives");
    candidates.into_iter().map(|(_, path)| path).collect()
}

/// Recent projects from the main config, as an array or a numbered map,
/// at the top level or under `app`
pub fn recent_projects(config: &Value) -> Vec<PathBuf> {
    let list = config
        .get(keys::RECENT_PROJECTS)
        .or_else(|| config.get("app").and_then(|app| app.get(keys::RECENT_PROJECTS)));

    match list {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(PathBuf::from)
            .collect(),
        Some(Value::Object(map)) => {
            let mut numbered: Vec<(u64, &str)> = map
                .iter()
                .filter_map(|(key, value)| Some((key.trim().parse().ok()?, value.as_str()?)))
                .collect();
            numbered.sort();
            numbered.into_iter().map(|(_, path)| PathBuf::from(path)).collect()
        }
        _ => Vec::new(),
    }
}

/// Files directly inside `dir`; errors skip the folder
fn scan_folder(dir: &Path) -> Vec<PathBuf> {
    match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .collect(),
        Err(e) => {
            if dir.exists() {
                debug!(path = %dir.display(), error = %e, "Skipping unreadable folder");
            }
            Vec::new()
        }
    }
}

fn is_project_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(archive::PROJECT_EXTENSION))
}

fn dedup_key(path: &Path) -> String {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    absolute.to_string_lossy().replace('\\', "/").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::fs::File;
    use std::time::Duration;
    use tempfile::TempDir;

    fn touch(path: &Path, age_secs: u64) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let file = File::create(path).unwrap();
        let modified = SystemTime::now() - Duration::from_secs(age_secs);
        file.set_modified(modified).unwrap();
    }

    #[test]
    fn test_recent_projects_shapes() {
        let array = json!({"recent_projects": ["/a.3mf", 3, "/b.3mf"]});
        assert_eq!(recent_projects(&array), vec![PathBuf::from("/a.3mf"), PathBuf::from("/b.3mf")]);

        let numbered = json!({"app": {"recent_projects": {"10": "/c.3mf", "2": "/b.3mf", "x": "/z.3mf"}}});
        assert_eq!(recent_projects(&numbered), vec![PathBuf::from("/b.3mf"), PathBuf::from("/c.3mf")]);

        assert!(recent_projects(&json!({})).is_empty());
    }

    #[test]
    fn test_collect_dedups_and_sorts_newest_first() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("home");
        let old = home.join("Documents").join("old.3mf");
        let new = home.join("Desktop").join("new.3MF");
        let recent_only = dir.path().join("elsewhere").join("recent.3mf");
        touch(&old, 3600);
        touch(&new, 10);
        touch(&recent_only, 600);
        touch(&home.join("Desktop").join("model.stl"), 0);

        let locations = Locations {
            home: Some(home.clone()),
            ..Locations::default()
        };
        let config = json!({"recent_projects": [
            old.to_string_lossy(),
            recent_only.to_string_lossy(),
            dir.path().join("missing.3mf").to_string_lossy(),
        ]});

        let candidates = collect_candidates(Slicer::Bambu, &locations, Some(&config));
        assert_eq!(candidates, vec![new, recent_only, old]);
    }

    #[test]
    fn test_no_sources_no_candidates() {
        assert!(collect_candidates(Slicer::Orca, &Locations::default(), None).is_empty());
    }
}
