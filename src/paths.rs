//! Locations of the app's data directory, temp images and the Vision helper.

use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

const APP_DATA_DIR_NAME: &str = ".snap-ocr";
pub const VISION_HELPER_NAME: &str = "vision-ocr.swift";
const BUNDLED_HELPER_DIR: &str = "assets/scripts";

/// Gets the user's home directory.
///
/// Tries `HOME` first (available on Windows 10+ too), then `USERPROFILE` on Windows.
pub fn get_home_dir() -> Result<PathBuf, String> {
    if let Ok(home) = env::var("HOME") {
        return Ok(PathBuf::from(home));
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(profile) = env::var("USERPROFILE") {
            return Ok(PathBuf::from(profile));
        }
    }

    Err("Could not determine home directory: HOME and USERPROFILE are not set".to_string())
}

/// `${HOME}/.snap-ocr`
pub fn get_app_data_dir() -> Result<PathBuf, String> {
    Ok(get_home_dir()?.join(APP_DATA_DIR_NAME))
}

/// `${HOME}/.snap-ocr/cache`, where clipboard and screenshot images are written.
pub fn get_cache_dir() -> Result<PathBuf, String> {
    Ok(get_app_data_dir()?.join("cache"))
}

/// `${HOME}/.snap-ocr/scripts`
pub fn get_scripts_dir() -> Result<PathBuf, String> {
    Ok(get_app_data_dir()?.join("scripts"))
}

/// Searches for the Vision helper script.
///
/// Order: `assets/scripts/vision-ocr.swift` beside the executable or any of its
/// ancestors, then under the current directory, then in the app scripts dir.
pub fn find_vision_helper() -> Option<PathBuf> {
    if let Ok(exe_path) = env::current_exe() {
        if let Some(found) = exe_path.parent().and_then(search_ancestors) {
            return Some(found);
        }
    }

    if let Ok(current_dir) = env::current_dir() {
        let candidate = current_dir.join(BUNDLED_HELPER_DIR).join(VISION_HELPER_NAME);
        if candidate.is_file() {
            return Some(canonical(candidate));
        }
    }

    let installed = get_scripts_dir().ok()?.join(VISION_HELPER_NAME);
    installed.is_file().then_some(installed)
}

/// The helper to use when none is configured. When the script cannot be found this
/// still returns the expected install location so the error names a real path.
pub fn bundled_vision_helper() -> PathBuf {
    if let Some(found) = find_vision_helper() {
        debug!(helper = %found.display(), "Found Vision helper");
        return found;
    }
    installed_vision_helper()
}

/// `${HOME}/.snap-ocr/scripts/vision-ocr.swift`, without checking that it exists.
pub fn installed_vision_helper() -> PathBuf {
    get_scripts_dir()
        .map(|dir| dir.join(VISION_HELPER_NAME))
        .unwrap_or_else(|_| PathBuf::from(VISION_HELPER_NAME))
}

fn search_ancestors(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(BUNDLED_HELPER_DIR).join(VISION_HELPER_NAME))
        .find(|candidate| candidate.is_file())
        .map(canonical)
}

fn canonical(path: PathBuf) -> PathBuf {
    path.canonicalize().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn ancestors_are_searched_for_the_bundled_script() {
        let root = tempfile::tempdir().unwrap();
        let scripts = root.path().join(BUNDLED_HELPER_DIR);
        fs::create_dir_all(&scripts).unwrap();
        fs::write(scripts.join(VISION_HELPER_NAME), "// helper").unwrap();

        let nested = root.path().join("target").join("debug");
        fs::create_dir_all(&nested).unwrap();

        let found = search_ancestors(&nested).unwrap();
        assert!(found.ends_with("assets/scripts/vision-ocr.swift"));
    }

    #[test]
    fn missing_script_is_not_found_in_ancestors() {
        let root = tempfile::tempdir().unwrap();
        assert_eq!(search_ancestors(root.path()), None);
    }

    #[test]
    fn bundled_helper_always_names_the_script() {
        assert!(bundled_vision_helper().ends_with(VISION_HELPER_NAME));
    }
}
