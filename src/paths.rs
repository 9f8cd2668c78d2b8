//! Centralized path utilities for the launcher.

use std::path::{Path, PathBuf};

/// Config file looked up in the working directory first.
pub const LOCAL_CONFIG_FILE: &str = "wrangler-launcher.toml";

/// Get the root data directory for the launcher (~/.wrangler_dev_launcher).
pub fn get_data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".wrangler_dev_launcher"))
}

/// Get the path to the per-user config file.
pub fn user_config_path() -> Option<PathBuf> {
    get_data_dir().map(|dir| dir.join("config.toml"))
}

/// Pick the config file to load: an explicit path wins, then a
/// `wrangler-launcher.toml` in `cwd`, then the per-user config.
pub fn resolve_config_path(explicit: Option<&Path>, cwd: &Path) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    let local = cwd.join(LOCAL_CONFIG_FILE);
    if local.exists() {
        return local;
    }

    user_config_path().unwrap_or(local)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(LOCAL_CONFIG_FILE), "").unwrap();
        let explicit = dir.path().join("other.toml");
        assert_eq!(
            resolve_config_path(Some(&explicit), dir.path()),
            explicit
        );
    }

    #[test]
    fn local_file_preferred_over_user_config() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join(LOCAL_CONFIG_FILE);
        std::fs::write(&local, "").unwrap();
        assert_eq!(resolve_config_path(None, dir.path()), local);
    }
}
