//! Configuration module for TidyMind search
//!
//! Handles loading settings from YAML files and environment variables.

mod settings;

pub use settings::*;

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::info;

/// Load settings from an explicit path, the environment, or the default locations.
///
/// Falls back to defaults when no settings file is found. Environment
/// overrides are applied in every case. Invalid timeouts are an error.
pub fn load(explicit: Option<&Path>) -> Result<Settings> {
    let mut settings = match find_settings_file(explicit) {
        Some(path) => {
            info!("Loading settings from: {}", path.display());
            Settings::from_file(&path)?
        }
        None => {
            info!("No settings file found, using defaults");
            Settings::default()
        }
    };
    settings.merge_env();
    settings.validate()?;
    Ok(settings)
}

/// Locate the settings file to use, if any
fn find_settings_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    // Check environment variable first
    if let Ok(path) = std::env::var("TIDYMIND_SETTINGS_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let mut paths = vec![
        PathBuf::from("settings.yml"),
        PathBuf::from("config/settings.yml"),
    ];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("tidymind/settings.yml"));
    }

    paths.into_iter().find(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_wins() {
        let path = Path::new("/nonexistent/tidymind.yml");
        assert_eq!(find_settings_file(Some(path)), Some(path.to_path_buf()));
    }

    #[test]
    fn test_load_rejects_negative_timeout() {
        let path = std::env::temp_dir().join(format!(
            "tidymind-negative-timeout-{}.yml",
            std::process::id()
        ));
        std::fs::write(&path, "search:\n  source_timeout: -1.0\n").unwrap();
        let result = load(Some(&path));
        std::fs::remove_file(&path).unwrap();

        let err = result.unwrap_err();
        assert!(err.to_string().contains("source_timeout"));
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        assert!(load(Some(Path::new("/nonexistent/tidymind.yml"))).is_err());
    }
}
