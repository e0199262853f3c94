//! Where pgviews keeps its files

use std::path::PathBuf;

use crate::{Result, SettingsError};

pub const SETTINGS_FILE_NAME: &str = "pgviews.toml";

pub fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .ok_or(SettingsError::NoConfigDir)
        .map(|p| p.join("pgviews"))
}

/// `<config dir>/pgviews/pgviews.toml`
pub fn settings_file() -> Result<PathBuf> {
    config_dir().map(|p| p.join(SETTINGS_FILE_NAME))
}

/// Recorded view snapshot used to detect removed and changed views
pub fn snapshot_file() -> Result<PathBuf> {
    config_dir().map(|p| p.join("views.json"))
}

pub fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pgviews")
        .join("logs")
}
