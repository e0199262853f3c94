//! The settings file

use indexmap::IndexMap;
use pgviews_driver_postgres::PostgresConfig;
use pgviews_objects::ViewRegistry;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::logging::{LogPreset, LoggingConfig};
use crate::{Result, SettingsError, ViewSettings, paths};

/// One configured database
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(flatten)]
    pub connection: PostgresConfig,
    /// Only views of these namespaces are migrated on this database
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespaces: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub preset: LogPreset,
    /// Overrides the preset's JSON file output
    pub json_logs: Option<bool>,
    pub log_dir: Option<PathBuf>,
    /// `EnvFilter` directives, overridden by `RUST_LOG`
    pub filter: Option<String>,
}

impl LoggingSettings {
    pub fn to_config(&self) -> LoggingConfig {
        let mut config = LoggingConfig::from_preset(self.preset);
        if let Some(json_logs) = self.json_logs {
            config.enable_json_logs = json_logs;
        }
        if let Some(log_dir) = &self.log_dir {
            config.log_dir = log_dir.clone();
        }
        if let Some(filter) = &self.filter {
            config.default_filter = filter.clone();
        }
        config
    }
}

/// Contents of `pgviews.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Alias commands use when none is given
    pub default_database: String,
    /// Compare materialized view definitions before recreating them
    pub materialized_views_check_sql_changed: bool,
    /// Do not sync views once migrations have run
    pub materialized_views_disable_sync_on_migrate: bool,
    pub databases: IndexMap<String, DatabaseSettings>,
    pub logging: LoggingSettings,
    pub views: Vec<ViewSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_database: "default".to_string(),
            materialized_views_check_sql_changed: false,
            materialized_views_disable_sync_on_migrate: false,
            databases: IndexMap::new(),
            logging: LoggingSettings::default(),
            views: Vec::new(),
        }
    }
}

impl Settings {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_toml_str(&content)?;
        tracing::debug!(
            path = %path.display(),
            databases = settings.databases.len(),
            views = settings.views.len(),
            "loaded settings"
        );
        Ok(settings)
    }

    /// Load from `path`, or from the default location when `None`
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Self::load(&paths::settings_file()?),
        }
    }

    pub fn database(&self, alias: &str) -> Result<&DatabaseSettings> {
        self.databases
            .get(alias)
            .ok_or_else(|| SettingsError::UnknownDatabase(alias.to_string()))
    }

    /// Registry of the views declared in the file, in file order
    pub fn registry(&self) -> Result<ViewRegistry> {
        let mut registry = ViewRegistry::new();
        for (index, view) in self.views.iter().enumerate() {
            let invalid = |source| SettingsError::InvalidView {
                index,
                label: view.label(),
                source,
            };
            let definition = view.to_definition().map_err(invalid)?;
            registry.register(definition).map_err(invalid)?;
        }
        Ok(registry)
    }
}
