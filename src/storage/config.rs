//! Configuration handling for ect
//!
//! Configuration is read from the global `config.toml` in the user config
//! directory (or the file named by `$ECT_CONFIG`) and from `.ect/config.toml`
//! in the nearest project directory. Project settings extend the global ones.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming an alternative global config file
pub const CONFIG_ENV: &str = "ECT_CONFIG";

/// Name of the per-project directory
pub const PROJECT_DIR: &str = ".ect";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// A named data source that `list ds` can show
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSourceConfig {
    /// Unique data source name
    pub name: String,

    /// Local directory or file holding the data
    pub path: PathBuf,

    /// Human-readable description
    #[serde(default)]
    pub description: Option<String>,
}

/// Settings shared by the global and project files
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Show progress for `run` even without `--monitor`
    pub monitor: Option<bool>,

    /// Extra directories searched for `ect-*` plugin executables
    pub plugin_dirs: Vec<PathBuf>,

    /// Declared data sources
    pub data_sources: Vec<DataSourceConfig>,
}

impl Settings {
    /// Layers `other` on top of `self`
    fn merge(mut self, other: Settings) -> Self {
        if other.monitor.is_some() {
            self.monitor = other.monitor;
        }
        self.plugin_dirs.extend(other.plugin_dirs);
        for source in other.data_sources {
            self.data_sources.retain(|s| s.name != source.name);
            self.data_sources.push(source);
        }
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (i, source) in self.data_sources.iter().enumerate() {
            if source.name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "data source #{} has an empty name",
                    i + 1
                )));
            }
        }
        Ok(())
    }
}

/// Combined configuration (global + project)
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub settings: Settings,
    pub project_root: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from default locations
    pub fn load() -> Result<Self> {
        let global = Self::load_global()?;
        let project_root = Self::find_project_root();

        let settings = match &project_root {
            Some(root) => global.merge(Self::load_file(&root.join(PROJECT_DIR).join("config.toml"))?),
            None => global,
        };
        settings.validate()?;

        Ok(Self {
            settings,
            project_root,
        })
    }

    /// Returns the global config file path
    pub fn global_config_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        ProjectDirs::from("org", "ect", "ect").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    fn load_global() -> Result<Settings> {
        match Self::global_config_path() {
            Some(path) => Self::load_file(&path),
            None => Ok(Settings::default()),
        }
    }

    /// Loads one settings file; a missing file yields defaults
    fn load_file(path: &Path) -> Result<Settings> {
        if !path.exists() {
            return Ok(Settings::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        Self::parse(&content).with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    fn parse(content: &str) -> Result<Settings, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Finds the project root by looking for an `.ect/` directory
    pub fn find_project_root() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;

        loop {
            if current.join(PROJECT_DIR).is_dir() {
                return Some(current);
            }

            if !current.pop() {
                return None;
            }
        }
    }

    /// Whether `run` reports progress when `--monitor` is not given
    pub fn monitor_by_default(&self) -> bool {
        self.settings.monitor.unwrap_or(false)
    }

    /// All directories to search for plugins, project-local first
    pub fn plugin_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        if let Some(root) = &self.project_root {
            dirs.push(root.join(PROJECT_DIR).join("plugins"));
        }
        dirs.extend(self.settings.plugin_dirs.iter().cloned());
        dirs
    }
}
