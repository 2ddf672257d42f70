//! Plugin discovery
//!
//! Plugins are discovered from:
//! 1. PATH (executables starting with "ect-")
//! 2. `.ect/plugins/` of the nearest project
//! 3. `plugin_dirs` from configuration

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Executable name prefix that marks a plugin
pub const PLUGIN_PREFIX: &str = "ect-";

/// Where a plugin was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginSource {
    SearchPath,
    Directory,
}

impl PluginSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginSource::SearchPath => "PATH",
            PluginSource::Directory => "plugin dir",
        }
    }
}

/// Information about a discovered plugin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInfo {
    /// Name without the `ect-` prefix
    pub name: String,

    /// Path to the plugin executable
    pub path: PathBuf,

    pub source: PluginSource,
}

/// Plugin discovery over PATH and plugin directories
pub struct PluginLoader {
    plugins: BTreeMap<String, PluginInfo>,
    plugin_dirs: Vec<PathBuf>,
    search_path: Option<OsString>,
}

impl PluginLoader {
    /// Creates a loader that searches the process `PATH`
    pub fn new() -> Self {
        Self {
            plugins: BTreeMap::new(),
            plugin_dirs: Vec::new(),
            search_path: std::env::var_os("PATH"),
        }
    }

    /// Replaces the `PATH`-style search list; `None` disables it
    pub fn with_search_path(mut self, search_path: Option<OsString>) -> Self {
        self.search_path = search_path;
        self
    }

    /// Adds a plugin directory to search
    pub fn add_plugin_dir(&mut self, dir: impl Into<PathBuf>) {
        self.plugin_dirs.push(dir.into());
    }

    /// Discovers all available plugins; the first one found for a name wins
    pub fn discover(&mut self) {
        self.plugins.clear();

        if let Some(path_var) = self.search_path.clone() {
            for dir in std::env::split_paths(&path_var) {
                self.scan_directory(&dir, PluginSource::SearchPath);
            }
        }

        for dir in self.plugin_dirs.clone() {
            self.scan_directory(&dir, PluginSource::Directory);
        }
    }

    fn scan_directory(&mut self, dir: &Path, source: PluginSource) {
        // Missing or unreadable directories are skipped
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(name) = plugin_name(file_name) else {
                continue;
            };
            if name.is_empty() || self.plugins.contains_key(name) || !is_executable(&path) {
                continue;
            }
            self.plugins.insert(
                name.to_string(),
                PluginInfo {
                    name: name.to_string(),
                    path: path.clone(),
                    source,
                },
            );
        }
    }

    /// Lists discovered plugins sorted by name
    pub fn list(&self) -> Vec<&PluginInfo> {
        self.plugins.values().collect()
    }

    /// Gets a plugin by name
    pub fn get(&self, name: &str) -> Option<&PluginInfo> {
        self.plugins.get(name)
    }
}

impl Default for PluginLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Strips the plugin prefix and, on Windows, the executable extension
fn plugin_name(file_name: &str) -> Option<&str> {
    let name = file_name.strip_prefix(PLUGIN_PREFIX)?;
    if cfg!(windows) {
        for ext in [".exe", ".bat", ".cmd"] {
            if let Some(stem) = name.strip_suffix(ext) {
                return Some(stem);
            }
        }
    }
    Some(name)
}

fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(meta) = path.metadata() {
            return meta.is_file() && meta.permissions().mode() & 0o111 != 0;
        }
    }

    #[cfg(windows)]
    {
        if let Some(ext) = path.extension() {
            return ext == "exe" || ext == "bat" || ext == "cmd";
        }
    }

    false
}
