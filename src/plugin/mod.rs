//! # Plugin Discovery
//!
//! Plugins are separate executables named `ect-{name}`. They are found in
//! three places, first match wins:
//!
//! 1. `$PATH` - system-wide plugins
//! 2. `.ect/plugins/` - project-local plugins
//! 3. `plugin_dirs` - directories listed in configuration
//!
//! `ect list pi` shows what was discovered.

mod loader;

pub use loader::{PluginInfo, PluginLoader, PluginSource, PLUGIN_PREFIX};
