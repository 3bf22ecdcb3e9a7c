//! # ninja-crashdump-config
//!
//! Configuration management for the ninja crash dump writer.
//!
//! Loads configuration from:
//! 1. `<config dir>/ninja-crashdump/config.toml` (global)
//! 2. `.ninja-crashdump.toml` (working directory, overrides global)
//! 3. Environment variables (highest priority)
//!
//! Configuration is read once, when the host installs its crash handler.
//! Nothing in this crate is meant to run inside the fault path itself.

pub mod logging;
pub mod testing;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard};
use tracing::debug;

pub use logging::LogLevel;

/// Module that exports the dump writer on Windows.
pub const DEFAULT_MODULE: &str = "dbghelp.dll";

/// Exported name of the dump writer inside [`DEFAULT_MODULE`].
pub const DEFAULT_ENTRY_POINT: &str = "MiniDumpWriteDump";

/// Project-local config file name.
pub const PROJECT_CONFIG_FILE: &str = ".ninja-crashdump.toml";

pub const ENV_DIR: &str = "NINJA_CRASHDUMP_DIR";
pub const ENV_MODULE: &str = "NINJA_CRASHDUMP_MODULE";
pub const ENV_ENTRY_POINT: &str = "NINJA_CRASHDUMP_ENTRY_POINT";
pub const ENV_LOG: &str = "NINJA_CRASHDUMP_LOG";

/// Global config instance
static CONFIG: Lazy<RwLock<Config>> = Lazy::new(|| RwLock::new(Config::load().unwrap_or_default()));

/// Get global config (read-only)
pub fn config() -> RwLockReadGuard<'static, Config> {
    // A poisoned lock still holds a complete Config.
    CONFIG.read().unwrap_or_else(|e| e.into_inner())
}

/// Reload config from disk
pub fn reload() -> Result<(), ConfigError> {
    let new_config = Config::load()?;
    *CONFIG.write().unwrap_or_else(|e| e.into_inner()) = new_config;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dump: DumpConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load config from standard locations
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // 1. Global config
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                debug!("Loading global config from {:?}", global_path);
                config = Self::load_from(&global_path)?;
            }
        }

        // 2. Project config - overrides global
        let project_path = Path::new(PROJECT_CONFIG_FILE);
        if project_path.exists() {
            debug!("Loading project config from {:?}", project_path);
            config.merge(ConfigOverlay::load_from(project_path)?);
        }

        // 3. Environment variable overrides
        config.apply_env_overrides();

        Ok(config)
    }

    /// Parse a single TOML file without applying any overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Ok(toml::from_str(&contents)?)
    }

    /// Global config path: `<config dir>/ninja-crashdump/config.toml`
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("ninja-crashdump").join("config.toml"))
    }

    /// Lay a partial config over this one. Every key the overlay sets wins,
    /// including keys set to their default value.
    pub fn merge(&mut self, overlay: ConfigOverlay) {
        let ConfigOverlay { dump, logging } = overlay;
        if let Some(module) = dump.module {
            self.dump.module = module;
        }
        if let Some(entry_point) = dump.entry_point {
            self.dump.entry_point = entry_point;
        }
        if let Some(directory) = dump.directory {
            self.dump.directory = Some(directory);
        }
        if let Some(unload_module) = dump.unload_module {
            self.dump.unload_module = unload_module;
        }
        if let Some(level) = logging.level {
            self.logging.level = level;
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup (environment in production).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(ENV_DIR).filter(|v| !v.is_empty()) {
            self.dump.directory = Some(PathBuf::from(dir));
        }
        if let Some(module) = lookup(ENV_MODULE).filter(|v| !v.is_empty()) {
            self.dump.module = module;
        }
        if let Some(entry_point) = lookup(ENV_ENTRY_POINT).filter(|v| !v.is_empty()) {
            self.dump.entry_point = entry_point;
        }
        if let Some(level) = lookup(ENV_LOG) {
            if let Ok(level) = level.parse() {
                self.logging.level = level;
            }
        }
    }

    /// Render this config as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Generate default config TOML string
    pub fn default_toml() -> Result<String, ConfigError> {
        Config::default().to_toml()
    }
}

/// Dump writer configuration
///
/// The dump type (data segments + handle data) is fixed and not configurable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DumpConfig {
    /// Diagnostic module loaded at crash time
    pub module: String,
    /// Dump writer export looked up in `module`
    pub entry_point: String,
    /// Directory for dump files (None = system temp directory)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
    /// Unload the diagnostic module after writing
    pub unload_module: bool,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            module: DEFAULT_MODULE.to_string(),
            entry_point: DEFAULT_ENTRY_POINT.to_string(),
            directory: None,
            unload_module: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Warn,
        }
    }
}

/// A config file as written: only the keys it mentions are set.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConfigOverlay {
    pub dump: DumpOverlay,
    pub logging: LoggingOverlay,
}

impl ConfigOverlay {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Ok(toml::from_str(&contents)?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DumpOverlay {
    pub module: Option<String>,
    pub entry_point: Option<String>,
    pub directory: Option<PathBuf>,
    pub unload_module: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingOverlay {
    pub level: Option<LogLevel>,
}
