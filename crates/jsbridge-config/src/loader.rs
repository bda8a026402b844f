//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::engine::EngineConfig;
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};

/// Project configuration file name
pub const CONFIG_FILE_NAME: &str = "jsbridge.toml";

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Global config (~/.jsbridge/config.toml) - lowest priority
/// 2. Project config (./jsbridge.toml) - overrides global
/// 3. Environment variables (JSBRIDGE_*) - overrides project
pub struct ConfigLoader {
    /// Cached global config path
    global_config_path: Option<PathBuf>,
}

/// Merged configuration result
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Effective engine configuration
    pub engine: EngineConfig,

    /// Directory where jsbridge.toml was found
    pub project_root: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    /// Use `path` as the global config file instead of ~/.jsbridge/config.toml
    pub fn with_global_config(path: impl Into<PathBuf>) -> Self {
        Self {
            global_config_path: Some(path.into()),
        }
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find jsbridge.toml, layers it over the
    /// global config and applies environment overrides.
    pub fn load_from_directory(&mut self, start_dir: &Path) -> ConfigResult<Config> {
        let (project_root, project_config) = self.find_project_config(start_dir)?;

        let mut engine = self.load_global_config()?;
        engine.merge(&project_config);
        apply_env_overrides(&mut engine)?;
        engine.validate()?;

        Ok(Config {
            engine,
            project_root,
        })
    }

    /// Load configuration from a specific project config file
    pub fn load_from_file(&mut self, config_path: &Path) -> ConfigResult<Config> {
        let project_config = EngineConfig::load_from_file(config_path)?;

        let mut engine = self.load_global_config()?;
        engine.merge(&project_config);
        apply_env_overrides(&mut engine)?;
        engine.validate()?;

        Ok(Config {
            engine,
            project_root: config_path.parent().map(|p| p.to_path_buf()),
        })
    }

    /// Find project configuration by walking up directory tree
    fn find_project_config(
        &self,
        start_dir: &Path,
    ) -> ConfigResult<(Option<PathBuf>, EngineConfig)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.exists() {
                let config = EngineConfig::load_from_file(&config_path)?;
                return Ok((Some(current), config));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, EngineConfig::default())),
            }
        }
    }

    /// Load global configuration; a missing file or home directory yields defaults
    fn load_global_config(&mut self) -> ConfigResult<EngineConfig> {
        if self.global_config_path.is_none() {
            match EngineConfig::global_config_path() {
                Ok(path) => self.global_config_path = Some(path),
                Err(ConfigError::HomeNotFound) => return Ok(EngineConfig::default()),
                Err(e) => return Err(e),
            }
        }

        match &self.global_config_path {
            Some(path) if path.exists() => EngineConfig::load_from_file(path),
            _ => Ok(EngineConfig::default()),
        }
    }

    /// Get the global configuration directory (~/.jsbridge)
    pub fn global_config_dir() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".jsbridge"))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply JSBRIDGE_* environment overrides
///
/// Recognized: JSBRIDGE_MAX_STACK_SIZE, JSBRIDGE_MEMORY_LIMIT,
/// JSBRIDGE_GC_THRESHOLD, JSBRIDGE_STRICT
pub fn apply_env_overrides(config: &mut EngineConfig) -> ConfigResult<()> {
    if let Some(size) = env_usize("JSBRIDGE_MAX_STACK_SIZE")? {
        config.limits_mut().max_stack_size = Some(size);
    }
    if let Some(limit) = env_usize("JSBRIDGE_MEMORY_LIMIT")? {
        config.limits_mut().memory_limit = Some(limit);
    }
    if let Some(threshold) = env_usize("JSBRIDGE_GC_THRESHOLD")? {
        config.limits_mut().gc_threshold = Some(threshold);
    }
    if let Ok(strict) = env::var("JSBRIDGE_STRICT") {
        let strict = match strict.to_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            other => {
                return Err(ConfigError::InvalidValue {
                    field: "JSBRIDGE_STRICT".to_string(),
                    reason: format!("expected a boolean, got '{}'", other),
                })
            }
        };
        config.eval_mut().strict = Some(strict);
    }
    Ok(())
}

fn env_usize(name: &str) -> ConfigResult<Option<usize>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                field: name.to_string(),
                reason: format!("expected a byte count, got '{}': {}", raw, e),
            }),
        Err(_) => Ok(None),
    }
}

impl Config {
    /// Check if a jsbridge.toml was found
    pub fn is_project(&self) -> bool {
        self.project_root.is_some()
    }

    /// Get the project root directory
    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }
}
