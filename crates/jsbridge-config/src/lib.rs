//! JSBridge Configuration System
//!
//! Provides configuration for embedded script engines:
//! - Engine configuration (jsbridge.toml)
//! - Global user configuration (~/.jsbridge/config.toml)
//! - Environment overrides (JSBRIDGE_*)
//! - Configuration precedence and merging
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later overrides earlier):
//! 1. Global config (~/.jsbridge/config.toml)
//! 2. Project config (./jsbridge.toml)
//! 3. Environment variables (JSBRIDGE_*)
//!
//! # Example
//!
//! ```no_run
//! use jsbridge_config::ConfigLoader;
//! use std::path::Path;
//!
//! let mut loader = ConfigLoader::new();
//! let config = loader.load_from_directory(Path::new(".")).unwrap();
//! println!("stack limit: {:?}", config.engine.max_stack_size());
//! ```

pub mod engine;
pub mod loader;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Home directory not found")]
    HomeNotFound,
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use engine::{EngineConfig, EvalConfig, LimitsConfig, DEFAULT_EVAL_LABEL, MIN_STACK_SIZE};
pub use loader::{Config, ConfigLoader, CONFIG_FILE_NAME};
