//! Engine Configuration (jsbridge.toml)
//!
//! Resource limits and evaluation defaults applied when an engine instance
//! is created. Every field is optional; unset limits keep the engine's own
//! defaults.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Label used for evaluations that do not name their source.
pub const DEFAULT_EVAL_LABEL: &str = "<eval>";

/// Smallest accepted call-stack limit in bytes.
pub const MIN_STACK_SIZE: usize = 16 * 1024;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Resource limits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limits: Option<LimitsConfig>,

    /// Evaluation defaults
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eval: Option<EvalConfig>,
}

/// Resource limits, all in bytes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    /// Maximum call-stack size enforced by the engine
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_stack_size: Option<usize>,

    /// Heap allocation ceiling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<usize>,

    /// Allocation volume that triggers a collection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gc_threshold: Option<usize>,
}

/// Evaluation defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct EvalConfig {
    /// Evaluate every script in strict mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,

    /// Source label used when none is given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_label: Option<String>,
}

impl EngineConfig {
    /// Load engine configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config = Self::parse(&content, path)?;
        config.validate()?;
        Ok(config)
    }

    fn parse(content: &str, path: &Path) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })
    }

    /// Validate the engine configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(limits) = &self.limits {
            if let Some(size) = limits.max_stack_size {
                if size < MIN_STACK_SIZE {
                    return Err(ConfigError::InvalidValue {
                        field: "limits.max_stack_size".to_string(),
                        reason: format!("must be at least {} bytes, got {}", MIN_STACK_SIZE, size),
                    });
                }
            }
            validate_non_zero("limits.memory_limit", limits.memory_limit)?;
            validate_non_zero("limits.gc_threshold", limits.gc_threshold)?;
        }

        if let Some(label) = self.eval.as_ref().and_then(|e| e.default_label.as_deref()) {
            if label.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "eval.default_label".to_string(),
                    reason: "must not be empty".to_string(),
                });
            }
            if label.contains('\0') {
                return Err(ConfigError::InvalidValue {
                    field: "eval.default_label".to_string(),
                    reason: "must not contain NUL bytes".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Get the global config file path (~/.jsbridge/config.toml)
    pub fn global_config_path() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".jsbridge").join("config.toml"))
    }

    pub fn max_stack_size(&self) -> Option<usize> {
        self.limits.as_ref().and_then(|l| l.max_stack_size)
    }

    pub fn memory_limit(&self) -> Option<usize> {
        self.limits.as_ref().and_then(|l| l.memory_limit)
    }

    pub fn gc_threshold(&self) -> Option<usize> {
        self.limits.as_ref().and_then(|l| l.gc_threshold)
    }

    /// Whether scripts are evaluated in strict mode (default: false)
    pub fn strict(&self) -> bool {
        self.eval.as_ref().and_then(|e| e.strict).unwrap_or(false)
    }

    /// Label for unnamed evaluations (default: `<eval>`)
    pub fn default_label(&self) -> &str {
        self.eval
            .as_ref()
            .and_then(|e| e.default_label.as_deref())
            .unwrap_or(DEFAULT_EVAL_LABEL)
    }

    /// Merge another config into this one
    /// Other config takes precedence for every field it sets
    pub fn merge(&mut self, other: &EngineConfig) {
        if let Some(theirs) = &other.limits {
            let ours = self.limits.get_or_insert_with(Default::default);
            merge_field(&mut ours.max_stack_size, &theirs.max_stack_size);
            merge_field(&mut ours.memory_limit, &theirs.memory_limit);
            merge_field(&mut ours.gc_threshold, &theirs.gc_threshold);
        }
        if let Some(theirs) = &other.eval {
            let ours = self.eval.get_or_insert_with(Default::default);
            merge_field(&mut ours.strict, &theirs.strict);
            merge_field(&mut ours.default_label, &theirs.default_label);
        }
    }

    pub(crate) fn limits_mut(&mut self) -> &mut LimitsConfig {
        self.limits.get_or_insert_with(Default::default)
    }

    pub(crate) fn eval_mut(&mut self) -> &mut EvalConfig {
        self.eval.get_or_insert_with(Default::default)
    }
}

fn merge_field<T: Clone>(ours: &mut Option<T>, theirs: &Option<T>) {
    if theirs.is_some() {
        ours.clone_from(theirs);
    }
}

fn validate_non_zero(field: &str, value: Option<usize>) -> ConfigResult<()> {
    if value == Some(0) {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}
