//! TOML-based configuration for objql.
//!
//! Supports a config file (objql.toml) with environment variable expansion
//! in the mapping path.
//!
//! Example configuration:
//! ```toml
//! [compiler]
//! max_path_segments = 32
//! max_nesting_depth = 64
//! default_prefetch_semantics = "joint"
//!
//! [cache]
//! enabled = true
//! capacity = 1024
//!
//! [mapping]
//! path = "${APP_HOME}/mapping.toml"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::compiler::PrefetchSemantics;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub compiler: CompilerSettings,
    pub cache: CacheSettings,
    pub mapping: MappingSettings,
}

/// Compiler limits and defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CompilerSettings {
    /// Longest accepted path, counting the identification variable.
    pub max_path_segments: usize,

    /// Deepest accepted expression / sub-select nesting.
    pub max_nesting_depth: usize,

    /// Semantics given to fetch joins.
    pub default_prefetch_semantics: PrefetchSemantics,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            max_path_segments: 32,
            max_nesting_depth: 64,
            default_prefetch_semantics: PrefetchSemantics::Joint,
        }
    }
}

/// Compiled expression cache.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,

    /// Maximum number of cached expressions.
    pub capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 1024,
        }
    }
}

/// Where the entity mapping lives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct MappingSettings {
    /// Mapping file path (supports ${ENV_VAR} expansion).
    pub path: Option<String>,
}

impl MappingSettings {
    /// Mapping path with environment variables expanded.
    pub fn resolved_path(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.path
            .as_deref()
            .map(|p| expand_env_vars(p).map(PathBuf::from))
            .transpose()
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. `$OBJQL_CONFIG`
    /// 2. `./objql.toml`
    /// 3. `~/.config/objql/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("OBJQL_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("objql.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("objql").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        tracing::debug!(target: "objql.config", "no config file found, using defaults");
        Ok(Settings::default())
    }

    /// Reject limits that would make every compilation fail.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.compiler.max_path_segments == 0 {
            return Err(SettingsError::InvalidConfig(
                "compiler.max_path_segments must be at least 1".to_string(),
            ));
        }
        if self.compiler.max_nesting_depth == 0 {
            return Err(SettingsError::InvalidConfig(
                "compiler.max_nesting_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Expand environment variables in a string.
///
/// Supports both `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name: String = if chars.next_if_eq(&'{').is_some() {
            let name: String = std::iter::from_fn(|| chars.next_if(|&ch| ch != '}')).collect();
            chars.next(); // closing brace
            name
        } else {
            std::iter::from_fn(|| chars.next_if(|&ch| ch.is_alphanumeric() || ch == '_')).collect()
        };

        if var_name.is_empty() {
            result.push('$');
            continue;
        }
        let value = env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name))?;
        result.push_str(&value);
    }

    Ok(result)
}
