//! Configuration module for objql.
//!
//! Handles compiler limits, cache sizing and mapping file discovery.

mod settings;

pub use settings::{
    expand_env_vars, CacheSettings, CompilerSettings, MappingSettings, Settings, SettingsError,
};
