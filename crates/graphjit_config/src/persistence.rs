//! Persistent cache and top-level cache configuration

use crate::PolicyConfig;
use crate::parse_flag;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_KEY_PREFIX: &str = "graphjit_cache";
pub const DEFAULT_DEVICE_TYPE: &str = "cpu";
pub const DEFAULT_ASYNC_COMPILE_THREADS: usize = 4;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse cache configuration: {0}")]
    Parse(String),

    #[error("invalid cache configuration: {0}")]
    Invalid(String),
}

/// Where and how compiled executables are persisted across processes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Directory holding serialized entries; `None` disables the persistent cache
    pub directory: Option<PathBuf>,

    /// Prepended to every entry file name
    pub key_prefix: String,

    /// Compare the stored lowered program byte-for-byte before trusting an entry
    pub strict_signature_checks: bool,

    /// Load from the directory but never write to it
    pub read_only: bool,

    /// Device the executables were built for, part of every key
    pub device_type: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            directory: None,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            strict_signature_checks: true,
            read_only: false,
            device_type: DEFAULT_DEVICE_TYPE.to_string(),
        }
    }
}

impl PersistenceConfig {
    pub fn with_directory(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: Some(directory.into()),
            ..Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.directory.is_some()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(dir) = lookup("GRAPHJIT_PERSISTENT_CACHE_DIR").filter(|d| !d.is_empty()) {
            config.directory = Some(PathBuf::from(dir));
        }

        if let Some(prefix) = lookup("GRAPHJIT_PERSISTENT_CACHE_PREFIX") {
            config.key_prefix = prefix;
        }

        if let Some(disabled) =
            lookup("GRAPHJIT_DISABLE_STRICT_SIGNATURE_CHECKS").and_then(|v| parse_flag(&v))
        {
            config.strict_signature_checks = !disabled;
        }

        if let Some(read_only) =
            lookup("GRAPHJIT_PERSISTENT_CACHE_READ_ONLY").and_then(|v| parse_flag(&v))
        {
            config.read_only = read_only;
        }

        if let Some(device) = lookup("GRAPHJIT_DEVICE_TYPE").filter(|d| !d.is_empty()) {
            config.device_type = device;
        }

        config
    }
}

/// Everything a `CompilationCache` is configured with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub persistence: PersistenceConfig,
    pub policy: PolicyConfig,

    /// Size of the background compile pool
    pub async_compile_threads: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            persistence: PersistenceConfig::default(),
            policy: PolicyConfig::default(),
            async_compile_threads: DEFAULT_ASYNC_COMPILE_THREADS,
        }
    }
}

impl CacheConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self {
            persistence: PersistenceConfig::from_env(),
            policy: PolicyConfig::from_env(),
            ..Self::default()
        };

        if let Ok(val) = std::env::var("GRAPHJIT_ASYNC_THREADS") {
            config.async_compile_threads = val
                .parse()
                .ok()
                .filter(|threads| *threads > 0)
                .unwrap_or(DEFAULT_ASYNC_COMPILE_THREADS);
        }

        config
    }

    #[cfg(feature = "toml-config")]
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.async_compile_threads == 0 {
            return Err(ConfigError::Invalid(
                "async_compile_threads must be at least 1".to_string(),
            ));
        }
        if self.persistence.device_type.is_empty() {
            return Err(ConfigError::Invalid("device_type must not be empty".to_string()));
        }
        Ok(())
    }
}
