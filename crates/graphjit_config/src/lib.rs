pub mod compile_mode;
pub mod persistence;

pub use crate::compile_mode::*;
pub use crate::persistence::{CacheConfig, ConfigError, PersistenceConfig};
use serde::{Deserialize, Serialize};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Codegen optimization level handed to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodegenOptLevel {
    None,
    Default,
    Aggressive,
}

/// Options forwarded verbatim to every `Compiler` entry point.
///
/// The cache never interprets these; they only travel with a compile request so the
/// background path sees exactly what the caller asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    pub opt_level: CodegenOptLevel,
    /// Treat the lowered program as the top-level computation of the device program
    pub is_entry_computation: bool,
    /// Always wrap results in a tuple, even for a single output
    pub always_return_tuple: bool,
    /// Let the backend alias resource updates with their inputs
    pub alias_resource_updates: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            opt_level: CodegenOptLevel::Default,
            is_entry_computation: true,
            always_return_tuple: true,
            alias_resource_updates: false,
        }
    }
}

/// Parse a boolean setting, accepting `1`/`0` alongside `true`/`false`
pub(crate) fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
