use crate::parse_flag;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// When an uncompiled signature gets compiled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompileMode {
    /// Compile on the calling thread as soon as a signature is first requested
    Strict,

    /// Compile on the calling thread once the signature has been requested often enough
    Lazy,

    /// Compile on a background worker; callers run uncompiled until it lands
    Async,

    /// Never compile
    Disabled,
}

impl CompileMode {
    pub fn name(self) -> &'static str {
        match self {
            CompileMode::Strict => "strict",
            CompileMode::Lazy => "lazy",
            CompileMode::Async => "async",
            CompileMode::Disabled => "disabled",
        }
    }
}

impl fmt::Display for CompileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CompileMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(CompileMode::Strict),
            "lazy" => Ok(CompileMode::Lazy),
            "async" => Ok(CompileMode::Async),
            "disabled" => Ok(CompileMode::Disabled),
            other => Err(format!("unknown compile mode: {other}")),
        }
    }
}

/// Thresholds consulted by the compile-mode policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Refuse every compilation regardless of the requested mode
    pub compilation_disabled: bool,

    /// Requests a signature needs before lazy mode compiles it
    pub lazy_compile_threshold: u64,

    /// Background compilations allowed in flight before async requests are deferred
    pub max_ongoing_async_compilations: usize,

    /// Compilations of one function after which it may be flagged megamorphic
    pub megamorphic_compile_threshold: u64,

    /// Executions per compilation a function must sustain to avoid the megamorphic flag
    pub min_executions_per_compile: u64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            compilation_disabled: false,
            lazy_compile_threshold: 2,
            max_ongoing_async_compilations: 10,
            megamorphic_compile_threshold: 10,
            min_executions_per_compile: 50,
        }
    }
}

impl PolicyConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(disabled) = lookup("GRAPHJIT_DISABLE_COMPILATION").and_then(|v| parse_flag(&v))
        {
            config.compilation_disabled = disabled;
        }

        if let Some(val) = lookup("GRAPHJIT_LAZY_THRESHOLD") {
            config.lazy_compile_threshold = val.parse().unwrap_or(config.lazy_compile_threshold);
        }

        if let Some(val) = lookup("GRAPHJIT_MAX_ONGOING_ASYNC") {
            config.max_ongoing_async_compilations = val
                .parse()
                .unwrap_or(config.max_ongoing_async_compilations);
        }

        config
    }
}
