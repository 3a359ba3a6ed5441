//! GraphJit: memoized JIT compilation keyed by function signature.
//!
//! The pieces live in their own crates and are re-exported here:
//! [`graphjit_cache`] for the cache, persistence and background compilation,
//! [`graphjit_config`] for settings, and [`graphjit_metrics`] for the profiler that
//! decides when to compile.

use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt};

pub use graphjit_cache::*;
pub use graphjit_config::{
    CacheConfig, CodegenOptLevel, CompileMode, CompileOptions, ConfigError, PersistenceConfig,
    PolicyConfig,
};
pub use graphjit_metrics::{CompilationProfiler, CompileDecision, FunctionCompileStats, Profiler};

static INIT: Once = Once::new();

/// Install a `tracing` subscriber once per process.
///
/// Honours `RUST_LOG`, defaulting to `graphjit=info`. Does nothing if the host
/// application already installed a subscriber.
pub fn init_tracing() {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("graphjit=info"));

        let _ = fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .compact()
            .try_init();
    });
}
