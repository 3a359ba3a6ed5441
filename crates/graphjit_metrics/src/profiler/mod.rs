// Compilation profiling and compile-mode policy
pub mod compilation_profiler;
pub mod policy;

pub use compilation_profiler::{
    CompilationEvent, CompilationProfiler, CompilationTimer, FunctionCompileStats,
};

use graphjit_config::CompileMode;
use std::time::Duration;

/// What the cache should do with a signature that has not been compiled yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompileDecision {
    /// Compile on the calling thread before returning
    CompileNow,
    /// Hand the compilation to the background pool
    CompileAsync,
    /// Leave it uncompiled for now; a later request may decide otherwise
    NotYet,
    /// Compilation is switched off
    Refuse,
}

/// Bookkeeping hooks the compilation cache calls at fixed points.
///
/// Every method is called synchronously from the cache, sometimes while an entry lock
/// is held, so implementations must be cheap and must not call back into the cache.
/// None of them can fail; the cache treats them as fire-and-forget.
pub trait Profiler: Send + Sync {
    /// Called once per cache request for `function`, before any compile decision
    fn register_execution(&self, function: &str);

    /// Called once per finished synchronous compile, including failed builds
    fn register_compilation(&self, function: &str, duration: Duration, persistent_cache_hit: bool);

    /// Decide whether an uncompiled signature of `function` should be compiled now
    fn should_compile(&self, function: &str, mode: CompileMode, request_count: u64)
    -> CompileDecision;

    fn increment_ongoing_async_compilations(&self);

    fn decrement_ongoing_async_compilations(&self);

    fn ongoing_async_compilations(&self) -> usize;
}
