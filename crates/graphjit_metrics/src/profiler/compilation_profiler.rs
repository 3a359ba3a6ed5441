//! Compilation profiling for tracking compilation performance

use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use graphjit_config::{CompileMode, PolicyConfig};
use tracing::{debug, warn};

use super::policy::{self, PolicyInput};
use super::{CompileDecision, Profiler};

/// Compilation event
#[derive(Debug, Clone)]
pub struct CompilationEvent {
    /// Function name
    pub function_name: String,

    /// Compilation duration, lowering included
    pub duration: Duration,

    /// Timestamp
    pub timestamp_ms: u64,

    /// Whether the executable came from the persistent cache
    pub persistent_cache_hit: bool,
}

/// Per-function compilation statistics
#[derive(Debug, Clone, Default)]
pub struct FunctionCompileStats {
    /// Function name
    pub function_name: String,

    /// Number of cache requests seen for this function
    pub execution_count: u64,

    /// Number of finished compilations, across all signatures
    pub compile_count: u64,

    /// Total compilation time (microseconds)
    pub cumulative_compile_time_us: u64,

    /// Compilations served by loading from the persistent cache
    pub persistent_cache_hits: u64,

    /// Last compilation timestamp
    pub last_compiled_ms: u64,

    /// Sticky once set
    pub is_megamorphic: bool,
}

impl FunctionCompileStats {
    pub fn new(function_name: String) -> Self {
        Self {
            function_name,
            ..Default::default()
        }
    }

    /// Record a compilation
    pub fn record_compilation(&mut self, duration_us: u64, persistent_cache_hit: bool) {
        self.compile_count += 1;
        self.cumulative_compile_time_us += duration_us;
        self.last_compiled_ms = current_time_ms();
        if persistent_cache_hit {
            self.persistent_cache_hits += 1;
        }
    }

    /// Get average compilation time
    pub fn avg_compilation_time_us(&self) -> f64 {
        if self.compile_count == 0 {
            0.0
        } else {
            self.cumulative_compile_time_us as f64 / self.compile_count as f64
        }
    }
}

/// Default `Profiler`: per-function counters, a bounded event history and the
/// compile-mode policy.
pub struct CompilationProfiler {
    config: PolicyConfig,

    /// Per-function statistics
    function_stats: Arc<RwLock<HashMap<String, FunctionCompileStats>>>,

    /// Compilation event history
    event_history: Arc<RwLock<VecDeque<CompilationEvent>>>,

    /// Maximum history size
    max_history_size: usize,

    ongoing_async: AtomicUsize,
}

impl CompilationProfiler {
    pub fn new() -> Self {
        Self::with_config(PolicyConfig::default())
    }

    pub fn with_config(config: PolicyConfig) -> Self {
        Self {
            config,
            function_stats: Arc::new(RwLock::new(HashMap::new())),
            event_history: Arc::new(RwLock::new(VecDeque::new())),
            max_history_size: 1000,
            ongoing_async: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Start timing a compilation
    pub fn start_compilation(&self, function_name: &str) -> CompilationTimer {
        CompilationTimer::start(function_name)
    }

    /// Get statistics for a function
    pub fn function_stats(&self, function_name: &str) -> Option<FunctionCompileStats> {
        self.function_stats.read().get(function_name).cloned()
    }

    /// Get all function statistics
    pub fn all_function_stats(&self) -> Vec<FunctionCompileStats> {
        self.function_stats.read().values().cloned().collect()
    }

    /// Get compilation event history, oldest first
    pub fn event_history(&self) -> Vec<CompilationEvent> {
        self.event_history.read().iter().cloned().collect()
    }

    /// Get total compilation time across all functions
    pub fn total_compilation_time(&self) -> Duration {
        let total_us: u64 = self
            .function_stats
            .read()
            .values()
            .map(|s| s.cumulative_compile_time_us)
            .sum();
        Duration::from_micros(total_us)
    }

    /// Clear all statistics
    pub fn clear(&self) {
        self.function_stats.write().clear();
        self.event_history.write().clear();
    }
}

impl Default for CompilationProfiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Profiler for CompilationProfiler {
    fn register_execution(&self, function: &str) {
        let mut stats = self.function_stats.write();
        stats
            .entry(function.to_string())
            .or_insert_with(|| FunctionCompileStats::new(function.to_string()))
            .execution_count += 1;
    }

    fn register_compilation(&self, function: &str, duration: Duration, persistent_cache_hit: bool) {
        let duration_us = duration.as_micros().min(u64::MAX as u128) as u64;

        let mut func_stats = self.function_stats.write();
        let stats = func_stats
            .entry(function.to_string())
            .or_insert_with(|| FunctionCompileStats::new(function.to_string()));
        stats.record_compilation(duration_us, persistent_cache_hit);
        debug!(
            function,
            compile_count = stats.compile_count,
            cumulative_compile_time_us = stats.cumulative_compile_time_us,
            "recorded compilation"
        );
        drop(func_stats);

        let mut history = self.event_history.write();
        if history.len() >= self.max_history_size {
            history.pop_front();
        }
        history.push_back(CompilationEvent {
            function_name: function.to_string(),
            duration,
            timestamp_ms: current_time_ms(),
            persistent_cache_hit,
        });
    }

    fn should_compile(
        &self,
        function: &str,
        mode: CompileMode,
        request_count: u64,
    ) -> CompileDecision {
        let is_megamorphic = {
            let mut func_stats = self.function_stats.write();
            let stats = func_stats
                .entry(function.to_string())
                .or_insert_with(|| FunctionCompileStats::new(function.to_string()));
            if !stats.is_megamorphic && policy::looks_megamorphic(&self.config, stats) {
                warn!(
                    function,
                    compile_count = stats.compile_count,
                    execution_count = stats.execution_count,
                    "function marked megamorphic; lazy compilation disabled for it"
                );
                stats.is_megamorphic = true;
            }
            stats.is_megamorphic
        };

        policy::decide(
            &self.config,
            PolicyInput {
                mode,
                request_count,
                ongoing_async_compilations: self.ongoing_async_compilations(),
                is_megamorphic,
            },
        )
    }

    fn increment_ongoing_async_compilations(&self) {
        self.ongoing_async.fetch_add(1, Ordering::AcqRel);
    }

    fn decrement_ongoing_async_compilations(&self) {
        // Saturate so an unbalanced decrement cannot wrap the counter
        let _ = self
            .ongoing_async
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    fn ongoing_async_compilations(&self) -> usize {
        self.ongoing_async.load(Ordering::Acquire)
    }
}

/// Timer for measuring compilation duration
pub struct CompilationTimer {
    function_name: String,
    start: Instant,
}

impl CompilationTimer {
    pub fn start(function_name: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            start: Instant::now(),
        }
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Get function name
    pub fn function_name(&self) -> &str {
        &self.function_name
    }
}

/// Get current time in milliseconds
fn current_time_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_stats() {
        let profiler = CompilationProfiler::new();

        profiler.register_execution("test_fn");
        profiler.register_execution("test_fn");
        profiler.register_compilation("test_fn", Duration::from_micros(1000), false);
        profiler.register_compilation("test_fn", Duration::from_micros(2000), true);

        let stats = profiler.function_stats("test_fn").unwrap();
        assert_eq!(stats.execution_count, 2);
        assert_eq!(stats.compile_count, 2);
        assert_eq!(stats.cumulative_compile_time_us, 3000);
        assert_eq!(stats.persistent_cache_hits, 1);
        assert_eq!(stats.avg_compilation_time_us(), 1500.0);
        assert_eq!(profiler.total_compilation_time(), Duration::from_micros(3000));
    }

    #[test]
    fn test_event_history_is_bounded() {
        let mut profiler = CompilationProfiler::new();
        profiler.max_history_size = 3;

        for i in 0..5 {
            profiler.register_compilation(&format!("fn{i}"), Duration::from_micros(10), false);
        }

        let history = profiler.event_history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].function_name, "fn2");
        assert_eq!(history[2].function_name, "fn4");
    }

    #[test]
    fn test_ongoing_async_counter_saturates() {
        let profiler = CompilationProfiler::new();
        profiler.decrement_ongoing_async_compilations();
        assert_eq!(profiler.ongoing_async_compilations(), 0);

        profiler.increment_ongoing_async_compilations();
        profiler.increment_ongoing_async_compilations();
        profiler.decrement_ongoing_async_compilations();
        assert_eq!(profiler.ongoing_async_compilations(), 1);
    }

    #[test]
    fn test_async_deferred_when_pool_busy() {
        let profiler = CompilationProfiler::with_config(PolicyConfig {
            max_ongoing_async_compilations: 1,
            ..PolicyConfig::default()
        });
        assert_eq!(
            profiler.should_compile("f", CompileMode::Async, 1),
            CompileDecision::CompileAsync
        );
        profiler.increment_ongoing_async_compilations();
        assert_eq!(
            profiler.should_compile("f", CompileMode::Async, 1),
            CompileDecision::NotYet
        );
    }

    #[test]
    fn test_megamorphic_flag_is_sticky() {
        let profiler = CompilationProfiler::new();
        for _ in 0..11 {
            profiler.register_compilation("poly", Duration::from_micros(5), false);
        }
        assert_eq!(
            profiler.should_compile("poly", CompileMode::Lazy, 10),
            CompileDecision::NotYet
        );
        assert!(profiler.function_stats("poly").unwrap().is_megamorphic);

        // Plenty of executions later does not clear the flag
        for _ in 0..10_000 {
            profiler.register_execution("poly");
        }
        assert_eq!(
            profiler.should_compile("poly", CompileMode::Lazy, 10),
            CompileDecision::NotYet
        );
        // Strict mode ignores it
        assert_eq!(
            profiler.should_compile("poly", CompileMode::Strict, 1),
            CompileDecision::CompileNow
        );
    }

    #[test]
    fn test_compilation_timer() {
        let profiler = CompilationProfiler::new();
        let timer = profiler.start_compilation("test_fn");
        std::thread::sleep(Duration::from_millis(10));
        assert!(timer.elapsed() >= Duration::from_millis(10));
        assert_eq!(timer.function_name(), "test_fn");
    }
}
