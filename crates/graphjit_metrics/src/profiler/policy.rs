//! Compile-mode policy
//!
//! A plain function over the requested mode and the live counters; the profiler feeds
//! it and the cache acts on the answer.

use super::{CompileDecision, FunctionCompileStats};
use graphjit_config::{CompileMode, PolicyConfig};

/// Inputs to a single compile decision
#[derive(Debug, Clone, Copy)]
pub struct PolicyInput {
    pub mode: CompileMode,
    pub request_count: u64,
    pub ongoing_async_compilations: usize,
    pub is_megamorphic: bool,
}

pub fn decide(config: &PolicyConfig, input: PolicyInput) -> CompileDecision {
    if config.compilation_disabled {
        return CompileDecision::Refuse;
    }

    match input.mode {
        CompileMode::Disabled => CompileDecision::Refuse,
        CompileMode::Strict => CompileDecision::CompileNow,
        CompileMode::Lazy => {
            if input.is_megamorphic || input.request_count < config.lazy_compile_threshold {
                CompileDecision::NotYet
            } else {
                CompileDecision::CompileNow
            }
        }
        CompileMode::Async => {
            if input.ongoing_async_compilations >= config.max_ongoing_async_compilations {
                CompileDecision::NotYet
            } else {
                CompileDecision::CompileAsync
            }
        }
    }
}

/// Whether a function recompiles so often relative to how often it runs that compiling
/// yet another signature for it is not worth it
pub fn looks_megamorphic(config: &PolicyConfig, stats: &FunctionCompileStats) -> bool {
    stats.compile_count > config.megamorphic_compile_threshold
        && stats.execution_count
            < config
                .min_executions_per_compile
                .saturating_mul(stats.compile_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(mode: CompileMode, request_count: u64) -> PolicyInput {
        PolicyInput {
            mode,
            request_count,
            ongoing_async_compilations: 0,
            is_megamorphic: false,
        }
    }

    #[test]
    fn test_strict_and_disabled() {
        let config = PolicyConfig::default();
        assert_eq!(
            decide(&config, input(CompileMode::Strict, 1)),
            CompileDecision::CompileNow
        );
        assert_eq!(
            decide(&config, input(CompileMode::Disabled, 100)),
            CompileDecision::Refuse
        );
    }

    #[test]
    fn test_global_disable_overrides_mode() {
        let config = PolicyConfig {
            compilation_disabled: true,
            ..PolicyConfig::default()
        };
        assert_eq!(
            decide(&config, input(CompileMode::Strict, 1)),
            CompileDecision::Refuse
        );
    }

    #[test]
    fn test_lazy_threshold() {
        let config = PolicyConfig::default();
        assert_eq!(
            decide(&config, input(CompileMode::Lazy, 1)),
            CompileDecision::NotYet
        );
        assert_eq!(
            decide(&config, input(CompileMode::Lazy, 2)),
            CompileDecision::CompileNow
        );

        let megamorphic = PolicyInput {
            is_megamorphic: true,
            ..input(CompileMode::Lazy, 1000)
        };
        assert_eq!(decide(&config, megamorphic), CompileDecision::NotYet);
    }

    #[test]
    fn test_async_backpressure() {
        let config = PolicyConfig {
            max_ongoing_async_compilations: 2,
            ..PolicyConfig::default()
        };
        let busy = PolicyInput {
            ongoing_async_compilations: 2,
            ..input(CompileMode::Async, 1)
        };
        assert_eq!(decide(&config, busy), CompileDecision::NotYet);
        assert_eq!(
            decide(&config, input(CompileMode::Async, 1)),
            CompileDecision::CompileAsync
        );
    }

    #[test]
    fn test_megamorphic_detection() {
        let config = PolicyConfig::default();
        let mut stats = FunctionCompileStats::new("f".to_string());
        stats.compile_count = 11;
        stats.execution_count = 100;
        assert!(looks_megamorphic(&config, &stats));

        stats.execution_count = 11 * 50;
        assert!(!looks_megamorphic(&config, &stats));

        stats.compile_count = 10;
        stats.execution_count = 0;
        assert!(!looks_megamorphic(&config, &stats));
    }
}
