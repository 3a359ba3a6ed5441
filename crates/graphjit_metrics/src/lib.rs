pub mod profiler;

pub use profiler::{
    CompilationProfiler, CompilationTimer, CompileDecision, FunctionCompileStats, Profiler,
};
