//! Counting in-memory backend shared by the cache tests

use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use graphjit_config::{CacheConfig, CompileOptions, PersistenceConfig, PolicyConfig};
use graphjit_metrics::{CompilationProfiler, Profiler};

use super::CompilationCache;
use crate::compiler::{Compiler, LoweredProgram, OpContext};
use crate::error::{CompileError, Result};
use crate::signature::{Argument, DataType, FunctionDescriptor, Signature};

#[derive(Debug)]
pub(crate) struct MockProgram {
    pub(crate) text: String,
}

impl LoweredProgram for MockProgram {
    fn serialize(&self) -> Vec<u8> {
        self.text.as_bytes().to_vec()
    }
}

#[derive(Debug)]
pub(crate) struct MockExecutable {
    pub(crate) text: String,
    /// Came from `load_executable` rather than `build_executable`
    pub(crate) loaded: bool,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) lower: AtomicUsize,
    pub(crate) build: AtomicUsize,
    pub(crate) export: AtomicUsize,
    pub(crate) aot: AtomicUsize,
    pub(crate) load: AtomicUsize,
}

impl Counters {
    pub(crate) fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub(crate) struct MockCompiler {
    pub(crate) counters: Arc<Counters>,
    pub(crate) build_delay: Duration,
    /// When set, every build blocks until the test sends on the other end
    pub(crate) gate: Option<Receiver<()>>,
    pub(crate) fail_lowering: bool,
    pub(crate) fail_build: bool,
    pub(crate) panic_on_build: bool,
    pub(crate) export_supported: bool,
}

impl MockCompiler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lowered(&self, kind: &str, name: &str, args: &[Argument]) -> Result<MockProgram> {
        self.counters.lower.fetch_add(1, Ordering::SeqCst);
        if self.fail_lowering {
            return Err(CompileError::invalid_argument(format!("cannot lower {name}")));
        }
        let signature = Signature::build(&FunctionDescriptor::new(name), args)?;
        Ok(MockProgram {
            text: format!("{kind} {}", signature.human_string()),
        })
    }
}

impl Compiler for MockCompiler {
    type Program = MockProgram;
    type Executable = MockExecutable;

    fn lower_function(
        &self,
        _options: &CompileOptions,
        function: &FunctionDescriptor,
        args: &[Argument],
    ) -> Result<MockProgram> {
        self.lowered("module", &function.canonical_name(), args)
    }

    fn lower_single_op(
        &self,
        _options: &CompileOptions,
        op: &OpContext,
        args: &[Argument],
    ) -> Result<MockProgram> {
        self.lowered("op", &op.op_type, args)
    }

    fn build_executable(
        &self,
        _options: &CompileOptions,
        program: &MockProgram,
    ) -> Result<MockExecutable> {
        self.counters.build.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _ = gate.recv();
        }
        if !self.build_delay.is_zero() {
            thread::sleep(self.build_delay);
        }
        if self.panic_on_build {
            panic!("backend crashed building {}", program.text);
        }
        if self.fail_build {
            return Err(CompileError::internal("out of registers"));
        }
        Ok(MockExecutable {
            text: program.text.clone(),
            loaded: false,
        })
    }

    fn export_ahead_of_time(&self, executable: &MockExecutable) -> Result<Vec<u8>> {
        if !self.export_supported {
            return Err(CompileError::unimplemented("no export"));
        }
        self.counters.export.fetch_add(1, Ordering::SeqCst);
        Ok(executable.text.as_bytes().to_vec())
    }

    fn build_ahead_of_time(
        &self,
        _options: &CompileOptions,
        program: &MockProgram,
    ) -> Result<Vec<u8>> {
        self.counters.aot.fetch_add(1, Ordering::SeqCst);
        Ok(program.text.as_bytes().to_vec())
    }

    fn load_executable(
        &self,
        _options: &CompileOptions,
        _program: &MockProgram,
        serialized: &[u8],
    ) -> Result<MockExecutable> {
        self.counters.load.fetch_add(1, Ordering::SeqCst);
        Ok(MockExecutable {
            text: String::from_utf8_lossy(serialized).into_owned(),
            loaded: true,
        })
    }
}

pub(crate) fn config() -> CacheConfig {
    CacheConfig {
        async_compile_threads: 2,
        ..CacheConfig::default()
    }
}

pub(crate) fn persistent_config(dir: &std::path::Path) -> CacheConfig {
    CacheConfig {
        persistence: PersistenceConfig::with_directory(dir),
        ..config()
    }
}

pub(crate) fn cache(compiler: MockCompiler) -> CompilationCache<MockCompiler> {
    CompilationCache::new(compiler, config()).unwrap()
}

pub(crate) fn profiler() -> Arc<dyn Profiler> {
    Arc::new(CompilationProfiler::new())
}

pub(crate) fn profiler_with(config: PolicyConfig) -> Arc<dyn Profiler> {
    Arc::new(CompilationProfiler::with_config(config))
}

pub(crate) fn matrix(dims: [i64; 2]) -> Vec<Argument> {
    vec![Argument::parameter(DataType::F32, dims)]
}

/// Block until every background compile has finished
pub(crate) fn wait_for_async(cache: &CompilationCache<MockCompiler>) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while cache.pending_async_compilations() > 0 {
        assert!(Instant::now() < deadline, "background compiles did not finish");
        thread::sleep(Duration::from_millis(1));
    }
}
