use std::sync::Arc;
use tracing::{debug, info, warn};

use graphjit_config::CompileOptions;
use graphjit_metrics::{CompilationTimer, Profiler};

use super::entry::{CompileState, EntryState};
use super::persistent::ExecutablePersistor;
use crate::compiler::{CompileScope, Compiler};
use crate::error::{CompileError, Result};
use crate::signature::{Argument, FunctionDescriptor, Signature};

/// Everything one compilation needs, owned so it can move to a worker thread
#[derive(Debug, Clone)]
pub(crate) struct CompileRequest {
    pub(crate) signature: Signature,
    pub(crate) function: FunctionDescriptor,
    pub(crate) args: Vec<Argument>,
    pub(crate) options: CompileOptions,
    pub(crate) scope: CompileScope,
}

/// State shared between the cache and its background compiles
pub(crate) struct CompileContext<C: Compiler> {
    pub(crate) compiler: C,
    pub(crate) persistor: ExecutablePersistor,
}

impl<C: Compiler> CompileContext<C> {
    /// Lower, then load or build, into `state`.
    ///
    /// `state` is marked compiled as soon as lowering returns, so a failure further down
    /// is remembered instead of retried. The returned status is also left in `state`;
    /// it only turns `Ok` once an executable is in place.
    pub(crate) fn compile_strict(
        &self,
        request: &CompileRequest,
        profiler: &dyn Profiler,
        state: &mut EntryState<C::Program, C::Executable>,
    ) -> Result<()> {
        let timer = CompilationTimer::start(request.function.name.as_str());
        debug!(signature = %request.signature.human_string(), "compiling");

        let lowered = match &request.scope {
            CompileScope::Function => {
                self.compiler
                    .lower_function(&request.options, &request.function, &request.args)
            }
            CompileScope::SingleOp(op) => {
                self.compiler
                    .lower_single_op(&request.options, op, &request.args)
            }
        };

        state.compile_state = CompileState::Compiled;
        let program = match lowered {
            Ok(program) => {
                let program = Arc::new(program);
                state.compilation_result = Some(Arc::clone(&program));
                // Stays in place if the build unwinds instead of returning
                state.compilation_status = Err(CompileError::internal(format!(
                    "building {} did not complete",
                    request.function.name
                )));
                program
            }
            Err(e) => {
                warn!(function = %request.function.name, error = %e, "lowering failed");
                state.compilation_status = Err(e.clone());
                return Err(e);
            }
        };

        let persistent_cache_hit = match self.load_or_build(request, &program, state) {
            Ok(hit) => {
                state.compilation_status = Ok(());
                hit
            }
            Err(e) => {
                warn!(function = %request.function.name, error = %e, "building executable failed");
                state.compilation_status = Err(e);
                false
            }
        };

        let elapsed = timer.elapsed();
        profiler.register_compilation(timer.function_name(), elapsed, persistent_cache_hit);
        info!(
            function = %request.function.name,
            elapsed_us = elapsed.as_micros() as u64,
            persistent_cache_hit,
            ok = state.compilation_status.is_ok(),
            "compilation finished"
        );

        state.compilation_status.clone()
    }

    /// Returns whether the executable came from the persistent cache
    fn load_or_build(
        &self,
        request: &CompileRequest,
        program: &Arc<C::Program>,
        state: &mut EntryState<C::Program, C::Executable>,
    ) -> Result<bool> {
        let keyed = self
            .persistor
            .keyed_snapshot(&request.signature, program.as_ref());

        if let Some(keyed) = &keyed {
            let loaded = self.persistor.try_load_executable(
                &self.compiler,
                &request.options,
                program,
                keyed,
            )?;
            if let Some(executable) = loaded {
                state.executable = Some(Arc::new(executable));
                return Ok(true);
            }
        }

        let executable = self.compiler.build_executable(&request.options, program)?;
        state.executable = Some(Arc::new(executable));

        if let Some(keyed) = &keyed {
            if let Err(e) = self.persistor.try_persist_executable(
                &self.compiler,
                &request.options,
                keyed,
                state,
            ) {
                warn!(
                    function = %request.function.name,
                    error = %e,
                    "failed to persist executable; continuing without it"
                );
            }
        }

        Ok(false)
    }
}
