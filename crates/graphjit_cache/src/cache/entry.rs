use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

use crate::error::{CompileError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompileState {
    Uncompiled,
    Compiling,
    Compiled,
}

impl fmt::Display for CompileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompileState::Uncompiled => "uncompiled",
            CompileState::Compiling => "compiling",
            CompileState::Compiled => "compiled",
        })
    }
}

/// A lowered program together with the executable built from it
pub struct CompiledArtifact<P, E> {
    pub program: Arc<P>,
    pub executable: Arc<E>,
}

impl<P, E> Clone for CompiledArtifact<P, E> {
    fn clone(&self) -> Self {
        Self {
            program: Arc::clone(&self.program),
            executable: Arc::clone(&self.executable),
        }
    }
}

impl<P, E> fmt::Debug for CompiledArtifact<P, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledArtifact")
            .field("program", &Arc::as_ptr(&self.program))
            .field("executable", &Arc::as_ptr(&self.executable))
            .finish()
    }
}

/// Mutable per-signature record. Only ever touched through `Entry::lock`, or as a
/// private value owned by one background compile.
pub(crate) struct EntryState<P, E> {
    pub(crate) compile_state: CompileState,
    pub(crate) compilation_result: Option<Arc<P>>,
    pub(crate) executable: Option<Arc<E>>,
    pub(crate) compilation_status: Result<()>,
    pub(crate) request_count: u64,
}

impl<P, E> EntryState<P, E> {
    pub(crate) fn new() -> Self {
        Self {
            compile_state: CompileState::Uncompiled,
            compilation_result: None,
            executable: None,
            compilation_status: Ok(()),
            request_count: 0,
        }
    }

    /// Take over the outcome of a compile that ran against `finished`.
    ///
    /// Request counting belongs to the shared entry and is left alone.
    pub(crate) fn absorb(&mut self, finished: EntryState<P, E>) {
        self.compile_state = finished.compile_state;
        self.compilation_result = finished.compilation_result;
        self.executable = finished.executable;
        self.compilation_status = finished.compilation_status;
    }

    /// Record a failure that happened before or outside the compile procedure
    pub(crate) fn fail(&mut self, err: CompileError) {
        self.compile_state = CompileState::Compiled;
        self.compilation_status = Err(err);
    }

    /// Result handed to callers once the entry is compiled
    pub(crate) fn artifact(&self) -> Result<CompiledArtifact<P, E>> {
        self.compilation_status.clone()?;
        match (&self.compilation_result, &self.executable) {
            (Some(program), Some(executable)) => Ok(CompiledArtifact {
                program: Arc::clone(program),
                executable: Arc::clone(executable),
            }),
            _ => Err(CompileError::internal(
                "compiled entry is missing its program or executable",
            )),
        }
    }

    pub(crate) fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            compile_state: self.compile_state,
            request_count: self.request_count,
            has_program: self.compilation_result.is_some(),
            has_executable: self.executable.is_some(),
            status: self.compilation_status.clone(),
        }
    }
}

/// Point-in-time copy of an entry's bookkeeping, for diagnostics and tests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySnapshot {
    pub compile_state: CompileState,
    pub request_count: u64,
    pub has_program: bool,
    pub has_executable: bool,
    pub status: Result<()>,
}

pub(crate) struct Entry<P, E> {
    state: Mutex<EntryState<P, E>>,
}

impl<P, E> Entry<P, E> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(EntryState::new()),
        }
    }

    pub(crate) fn lock(&self) -> parking_lot::MutexGuard<'_, EntryState<P, E>> {
        self.state.lock()
    }
}
