// Compilation cache
pub(crate) mod compile;
pub mod entry;
pub mod fs;
pub mod persistent;
pub mod stats;

#[cfg(test)]
pub(crate) mod testing;

pub use entry::{CompileState, CompiledArtifact, EntrySnapshot};
pub use fs::{CacheFileSystem, LocalFileSystem};
pub use persistent::{ExecutablePersistor, SerializedCacheEntry, SerializedCacheKey};
pub use stats::CacheStats;

use ahash::AHashMap;
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::debug;

use graphjit_config::{CacheConfig, CompileMode, CompileOptions, PersistenceConfig};
use graphjit_metrics::{CompileDecision, Profiler};

use self::compile::{CompileContext, CompileRequest};
use self::entry::{Entry, EntryState};
use crate::compiler::{CompileScope, Compiler, OpContext};
use crate::concurrency::AsyncCompileScheduler;
use crate::error::{CompileError, Result};
use crate::signature::{Argument, FunctionDescriptor, Signature};

/// What a successful lookup hands back for compiler `C`
pub type Artifact<C> = CompiledArtifact<<C as Compiler>::Program, <C as Compiler>::Executable>;

type SharedEntry<C> = Arc<Entry<<C as Compiler>::Program, <C as Compiler>::Executable>>;

/// Memoizes compilations per signature.
///
/// Two locks are involved: the map lock, held only to find or insert an entry, and one
/// lock per entry, held for the rest of a request. A signature compiled on the calling
/// thread keeps its entry locked for the whole compile, so concurrent requests for the
/// same signature wait for it and at most one compile per signature is ever in flight.
/// Requests for other signatures are unaffected.
///
/// Entries are never evicted.
pub struct CompilationCache<C: Compiler> {
    context: Arc<CompileContext<C>>,
    entries: Mutex<AHashMap<Signature, SharedEntry<C>>>,
    scheduler: AsyncCompileScheduler,
}

impl<C: Compiler> CompilationCache<C> {
    pub fn new(compiler: C, config: CacheConfig) -> Result<Self> {
        Self::with_file_system(compiler, config, Arc::new(LocalFileSystem))
    }

    pub fn with_file_system(
        compiler: C,
        config: CacheConfig,
        fs: Arc<dyn CacheFileSystem>,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| CompileError::invalid_argument(e.to_string()))?;

        let scheduler = AsyncCompileScheduler::new(config.async_compile_threads)?;
        let persistor = ExecutablePersistor::new(config.persistence, fs);

        Ok(Self {
            context: Arc::new(CompileContext {
                compiler,
                persistor,
            }),
            entries: Mutex::new(AHashMap::new()),
            scheduler,
        })
    }

    pub fn compiler(&self) -> &C {
        &self.context.compiler
    }

    pub fn persistence(&self) -> &PersistenceConfig {
        self.context.persistor.config()
    }

    pub fn compile_function(
        &self,
        function: &FunctionDescriptor,
        args: &[Argument],
        options: &CompileOptions,
        mode: CompileMode,
        profiler: &Arc<dyn Profiler>,
    ) -> Result<Option<Artifact<C>>> {
        self.compile_or_fetch(function, args, options, mode, &CompileScope::Function, profiler)
    }

    /// Compile one operation outside of any function body. `function` still names the
    /// operation for caching and profiling purposes.
    pub fn compile_single_op(
        &self,
        function: &FunctionDescriptor,
        op: &OpContext,
        args: &[Argument],
        options: &CompileOptions,
        mode: CompileMode,
        profiler: &Arc<dyn Profiler>,
    ) -> Result<Option<Artifact<C>>> {
        let scope = CompileScope::SingleOp(op.clone());
        self.compile_or_fetch(function, args, options, mode, &scope, profiler)
    }

    /// Return the compiled artifact for `function` at `args`, compiling it if the
    /// profiler's policy says so.
    ///
    /// `Ok(None)` means nothing is ready: the policy deferred compilation, or it is
    /// running in the background. A failed compile is remembered and returned to every
    /// later request for the same signature.
    pub fn compile_or_fetch(
        &self,
        function: &FunctionDescriptor,
        args: &[Argument],
        options: &CompileOptions,
        mode: CompileMode,
        scope: &CompileScope,
        profiler: &Arc<dyn Profiler>,
    ) -> Result<Option<Artifact<C>>> {
        let signature = Signature::build(function, args)?;
        let entry = self.lookup_or_insert(&signature);

        profiler.register_execution(&function.name);

        let mut state = entry.lock();
        state.request_count += 1;

        match state.compile_state {
            CompileState::Uncompiled => {
                match profiler.should_compile(&function.name, mode, state.request_count) {
                    CompileDecision::Refuse => {
                        return Err(CompileError::internal(format!(
                            "compilation disabled for {}",
                            function.name
                        )));
                    }
                    CompileDecision::NotYet => return Ok(None),
                    CompileDecision::CompileAsync => {
                        let request = Self::request(signature, function, args, options, scope);
                        self.schedule_async(request, profiler, &entry, &mut state)?;
                        return Ok(None);
                    }
                    CompileDecision::CompileNow => {
                        let request = Self::request(signature, function, args, options, scope);
                        // The outcome is stored in `state` and surfaced below
                        let _ = self
                            .context
                            .compile_strict(&request, profiler.as_ref(), &mut state);
                    }
                }
            }
            CompileState::Compiling => return Ok(None),
            CompileState::Compiled => {}
        }

        state.artifact().map(Some)
    }

    /// Like `compile_or_fetch`, but never compiles and never creates an entry
    pub fn peek_if_compiled(
        &self,
        function: &FunctionDescriptor,
        args: &[Argument],
    ) -> Result<Option<Artifact<C>>> {
        let signature = Signature::build(function, args)?;
        let Some(entry) = self.lookup(&signature) else {
            return Ok(None);
        };

        let mut state = entry.lock();
        if state.compile_state != CompileState::Compiled {
            return Ok(None);
        }
        state.request_count += 1;
        state.artifact().map(Some)
    }

    /// Current bookkeeping for a signature without counting a request
    pub fn entry_snapshot(
        &self,
        function: &FunctionDescriptor,
        args: &[Argument],
    ) -> Result<Option<EntrySnapshot>> {
        let signature = Signature::build(function, args)?;
        Ok(self.lookup(&signature).map(|entry| entry.lock().snapshot()))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Background compiles queued or running
    pub fn pending_async_compilations(&self) -> usize {
        self.scheduler.pending()
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();
        for (_, entry) in self.snapshot_entries() {
            stats.record(&entry.lock().snapshot());
        }
        stats
    }

    /// One line per signature; for logs only
    pub fn debug_string(&self) -> String {
        let mut lines = self
            .snapshot_entries()
            .into_iter()
            .map(|(signature, entry)| {
                let snapshot = entry.lock().snapshot();
                format!(
                    "{} state={} requests={} ok={}",
                    signature.human_string(),
                    snapshot.compile_state,
                    snapshot.request_count,
                    snapshot.status.is_ok()
                )
            })
            .collect::<Vec<_>>();
        lines.sort();
        lines.join("\n")
    }

    fn request(
        signature: Signature,
        function: &FunctionDescriptor,
        args: &[Argument],
        options: &CompileOptions,
        scope: &CompileScope,
    ) -> CompileRequest {
        CompileRequest {
            signature,
            function: function.clone(),
            args: args.to_vec(),
            options: options.clone(),
            scope: scope.clone(),
        }
    }

    fn lookup(&self, signature: &Signature) -> Option<SharedEntry<C>> {
        self.entries.lock().get(signature).cloned()
    }

    fn lookup_or_insert(&self, signature: &Signature) -> SharedEntry<C> {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get(signature) {
            return Arc::clone(entry);
        }
        debug!(signature = %signature.human_string(), "creating cache entry");
        let entry = Arc::new(Entry::new());
        entries.insert(signature.clone(), Arc::clone(&entry));
        entry
    }

    /// Copy the entry list out so entry locks are taken without the map lock held
    fn snapshot_entries(&self) -> Vec<(Signature, SharedEntry<C>)> {
        self.entries
            .lock()
            .iter()
            .map(|(signature, entry)| (signature.clone(), Arc::clone(entry)))
            .collect()
    }

    /// Hand `request` to the background pool. Must be called with `entry` locked as
    /// `state`; the entry is marked compiling before the lock is released, so no other
    /// request can schedule the same signature again.
    fn schedule_async(
        &self,
        request: CompileRequest,
        profiler: &Arc<dyn Profiler>,
        entry: &SharedEntry<C>,
        state: &mut EntryState<C::Program, C::Executable>,
    ) -> Result<()> {
        state.compile_state = CompileState::Compiling;
        profiler.increment_ongoing_async_compilations();

        let context = Arc::clone(&self.context);
        let job_profiler = Arc::clone(profiler);
        let shared = Arc::clone(entry);

        let scheduled = self.scheduler.schedule(move || {
            // Compile into a private state so the shared entry stays unlocked meanwhile
            let mut local = EntryState::new();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                context.compile_strict(&request, job_profiler.as_ref(), &mut local)
            }));
            if outcome.is_err() {
                local.fail(CompileError::internal(format!(
                    "compilation of {} panicked",
                    request.function.name
                )));
            }
            job_profiler.decrement_ongoing_async_compilations();

            shared.lock().absorb(local);
        });

        if let Err(e) = scheduled {
            state.compile_state = CompileState::Uncompiled;
            profiler.decrement_ongoing_async_compilations();
            return Err(e);
        }
        Ok(())
    }
}

impl<C: Compiler> Drop for CompilationCache<C> {
    fn drop(&mut self) {
        // Background compiles must finish while the compiler is still usable
        self.scheduler.shutdown();
    }
}
