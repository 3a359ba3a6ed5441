use std::fmt;

use super::entry::{CompileState, EntrySnapshot};

/// Counts across every signature in a cache
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub signatures: usize,
    pub uncompiled: usize,
    pub compiling: usize,
    /// Compiled successfully
    pub compiled: usize,
    /// Compiled with an error that is now cached
    pub failed: usize,
    pub total_requests: u64,
}

impl CacheStats {
    pub(crate) fn record(&mut self, snapshot: &EntrySnapshot) {
        self.signatures += 1;
        self.total_requests += snapshot.request_count;
        match snapshot.compile_state {
            CompileState::Uncompiled => self.uncompiled += 1,
            CompileState::Compiling => self.compiling += 1,
            CompileState::Compiled if snapshot.status.is_ok() => self.compiled += 1,
            CompileState::Compiled => self.failed += 1,
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} signatures ({} compiled, {} failed, {} compiling, {} uncompiled), {} requests",
            self.signatures,
            self.compiled,
            self.failed,
            self.compiling,
            self.uncompiled,
            self.total_requests
        )
    }
}
