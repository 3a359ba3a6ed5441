//! On-disk executable cache.
//!
//! One file per (signature, lowered program, device) holding the lowered program it was
//! built from and a serialized ahead-of-time artifact. Entries are verified against a
//! fresh lowering before being trusted.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use graphjit_config::{CompileOptions, PersistenceConfig};

use super::entry::{CompileState, EntryState};
use super::fs::CacheFileSystem;
use crate::compiler::{Compiler, LoweredProgram};
use crate::error::{CompileError, Result};
use crate::signature::Signature;
use crate::signature::fingerprint::fingerprint_bytes;

const KEY_SEPARATOR: &str = "__";
const ENTRY_EXTENSION: &str = "pb";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SerializedCacheKey {
    pub signature_fingerprint: u64,
    pub content_fingerprint: u64,
    pub device_type: String,
    pub prefix: String,
}

impl SerializedCacheKey {
    /// `{prefix}__{signature}__{content}__{device}.pb`, without the leading
    /// `{prefix}__` when the prefix is empty
    pub fn file_name(&self) -> String {
        let stem = [
            self.signature_fingerprint.to_string(),
            self.content_fingerprint.to_string(),
            self.device_type.clone(),
        ]
        .join(KEY_SEPARATOR);

        if self.prefix.is_empty() {
            format!("{stem}.{ENTRY_EXTENSION}")
        } else {
            format!("{}{KEY_SEPARATOR}{stem}.{ENTRY_EXTENSION}", self.prefix)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedCacheEntry {
    pub key: SerializedCacheKey,
    pub lowered_program_snapshot: Vec<u8>,
    pub executable: Vec<u8>,
}

impl SerializedCacheEntry {
    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| CompileError::internal(format!("failed to encode cache entry: {e}")))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes)
            .map_err(|e| CompileError::DataLoss(format!("failed to decode cache entry: {e}")))
    }
}

/// Key plus the serialized program it was derived from, computed once per compile
pub(crate) struct KeyedSnapshot {
    pub(crate) key: SerializedCacheKey,
    pub(crate) snapshot: Vec<u8>,
}

pub struct ExecutablePersistor {
    config: PersistenceConfig,
    fs: Arc<dyn CacheFileSystem>,
}

impl ExecutablePersistor {
    pub fn new(config: PersistenceConfig, fs: Arc<dyn CacheFileSystem>) -> Self {
        Self { config, fs }
    }

    pub fn config(&self) -> &PersistenceConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_enabled()
    }

    pub fn cache_key(&self, signature: &Signature, program_snapshot: &[u8]) -> SerializedCacheKey {
        SerializedCacheKey {
            signature_fingerprint: signature.fingerprint(),
            content_fingerprint: fingerprint_bytes(program_snapshot),
            device_type: self.config.device_type.clone(),
            prefix: self.config.key_prefix.clone(),
        }
    }

    pub fn entry_path(&self, key: &SerializedCacheKey) -> Option<PathBuf> {
        self.config
            .directory
            .as_ref()
            .map(|dir| dir.join(key.file_name()))
    }

    /// Serialize `program` and derive its key; `None` when persistence is off
    pub(crate) fn keyed_snapshot<P: LoweredProgram>(
        &self,
        signature: &Signature,
        program: &P,
    ) -> Option<KeyedSnapshot> {
        if !self.is_enabled() {
            return None;
        }
        let snapshot = program.serialize();
        let key = self.cache_key(signature, &snapshot);
        Some(KeyedSnapshot { key, snapshot })
    }

    /// Read the entry stored under `key`. A missing file is a miss; anything else that
    /// goes wrong is an error.
    pub fn try_load_entry(&self, key: &SerializedCacheKey) -> Result<Option<SerializedCacheEntry>> {
        let Some(path) = self.entry_path(key) else {
            return Ok(None);
        };
        if !self.fs.file_exists(&path) {
            return Ok(None);
        }
        let bytes = match self.fs.read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                let err = CompileError::io(&path, &e);
                if err.is_not_found() {
                    return Ok(None);
                }
                return Err(err);
            }
        };
        SerializedCacheEntry::decode(&bytes).map(Some)
    }

    /// Check a loaded entry against the key and snapshot of a fresh lowering
    pub fn verify_entry(
        &self,
        key: &SerializedCacheKey,
        snapshot: &[u8],
        entry: &SerializedCacheEntry,
    ) -> Result<()> {
        if entry.key != *key {
            return Err(CompileError::invalid_argument(format!(
                "persistent cache entry key mismatch: expected {}, found {}",
                key.file_name(),
                entry.key.file_name()
            )));
        }
        if self.config.strict_signature_checks && entry.lowered_program_snapshot != snapshot {
            return Err(CompileError::invalid_argument(format!(
                "persistent cache entry {} was built from a different lowered program",
                key.file_name()
            )));
        }
        if entry.executable.is_empty() {
            return Err(CompileError::invalid_argument(format!(
                "persistent cache entry {} has an empty executable",
                key.file_name()
            )));
        }
        Ok(())
    }

    /// Load a verified executable for `program`, or `None` on a cache miss
    pub(crate) fn try_load_executable<C: Compiler>(
        &self,
        compiler: &C,
        options: &CompileOptions,
        program: &C::Program,
        keyed: &KeyedSnapshot,
    ) -> Result<Option<C::Executable>> {
        let Some(entry) = self.try_load_entry(&keyed.key)? else {
            debug!(key = %keyed.key.file_name(), "persistent cache miss");
            return Ok(None);
        };
        self.verify_entry(&keyed.key, &keyed.snapshot, &entry)?;
        debug!(key = %keyed.key.file_name(), "persistent cache hit");
        compiler
            .load_executable(options, program, &entry.executable)
            .map(Some)
    }

    /// Turn a compiled entry into its on-disk form
    pub(crate) fn serialize_entry<C: Compiler>(
        &self,
        compiler: &C,
        options: &CompileOptions,
        keyed: &KeyedSnapshot,
        state: &EntryState<C::Program, C::Executable>,
    ) -> Result<SerializedCacheEntry> {
        if state.compile_state != CompileState::Compiled {
            return Err(CompileError::FailedPrecondition(format!(
                "cannot serialize an entry in state {}",
                state.compile_state
            )));
        }
        let (Some(program), Some(executable)) = (&state.compilation_result, &state.executable)
        else {
            return Err(CompileError::FailedPrecondition(
                "cannot serialize an entry without a lowered program and executable".to_string(),
            ));
        };

        let serialized = match compiler.export_ahead_of_time(executable) {
            Ok(bytes) => bytes,
            Err(e) if e.is_unimplemented() => {
                debug!("executable export unsupported, building ahead-of-time artifact");
                compiler.build_ahead_of_time(options, program)?
            }
            Err(e) => return Err(e),
        };

        Ok(SerializedCacheEntry {
            key: keyed.key.clone(),
            lowered_program_snapshot: keyed.snapshot.clone(),
            executable: serialized,
        })
    }

    pub fn save_entry(&self, entry: &SerializedCacheEntry) -> Result<()> {
        let (Some(dir), Some(path)) = (self.config.directory.as_ref(), self.entry_path(&entry.key))
        else {
            return Err(CompileError::FailedPrecondition(
                "no persistent cache directory configured".to_string(),
            ));
        };
        self.fs
            .create_dir_all(dir)
            .map_err(|e| CompileError::io(dir, &e))?;
        let bytes = entry.encode()?;
        self.fs
            .write(&path, &bytes)
            .map_err(|e| CompileError::io(&path, &e))?;
        debug!(path = %path.display(), bytes = bytes.len(), "persisted executable");
        Ok(())
    }

    /// Serialize and write a freshly built entry. No-op for read-only caches.
    pub(crate) fn try_persist_executable<C: Compiler>(
        &self,
        compiler: &C,
        options: &CompileOptions,
        keyed: &KeyedSnapshot,
        state: &EntryState<C::Program, C::Executable>,
    ) -> Result<()> {
        if self.config.read_only {
            return Ok(());
        }
        let entry = self.serialize_entry(compiler, options, keyed, state)?;
        self.save_entry(&entry)
    }
}
