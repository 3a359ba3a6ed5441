//! Backend the cache drives to lower, build, export and reload executables

use graphjit_config::CompileOptions;

use crate::error::{CompileError, Result};
use crate::signature::{Argument, AttrValue, FunctionDescriptor};
use std::collections::BTreeMap;

/// Intermediate program produced by lowering.
///
/// `serialize` must be deterministic: its bytes feed the persistent cache key and are
/// compared byte-for-byte when an on-disk entry is verified.
pub trait LoweredProgram: Send + Sync + 'static {
    fn serialize(&self) -> Vec<u8>;
}

/// A single low-level operation compiled on its own, outside any function body
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OpContext {
    pub op_type: String,
    pub attrs: BTreeMap<String, AttrValue>,
}

impl OpContext {
    pub fn new(op_type: impl Into<String>) -> Self {
        Self {
            op_type: op_type.into(),
            attrs: BTreeMap::new(),
        }
    }
}

/// Which lowering entry point a compile request goes through
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CompileScope {
    #[default]
    Function,
    SingleOp(OpContext),
}

pub trait Compiler: Send + Sync + 'static {
    type Program: LoweredProgram;
    type Executable: Send + Sync + 'static;

    fn lower_function(
        &self,
        options: &CompileOptions,
        function: &FunctionDescriptor,
        args: &[Argument],
    ) -> Result<Self::Program>;

    fn lower_single_op(
        &self,
        options: &CompileOptions,
        op: &OpContext,
        args: &[Argument],
    ) -> Result<Self::Program>;

    fn build_executable(
        &self,
        options: &CompileOptions,
        program: &Self::Program,
    ) -> Result<Self::Executable>;

    /// Serialize an already built executable.
    ///
    /// Backends that cannot do this return `Unimplemented`; the cache then asks
    /// `build_ahead_of_time` for the artifact instead.
    fn export_ahead_of_time(&self, _executable: &Self::Executable) -> Result<Vec<u8>> {
        Err(CompileError::unimplemented(
            "executable export is not supported by this backend",
        ))
    }

    fn build_ahead_of_time(
        &self,
        options: &CompileOptions,
        program: &Self::Program,
    ) -> Result<Vec<u8>>;

    fn load_executable(
        &self,
        options: &CompileOptions,
        program: &Self::Program,
        serialized: &[u8],
    ) -> Result<Self::Executable>;
}
