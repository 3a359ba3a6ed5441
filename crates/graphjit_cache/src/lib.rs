//! Signature-keyed cache of compiled executables, with an optional on-disk layer and
//! background compilation.

pub mod cache;
pub mod compiler;
pub mod concurrency;
pub mod error;
pub mod registry;
pub mod signature;

pub use cache::{
    Artifact, CacheStats, CompilationCache, CompileState, CompiledArtifact, EntrySnapshot,
};
pub use compiler::{CompileScope, Compiler, LoweredProgram, OpContext};
pub use error::{CompileError, Result};
pub use registry::{ResourceRegistry, shared_compilation_cache};
pub use signature::{
    Argument, AttrValue, ConstantValue, DataType, FunctionDescriptor, Signature, TensorShape,
};
