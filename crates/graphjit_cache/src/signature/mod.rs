// Compilation signatures
pub mod args;
pub mod fingerprint;
pub mod function;
pub mod key;

pub use args::{Argument, ConstantValue, DataType, TensorShape};
pub use function::{AttrValue, FunctionDescriptor};
pub use key::{Signature, SignatureArg};
