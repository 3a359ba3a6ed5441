use std::collections::BTreeMap;

use super::args::{Argument, ConstantValue, DataType, TensorShape};
use super::fingerprint::fingerprint;
use super::function::{AttrValue, FunctionDescriptor};
use crate::error::{CompileError, Result};

/// One positional component of a signature
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SignatureArg {
    Constant(ConstantValue),
    TypeAndShape { dtype: DataType, shape: TensorShape },
}

/// Key identifying one compiled version of a function.
///
/// Name and attributes are kept as data; they are only ever rendered for display.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    function: FunctionDescriptor,
    args: Vec<SignatureArg>,
}

impl Signature {
    /// Classify `args` for `function`.
    ///
    /// Constants are keyed by content and parameters by type and shape. Anything else
    /// has to be resolved by the caller first.
    pub fn build(function: &FunctionDescriptor, args: &[Argument]) -> Result<Self> {
        let args = args
            .iter()
            .enumerate()
            .map(|(idx, arg)| match arg {
                Argument::Constant(value) => Ok(SignatureArg::Constant(value.clone())),
                Argument::Parameter { dtype, shape } => Ok(SignatureArg::TypeAndShape {
                    dtype: *dtype,
                    shape: shape.clone(),
                }),
                Argument::Resource { .. } | Argument::Token => {
                    Err(CompileError::invalid_argument(format!(
                        "unsupported {} argument at position {idx} of {}",
                        arg.kind_name(),
                        function.name
                    )))
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            function: function.clone(),
            args,
        })
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }

    pub fn attrs(&self) -> &BTreeMap<String, AttrValue> {
        &self.function.attrs
    }

    pub fn args(&self) -> &[SignatureArg] {
        &self.args
    }

    /// Process-independent hash, used in persistent cache keys
    pub fn fingerprint(&self) -> u64 {
        fingerprint(self)
    }

    /// Diagnostic rendering; not for hot paths
    pub fn human_string(&self) -> String {
        let mut out = self.function.canonical_name();
        for arg in &self.args {
            out.push(',');
            match arg {
                SignatureArg::Constant(value) => out.push_str(&value.to_string()),
                SignatureArg::TypeAndShape { dtype, shape } => {
                    out.push_str(&format!("{dtype}{shape}"));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::AHasher;
    use std::hash::{Hash, Hasher};

    fn ahash_of(sig: &Signature) -> u64 {
        let mut hasher = AHasher::default();
        sig.hash(&mut hasher);
        hasher.finish()
    }

    fn f() -> FunctionDescriptor {
        FunctionDescriptor::new("f")
    }

    #[test]
    fn test_equal_signatures_hash_equal() {
        let args = [
            Argument::parameter(DataType::F32, [2, 2]),
            Argument::Constant(ConstantValue::scalar_i32(3)),
        ];
        let a = Signature::build(&f(), &args).unwrap();
        let b = Signature::build(&f(), &args.clone()).unwrap();

        assert_eq!(a, b);
        assert_eq!(ahash_of(&a), ahash_of(&b));
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_cross_tag_mismatch_is_unequal() {
        // Same dtype and shape, but one side is a constant
        let constant = ConstantValue::from_f32s(TensorShape::new([2]), &[1.0, 2.0]);
        let a = Signature::build(&f(), &[Argument::Constant(constant)]).unwrap();
        let b = Signature::build(&f(), &[Argument::parameter(DataType::F32, [2])]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_constants_compare_by_content() {
        let one = Signature::build(&f(), &[Argument::Constant(ConstantValue::scalar_i32(1))]);
        let two = Signature::build(&f(), &[Argument::Constant(ConstantValue::scalar_i32(2))]);
        assert_ne!(one.unwrap(), two.unwrap());
    }

    #[test]
    fn test_name_and_arity_matter() {
        let args = [Argument::parameter(DataType::F32, [2, 2])];
        let a = Signature::build(&f(), &args).unwrap();
        let g = Signature::build(&FunctionDescriptor::new("g"), &args).unwrap();
        let longer = Signature::build(
            &f(),
            &[
                Argument::parameter(DataType::F32, [2, 2]),
                Argument::parameter(DataType::F32, [2, 2]),
            ],
        )
        .unwrap();

        assert_ne!(a, g);
        assert_ne!(a, longer);
        assert_ne!(
            a,
            Signature::build(&f(), &[Argument::parameter(DataType::F64, [2, 2])]).unwrap()
        );
    }

    #[test]
    fn test_unsupported_arguments_are_rejected() {
        let err = Signature::build(
            &f(),
            &[
                Argument::parameter(DataType::F32, [1]),
                Argument::Resource {
                    name: "var0".to_string(),
                    dtype: DataType::F32,
                },
            ],
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::InvalidArgument(ref m) if m.contains("position 1")));

        assert!(matches!(
            Signature::build(&f(), &[Argument::Token]),
            Err(CompileError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_attrs_are_not_folded_into_the_name() {
        let args = [Argument::parameter(DataType::F32, [2, 2])];
        let bracketed = Signature::build(&FunctionDescriptor::new("f[a=1]"), &args).unwrap();
        let attributed =
            Signature::build(&f().with_attr("a", AttrValue::Int(1)), &args).unwrap();

        // Both render the same, but they are different functions
        assert_eq!(bracketed.human_string(), "f[a=1],f32[2,2]");
        assert_eq!(attributed.human_string(), "f[a=1],f32[2,2]");
        assert_ne!(bracketed, attributed);
        assert_ne!(bracketed.fingerprint(), attributed.fingerprint());
        assert_eq!(attributed.name(), "f");
        assert_eq!(attributed.attrs().get("a"), Some(&AttrValue::Int(1)));
    }

    #[test]
    fn test_shape_and_list_attrs_differ() {
        let args = [Argument::parameter(DataType::F32, [2, 2])];
        let shape = f().with_attr("dims", AttrValue::Shape(TensorShape::new([2, 2])));
        let list = f().with_attr(
            "dims",
            AttrValue::List(vec![AttrValue::Int(2), AttrValue::Int(2)]),
        );

        let a = Signature::build(&shape, &args).unwrap();
        let b = Signature::build(&list, &args).unwrap();
        assert_ne!(a, b);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_float_attrs_hash_consistently() {
        let args = [Argument::parameter(DataType::F32, [1])];
        let a = Signature::build(&f().with_attr("eps", AttrValue::Float(f64::NAN)), &args);
        let b = Signature::build(&f().with_attr("eps", AttrValue::Float(f64::NAN)), &args);
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a, b);
        assert_eq!(ahash_of(&a), ahash_of(&b));
    }

    #[test]
    fn test_human_string() {
        let sig = Signature::build(
            &f(),
            &[
                Argument::parameter(DataType::F32, [2, 2]),
                Argument::Constant(ConstantValue::scalar_i32(1)),
            ],
        )
        .unwrap();
        assert_eq!(sig.human_string(), "f,f32[2,2],const s32[]{01000000}");
    }
}
