use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use super::args::{DataType, TensorShape};

/// Attribute attached to a function; part of its compiled identity.
///
/// Floats compare and hash by their bit pattern, so `NaN` equals itself and `0.0`
/// differs from `-0.0`.
#[derive(Debug, Clone)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Type(DataType),
    Shape(TensorShape),
    List(Vec<AttrValue>),
}

impl AttrValue {
    fn tag(&self) -> u8 {
        match self {
            AttrValue::Bool(_) => 0,
            AttrValue::Int(_) => 1,
            AttrValue::Float(_) => 2,
            AttrValue::Str(_) => 3,
            AttrValue::Type(_) => 4,
            AttrValue::Shape(_) => 5,
            AttrValue::List(_) => 6,
        }
    }
}

impl PartialEq for AttrValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (AttrValue::Bool(a), AttrValue::Bool(b)) => a == b,
            (AttrValue::Int(a), AttrValue::Int(b)) => a == b,
            (AttrValue::Float(a), AttrValue::Float(b)) => a.to_bits() == b.to_bits(),
            (AttrValue::Str(a), AttrValue::Str(b)) => a == b,
            (AttrValue::Type(a), AttrValue::Type(b)) => a == b,
            (AttrValue::Shape(a), AttrValue::Shape(b)) => a == b,
            (AttrValue::List(a), AttrValue::List(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for AttrValue {}

// Explicit tags rather than `mem::discriminant` so persistent fingerprints stay stable
impl Hash for AttrValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u8(self.tag());
        match self {
            AttrValue::Bool(v) => v.hash(state),
            AttrValue::Int(v) => v.hash(state),
            AttrValue::Float(v) => v.to_bits().hash(state),
            AttrValue::Str(v) => v.hash(state),
            AttrValue::Type(v) => v.hash(state),
            AttrValue::Shape(v) => v.hash(state),
            AttrValue::List(items) => items.hash(state),
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(v) => write!(f, "{v}"),
            AttrValue::Int(v) => write!(f, "{v}"),
            AttrValue::Float(v) => write!(f, "f{:016x}", v.to_bits()),
            AttrValue::Str(v) => write!(f, "{v:?}"),
            AttrValue::Type(v) => write!(f, "{v}"),
            AttrValue::Shape(v) => write!(f, "shape{v}"),
            AttrValue::List(items) => {
                write!(f, "[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// The function being compiled: its name plus the attributes that affect lowering
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FunctionDescriptor {
    pub name: String,
    pub attrs: BTreeMap<String, AttrValue>,
}

impl FunctionDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: BTreeMap::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: AttrValue) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }

    /// Name plus sorted attributes, e.g. `matmul[T=f32,transpose_a=false]`.
    ///
    /// Attribute-free functions canonicalize to their bare name. For display only: names
    /// and keys are not escaped, so two descriptors may render alike.
    pub fn canonical_name(&self) -> String {
        if self.attrs.is_empty() {
            return self.name.clone();
        }
        let attrs = self
            .attrs
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(",");
        format!("{}[{attrs}]", self.name)
    }
}
