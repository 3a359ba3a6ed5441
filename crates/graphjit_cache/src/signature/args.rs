use std::fmt;

/// Element type of a tensor argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataType {
    Bool,
    I8,
    I32,
    I64,
    U8,
    U32,
    F16,
    BF16,
    F32,
    F64,
}

impl DataType {
    pub fn name(self) -> &'static str {
        match self {
            DataType::Bool => "pred",
            DataType::I8 => "s8",
            DataType::I32 => "s32",
            DataType::I64 => "s64",
            DataType::U8 => "u8",
            DataType::U32 => "u32",
            DataType::F16 => "f16",
            DataType::BF16 => "bf16",
            DataType::F32 => "f32",
            DataType::F64 => "f64",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Dimension sizes of a tensor; `-1` marks a dimension unknown until runtime
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct TensorShape(pub Vec<i64>);

impl TensorShape {
    pub fn new(dims: impl Into<Vec<i64>>) -> Self {
        Self(dims.into())
    }

    pub fn scalar() -> Self {
        Self(Vec::new())
    }

    pub fn dims(&self) -> &[i64] {
        &self.0
    }
}

impl fmt::Display for TensorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (idx, dim) in self.dims().iter().enumerate() {
            if idx > 0 {
                write!(f, ",")?;
            }
            write!(f, "{dim}")?;
        }
        write!(f, "]")
    }
}

/// Snapshot of a compile-time constant input
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConstantValue {
    pub dtype: DataType,
    pub shape: TensorShape,
    pub bytes: Vec<u8>,
}

impl ConstantValue {
    pub fn new(dtype: DataType, shape: TensorShape, bytes: Vec<u8>) -> Self {
        Self {
            dtype,
            shape,
            bytes,
        }
    }

    pub fn from_i32s(shape: TensorShape, values: &[i32]) -> Self {
        let bytes = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::new(DataType::I32, shape, bytes)
    }

    pub fn from_f32s(shape: TensorShape, values: &[f32]) -> Self {
        let bytes = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::new(DataType::F32, shape, bytes)
    }

    pub fn scalar_i32(value: i32) -> Self {
        Self::from_i32s(TensorShape::scalar(), &[value])
    }
}

impl fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const MAX_SHOWN: usize = 16;

        write!(f, "const {}{}{{", self.dtype, self.shape)?;
        for byte in self.bytes.iter().take(MAX_SHOWN) {
            write!(f, "{byte:02x}")?;
        }
        if self.bytes.len() > MAX_SHOWN {
            write!(f, "...")?;
        }
        write!(f, "}}")
    }
}

/// An input as the caller classified it
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// Value known at compile time; becomes part of the signature
    Constant(ConstantValue),

    /// Runtime value; only its type and shape matter for compilation
    Parameter { dtype: DataType, shape: TensorShape },

    /// Handle to mutable state that has not been resolved to a constant or a shape
    Resource { name: String, dtype: DataType },

    /// Ordering token with no data
    Token,
}

impl Argument {
    pub fn parameter(dtype: DataType, dims: impl Into<Vec<i64>>) -> Self {
        Argument::Parameter {
            dtype,
            shape: TensorShape::new(dims),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Argument::Constant(_) => "constant",
            Argument::Parameter { .. } => "parameter",
            Argument::Resource { .. } => "resource",
            Argument::Token => "token",
        }
    }
}
