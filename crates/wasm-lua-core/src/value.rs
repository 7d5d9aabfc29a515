//! The four primitive WebAssembly value kinds.
//!
//! [`Value`] is a tagged union with one variant per [`ValueKind`]; there is no
//! implicit coercion between tags. Conversions to and from Wasmtime's
//! [`Val`]/[`ValType`] are partial because the engine also knows vector and
//! reference types, which this binding does not support.

use std::fmt;

use wasmtime::{FuncType, Val, ValType};

/// Primitive value kind of a parameter or result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// 32-bit integer.
    I32,
    /// 64-bit integer.
    I64,
    /// 32-bit IEEE float.
    F32,
    /// 64-bit IEEE float.
    F64,
}

impl ValueKind {
    /// Map an engine value type, `None` for vector and reference types.
    pub fn from_val_type(ty: &ValType) -> Option<Self> {
        match ty {
            ValType::I32 => Some(Self::I32),
            ValType::I64 => Some(Self::I64),
            ValType::F32 => Some(Self::F32),
            ValType::F64 => Some(Self::F64),
            _ => None,
        }
    }

    /// Returns `true` for the two integer kinds.
    pub fn is_integer(self) -> bool {
        matches!(self, Self::I32 | Self::I64)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A primitive WebAssembly value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Value {
    /// The kind tag of this value.
    pub fn kind(self) -> ValueKind {
        match self {
            Value::I32(_) => ValueKind::I32,
            Value::I64(_) => ValueKind::I64,
            Value::F32(_) => ValueKind::F32,
            Value::F64(_) => ValueKind::F64,
        }
    }

    /// Convert an engine value, `None` for vector and reference values.
    pub fn from_val(val: &Val) -> Option<Self> {
        match val {
            Val::I32(v) => Some(Value::I32(*v)),
            Val::I64(v) => Some(Value::I64(*v)),
            Val::F32(bits) => Some(Value::F32(f32::from_bits(*bits))),
            Val::F64(bits) => Some(Value::F64(f64::from_bits(*bits))),
            _ => None,
        }
    }
}

impl From<Value> for Val {
    fn from(value: Value) -> Self {
        match value {
            Value::I32(v) => Val::I32(v),
            Value::I64(v) => Val::I64(v),
            Value::F32(v) => Val::F32(v.to_bits()),
            Value::F64(v) => Val::F64(v.to_bits()),
        }
    }
}

/// Fixed parameter and result kinds of a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncSignature {
    params: Vec<ValueKind>,
    results: Vec<ValueKind>,
}

impl FuncSignature {
    pub fn new(params: Vec<ValueKind>, results: Vec<ValueKind>) -> Self {
        Self { params, results }
    }

    /// Map an engine function type.
    ///
    /// # Errors
    ///
    /// Returns the engine's name of the first unsupported type.
    pub fn from_func_type(ty: &FuncType) -> Result<Self, String> {
        let convert = |ty: ValType| ValueKind::from_val_type(&ty).ok_or_else(|| ty.to_string());

        Ok(Self {
            params: ty.params().map(convert).collect::<Result<_, _>>()?,
            results: ty.results().map(convert).collect::<Result<_, _>>()?,
        })
    }

    pub fn params(&self) -> &[ValueKind] {
        &self.params
    }

    pub fn results(&self) -> &[ValueKind] {
        &self.results
    }
}

impl fmt::Display for FuncSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |kinds: &[ValueKind]| {
            kinds
                .iter()
                .map(|kind| kind.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        write!(f, "({}) -> ({})", join(&self.params), join(&self.results))
    }
}
