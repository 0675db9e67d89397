//! NumPy-compatible element types for streamed arrays.
//!
//! Clients announce arrays with the dtype string NumPy prints for them
//! (`"float32"`, `"uint8"`, `"bool"`) or with an array-protocol descriptor
//! (`"<f4"`, `"|u1"`, `">i2"`). [`DType`] parses both spellings and renders
//! the descriptor written into `.npy` headers.

use std::fmt;
use std::str::FromStr;

/// Element kind, mirroring NumPy's single-letter kind codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DTypeKind {
    /// `b`: boolean stored as one byte.
    Bool,
    /// `i`: signed integer.
    Int,
    /// `u`: unsigned integer.
    UInt,
    /// `f`: IEEE floating point.
    Float,
    /// `c`: complex floating point (two floats).
    Complex,
}

impl DTypeKind {
    const fn code(self) -> char {
        match self {
            Self::Bool => 'b',
            Self::Int => 'i',
            Self::UInt => 'u',
            Self::Float => 'f',
            Self::Complex => 'c',
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Float => "float",
            Self::Complex => "complex",
        }
    }
}

/// Byte order of multi-byte elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    /// `<`
    Little,
    /// `>`
    Big,
    /// `|`: single-byte types.
    NotApplicable,
}

/// A fixed-size element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DType {
    kind: DTypeKind,
    item_size: usize,
    order: ByteOrder,
}

/// Error returned when a dtype string is not understood.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported dtype: {0:?}")]
pub struct ParseDTypeError(pub String);

impl DType {
    /// Builds a native (little-endian) dtype, returning `None` for sizes
    /// NumPy does not offer for that kind.
    #[must_use]
    pub fn new(kind: DTypeKind, item_size: usize) -> Option<Self> {
        let valid = match kind {
            DTypeKind::Bool => item_size == 1,
            DTypeKind::Int | DTypeKind::UInt => matches!(item_size, 1 | 2 | 4 | 8),
            DTypeKind::Float => matches!(item_size, 2 | 4 | 8),
            DTypeKind::Complex => matches!(item_size, 8 | 16),
        };
        valid.then(|| Self {
            kind,
            item_size,
            order: if item_size == 1 {
                ByteOrder::NotApplicable
            } else {
                ByteOrder::Little
            },
        })
    }

    /// Element kind.
    #[must_use]
    pub const fn kind(&self) -> DTypeKind {
        self.kind
    }

    /// Size of one element in bytes.
    #[must_use]
    pub const fn item_size(&self) -> usize {
        self.item_size
    }

    /// Byte order of the element.
    #[must_use]
    pub const fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// Array-protocol descriptor, e.g. `<f4`, `|u1`, `>i2`.
    #[must_use]
    pub fn descr(&self) -> String {
        let prefix = match self.order {
            ByteOrder::Little => '<',
            ByteOrder::Big => '>',
            ByteOrder::NotApplicable => '|',
        };
        format!("{prefix}{}{}", self.kind.code(), self.item_size)
    }

    fn with_order(mut self, order: ByteOrder) -> Self {
        if self.item_size > 1 {
            self.order = order;
        }
        self
    }

    fn from_name(name: &str) -> Option<Self> {
        let (kind, size) = match name {
            "bool" | "bool_" | "?" => (DTypeKind::Bool, 1),
            "int8" | "byte" => (DTypeKind::Int, 1),
            "int16" | "short" => (DTypeKind::Int, 2),
            "int32" | "intc" => (DTypeKind::Int, 4),
            "int64" | "int" | "long" | "longlong" | "int_" => (DTypeKind::Int, 8),
            "uint8" | "ubyte" => (DTypeKind::UInt, 1),
            "uint16" | "ushort" => (DTypeKind::UInt, 2),
            "uint32" | "uintc" => (DTypeKind::UInt, 4),
            "uint64" | "uint" | "ulong" | "ulonglong" => (DTypeKind::UInt, 8),
            "float16" | "half" => (DTypeKind::Float, 2),
            "float32" | "single" => (DTypeKind::Float, 4),
            "float64" | "float" | "double" | "float_" => (DTypeKind::Float, 8),
            "complex64" | "csingle" => (DTypeKind::Complex, 8),
            "complex128" | "complex" | "cdouble" | "complex_" => (DTypeKind::Complex, 16),
            _ => return None,
        };
        Self::new(kind, size)
    }

    fn from_descr(descr: &str) -> Option<Self> {
        let (order, rest) = match descr.chars().next()? {
            '<' => (Some(ByteOrder::Little), descr.get(1..)?),
            '>' => (Some(ByteOrder::Big), descr.get(1..)?),
            '|' | '=' => (None, descr.get(1..)?),
            _ => (None, descr),
        };
        match rest {
            "?" => return Self::new(DTypeKind::Bool, 1),
            "b" => return Self::new(DTypeKind::Int, 1),
            "B" => return Self::new(DTypeKind::UInt, 1),
            _ => {}
        }
        let mut chars = rest.chars();
        let kind = match chars.next()? {
            'b' => DTypeKind::Bool,
            'i' => DTypeKind::Int,
            'u' => DTypeKind::UInt,
            'f' => DTypeKind::Float,
            'c' => DTypeKind::Complex,
            _ => return None,
        };
        let dtype = Self::new(kind, chars.as_str().parse().ok()?)?;
        Some(match order {
            Some(order) => dtype.with_order(order),
            None => dtype,
        })
    }
}

impl FromStr for DType {
    type Err = ParseDTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::from_name(trimmed)
            .or_else(|| Self::from_descr(trimmed))
            .ok_or_else(|| ParseDTypeError(s.to_string()))
    }
}

impl fmt::Display for DType {
    /// Renders the NumPy name (`float32`) for native types and the
    /// descriptor otherwise.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, self.order) {
            (DTypeKind::Bool, _) => write!(f, "bool"),
            (_, ByteOrder::Big) => write!(f, "{}", self.descr()),
            (kind, _) => write!(f, "{}{}", kind.name(), self.item_size * 8),
        }
    }
}

/// Rust scalar types that can be streamed as array elements.
pub trait Element: Copy {
    /// The matching NumPy dtype.
    fn dtype() -> DType;

    /// Appends the little-endian encoding of `self` to `out`.
    fn extend_le_bytes(self, out: &mut Vec<u8>);
}

macro_rules! impl_element {
    ($($ty:ty => $kind:expr),* $(,)?) => {
        $(
            impl Element for $ty {
                fn dtype() -> DType {
                    DType {
                        kind: $kind,
                        item_size: std::mem::size_of::<$ty>(),
                        order: if std::mem::size_of::<$ty>() == 1 {
                            ByteOrder::NotApplicable
                        } else {
                            ByteOrder::Little
                        },
                    }
                }

                fn extend_le_bytes(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

impl_element! {
    i8 => DTypeKind::Int,
    i16 => DTypeKind::Int,
    i32 => DTypeKind::Int,
    i64 => DTypeKind::Int,
    u8 => DTypeKind::UInt,
    u16 => DTypeKind::UInt,
    u32 => DTypeKind::UInt,
    u64 => DTypeKind::UInt,
    f32 => DTypeKind::Float,
    f64 => DTypeKind::Float,
}

impl Element for bool {
    fn dtype() -> DType {
        DType {
            kind: DTypeKind::Bool,
            item_size: 1,
            order: ByteOrder::NotApplicable,
        }
    }

    fn extend_le_bytes(self, out: &mut Vec<u8>) {
        out.push(u8::from(self));
    }
}
