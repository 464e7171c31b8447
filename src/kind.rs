//! The lattice of element representations

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Physical layout of an array's elements, ordered by generality.
///
/// `PackedSmi < PackedDouble < Packed` is the generality order: each kind can
/// hold every value the previous one can. `Dictionary` is the sparse storage
/// strategy; it sits on top of the order because a store that has been
/// normalized never returns to a packed layout.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementsKind {
    /// Small integers, unboxed
    PackedSmi = 0,
    /// Doubles, unboxed
    PackedDouble = 1,
    /// Arbitrary values
    Packed = 2,
    /// Sparse index → value map
    Dictionary = 3,
}

use ElementsKind::{Dictionary, Packed, PackedDouble, PackedSmi};

const JOIN: [[ElementsKind; 4]; 4] = [
    [PackedSmi, PackedDouble, Packed, Dictionary],
    [PackedDouble, PackedDouble, Packed, Dictionary],
    [Packed, Packed, Packed, Dictionary],
    [Dictionary, Dictionary, Dictionary, Dictionary],
];

impl Default for ElementsKind {
    fn default() -> Self {
        Self::PackedSmi
    }
}

impl ElementsKind {
    /// Every kind, least general first.
    pub const ALL: [ElementsKind; 4] = [PackedSmi, PackedDouble, Packed, Dictionary];

    /// Least upper bound of two kinds.
    #[must_use]
    pub fn join(self, other: Self) -> Self {
        JOIN[self as usize][other as usize]
    }

    /// Returns `true` if a store of kind `self` can hold everything a store of
    /// kind `other` can, and more.
    #[must_use]
    pub fn is_more_general_than(self, other: Self) -> bool {
        self != other && self.join(other) == self
    }

    /// Returns `true` for the sparse dictionary layout.
    #[must_use]
    pub fn is_dictionary(self) -> bool {
        self == Dictionary
    }

    /// Returns `true` for the packed layouts.
    #[must_use]
    pub fn is_packed(self) -> bool {
        !self.is_dictionary()
    }

    /// Human-readable label reported by the classification query.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            PackedSmi => "packed small-int elements",
            PackedDouble => "packed double elements",
            Packed => "packed elements",
            Dictionary => "dictionary elements",
        }
    }
}

impl Display for ElementsKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Minimal kind able to hold `value` without loss: small integers need
/// `PackedSmi`, other numbers `PackedDouble` and everything else `Packed`.
#[must_use]
pub fn classify(value: &Value) -> ElementsKind {
    match value {
        Value::Number(_) if value.as_small_int().is_some() => PackedSmi,
        Value::Number(_) => PackedDouble,
        _ => Packed,
    }
}

/// Returns `true` if `kind` is the sparse dictionary layout.
#[must_use]
pub fn is_dictionary(kind: ElementsKind) -> bool {
    kind.is_dictionary()
}

/// Element type of an external fixed-width numeric buffer. These buffers
/// have a fixed element type and never transition.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalArrayType {
    /// Signed 8-bit integers
    Int8,
    /// Unsigned 8-bit integers
    Uint8,
    /// Signed 16-bit integers
    Int16,
    /// Unsigned 16-bit integers
    Uint16,
    /// Signed 32-bit integers
    Int32,
    /// Unsigned 32-bit integers
    Uint32,
    /// 32-bit floats
    Float32,
    /// 64-bit floats
    Float64,
    /// Unsigned 8-bit integers, clamped on store
    Pixel,
}

impl ExternalArrayType {
    /// Size of one element in bytes.
    #[must_use]
    pub fn element_size(self) -> usize {
        use std::mem::size_of;
        use ExternalArrayType::*;
        match self {
            Int8 => size_of::<i8>(),
            Uint8 | Pixel => size_of::<u8>(),
            Int16 => size_of::<i16>(),
            Uint16 => size_of::<u16>(),
            Int32 => size_of::<i32>(),
            Uint32 => size_of::<u32>(),
            Float32 => size_of::<f32>(),
            Float64 => size_of::<f64>(),
        }
    }

    /// Returns `true` if elements are floating point.
    #[must_use]
    pub fn is_float(self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    /// Returns `true` if elements are signed.
    #[must_use]
    pub fn is_signed(self) -> bool {
        matches!(
            self,
            Self::Int8 | Self::Int16 | Self::Int32 | Self::Float32 | Self::Float64
        )
    }

    /// Human-readable label reported by the classification query.
    #[must_use]
    pub fn label(self) -> &'static str {
        use ExternalArrayType::*;
        match self {
            Int8 => "external byte elements",
            Uint8 => "external unsigned byte elements",
            Int16 => "external short elements",
            Uint16 => "external unsigned short elements",
            Int32 => "external int elements",
            Uint32 => "external unsigned int elements",
            Float32 => "external float elements",
            Float64 => "external double elements",
            Pixel => "external pixel elements",
        }
    }
}

/// What the classification query reports for an array.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrayKind {
    /// A transitionable elements store
    Elements(ElementsKind),
    /// A fixed external numeric buffer
    External(ExternalArrayType),
}

impl ArrayKind {
    /// Human-readable label, e.g. `"packed double elements"`.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            ArrayKind::Elements(kind) => kind.label(),
            ArrayKind::External(ty) => ty.label(),
        }
    }
}

impl Display for ArrayKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<ElementsKind> for ArrayKind {
    fn from(kind: ElementsKind) -> Self {
        ArrayKind::Elements(kind)
    }
}

impl From<ExternalArrayType> for ArrayKind {
    fn from(ty: ExternalArrayType) -> Self {
        ArrayKind::External(ty)
    }
}
