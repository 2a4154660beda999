//! The typed value model
//!
//! Every node in a bank carries exactly one [Value]. Data points carry scalars, strings or
//! binary blobs, records carry their primary key, and the root carries the `Root` marker.
//!
//! [ValueKind] mirrors the variants without payload. The discriminants are single bits, and
//! they are what goes on the wire, so they must never change. A [TypeMask] is a set of
//! kinds, used to disable kinds bank-wide.
//!
//! [Value]: enum.Value.html
//! [ValueKind]: enum.ValueKind.html
//! [TypeMask]: struct.TypeMask.html
use bitflags::bitflags;
use std::{cmp::Ordering, convert::TryFrom, fmt};

/// The kind of a value, with the bit value used in the binary format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ValueKind {
    None = 0,
    String = 1 << 0,
    Bin = 1 << 1,
    U64 = 1 << 2,
    U32 = 1 << 3,
    B32 = 1 << 4,
    C8 = 1 << 5,
    I64 = 1 << 6,
    I32 = 1 << 7,
    F32 = 1 << 8,
    F64 = 1 << 9,
    Record = 1 << 10,
    Root = 1 << 11,
}

impl ValueKind {
    pub const ALL: [ValueKind; 13] = [
        ValueKind::None,
        ValueKind::String,
        ValueKind::Bin,
        ValueKind::U64,
        ValueKind::U32,
        ValueKind::B32,
        ValueKind::C8,
        ValueKind::I64,
        ValueKind::I32,
        ValueKind::F32,
        ValueKind::F64,
        ValueKind::Record,
        ValueKind::Root,
    ];

    /// the bit value, as written to the binary format
    pub fn bits(self) -> u32 {
        self as u32
    }

    /// true for kinds that can be stored as a data point
    pub fn is_data_point(self) -> bool {
        !matches!(self, ValueKind::None | ValueKind::Record | ValueKind::Root)
    }

    /// true for kinds that support ordering comparisons in filters
    pub fn is_ordered(self) -> bool {
        matches!(
            self,
            ValueKind::U64
                | ValueKind::U32
                | ValueKind::C8
                | ValueKind::I64
                | ValueKind::I32
                | ValueKind::F32
                | ValueKind::F64
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueKind::None => "none",
            ValueKind::String => "string",
            ValueKind::Bin => "bin",
            ValueKind::U64 => "u64",
            ValueKind::U32 => "u32",
            ValueKind::B32 => "b32",
            ValueKind::C8 => "c8",
            ValueKind::I64 => "i64",
            ValueKind::I32 => "i32",
            ValueKind::F32 => "f32",
            ValueKind::F64 => "f64",
            ValueKind::Record => "record",
            ValueKind::Root => "root",
        }
    }
}

impl TryFrom<u32> for ValueKind {
    type Error = u32;

    fn try_from(bits: u32) -> Result<Self, u32> {
        ValueKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.bits() == bits)
            .ok_or(bits)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// A set of value kinds, e.g. the kinds disabled for a bank.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TypeMask: u32 {
        const STRING = 1 << 0;
        const BIN = 1 << 1;
        const U64 = 1 << 2;
        const U32 = 1 << 3;
        const B32 = 1 << 4;
        const C8 = 1 << 5;
        const I64 = 1 << 6;
        const I32 = 1 << 7;
        const F32 = 1 << 8;
        const F64 = 1 << 9;
        const RECORD = 1 << 10;
        const ROOT = 1 << 11;
    }
}

impl Default for TypeMask {
    fn default() -> Self {
        TypeMask::empty()
    }
}

impl TypeMask {
    pub fn contains_kind(&self, kind: ValueKind) -> bool {
        self.intersects(TypeMask::from(kind))
    }
}

impl From<ValueKind> for TypeMask {
    fn from(kind: ValueKind) -> Self {
        TypeMask::from_bits_retain(kind.bits())
    }
}

/// A typed value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// absence of a value, also the "not found" result of lookups
    None,
    String(String),
    Bin(Vec<u8>),
    U64(u64),
    U32(u32),
    B32(bool),
    C8(u8),
    I64(i64),
    I32(i32),
    F32(f32),
    F64(f64),
    /// a record, holding its primary key
    Record(u64),
    /// the root of a bank
    Root,
}

impl Default for Value {
    fn default() -> Self {
        Value::None
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::None => ValueKind::None,
            Value::String(_) => ValueKind::String,
            Value::Bin(_) => ValueKind::Bin,
            Value::U64(_) => ValueKind::U64,
            Value::U32(_) => ValueKind::U32,
            Value::B32(_) => ValueKind::B32,
            Value::C8(_) => ValueKind::C8,
            Value::I64(_) => ValueKind::I64,
            Value::I32(_) => ValueKind::I32,
            Value::F32(_) => ValueKind::F32,
            Value::F64(_) => ValueKind::F64,
            Value::Record(_) => ValueKind::Record,
            Value::Root => ValueKind::Root,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(x) => Some(x),
            _ => None,
        }
    }

    pub fn as_bin(&self) -> Option<&[u8]> {
        match self {
            Value::Bin(x) => Some(x),
            _ => None,
        }
    }

    /// the u64 payload, also returns the primary key of a record value
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U64(x) | Value::Record(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::U32(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::B32(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_c8(&self) -> Option<u8> {
        match self {
            Value::C8(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::F32(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(x) => Some(*x),
            _ => None,
        }
    }

    /// Compare two values of the same kind.
    ///
    /// Strings and binaries compare byte-lexicographically, numbers numerically, bools with
    /// false < true. Returns `None` for values of different kinds, for NaN, and for kinds
    /// that have no order (`None`, `Root`).
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::String(a), Value::String(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
            (Value::Bin(a), Value::Bin(b)) => Some(a.cmp(b)),
            (Value::U64(a), Value::U64(b)) => Some(a.cmp(b)),
            (Value::U32(a), Value::U32(b)) => Some(a.cmp(b)),
            (Value::B32(a), Value::B32(b)) => Some(a.cmp(b)),
            (Value::C8(a), Value::C8(b)) => Some(a.cmp(b)),
            (Value::I64(a), Value::I64(b)) => Some(a.cmp(b)),
            (Value::I32(a), Value::I32(b)) => Some(a.cmp(b)),
            (Value::F32(a), Value::F32(b)) => a.partial_cmp(b),
            (Value::F64(a), Value::F64(b)) => a.partial_cmp(b),
            (Value::Record(a), Value::Record(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// approximate heap bytes owned by the payload
    pub(crate) fn heap_size(&self) -> usize {
        match self {
            Value::String(x) => x.len(),
            Value::Bin(x) => x.len(),
            _ => 0,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "none"),
            Value::String(x) => write!(f, "{:?}", x),
            Value::Bin(x) => write!(f, "<{} bytes>", x.len()),
            Value::U64(x) => write!(f, "{}u64", x),
            Value::U32(x) => write!(f, "{}u32", x),
            Value::B32(x) => write!(f, "{}", x),
            Value::C8(x) => write!(f, "{:?}", char::from(*x)),
            Value::I64(x) => write!(f, "{}i64", x),
            Value::I32(x) => write!(f, "{}i32", x),
            Value::F32(x) => write!(f, "{}f32", x),
            Value::F64(x) => write!(f, "{}f64", x),
            Value::Record(pk) => write!(f, "record #{}", pk),
            Value::Root => write!(f, "root"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bin(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Bin(value.to_vec())
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::U64(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::U32(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::B32(value)
    }
}

impl From<u8> for Value {
    fn from(value: u8) -> Self {
        Value::C8(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::I64(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::I32(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::F32(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::F64(value)
    }
}
