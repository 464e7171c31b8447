//! Values stored into array elements

use std::cell::RefCell;
use std::fmt::{self, Debug, Formatter};
use std::rc::Rc;

use serde::ser::{Error as _, Serialize, Serializer};

use crate::array::ArrayObject;

/// Shared handle to an array object. Arrays have reference semantics: storing
/// an array into another array stores the handle, not a copy.
pub type ArrayRef = Rc<RefCell<ArrayObject>>;

/// Number of bits in a small integer, including the sign bit.
pub const SMALL_INT_BITS: u32 = 31;
/// Smallest value representable as a small integer.
pub const SMALL_INT_MIN: i32 = -(1 << (SMALL_INT_BITS - 1));
/// Largest value representable as a small integer.
pub const SMALL_INT_MAX: i32 = (1 << (SMALL_INT_BITS - 1)) - 1;

/// Opaque handle to an object owned by the embedding.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

/// A dynamically-typed value as seen by the element store path.
///
/// Numbers are always IEEE-754 doubles; whether a number is a small integer
/// is decided at classification time, not by the variant.
#[derive(Clone)]
pub enum Value {
    /// The undefined value. Holes read back as `Undefined`.
    Undefined,
    /// The null value
    Null,
    /// A boolean
    Bool(bool),
    /// A number
    Number(f64),
    /// An immutable string
    String(Rc<str>),
    /// A nested array
    Array(ArrayRef),
    /// Any other heap object
    Object(ObjectId),
}

impl Value {
    /// Returns the value as a small integer if it is an integral number in
    /// the small-integer range. Negative zero is not a small integer.
    #[must_use]
    pub fn as_small_int(&self) -> Option<i32> {
        match *self {
            Value::Number(n) => small_int_from_f64(n),
            _ => None,
        }
    }

    /// Returns the value as a double if it is a number.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match *self {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    /// Returns `true` if this value is a number.
    #[must_use]
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Number(_))
    }

    /// Returns `true` if this value is `Undefined`.
    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Numeric conversion used when writing into external numeric buffers.
    #[must_use]
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => string_to_number(s),
            Value::Array(_) | Value::Object(_) => f64::NAN,
        }
    }

    /// Name of the value's type, for diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

/// String-to-number conversion: surrounding whitespace is ignored, the
/// empty string is zero, `0x`/`0o`/`0b` prefixes select a radix, and only
/// the exact spelling `Infinity` is infinite. Anything else that is not a
/// decimal literal is NaN.
fn string_to_number(s: &str) -> f64 {
    let s = s.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}');
    if s.is_empty() {
        return 0.0;
    }
    let radix = match s.get(..2) {
        Some("0x") | Some("0X") => 16,
        Some("0o") | Some("0O") => 8,
        Some("0b") | Some("0B") => 2,
        _ => 10,
    };
    if radix != 10 {
        let digits = &s[2..];
        if digits.is_empty() {
            return f64::NAN;
        }
        return digits
            .chars()
            .try_fold(0.0, |acc: f64, c| {
                c.to_digit(radix)
                    .map(|d| acc * f64::from(radix) + f64::from(d))
            })
            .unwrap_or(f64::NAN);
    }
    let (sign, unsigned) = match s.as_bytes()[0] {
        b'-' => (-1.0, &s[1..]),
        b'+' => (1.0, &s[1..]),
        _ => (1.0, s),
    };
    if unsigned == "Infinity" {
        return sign * f64::INFINITY;
    }
    let decimal = unsigned
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'));
    if !decimal || unsigned.starts_with(|c| c == '+' || c == '-') {
        return f64::NAN;
    }
    unsigned
        .parse::<f64>()
        .map_or(f64::NAN, |n| sign * n)
}

pub(crate) fn small_int_from_f64(n: f64) -> Option<i32> {
    if n.fract() != 0.0 || (n == 0.0 && n.is_sign_negative()) {
        return None;
    }
    if n >= f64::from(SMALL_INT_MIN) && n <= f64::from(SMALL_INT_MAX) {
        Some(n as i32)
    } else {
        None
    }
}

thread_local! {
    static VISITING: RefCell<Vec<usize>> = RefCell::new(Vec::new());
}

/// Marks an array as being formatted or serialized on this thread, so that
/// an array reachable from itself is visited once.
struct Visit(usize);

impl Visit {
    fn enter(array: &ArrayRef) -> Option<Self> {
        let ptr = Rc::as_ptr(array) as usize;
        VISITING.with(|visiting| {
            let mut visiting = visiting.borrow_mut();
            if visiting.contains(&ptr) {
                None
            } else {
                visiting.push(ptr);
                Some(Visit(ptr))
            }
        })
    }
}

impl Drop for Visit {
    fn drop(&mut self) {
        VISITING.with(|visiting| visiting.borrow_mut().retain(|&p| p != self.0));
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Undefined
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => Debug::fmt(b, f),
            Value::Number(n) => Debug::fmt(n, f),
            Value::String(s) => Debug::fmt(&**s, f),
            Value::Array(a) => {
                let _visit = match Visit::enter(a) {
                    Some(visit) => visit,
                    None => return f.write_str("[<cyclic>]"),
                };
                match a.try_borrow() {
                    Ok(a) => Debug::fmt(&*a, f),
                    Err(_) => f.write_str("[<borrowed>]"),
                }
            }
            Value::Object(id) => write!(f, "<object #{}>", id.0),
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Undefined | Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => match small_int_from_f64(*n) {
                Some(i) => serializer.serialize_i32(i),
                None => serializer.serialize_f64(*n),
            },
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(a) => {
                let _visit = Visit::enter(a).ok_or_else(|| S::Error::custom("cyclic array"))?;
                a.try_borrow()
                    .map_err(|_| S::Error::custom("array is mutably borrowed"))?
                    .serialize(serializer)
            }
            Value::Object(id) => serializer.serialize_newtype_struct("Object", &id.0),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Number(f64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Number(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.into())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v.into())
    }
}

impl From<ArrayRef> for Value {
    fn from(v: ArrayRef) -> Self {
        Value::Array(v)
    }
}

impl From<ObjectId> for Value {
    fn from(v: ObjectId) -> Self {
        Value::Object(v)
    }
}
