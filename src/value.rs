//! A loosely typed value tree for schema-less consumption of the text format.
//!
//! [`JsonValue`] is what the generic value parser of the text codec produces: objects keep
//! the order of their members, numbers are double precision, and the non-standard
//! `undefined` literal has a variant of its own.

use crate::{fieldmap::FieldMap, from_as, from_fn, try_from_ctor};
use std::fmt::{self, Write};

#[derive(Clone, Debug, PartialEq)]
/// [`JsonValue`] and its variants.
///
/// # Example
///
/// ```
/// use graphwire::value::JsonValue;
///
/// let v = JsonValue::from(vec![JsonValue::from(true), JsonValue::Null, JsonValue::from("x")]);
///
/// assert_eq!(v.to_string(), r#"[true,null,"x"]"#);
/// ```
pub enum JsonValue {
    /// The `null` literal.
    Null,
    /// The `undefined` literal.
    Undefined,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<JsonValue>),
    /// Members in the order they appeared on the wire.
    Object(FieldMap<String, JsonValue>),
}

use JsonValue::{Array, Bool, Null, Number, Object, Undefined};

impl JsonValue {
    /// Indicates whether the value is `null` or `undefined`.
    pub fn is_null(&self) -> bool {
        match self {
            Null | Undefined => true,
            _ => false,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            JsonValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<JsonValue>> {
        match self {
            Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&FieldMap<String, JsonValue>> {
        match self {
            Object(o) => Some(o),
            _ => None,
        }
    }

    /// Looks up a member of an object. Returns `None` for any other variant.
    ///
    /// # Example
    ///
    /// ```
    /// use graphwire::{fieldmap::FieldMap, value::JsonValue};
    ///
    /// let mut members = FieldMap::new();
    /// members.insert("a".to_string(), JsonValue::from(1));
    /// let obj = JsonValue::Object(members);
    ///
    /// assert_eq!(obj.get("a"), Some(&JsonValue::Number(1.0)));
    /// assert_eq!(obj.get("b"), None);
    /// ```
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        match self {
            Object(o) => o.get(key),
            _ => None,
        }
    }
}

fn fmt_string(s: &str, f: &mut fmt::Formatter) -> fmt::Result {
    f.write_char('"')?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            '\n' => f.write_str("\\n")?,
            c if (c as u32) < 0x20 => write!(f, "\\u{:04x}", c as u32)?,
            c => f.write_char(c)?,
        }
    }
    f.write_char('"')
}

fn fmt_number(n: f64, f: &mut fmt::Formatter) -> fmt::Result {
    if n.is_nan() {
        f.write_str("NaN")
    } else if n.is_infinite() {
        f.write_str(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else {
        write!(f, "{}", n)
    }
}

/// Renders the value compactly, in the same shape the text codec accepts.
impl fmt::Display for JsonValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Null => f.write_str("null"),
            Undefined => f.write_str("undefined"),
            Bool(b) => write!(f, "{}", b),
            Number(n) => fmt_number(*n, f),
            JsonValue::String(s) => fmt_string(s, f),
            Array(a) => {
                f.write_char('[')?;
                for (i, v) in a.iter().enumerate() {
                    if i != 0 {
                        f.write_char(',')?;
                    }
                    write!(f, "{}", v)?;
                }
                f.write_char(']')
            }
            Object(o) => {
                f.write_char('{')?;
                for (i, (k, v)) in o.iter().enumerate() {
                    if i != 0 {
                        f.write_char(',')?;
                    }
                    fmt_string(k, f)?;
                    write!(f, ":{}", v)?;
                }
                f.write_char('}')
            }
        }
    }
}

impl From<&str> for JsonValue {
    fn from(s: &str) -> JsonValue { JsonValue::String(s.to_owned()) }
}

impl<T: Into<JsonValue>> From<Vec<T>> for JsonValue {
    fn from(v: Vec<T>) -> JsonValue { Array(v.into_iter().map(T::into).collect()) }
}

impl<T: Into<JsonValue>> From<FieldMap<std::string::String, T>> for JsonValue {
    fn from(m: FieldMap<std::string::String, T>) -> JsonValue {
        Object(m.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

from_fn!(JsonValue, bool, Bool);
from_fn!(JsonValue, f64, Number);
from_fn!(JsonValue, String, JsonValue::String);

from_as!(JsonValue, f32, f64);
from_as!(JsonValue, i8, f64);
from_as!(JsonValue, i16, f64);
from_as!(JsonValue, i32, f64);
from_as!(JsonValue, u8, f64);
from_as!(JsonValue, u16, f64);
from_as!(JsonValue, u32, f64);

try_from_ctor!(JsonValue, bool, Bool);
try_from_ctor!(JsonValue, f64, Number);
try_from_ctor!(JsonValue, std::string::String, String);
try_from_ctor!(JsonValue, Vec<JsonValue>, Array);
try_from_ctor!(JsonValue, FieldMap<std::string::String, JsonValue>, Object);
