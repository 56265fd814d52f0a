//! # The text wire format
//!
//! A JSON dialect. Objects, arrays, strings, numbers, `true`, `false` and `null` are as in
//! JSON, with these differences:
//!
//! * strings may be single quoted, and `'` is escaped as `\'` on write;
//! * characters other than tab, CR, LF, the quotes and backslash are written unescaped,
//!   multi-byte UTF-8 included;
//! * 64-bit integers are quoted, with a trailing `.`: `"-12."` (see [`parse_long`]);
//! * doubles may be `NaN`, `Infinity` or `-Infinity`, unquoted;
//! * byte arrays are quoted standard base64;
//! * dates are quoted `yyyy-MM-ddTHH:mm:ss.SSSZ` strings in UTC;
//! * `undefined` is accepted on read.
//!
//! Composite values are objects that start with their type id, `{"_typeId":64,...}`, or
//! back-references to one written earlier in the message, `{"*i":-1}`.
//!
//! [`TextWire`] holds the primitives and the tokenizer; [`TextOutput`] and [`TextInput`]
//! put the [`WireOutput`](crate::encoding::WireOutput) and
//! [`WireInput`](crate::encoding::WireInput) surface on top of it.

use crate::{
    buffer::{ByteOrder, WireBuffer},
    config::WireConfig,
    encoding::constants::*,
    errors::*,
    value::JsonValue,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

mod de;
mod long;
mod ser;
mod tokenizer;

pub use de::TextInput;
pub use long::parse_long;
pub use ser::TextOutput;

/// Low-level reader and writer of the text format over a [`WireBuffer`].
///
/// The writer keeps a pending-separator flag: every value sets it, every opening delimiter
/// and member name clears it, so siblings are separated by exactly one comma.
///
/// # Example
///
/// ```
/// use graphwire::{config::WireConfig, encoding::text::TextWire};
///
/// let mut wire = TextWire::new(&WireConfig::default());
/// wire.begin_object(None).unwrap();
/// wire.put_int(Some("a"), 1).unwrap();
/// wire.begin_element("b").unwrap();
/// wire.begin_array(None).unwrap();
/// wire.put_bool(None, true).unwrap();
/// wire.put_null(None).unwrap();
/// wire.put_string(None, "x").unwrap();
/// wire.end_array().unwrap();
/// wire.end_object().unwrap();
///
/// assert_eq!(&wire.into_bytes()[..], br#"{"a":1,"b":[true,null,"x"]}"#);
/// ```
#[derive(Debug)]
pub struct TextWire {
    buf: WireBuffer,
    add_comma: bool,
    max_depth: usize,
}

impl TextWire {
    /// An empty writer.
    pub fn new(config: &WireConfig) -> Self {
        TextWire {
            buf: WireBuffer::with_capacity(
                config.initial_capacity,
                config.max_buffer_size,
                ByteOrder::BigEndian,
            ),
            add_comma: false,
            max_depth: config.max_depth,
        }
    }

    /// A reader over a received message.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::Corrupt`] error if `data` is longer than the configured
    /// maximum buffer size.
    pub fn from_bytes(data: &[u8], config: &WireConfig) -> Result<Self> {
        if data.len() > config.max_buffer_size {
            return Err(WireError::corrupt(format!(
                "message of {} bytes exceeds the maximum buffer size of {} bytes",
                data.len(),
                config.max_buffer_size
            )));
        }
        Ok(TextWire {
            buf: WireBuffer::from_bytes(data, ByteOrder::BigEndian),
            add_comma: false,
            max_depth: config.max_depth,
        })
    }

    pub fn buffer(&self) -> &WireBuffer { &self.buf }

    /// Consumes the writer, returning the text written so far.
    pub fn into_bytes(self) -> Bytes { self.buf.into_bytes() }

    fn separator(&mut self) -> Result<()> {
        if self.add_comma {
            self.buf.put_u8(b',')?;
        }
        Ok(())
    }

    fn prefix(&mut self, name: Option<&str>) -> Result<()> {
        match name {
            Some(name) => self.begin_element(name),
            None => self.separator(),
        }
    }

    fn put_raw(&mut self, name: Option<&str>, raw: &[u8]) -> Result<()> {
        self.prefix(name)?;
        self.buf.put_slice(raw)?;
        self.add_comma = true;
        Ok(())
    }

    fn put_escaped(&mut self, s: &str) -> Result<()> {
        self.buf.ensure_capacity(s.len() + 2)?;
        self.buf.put_u8(b'"')?;
        let bytes = s.as_bytes();
        let mut start = 0;
        for (i, b) in bytes.iter().enumerate() {
            let escape: &[u8] = match b {
                b'\t' => b"\\t",
                b'\r' => b"\\r",
                b'\n' => b"\\n",
                b'"' => b"\\\"",
                b'\'' => b"\\'",
                b'\\' => b"\\\\",
                _ => continue,
            };
            self.buf.put_slice(&bytes[start..i])?;
            self.buf.put_slice(escape)?;
            start = i + 1;
        }
        self.buf.put_slice(&bytes[start..])?;
        self.buf.put_u8(b'"')
    }

    /// Writes `"name":` and clears the pending separator, so the next value or opening
    /// delimiter becomes the member's value.
    pub fn begin_element(&mut self, name: &str) -> Result<()> {
        self.separator()?;
        self.put_escaped(name)?;
        self.buf.put_u8(b':')?;
        self.add_comma = false;
        Ok(())
    }

    pub fn begin_object(&mut self, name: Option<&str>) -> Result<()> {
        self.prefix(name)?;
        self.buf.put_u8(b'{')?;
        self.add_comma = false;
        Ok(())
    }

    pub fn end_object(&mut self) -> Result<()> {
        self.buf.put_u8(b'}')?;
        self.add_comma = true;
        Ok(())
    }

    pub fn begin_array(&mut self, name: Option<&str>) -> Result<()> {
        self.prefix(name)?;
        self.buf.put_u8(b'[')?;
        self.add_comma = false;
        Ok(())
    }

    pub fn end_array(&mut self) -> Result<()> {
        self.buf.put_u8(b']')?;
        self.add_comma = true;
        Ok(())
    }

    pub fn put_null(&mut self, name: Option<&str>) -> Result<()> { self.put_raw(name, b"null") }

    pub fn put_bool(&mut self, name: Option<&str>, v: bool) -> Result<()> {
        self.put_raw(name, if v { &b"true"[..] } else { &b"false"[..] })
    }

    /// Writes an integer of at most 32 bits as a plain decimal number.
    pub fn put_int(&mut self, name: Option<&str>, v: i32) -> Result<()> {
        self.put_raw(name, v.to_string().as_bytes())
    }

    /// Writes a 64-bit integer as a quoted decimal with a trailing `.`.
    pub fn put_long(&mut self, name: Option<&str>, v: i64) -> Result<()> {
        self.put_raw(name, format!("\"{}.\"", v).as_bytes())
    }

    /// Writes a double in its shortest round-trippable form.
    pub fn put_double(&mut self, name: Option<&str>, v: f64) -> Result<()> {
        if v.is_nan() {
            self.put_raw(name, b"NaN")
        } else if v.is_infinite() {
            self.put_raw(name, if v > 0.0 { &b"Infinity"[..] } else { &b"-Infinity"[..] })
        } else {
            self.put_raw(name, format!("{:?}", v).as_bytes())
        }
    }

    /// Writes a float; it is widened, so the written double converts back exactly.
    pub fn put_float(&mut self, name: Option<&str>, v: f32) -> Result<()> {
        self.put_double(name, f64::from(v))
    }

    /// Writes a one-character string; NUL is written as `""`.
    pub fn put_char(&mut self, name: Option<&str>, v: char) -> Result<()> {
        let mut scratch = [0u8; 4];
        let s: &str = if v == '\0' { "" } else { v.encode_utf8(&mut scratch) };
        self.put_string(name, s)
    }

    pub fn put_string(&mut self, name: Option<&str>, v: &str) -> Result<()> {
        self.prefix(name)?;
        self.put_escaped(v)?;
        self.add_comma = true;
        Ok(())
    }

    /// Writes standard base64 inside quotes.
    pub fn put_bytes(&mut self, name: Option<&str>, v: &[u8]) -> Result<()> {
        self.prefix(name)?;
        self.buf.put_u8(b'"')?;
        self.buf.put_slice(STANDARD.encode(v).as_bytes())?;
        self.buf.put_u8(b'"')?;
        self.add_comma = true;
        Ok(())
    }

    pub fn put_date(&mut self, name: Option<&str>, v: Option<&DateTime<Utc>>) -> Result<()> {
        match v {
            Some(date) => self.put_string(name, &date.format(DATE_WRITE_FORMAT).to_string()),
            None => self.put_null(name),
        }
    }

    /// Writes the back-reference marker `{"*i":-id}`.
    pub fn put_ref(&mut self, name: Option<&str>, id: i32) -> Result<()> {
        self.begin_object(name)?;
        self.put_int(Some(REF_MEMBER), -id)?;
        self.end_object()
    }

    /// Writes a value tree.
    pub fn put_value(&mut self, name: Option<&str>, v: &JsonValue) -> Result<()> {
        match v {
            JsonValue::Null => self.put_null(name),
            JsonValue::Undefined => self.put_raw(name, b"undefined"),
            JsonValue::Bool(b) => self.put_bool(name, *b),
            JsonValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                self.put_raw(name, format!("{}", *n as i64).as_bytes())
            }
            JsonValue::Number(n) => self.put_double(name, *n),
            JsonValue::String(s) => self.put_string(name, s),
            JsonValue::Array(items) => {
                self.begin_array(name)?;
                for item in items {
                    self.put_value(None, item)?;
                }
                self.end_array()
            }
            JsonValue::Object(members) => {
                self.begin_object(name)?;
                for (k, item) in members {
                    self.put_value(Some(k.as_str()), item)?;
                }
                self.end_object()
            }
        }
    }
}

/// Parses a date in any of the accepted layouts. Text that matches none is no date.
pub(crate) fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, DATE_EXACT_FORMAT) {
        return Some(naive.and_utc());
    }
    if let Ok(date) = DateTime::parse_from_rfc3339(s) {
        return Some(date.with_timezone(&Utc));
    }
    DATE_NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, DATE_ONLY_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}

/// Decodes quoted base64 content.
pub(crate) fn decode_base64(s: &str) -> Result<Bytes> {
    STANDARD
        .decode(s)
        .map(Bytes::from)
        .map_err(|e| WireError::corrupt(format!("invalid base64: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn written(f: impl FnOnce(&mut TextWire) -> Result<()>) -> String {
        let mut wire = TextWire::new(&WireConfig::default());
        f(&mut wire).unwrap();
        String::from_utf8(wire.into_bytes().to_vec()).unwrap()
    }

    #[test]
    fn separators() {
        let text = written(|w| {
            w.begin_array(None)?;
            w.begin_object(None)?;
            w.end_object()?;
            w.begin_array(None)?;
            w.end_array()?;
            w.put_long(None, -1)?;
            w.end_array()
        });
        assert_eq!(text, r#"[{},[],"-1."]"#);
    }

    #[test]
    fn escapes_only_documented_characters() {
        let text = written(|w| w.put_string(None, "a\tb\rc\nd\"e'f\\g\u{1F600}/"));
        assert_eq!(text, "\"a\\tb\\rc\\nd\\\"e\\'f\\\\g\u{1F600}/\"");
    }

    #[test]
    fn special_doubles_and_ref() {
        let text = written(|w| {
            w.begin_object(None)?;
            w.put_double(Some("n"), f64::NAN)?;
            w.put_double(Some("i"), f64::NEG_INFINITY)?;
            w.put_ref(Some("r"), 3)?;
            w.end_object()
        });
        assert_eq!(text, r#"{"n":NaN,"i":-Infinity,"r":{"*i":-3}}"#);
    }

    #[test]
    fn dates() {
        let date = Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap();
        let text = written(|w| w.put_date(None, Some(&date)));
        assert_eq!(text, "\"2021-03-04T05:06:07.000Z\"");

        assert_eq!(parse_date("2021-03-04T05:06:07.000Z"), Some(date));
        assert_eq!(parse_date("2021-03-04T06:06:07+01:00"), Some(date));
        assert_eq!(parse_date("2021-03-04 05:06:07"), Some(date));
        assert_eq!(
            parse_date("2021-03-04"),
            Some(Utc.with_ymd_and_hms(2021, 3, 4, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn growth_limit_is_internal() {
        let config = WireConfig::default().with_initial_capacity(4).with_max_buffer_size(8);
        let mut wire = TextWire::new(&config);
        assert!(wire.put_string(None, "far too long").unwrap_err().is_internal());
    }
}
