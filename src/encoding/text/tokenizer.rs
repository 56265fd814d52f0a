use super::TextWire;
use crate::{errors::*, fieldmap::FieldMap, util::context_dump, value::JsonValue};
use smallvec::SmallVec;
use tracing::{debug, error};

fn is_space(b: u8) -> bool { b == b' ' || b == b'\t' || b == b'\r' || b == b'\n' }

fn is_number_char(b: u8) -> bool {
    b.is_ascii_digit() || b == b'.' || b == b'e' || b == b'E' || b == b'+' || b == b'-'
}

impl TextWire {
    /// Builds a corruption error at the current position, with the surrounding buffer
    /// content attached.
    pub(crate) fn corrupt(&self, message: impl Into<String>) -> WireError {
        self.corrupt_at(self.buf.position(), message)
    }

    fn corrupt_at(&self, position: usize, message: impl Into<String>) -> WireError {
        let message = message.into();
        let dump = context_dump(self.buf.readable(), position);
        error!(position, "{}", message);
        debug!(context = %dump, "text wire content around the error");
        WireError::corrupt(message).at(position).with_detail(dump)
    }

    /// Skips whitespace and returns the next significant character, consuming it if `eat`
    /// is set. Returns `None` at the end of the input.
    pub fn next_char(&mut self, eat: bool) -> Option<u8> {
        while let Some(b) = self.buf.peek_u8() {
            if !is_space(b) {
                if eat {
                    self.buf.set_position(self.buf.position() + 1);
                }
                return Some(b);
            }
            self.buf.set_position(self.buf.position() + 1);
        }
        None
    }

    /// Consumes the next significant character, which must be `expected`.
    pub fn next_expected_char(&mut self, expected: u8) -> Result<()> {
        match self.next_char(false) {
            Some(c) if c == expected => {
                self.one_char_forward();
                Ok(())
            }
            _ => Err(self.corrupt(format!("Expecting character {}", expected as char))),
        }
    }

    /// Steps back over the last consumed character.
    pub fn one_char_back(&mut self) {
        let position = self.buf.position();
        self.buf.set_position(position.saturating_sub(1));
    }

    fn one_char_forward(&mut self) { self.buf.set_position(self.buf.position() + 1) }

    fn expect_literal(&mut self, literal: &[u8]) -> Result<()> {
        let start = self.buf.position();
        let matches = self
            .buf
            .readable()
            .get(start..start + literal.len())
            .map_or(false, |s| s == literal);
        if !matches {
            return Err(self.corrupt(format!(
                "Expecting {}",
                String::from_utf8_lossy(literal)
            )));
        }
        self.buf.set_position(start + literal.len());
        Ok(())
    }

    pub fn get_bool(&mut self) -> Result<bool> {
        match self.next_char(false) {
            Some(b't') => self.expect_literal(b"true").map(|_| true),
            Some(b'f') => self.expect_literal(b"false").map(|_| false),
            _ => Err(self.corrupt("Expecting boolean")),
        }
    }

    /// Reads a double: a decimal number, `NaN`, or an optionally signed `Infinity`.
    pub fn get_double(&mut self) -> Result<f64> {
        let start = match self.next_char(false) {
            Some(_) => self.buf.position(),
            None => return Err(self.corrupt("Expecting number")),
        };
        let mut acc: SmallVec<[u8; 32]> = SmallVec::new();
        while let Some(b) = self.buf.peek_u8().filter(|b| is_number_char(*b)) {
            acc.push(b);
            self.one_char_forward();
        }

        match self.buf.peek_u8() {
            Some(b'N') if acc.is_empty() => {
                return self.expect_literal(b"NaN").map(|_| f64::NAN);
            }
            Some(b'I') if acc.is_empty() || acc[..] == b"-"[..] || acc[..] == b"+"[..] => {
                let negative = acc.first() == Some(&b'-');
                self.expect_literal(b"Infinity")?;
                return Ok(if negative {
                    f64::NEG_INFINITY
                } else {
                    f64::INFINITY
                });
            }
            _ => {}
        }

        if acc.is_empty() {
            return Err(self.corrupt("Expecting number"));
        }
        std::str::from_utf8(&acc)
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| self.corrupt_at(start, "Invalid number"))
    }

    /// Reads a single- or double-quoted string.
    ///
    /// The closing quote is found with one linear scan; content without backslashes is
    /// taken as is, otherwise `\t \r \n \b \f \/ \\ \" \'` and `\uXXXX` (including
    /// surrogate pairs) are decoded.
    pub fn get_string(&mut self) -> Result<String> {
        let quote = match self.next_char(false) {
            Some(q) if q == b'"' || q == b'\'' => q,
            _ => return Err(self.corrupt("Expecting string")),
        };
        let open = self.buf.position();
        let start = open + 1;

        let data = self.buf.readable();
        let mut escaped = false;
        let mut i = start;
        let end = loop {
            match data.get(i) {
                None => return Err(self.corrupt_at(open, "Missing closing quote")),
                Some(b'\\') => {
                    escaped = true;
                    i += 2;
                }
                Some(b) if *b == quote => break i,
                Some(_) => i += 1,
            }
        };

        let s = if escaped {
            self.unescape(start, end)?
        } else {
            std::str::from_utf8(&data[start..end])
                .map_err(|_| self.corrupt_at(start, "Invalid UTF-8 in string"))?
                .to_owned()
        };
        self.buf.set_position(end + 1);
        Ok(s)
    }

    fn unescape(&self, start: usize, end: usize) -> Result<String> {
        let raw = &self.buf.readable()[start..end];
        let mut out: Vec<u8> = Vec::with_capacity(raw.len());
        let mut i = 0;
        while i < raw.len() {
            let b = raw[i];
            i += 1;
            if b != b'\\' {
                out.push(b);
                continue;
            }
            let esc = raw.get(i).copied();
            i += 1;
            match esc {
                Some(b't') => out.push(b'\t'),
                Some(b'r') => out.push(b'\r'),
                Some(b'n') => out.push(b'\n'),
                Some(b'b') => out.push(0x08),
                Some(b'f') => out.push(0x0c),
                Some(c @ b'"') | Some(c @ b'\'') | Some(c @ b'\\') | Some(c @ b'/') => out.push(c),
                Some(b'u') => {
                    let high = self.hex4(raw, i, start)?;
                    i += 4;
                    let code = if (0xD800..0xDC00).contains(&high) {
                        if raw.get(i..i + 2) != Some(&b"\\u"[..]) {
                            return Err(self.corrupt_at(start + i, "Unpaired surrogate"));
                        }
                        let low = self.hex4(raw, i + 2, start)?;
                        if !(0xDC00..0xE000).contains(&low) {
                            return Err(self.corrupt_at(start + i, "Unpaired surrogate"));
                        }
                        i += 6;
                        0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
                    } else {
                        high
                    };
                    let c = std::char::from_u32(code)
                        .ok_or_else(|| self.corrupt_at(start + i, "Unpaired surrogate"))?;
                    let mut scratch = [0u8; 4];
                    out.extend_from_slice(c.encode_utf8(&mut scratch).as_bytes());
                }
                _ => return Err(self.corrupt_at(start + i - 1, "Invalid escape sequence")),
            }
        }
        String::from_utf8(out).map_err(|_| self.corrupt_at(start, "Invalid UTF-8 in string"))
    }

    fn hex4(&self, raw: &[u8], at: usize, base: usize) -> Result<u32> {
        raw.get(at..at + 4)
            .and_then(|h| std::str::from_utf8(h).ok())
            .and_then(|h| u32::from_str_radix(h, 16).ok())
            .ok_or_else(|| self.corrupt_at(base + at, "Expecting four hex digits"))
    }

    /// Parses one value of any kind into a tree.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::Corrupt`] error carrying the position of the first
    /// character that does not fit the grammar, or if nesting exceeds the configured
    /// maximum depth.
    pub fn parse_value(&mut self) -> Result<JsonValue> { self.parse_value_at(0) }

    /// Parses a complete message: exactly one value, followed by nothing but whitespace.
    pub fn parse_document(&mut self) -> Result<JsonValue> {
        let value = self.parse_value()?;
        match self.next_char(false) {
            None => Ok(value),
            Some(c) => Err(self.corrupt(format!("Unexpected character {} after value", c as char))),
        }
    }

    fn parse_value_at(&mut self, depth: usize) -> Result<JsonValue> {
        if depth > self.max_depth {
            return Err(self.corrupt(format!("Nesting exceeds {} levels", self.max_depth)));
        }
        match self.next_char(false) {
            None => Err(self.corrupt("Unexpected end of input")),
            Some(b'{') => {
                self.one_char_forward();
                let mut members = Vec::new();
                if self.next_char(false) == Some(b'}') {
                    self.one_char_forward();
                    return Ok(JsonValue::Object(FieldMap::new()));
                }
                loop {
                    match self.next_char(false) {
                        Some(b'"') | Some(b'\'') => {}
                        _ => return Err(self.corrupt("Expecting member name")),
                    }
                    let name = self.get_string()?;
                    self.next_expected_char(b':')?;
                    let value = self.parse_value_at(depth + 1)?;
                    members.push((name, value));
                    match self.next_char(true) {
                        Some(b',') => continue,
                        Some(b'}') => return Ok(JsonValue::Object(FieldMap::from_pairs(members))),
                        _ => {
                            self.one_char_back();
                            return Err(self.corrupt("Expecting character , or }"));
                        }
                    }
                }
            }
            Some(b'[') => {
                self.one_char_forward();
                let mut items = Vec::new();
                if self.next_char(false) == Some(b']') {
                    self.one_char_forward();
                    return Ok(JsonValue::Array(items));
                }
                loop {
                    items.push(self.parse_value_at(depth + 1)?);
                    match self.next_char(true) {
                        Some(b',') => continue,
                        Some(b']') => return Ok(JsonValue::Array(items)),
                        _ => {
                            self.one_char_back();
                            return Err(self.corrupt("Expecting character , or ]"));
                        }
                    }
                }
            }
            Some(b'"') | Some(b'\'') => self.get_string().map(JsonValue::String),
            Some(b't') | Some(b'f') => self.get_bool().map(JsonValue::Bool),
            Some(b'n') => self.expect_literal(b"null").map(|_| JsonValue::Null),
            Some(b'u') => self.expect_literal(b"undefined").map(|_| JsonValue::Undefined),
            Some(c) if is_number_char(c) || c == b'N' || c == b'I' => {
                self.get_double().map(JsonValue::Number)
            }
            Some(c) => Err(self.corrupt(format!("Unexpected character {}", c as char))),
        }
    }
}
