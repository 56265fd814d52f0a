//! # The binary wire format
//!
//! Fixed-width numerics are written in the configured byte order. Booleans and 8-bit
//! integers take one byte, characters four. Strings and byte arrays are a 32-bit length
//! followed by their bytes; sequences are a 32-bit item count followed by their items.
//! Dates are milliseconds since the Unix epoch, with `i64::MIN` standing for no date.
//!
//! A composite value starts with a 32-bit tag: `0` for null, a negative reference id for a
//! value written earlier in the message, or the value's type id followed by its body.

use crate::{
    buffer::WireBuffer,
    config::WireConfig,
    encoding::{constants::*, WireInput, WireOutput},
    errors::*,
    reference::{DecodeRefs, EncodeRefs},
    registry::TypeRegistry,
    rep::Obj,
    serializer::Serializer,
    stream::LazyLoad,
};
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use std::{convert::TryFrom, sync::Arc};
use tracing::trace;

/// Writes one message in the binary format.
///
/// # Example
///
/// ```
/// use graphwire::{config::WireConfig, encoding::{binary::BinaryOutput, WireOutput}};
/// use graphwire::registry::TypeRegistry;
///
/// let registry = TypeRegistry::builder().build().unwrap();
/// let mut out = BinaryOutput::new(registry, &WireConfig::default(), 1);
/// out.put_str("", "hi").unwrap();
///
/// assert_eq!(&out.finish()[..], &[2, 0, 0, 0, b'h', b'i']);
/// ```
pub struct BinaryOutput {
    buf: WireBuffer,
    refs: EncodeRefs,
    registry: Arc<TypeRegistry>,
    version: i64,
    depth: usize,
    max_depth: usize,
}

impl BinaryOutput {
    pub fn new(registry: Arc<TypeRegistry>, config: &WireConfig, version: i64) -> Self {
        BinaryOutput {
            buf: WireBuffer::with_capacity(
                config.initial_capacity,
                config.max_buffer_size,
                config.byte_order,
            ),
            refs: EncodeRefs::new(),
            registry,
            version,
            depth: 0,
            max_depth: config.max_depth,
        }
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize { self.buf.position() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Consumes the output, returning the message.
    pub fn finish(self) -> Bytes { self.buf.into_bytes() }

    fn put_len(&mut self, len: usize) -> Result<()> {
        let len = u32::try_from(len)
            .map_err(|_| WireError::internal(format!("length {} does not fit the wire", len)))?;
        self.buf.put_u32(len)
    }

    fn enter(&mut self) -> Result<()> {
        if self.depth >= self.max_depth {
            return Err(WireError::internal(format!(
                "object graph nests deeper than {} levels",
                self.max_depth
            )));
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) -> Result<()> {
        self.depth = self
            .depth
            .checked_sub(1)
            .ok_or_else(|| WireError::internal("sequence closed without being opened"))?;
        Ok(())
    }
}

impl WireOutput for BinaryOutput {
    fn registry(&self) -> &Arc<TypeRegistry> { &self.registry }

    fn version(&self) -> i64 { self.version }

    fn put_bool(&mut self, _: &str, v: bool) -> Result<()> { self.buf.put_u8(v as u8) }

    fn put_i8(&mut self, _: &str, v: i8) -> Result<()> { self.buf.put_u8(v as u8) }

    fn put_i16(&mut self, _: &str, v: i16) -> Result<()> { self.buf.put_u16(v as u16) }

    fn put_i32(&mut self, _: &str, v: i32) -> Result<()> { self.buf.put_u32(v as u32) }

    fn put_i64(&mut self, _: &str, v: i64) -> Result<()> { self.buf.put_u64(v as u64) }

    fn put_f32(&mut self, _: &str, v: f32) -> Result<()> { self.buf.put_u32(v.to_bits()) }

    fn put_f64(&mut self, _: &str, v: f64) -> Result<()> { self.buf.put_u64(v.to_bits()) }

    fn put_char(&mut self, _: &str, v: char) -> Result<()> { self.buf.put_u32(u32::from(v)) }

    fn put_str(&mut self, field: &str, v: &str) -> Result<()> { self.put_bytes(field, v.as_bytes()) }

    fn put_bytes(&mut self, _: &str, v: &[u8]) -> Result<()> {
        self.buf.ensure_capacity(4 + v.len())?;
        self.put_len(v.len())?;
        self.buf.put_slice(v)
    }

    fn put_date(&mut self, _: &str, v: Option<&DateTime<Utc>>) -> Result<()> {
        let millis = v.map_or(NO_DATE, DateTime::timestamp_millis);
        self.buf.put_u64(millis as u64)
    }

    fn begin_seq(&mut self, len: usize) -> Result<()> {
        self.enter()?;
        self.put_len(len)
    }

    fn end_seq(&mut self) -> Result<()> { self.leave() }

    fn write_obj(
        &mut self,
        _: &str,
        value: Option<&Obj>,
        ser: Option<&dyn Serializer>,
    ) -> Result<()> {
        let obj = match value {
            Some(obj) => obj,
            None => return self.buf.put_u32(TAG_NULL as u32),
        };
        if let Some(id) = self.refs.lookup(obj) {
            trace!(id, "back-reference");
            return self.buf.put_u32((-id) as u32);
        }

        let resolved;
        let ser = match ser {
            Some(ser) => ser,
            None => {
                resolved = self.registry.serializer_for(obj)?;
                &*resolved
            }
        };
        self.refs.assign(obj)?;
        self.enter()?;
        self.buf.put_u32(ser.type_id() as u32)?;
        let version = self.version;
        ser.write(obj, self, version)?;
        self.leave()
    }
}

/// Reads one message in the binary format.
pub struct BinaryInput {
    buf: WireBuffer,
    refs: DecodeRefs,
    lazy: LazyLoad,
    registry: Arc<TypeRegistry>,
    version: i64,
    depth: usize,
    max_depth: usize,
}

impl BinaryInput {
    /// # Errors
    ///
    /// Returns an [`ErrorKind::Corrupt`] error if `data` is longer than the configured
    /// maximum buffer size.
    pub fn new(
        registry: Arc<TypeRegistry>,
        data: &[u8],
        config: &WireConfig,
        version: i64,
    ) -> Result<Self> {
        if data.len() > config.max_buffer_size {
            return Err(WireError::corrupt(format!(
                "message of {} bytes exceeds the maximum buffer size of {} bytes",
                data.len(),
                config.max_buffer_size
            )));
        }
        Ok(BinaryInput {
            buf: WireBuffer::from_bytes(data, config.byte_order),
            refs: DecodeRefs::new(),
            lazy: LazyLoad::default(),
            registry,
            version,
            depth: 0,
            max_depth: config.max_depth,
        })
    }

    /// Checks that the whole message was consumed.
    pub fn finish(&self) -> Result<()> {
        match self.buf.remaining() {
            0 => Ok(()),
            n => Err(self.corrupt(format!("{} trailing bytes after the message", n))),
        }
    }

    fn corrupt(&self, message: impl Into<String>) -> WireError {
        WireError::corrupt(message).at(self.buf.position())
    }

    fn truncated(&self) -> WireError { self.corrupt("unexpected end of message") }

    fn u8(&mut self) -> Result<u8> { self.buf.get_u8().ok_or_else(|| self.truncated()) }

    fn u16(&mut self) -> Result<u16> { self.buf.get_u16().ok_or_else(|| self.truncated()) }

    fn u32(&mut self) -> Result<u32> { self.buf.get_u32().ok_or_else(|| self.truncated()) }

    fn u64(&mut self) -> Result<u64> { self.buf.get_u64().ok_or_else(|| self.truncated()) }

    /// A length prefix, which can never exceed the bytes left in the message.
    fn len_prefix(&mut self) -> Result<usize> {
        let len = self.u32()? as usize;
        if len > self.buf.remaining() {
            return Err(self.corrupt(format!(
                "length {} exceeds the {} remaining bytes",
                len,
                self.buf.remaining()
            )));
        }
        Ok(len)
    }

    fn enter(&mut self) -> Result<()> {
        if self.depth >= self.max_depth {
            return Err(self.corrupt(format!("message nests deeper than {} levels", self.max_depth)));
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) -> Result<()> {
        self.depth = self
            .depth
            .checked_sub(1)
            .ok_or_else(|| WireError::internal("sequence closed without being opened"))?;
        Ok(())
    }
}

impl WireInput for BinaryInput {
    fn registry(&self) -> &Arc<TypeRegistry> { &self.registry }

    fn version(&self) -> i64 { self.version }

    fn get_bool(&mut self, _: &str) -> Result<bool> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            b => Err(self.corrupt(format!("invalid boolean byte {}", b))),
        }
    }

    fn get_i8(&mut self, _: &str) -> Result<i8> { self.u8().map(|v| v as i8) }

    fn get_i16(&mut self, _: &str) -> Result<i16> { self.u16().map(|v| v as i16) }

    fn get_i32(&mut self, _: &str) -> Result<i32> { self.u32().map(|v| v as i32) }

    fn get_i64(&mut self, _: &str) -> Result<i64> { self.u64().map(|v| v as i64) }

    fn get_f32(&mut self, _: &str) -> Result<f32> { self.u32().map(f32::from_bits) }

    fn get_f64(&mut self, _: &str) -> Result<f64> { self.u64().map(f64::from_bits) }

    fn get_char(&mut self, _: &str) -> Result<char> {
        let v = self.u32()?;
        std::char::from_u32(v).ok_or_else(|| self.corrupt(format!("invalid character {:#x}", v)))
    }

    fn get_str(&mut self, field: &str) -> Result<String> {
        let start = self.buf.position();
        let bytes = self.get_bytes(field)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| WireError::corrupt("invalid UTF-8 in string").at(start))
    }

    fn get_bytes(&mut self, _: &str) -> Result<Bytes> {
        let len = self.len_prefix()?;
        let slice = self.buf.get_slice(len).map(Bytes::copy_from_slice);
        slice.ok_or_else(|| self.truncated())
    }

    fn get_date(&mut self, _: &str) -> Result<Option<DateTime<Utc>>> {
        let millis = self.u64()? as i64;
        if millis == NO_DATE {
            return Ok(None);
        }
        match Utc.timestamp_millis_opt(millis).single() {
            Some(date) => Ok(Some(date)),
            None => Err(self.corrupt(format!("date {} is out of range", millis))),
        }
    }

    fn begin_seq(&mut self) -> Result<usize> {
        self.enter()?;
        self.len_prefix()
    }

    fn end_seq(&mut self) -> Result<()> { self.leave() }

    fn read_obj(&mut self, _: &str, ser: Option<&dyn Serializer>) -> Result<Option<Obj>> {
        let tag_at = self.buf.position();
        let tag = self.u32()? as i32;
        if tag == TAG_NULL {
            return Ok(None);
        }
        if tag < 0 {
            trace!(id = tag.wrapping_neg(), "back-reference");
            return self
                .refs
                .resolve(tag.wrapping_neg())
                .map(Some)
                .map_err(|e| e.at(tag_at));
        }
        if !TypeRegistry::is_composite_type_id(tag) {
            return Err(WireError::corrupt(format!(
                "typeId={} does not name a composite type",
                tag
            ))
            .at(tag_at));
        }

        let resolved;
        let ser = match ser {
            Some(ser) if ser.type_id() != tag => {
                return Err(WireError::corrupt(format!(
                    "expected typeId={}, found typeId={}",
                    ser.type_id(),
                    tag
                ))
                .at(tag_at))
            }
            Some(ser) => ser,
            None => {
                resolved = self.registry.get(tag).map_err(|e| e.at(tag_at))?;
                &*resolved
            }
        };

        self.enter()?;
        let before = self.refs.len();
        let version = self.version;
        let obj = ser.read(None, self, version)?;
        self.leave()?;

        match self.refs.get(before) {
            Some(registered) if registered.ptr_eq(&obj) => Ok(Some(obj)),
            _ => Err(WireError::internal(format!(
                "serializer for typeId={} did not register the value it created",
                tag
            ))),
        }
    }

    fn on_object_created(&mut self, obj: Obj) -> Result<()> {
        let id = self.refs.register(obj)?;
        trace!(id, "registered object");
        Ok(())
    }

    fn lazy_load(&mut self) -> &mut LazyLoad { &mut self.lazy }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{buffer::ByteOrder, encoding::WireOutputExt, registry::LIST, rep::shared};

    fn registry() -> Arc<TypeRegistry> { TypeRegistry::builder().build().unwrap() }

    #[test]
    fn byte_order_follows_config() {
        let config = WireConfig::default().with_byte_order(ByteOrder::BigEndian);
        let mut out = BinaryOutput::new(registry(), &config, 1);
        out.put_i32("", 1).unwrap();
        assert_eq!(&out.finish()[..], &[0, 0, 0, 1]);

        let mut out = BinaryOutput::new(registry(), &WireConfig::default(), 1);
        out.put_i32("", 1).unwrap();
        assert_eq!(&out.finish()[..], &[1, 0, 0, 0]);
    }

    #[test]
    fn shared_list_is_tagged_then_referenced() {
        let list = shared(Vec::<Option<crate::rep::Obj>>::new());
        let mut out = BinaryOutput::new(registry(), &WireConfig::default(), 1);
        out.put_container("", Some(&list), LIST).unwrap();
        out.put_container("", Some(&list), LIST).unwrap();
        assert_eq!(
            &out.finish()[..],
            &[12, 0, 0, 0, 0, 0, 0, 0, 0xff, 0xff, 0xff, 0xff]
        );
    }

    #[test]
    fn lengths_are_bounded_by_remaining() {
        let mut input =
            BinaryInput::new(registry(), &[9, 0, 0, 0, b'a'], &WireConfig::default(), 1).unwrap();
        let err = input.get_str("").unwrap_err();
        assert!(err.is_corrupt());
        assert_eq!(err.position(), Some(4));

        let mut input =
            BinaryInput::new(registry(), &[0xff, 0xff, 0xff, 0x7f], &WireConfig::default(), 1)
                .unwrap();
        assert!(input.begin_seq().unwrap_err().is_corrupt());
    }

    #[test]
    fn tags() {
        let mut input = BinaryInput::new(
            registry(),
            &[0, 0, 0, 0, 0xff, 0xff, 0xff, 0xff],
            &WireConfig::default(),
            1,
        )
        .unwrap();
        assert_eq!(input.read_obj("", None).unwrap(), None);
        let err = input.read_obj("", None).unwrap_err();
        assert!(err.is_corrupt());
        assert_eq!(err.position(), Some(4));

        let mut input =
            BinaryInput::new(registry(), &[0x40, 0, 0, 0], &WireConfig::default(), 1).unwrap();
        assert!(input.read_obj("", None).unwrap_err().message().contains("typeId=64"));

        // 5 is a 32-bit integer, which never travels as a tagged composite
        let mut input =
            BinaryInput::new(registry(), &[5, 0, 0, 0], &WireConfig::default(), 1).unwrap();
        let err = input.read_obj("", None).unwrap_err();
        assert!(err.is_corrupt());
        assert!(err.message().contains("composite"));
        assert_eq!(err.position(), Some(0));
    }

    #[test]
    fn unmatched_end_seq_is_internal() {
        let mut out = BinaryOutput::new(registry(), &WireConfig::default(), 1);
        assert!(out.end_seq().unwrap_err().is_internal());
        out.begin_seq(0).unwrap();
        out.end_seq().unwrap();
        assert!(out.end_seq().unwrap_err().is_internal());

        let mut input =
            BinaryInput::new(registry(), &[0, 0, 0, 0], &WireConfig::default(), 1).unwrap();
        assert!(input.end_seq().unwrap_err().is_internal());
        assert_eq!(input.begin_seq().unwrap(), 0);
        input.end_seq().unwrap();
    }

    #[test]
    fn dates_and_trailing_bytes() {
        let mut input = BinaryInput::new(
            registry(),
            &[0, 0, 0, 0, 0, 0, 0, 0x80, 7],
            &WireConfig::default(),
            1,
        )
        .unwrap();
        assert_eq!(input.get_date("").unwrap(), None);
        assert!(input.finish().unwrap_err().is_corrupt());
        input.get_i8("").unwrap();
        input.finish().unwrap();
    }
}
