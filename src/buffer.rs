//! The growable byte buffer underneath both codecs.
//!
//! A [`WireBuffer`] is written in accumulation mode, [flipped](WireBuffer::flip) and then
//! read back. Growth doubles the capacity (or grows to exactly what is needed, whichever is
//! larger) and never drops bytes already written; it fails instead of growing past the
//! configured maximum size.

use crate::errors::*;
use byteorder::{BigEndian, ByteOrder as _, LittleEndian};
use bytes::Bytes;
use serde::Deserialize;
use tracing::trace;

/// Byte order used for fixed-width numerics.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Deserialize)]
pub enum ByteOrder {
    BigEndian,
    LittleEndian,
}

/// An owned, growable byte sequence with a read/write cursor.
///
/// # Example
///
/// ```
/// use graphwire::buffer::{ByteOrder, WireBuffer};
///
/// let mut buf = WireBuffer::with_capacity(2, usize::max_value(), ByteOrder::BigEndian);
/// buf.put_slice(b"hello").unwrap();
///
/// // the buffer grew and kept everything
/// assert!(buf.capacity() >= 5);
///
/// buf.flip();
/// assert_eq!(buf.remaining(), 5);
/// assert_eq!(buf.get_u8(), Some(b'h'));
/// ```
#[derive(Clone, Debug)]
pub struct WireBuffer {
    data: Vec<u8>,
    position: usize,
    limit: usize,
    order: ByteOrder,
    max_size: usize,
}

macro_rules! put_fixed {
    ($name:ident, $t:ty, $len:expr, $write:ident) => {
        /// Writes a fixed-width value in the buffer's byte order.
        pub fn $name(&mut self, v: $t) -> Result<()> {
            let mut scratch = [0u8; $len];
            match self.order {
                ByteOrder::BigEndian => BigEndian::$write(&mut scratch, v),
                ByteOrder::LittleEndian => LittleEndian::$write(&mut scratch, v),
            }
            self.put_slice(&scratch)
        }
    };
}

macro_rules! get_fixed {
    ($name:ident, $t:ty, $len:expr, $read:ident) => {
        /// Reads a fixed-width value in the buffer's byte order, or `None` if fewer bytes
        /// remain.
        pub fn $name(&mut self) -> Option<$t> {
            let order = self.order;
            let bytes = self.get_slice($len)?;
            Some(match order {
                ByteOrder::BigEndian => BigEndian::$read(bytes),
                ByteOrder::LittleEndian => LittleEndian::$read(bytes),
            })
        }
    };
}

impl WireBuffer {
    /// Creates an empty buffer in write mode.
    ///
    /// # Arguments
    ///
    /// * `capacity: usize` - Bytes to allocate up front.
    /// * `max_size: usize` - The capacity the buffer may never exceed.
    /// * `order: ByteOrder` - Byte order of fixed-width numerics.
    pub fn with_capacity(capacity: usize, max_size: usize, order: ByteOrder) -> Self {
        let capacity = capacity.min(max_size);
        WireBuffer {
            data: vec![0; capacity],
            position: 0,
            limit: capacity,
            order,
            max_size,
        }
    }

    /// Wraps received bytes in read mode: the position is 0 and the limit is the length.
    pub fn from_bytes(bytes: &[u8], order: ByteOrder) -> Self {
        WireBuffer {
            data: bytes.to_vec(),
            position: 0,
            limit: bytes.len(),
            order,
            max_size: bytes.len(),
        }
    }

    /// Makes room for `n` more bytes at the current position.
    ///
    /// The new capacity is `max(2 * capacity, position + n)`. All bytes of the buffer are
    /// kept, the byte order is unchanged.
    pub fn ensure_capacity(&mut self, n: usize) -> Result<()> {
        let needed = self
            .position
            .checked_add(n)
            .ok_or_else(|| WireError::internal("buffer size overflow"))?;
        if needed <= self.data.len() {
            return Ok(());
        }
        if needed > self.max_size {
            return Err(WireError::internal(format!(
                "message of at least {} bytes exceeds the maximum buffer size of {} bytes",
                needed, self.max_size
            )));
        }

        let capacity = (self.data.len() << 1).max(needed).min(self.max_size);
        trace!(from = self.data.len(), to = capacity, "growing wire buffer");
        self.data.resize(capacity, 0);
        self.limit = capacity;
        Ok(())
    }

    /// Appends a byte.
    pub fn put_u8(&mut self, b: u8) -> Result<()> {
        self.ensure_capacity(1)?;
        self.data[self.position] = b;
        self.position += 1;
        Ok(())
    }

    /// Appends a slice.
    pub fn put_slice(&mut self, slice: &[u8]) -> Result<()> {
        self.ensure_capacity(slice.len())?;
        self.data[self.position..self.position + slice.len()].copy_from_slice(slice);
        self.position += slice.len();
        Ok(())
    }

    put_fixed!(put_u16, u16, 2, write_u16);
    put_fixed!(put_u32, u32, 4, write_u32);
    put_fixed!(put_u64, u64, 8, write_u64);

    /// Consumes one byte.
    pub fn get_u8(&mut self) -> Option<u8> {
        let b = self.peek_u8()?;
        self.position += 1;
        Some(b)
    }

    /// Returns the byte at the position without consuming it.
    pub fn peek_u8(&self) -> Option<u8> {
        if self.position < self.limit {
            Some(self.data[self.position])
        } else {
            None
        }
    }

    /// Returns the byte at an absolute index below the limit.
    pub fn byte_at(&self, index: usize) -> Option<u8> {
        if index < self.limit {
            Some(self.data[index])
        } else {
            None
        }
    }

    /// Consumes `len` bytes and returns them, or `None` if fewer remain.
    pub fn get_slice(&mut self, len: usize) -> Option<&[u8]> {
        if self.remaining() < len {
            return None;
        }
        let start = self.position;
        self.position += len;
        Some(&self.data[start..start + len])
    }

    get_fixed!(get_u16, u16, 2, read_u16);
    get_fixed!(get_u32, u32, 4, read_u32);
    get_fixed!(get_u64, u64, 8, read_u64);

    /// The cursor.
    pub fn position(&self) -> usize { self.position }

    /// Moves the cursor. Positions beyond the limit are clamped to the limit.
    pub fn set_position(&mut self, position: usize) { self.position = position.min(self.limit) }

    /// In write mode the capacity, in read mode the end of the readable bytes.
    pub fn limit(&self) -> usize { self.limit }

    pub fn remaining(&self) -> usize { self.limit - self.position }

    pub fn capacity(&self) -> usize { self.data.len() }

    pub fn order(&self) -> ByteOrder { self.order }

    /// Switches from write accumulation to reading what was written.
    pub fn flip(&mut self) {
        self.limit = self.position;
        self.position = 0;
    }

    /// Resets the buffer for reuse in write mode. The capacity is kept.
    pub fn clear(&mut self) {
        self.position = 0;
        self.limit = self.data.len();
    }

    /// The bytes in front of the cursor; in write mode, everything written so far.
    pub fn as_written(&self) -> &[u8] { &self.data[..self.position] }

    /// The whole readable region, independent of the cursor.
    pub fn readable(&self) -> &[u8] { &self.data[..self.limit] }

    /// Consumes the buffer, returning the bytes written so far.
    pub fn into_bytes(mut self) -> Bytes {
        self.data.truncate(self.position);
        Bytes::from(self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growth_doubles_and_preserves() {
        let mut buf = WireBuffer::with_capacity(4, 1 << 20, ByteOrder::LittleEndian);
        buf.put_slice(b"abcd").unwrap();
        buf.put_u8(b'e').unwrap();
        assert_eq!(buf.capacity(), 8);
        buf.put_slice(&[b'z'; 20]).unwrap();
        assert_eq!(buf.capacity(), 25);
        assert_eq!(&buf.clone().into_bytes()[..5], b"abcde");
        assert_eq!(buf.order(), ByteOrder::LittleEndian);
    }

    #[test]
    fn growth_stops_at_max_size() {
        let mut buf = WireBuffer::with_capacity(4, 10, ByteOrder::BigEndian);
        buf.put_slice(b"0123456789").unwrap();
        let err = buf.put_u8(b'x').unwrap_err();
        assert!(err.is_internal());
        assert_eq!(buf.position(), 10);
    }

    #[test]
    fn fixed_width_respects_order() {
        let mut be = WireBuffer::with_capacity(8, 64, ByteOrder::BigEndian);
        be.put_u32(1).unwrap();
        assert_eq!(be.clone().into_bytes().as_ref(), &[0, 0, 0, 1]);

        let mut le = WireBuffer::with_capacity(8, 64, ByteOrder::LittleEndian);
        le.put_u32(1).unwrap();
        le.flip();
        assert_eq!(le.readable(), &[1, 0, 0, 0]);
        assert_eq!(le.get_u32(), Some(1));
        assert_eq!(le.get_u32(), None);
    }

    #[test]
    fn flip_and_clear() {
        let mut buf = WireBuffer::with_capacity(16, 64, ByteOrder::BigEndian);
        buf.put_slice(b"xy").unwrap();
        buf.flip();
        assert_eq!(buf.limit(), 2);
        assert_eq!(buf.get_slice(2), Some(&b"xy"[..]));
        assert_eq!(buf.get_u8(), None);
        buf.clear();
        assert_eq!(buf.position(), 0);
        assert_eq!(buf.limit(), 16);
    }
}
