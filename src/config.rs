//! Codec configuration.
//!
//! Defaults are read once per process from the environment:
//!
//! | Variable | Default |
//! | --- | --- |
//! | `GRAPHWIRE_INITIAL_CAPACITY` | 1 KiB |
//! | `GRAPHWIRE_MAX_BUFFER_SIZE` | 64 MiB |
//! | `GRAPHWIRE_MAX_DEPTH` | 256 |

use crate::buffer::ByteOrder;
use crate::lazy_env_parse;
use once_cell::sync::Lazy;
use serde::Deserialize;

/// Initial capacity of an encode buffer (defaults to 1 KiB)
pub static INITIAL_CAPACITY: Lazy<usize> =
    lazy_env_parse!("GRAPHWIRE_INITIAL_CAPACITY", usize, 1 << 10);

/// Hard upper bound of any wire buffer, encoded or decoded (defaults to 64 MiB)
pub static MAX_BUFFER_SIZE: Lazy<usize> =
    lazy_env_parse!("GRAPHWIRE_MAX_BUFFER_SIZE", usize, 64 << 20);

/// Maximum nesting of objects and arrays (defaults to 256)
pub static MAX_DEPTH: Lazy<usize> = lazy_env_parse!("GRAPHWIRE_MAX_DEPTH", usize, 256);

/// Limits and layout options shared by both codecs.
///
/// # Example
///
/// ```
/// use graphwire::config::WireConfig;
///
/// let config = WireConfig::default().with_max_depth(16);
///
/// assert_eq!(config.max_depth, 16);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WireConfig {
    /// Capacity allocated up front for an outgoing message.
    pub initial_capacity: usize,
    /// No buffer may grow beyond, and no input may be longer than, this many bytes.
    pub max_buffer_size: usize,
    /// Maximum nesting of composite values.
    pub max_depth: usize,
    /// Byte order of the binary codec. The text codec is always big endian.
    pub byte_order: ByteOrder,
}

impl Default for WireConfig {
    fn default() -> Self {
        WireConfig {
            initial_capacity: *INITIAL_CAPACITY,
            max_buffer_size: *MAX_BUFFER_SIZE,
            max_depth: *MAX_DEPTH,
            byte_order: ByteOrder::LittleEndian,
        }
    }
}

impl WireConfig {
    pub fn with_initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }

    pub fn with_max_buffer_size(mut self, max_buffer_size: usize) -> Self {
        self.max_buffer_size = max_buffer_size;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }
}
