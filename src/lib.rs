//! # graphwire
//!
//! graphwire moves object graphs between the two ends of an RPC connection. A message is a
//! single root value; everything reachable from it is written, with shared and cyclic
//! references preserved, in one of two interchangeable wire formats:
//!
//! * a JSON-like text format, readable in a browser's network tab and parseable by a
//!   JavaScript peer (see [`encoding::text`]);
//! * a compact binary format (see [`encoding::binary`]).
//!
//! # Usage
//!
//! Each transportable type declares a numeric type id and gets a [`Serializer`] that writes
//! and reads its members. Serializers are collected in a [`TypeRegistry`], which both ends
//! of a connection build from the same table.
//!
//! ```
//! use graphwire::prelude::*;
//!
//! #[derive(Default)]
//! struct Node {
//!     label: String,
//!     next: Option<Shared<Node>>,
//! }
//!
//! impl Transportable for Node {
//!     const TYPE_ID: TypeId = 64;
//! }
//!
//! struct NodeSerializer;
//!
//! impl ObjectSerializer for NodeSerializer {
//!     type Target = Node;
//!
//!     fn write_fields(&self, n: &Node, out: &mut dyn WireOutput, _: i64) -> Result<()> {
//!         out.put_str("label", &n.label)?;
//!         out.put_shared("next", n.next.as_ref())
//!     }
//!
//!     fn read_fields(&self, n: &Shared<Node>, input: &mut dyn WireInput, _: i64) -> Result<()> {
//!         let label = input.get_str("label")?;
//!         let next = input.get_shared::<Node>("next")?;
//!         let mut n = n.borrow_mut();
//!         n.label = label;
//!         n.next = next;
//!         Ok(())
//!     }
//! }
//!
//! let registry = TypeRegistry::builder()
//!     .register(ObjectAdapter::arc(NodeSerializer))
//!     .build()
//!     .unwrap();
//!
//! let tail = shared(Node { label: "tail".into(), next: None });
//! let head = shared(Node { label: "head".into(), next: Some(tail) });
//!
//! let text = encode_value(&registry, WireFormat::Text, &head, 1).unwrap();
//! assert_eq!(
//!     &text[..],
//!     &br#"{"_typeId":64,"label":"head","next":{"_typeId":64,"label":"tail","next":null}}"#[..]
//! );
//!
//! for format in [WireFormat::Text, WireFormat::Binary] {
//!     let bytes = encode_value(&registry, format, &head, 1).unwrap();
//!     let back = decode_value::<Node>(&registry, format, &bytes, 1).unwrap().unwrap();
//!     let back = back.borrow();
//!     assert_eq!(back.label, "head");
//!     assert_eq!(back.next.as_ref().unwrap().borrow().label, "tail");
//! }
//! ```
//!
//! # Modules
//!
//! * [`buffer`]: the growable byte buffer both codecs write to.
//! * [`encoding`]: the codecs and the encode/decode entry points.
//! * [`registry`]: type ids and their serializers.
//! * [`serializer`] and [`containers`]: the serializer contract and the built-in list, set
//!   and map serializers.
//! * [`reference`]: per-message object reference tables.
//! * [`stream`]: lazily loaded binary payloads.
//! * [`value`]: the parsed tree of a text message.
//! * [`config`]: buffer and nesting limits.
//!
//! [`Serializer`]: serializer::Serializer
//! [`TypeRegistry`]: registry::TypeRegistry

#![warn(
    deprecated_in_future,
    unsafe_code,
    unused_labels,
    keyword_idents,
    macro_use_extern_crate,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces
)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::len_without_is_empty)]

pub mod buffer;
pub mod config;
pub mod containers;
pub mod encoding;
pub mod errors;
pub mod fieldmap;
pub mod prelude;
pub mod reference;
pub mod registry;
pub mod rep;
pub mod serializer;
pub mod stream;
pub mod util;
pub mod value;

pub use errors::{ErrorKind, Result, WireError};
