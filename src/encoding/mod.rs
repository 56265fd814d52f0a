//! # Encoding and decoding messages
//!
//! A message is one root value, written with the text codec ([`text`]) or the binary codec
//! ([`binary`]). Both codecs present the same surface to serializers, [`WireOutput`] and
//! [`WireInput`], so a serializer is written once and works with either.
//!
//! Every message carries its own reference table: a composite value reachable more than
//! once is written in full the first time and as a back-reference afterwards, and decoding
//! restores the sharing (cycles included).
//!
//! # Example
//!
//! ```
//! use graphwire::prelude::*;
//!
//! let registry = TypeRegistry::builder().build().unwrap();
//!
//! // a list that contains itself
//! let list = shared(Vec::<Option<Obj>>::new());
//! let obj = Obj::from_shared(list.clone());
//! list.borrow_mut().push(Some(obj.clone()));
//!
//! let text = encode(&registry, WireFormat::Text, Some(&obj), 1).unwrap();
//! assert_eq!(&text[..], br#"{"_typeId":12,"_items":[{"*i":-1}]}"#);
//!
//! let decoded = decode(&registry, WireFormat::Text, &text, 1).unwrap().unwrap();
//! let items = decoded.downcast::<Vec<Option<Obj>>>().unwrap();
//! assert!(items.borrow()[0].as_ref().unwrap().ptr_eq(&decoded));
//! # list.borrow_mut().clear();
//! # items.borrow_mut().clear();
//! ```

use crate::{
    config::WireConfig,
    errors::*,
    registry::TypeRegistry,
    rep::{Obj, Shared, Transportable},
    stream::LazyStream,
};
use bytes::Bytes;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

pub mod binary;
mod constants;
pub mod de;
pub use de::*;
pub mod ser;
pub use ser::*;
pub mod text;

use binary::{BinaryInput, BinaryOutput};
use text::{TextInput, TextOutput};

/// The two interchangeable wire formats.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Deserialize)]
pub enum WireFormat {
    Text,
    Binary,
}

/// Encodes a message with the default configuration.
///
/// # Arguments
///
/// * `registry: &Arc<TypeRegistry>` - Resolves the serializers of the values in the graph.
/// * `format: WireFormat` - The codec to use.
/// * `root: Option<&Obj>` - The root value; `None` encodes a null message.
/// * `version: i64` - The version tag handed to every serializer.
///
/// # Errors
///
/// Returns an [`ErrorKind::Internal`] error if a value in the graph has no serializer or
/// the message outgrows the maximum buffer size.
pub fn encode(
    registry: &Arc<TypeRegistry>,
    format: WireFormat,
    root: Option<&Obj>,
    version: i64,
) -> Result<Bytes> {
    encode_with(registry, format, root, version, &WireConfig::default())
}

/// Encodes a message with an explicit configuration.
pub fn encode_with(
    registry: &Arc<TypeRegistry>,
    format: WireFormat,
    root: Option<&Obj>,
    version: i64,
    config: &WireConfig,
) -> Result<Bytes> {
    let bytes = match format {
        WireFormat::Text => {
            let mut out = TextOutput::new(registry.clone(), config, version);
            out.write_obj("", root, None)?;
            out.finish()
        }
        WireFormat::Binary => {
            let mut out = BinaryOutput::new(registry.clone(), config, version);
            out.write_obj("", root, None)?;
            out.finish()
        }
    };
    debug!(?format, len = bytes.len(), version, "encoded message");
    Ok(bytes)
}

/// Encodes a typed root value.
pub fn encode_value<T: Transportable>(
    registry: &Arc<TypeRegistry>,
    format: WireFormat,
    root: &Shared<T>,
    version: i64,
) -> Result<Bytes> {
    encode(registry, format, Some(&Obj::from_shared(root.clone())), version)
}

/// Decodes a message with the default configuration.
///
/// # Errors
///
/// Returns an [`ErrorKind::Corrupt`] error if the message is malformed, names a type id
/// that is not registered, or does not end where its root value ends.
pub fn decode(
    registry: &Arc<TypeRegistry>,
    format: WireFormat,
    data: &[u8],
    version: i64,
) -> Result<Option<Obj>> {
    decode_with(registry, format, data, version, &WireConfig::default())
}

/// Decodes a message with an explicit configuration.
pub fn decode_with(
    registry: &Arc<TypeRegistry>,
    format: WireFormat,
    data: &[u8],
    version: i64,
    config: &WireConfig,
) -> Result<Option<Obj>> {
    let mut input = open(registry, format, data, version, config)?;
    let root = input.read_root()?;
    debug!(?format, len = data.len(), version, "decoded message");
    Ok(root)
}

/// Decodes a typed root value.
///
/// # Errors
///
/// Returns an [`ErrorKind::Corrupt`] error if the root is of another type, in addition to
/// the errors of [`decode`].
pub fn decode_value<T: Transportable>(
    registry: &Arc<TypeRegistry>,
    format: WireFormat,
    data: &[u8],
    version: i64,
) -> Result<Option<Shared<T>>> {
    decode(registry, format, data, version)?
        .map(|obj| {
            obj.downcast::<T>().ok_or_else(|| {
                WireError::corrupt(format!(
                    "expected a root of typeId={}, found {}",
                    T::TYPE_ID,
                    obj.type_name()
                ))
            })
        })
        .transpose()
}

/// Decodes a message and runs the lazy-loading pass over it.
///
/// Returns the root together with every [`LazyStream`] in the graph whose payload is still
/// to be fetched, in the order they are reached from the root.
pub fn decode_lazy(
    registry: &Arc<TypeRegistry>,
    format: WireFormat,
    data: &[u8],
    version: i64,
) -> Result<(Option<Obj>, Vec<Shared<LazyStream>>)> {
    let mut input = open(registry, format, data, version, &WireConfig::default())?;
    let root = input.read_root()?;
    let deferred = {
        let input = input.as_input();
        if let Some(root) = &root {
            input.prepare_obj(root, None)?;
        }
        input.lazy_load().take_deferred()
    };
    debug!(streams = deferred.len(), "lazy-loading pass complete");
    Ok((root, deferred))
}

enum Input {
    Text(TextInput),
    Binary(BinaryInput),
}

fn open(
    registry: &Arc<TypeRegistry>,
    format: WireFormat,
    data: &[u8],
    version: i64,
    config: &WireConfig,
) -> Result<Input> {
    Ok(match format {
        WireFormat::Text => Input::Text(TextInput::new(registry.clone(), data, config, version)?),
        WireFormat::Binary => {
            Input::Binary(BinaryInput::new(registry.clone(), data, config, version)?)
        }
    })
}

impl Input {
    fn as_input(&mut self) -> &mut dyn WireInput {
        match self {
            Input::Text(input) => input,
            Input::Binary(input) => input,
        }
    }

    fn read_root(&mut self) -> Result<Option<Obj>> {
        let root = self.as_input().read_obj("", None)?;
        if let Input::Binary(input) = self {
            input.finish()?;
        }
        Ok(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{rep::shared, stream::LazyStream};

    fn registry() -> Arc<TypeRegistry> { TypeRegistry::builder().build().unwrap() }

    #[test]
    fn null_root() {
        for format in [WireFormat::Text, WireFormat::Binary] {
            let bytes = encode(&registry(), format, None, 1).unwrap();
            assert_eq!(decode(&registry(), format, &bytes, 1).unwrap(), None);
        }
        assert_eq!(&encode(&registry(), WireFormat::Text, None, 1).unwrap()[..], b"null");
    }

    #[test]
    fn trailing_content_is_corrupt() {
        assert!(decode(&registry(), WireFormat::Text, b"null null", 1)
            .unwrap_err()
            .is_corrupt());
        assert!(decode(&registry(), WireFormat::Binary, &[0, 0, 0, 0, 1], 1)
            .unwrap_err()
            .is_corrupt());
    }

    #[test]
    fn typed_root_mismatch() {
        let stream = shared(LazyStream::new(1, "a/b", 0));
        let bytes = encode_value(&registry(), WireFormat::Binary, &stream, 1).unwrap();
        let err =
            decode_value::<Vec<Option<Obj>>>(&registry(), WireFormat::Binary, &bytes, 1)
                .unwrap_err();
        assert!(err.is_corrupt());
        let back = decode_value::<LazyStream>(&registry(), WireFormat::Binary, &bytes, 1)
            .unwrap()
            .unwrap();
        assert_eq!(back.borrow().content_type, "a/b");
    }

    #[test]
    fn lazy_pass_collects_streams_once() {
        let stream = Obj::new(LazyStream::new(5, "image/png", 10));
        let list = shared(vec![Some(stream.clone()), Some(stream), None]);
        let bytes = encode_value(&registry(), WireFormat::Text, &list, 1).unwrap();
        let (root, deferred) = decode_lazy(&registry(), WireFormat::Text, &bytes, 1).unwrap();
        assert!(root.is_some());
        assert_eq!(deferred.len(), 1);
        assert_eq!(deferred[0].borrow().stream_id, 5);
    }
}
