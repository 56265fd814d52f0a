//! Stream values and the two-phase lazy-loading protocol.
//!
//! A [`LazyStream`] travels in a message as metadata only; its payload is shipped by the
//! transport out of band. Decoding with [`decode_lazy`](crate::encoding::decode_lazy) walks
//! the decoded graph once and collects every stream whose payload is still missing, so the
//! application can fetch and [`materialize`](LazyStream::materialize) them later instead of
//! blocking in the middle of a decode.

use crate::{
    encoding::{WireInput, WireOutput},
    errors::*,
    registry::{self, TypeId},
    rep::{shared, Obj, Shared, Transportable},
    serializer::Serializer,
};
use bytes::Bytes;
use std::collections::HashSet;
use tracing::trace;

/// A binary payload that is loaded separately from the message that references it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LazyStream {
    pub stream_id: i64,
    pub content_type: String,
    /// Announced payload length, or -1 if unknown.
    pub content_length: i64,
    payload: Option<Bytes>,
}

impl Transportable for LazyStream {
    const TYPE_ID: TypeId = registry::STREAM;
}

impl LazyStream {
    pub fn new(stream_id: i64, content_type: impl Into<String>, content_length: i64) -> Self {
        LazyStream {
            stream_id,
            content_type: content_type.into(),
            content_length,
            payload: None,
        }
    }

    /// A stream whose payload is already present.
    pub fn with_payload(stream_id: i64, content_type: impl Into<String>, payload: Bytes) -> Self {
        LazyStream {
            stream_id,
            content_type: content_type.into(),
            content_length: payload.len() as i64,
            payload: Some(payload),
        }
    }

    pub fn payload(&self) -> Option<&Bytes> { self.payload.as_ref() }

    pub fn is_materialized(&self) -> bool { self.payload.is_some() }

    /// Attaches the payload fetched for this stream.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::Corrupt`] error if the stream announced a length and the
    /// payload has another one.
    pub fn materialize(&mut self, payload: Bytes) -> Result<()> {
        if self.content_length >= 0 && payload.len() as i64 != self.content_length {
            return Err(WireError::corrupt(format!(
                "stream {} announced {} bytes, received {}",
                self.stream_id,
                self.content_length,
                payload.len()
            )));
        }
        self.payload = Some(payload);
        Ok(())
    }
}

/// Per-message state of a lazy-loading pass.
#[derive(Debug, Default)]
pub struct LazyLoad {
    visited: HashSet<usize>,
    deferred: Vec<Shared<LazyStream>>,
}

impl LazyLoad {
    /// Marks `obj` as visited, returning `false` if it already was. Cycles terminate on this.
    pub fn first_visit(&mut self, obj: &Obj) -> bool { self.visited.insert(obj.identity()) }

    /// Records a stream whose payload is still missing.
    pub fn defer(&mut self, stream: Shared<LazyStream>) { self.deferred.push(stream) }

    /// Takes the streams recorded so far, in the order they were met.
    pub fn take_deferred(&mut self) -> Vec<Shared<LazyStream>> {
        std::mem::replace(&mut self.deferred, Vec::new())
    }
}

/// The built-in serializer of [`LazyStream`].
pub struct StreamSerializer;

impl StreamSerializer {
    fn typed(value: &Obj) -> Result<Shared<LazyStream>> {
        value.downcast::<LazyStream>().ok_or_else(|| {
            WireError::internal(format!("stream serializer cannot handle {}", value.type_name()))
        })
    }
}

impl Serializer for StreamSerializer {
    fn type_id(&self) -> TypeId { registry::STREAM }

    fn read(&self, target: Option<Obj>, input: &mut dyn WireInput, _version: i64) -> Result<Obj> {
        let cell = target
            .and_then(|t| t.downcast::<LazyStream>())
            .unwrap_or_else(|| shared(LazyStream::default()));
        input.on_object_created(Obj::from_shared(cell.clone()))?;

        let stream_id = input.get_i64("streamId")?;
        let content_type = input.get_str("contentType")?;
        let content_length = input.get_i64("contentLength")?;
        {
            let mut stream = cell.borrow_mut();
            stream.stream_id = stream_id;
            stream.content_type = content_type;
            stream.content_length = content_length;
        }
        Ok(Obj::from_shared(cell))
    }

    fn write(&self, value: &Obj, out: &mut dyn WireOutput, _version: i64) -> Result<()> {
        let cell = Self::typed(value)?;
        let stream = cell
            .try_borrow()
            .map_err(|_| WireError::internal("stream is mutably borrowed while being written"))?;
        out.put_i64("streamId", stream.stream_id)?;
        out.put_str("contentType", &stream.content_type)?;
        out.put_i64("contentLength", stream.content_length)
    }

    fn prepare_for_lazy_loading(
        &self,
        value: &Obj,
        input: &mut dyn WireInput,
        _version: i64,
    ) -> Result<()> {
        let cell = Self::typed(value)?;
        let pending = !cell.borrow().is_materialized();
        if pending {
            trace!(stream_id = cell.borrow().stream_id, "deferring stream payload");
            input.lazy_load().defer(cell);
        }
        Ok(())
    }
}
