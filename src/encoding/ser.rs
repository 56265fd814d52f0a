use crate::{
    errors::*,
    registry::{TypeId, TypeRegistry},
    rep::{Obj, Shared, Transportable},
    serializer::Serializer,
};
use chrono::{DateTime, Utc};
use std::{any::Any, sync::Arc};

/// The codec-facing surface a [`Serializer`] writes to.
///
/// `field` names the member being written; it is significant in the text codec's object
/// bodies and ignored everywhere else (sequence items, the binary codec).
pub trait WireOutput {
    /// The registry used to resolve serializers of nested values.
    fn registry(&self) -> &Arc<TypeRegistry>;

    /// The version tag of the message being written.
    fn version(&self) -> i64;

    fn put_bool(&mut self, field: &str, v: bool) -> Result<()>;

    fn put_i8(&mut self, field: &str, v: i8) -> Result<()>;

    fn put_i16(&mut self, field: &str, v: i16) -> Result<()>;

    fn put_i32(&mut self, field: &str, v: i32) -> Result<()>;

    fn put_i64(&mut self, field: &str, v: i64) -> Result<()>;

    fn put_f32(&mut self, field: &str, v: f32) -> Result<()>;

    fn put_f64(&mut self, field: &str, v: f64) -> Result<()>;

    fn put_char(&mut self, field: &str, v: char) -> Result<()>;

    fn put_str(&mut self, field: &str, v: &str) -> Result<()>;

    fn put_bytes(&mut self, field: &str, v: &[u8]) -> Result<()>;

    /// Writes a date, or the absence of one.
    fn put_date(&mut self, field: &str, v: Option<&DateTime<Utc>>) -> Result<()>;

    /// Opens a sequence of `len` items. Only serializers of [`Shape::Array`] call this.
    ///
    /// [`Shape::Array`]: crate::serializer::Shape::Array
    fn begin_seq(&mut self, len: usize) -> Result<()>;

    fn end_seq(&mut self) -> Result<()>;

    /// Writes a composite value.
    ///
    /// `None` is written as null. A value already written in this message is written as a
    /// back-reference; otherwise it is assigned the next reference id and its body is
    /// written by `ser`, or by the serializer the registry binds to its class.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::Internal`] error if no serializer is given and the value's
    /// type declares no type id.
    fn write_obj(
        &mut self,
        field: &str,
        value: Option<&Obj>,
        ser: Option<&dyn Serializer>,
    ) -> Result<()>;
}

/// Typed conveniences over [`WireOutput`].
pub trait WireOutputExt: WireOutput {
    /// Writes a typed composite, resolving its serializer from its type id.
    fn put_shared<T: Transportable>(&mut self, field: &str, v: Option<&Shared<T>>) -> Result<()> {
        let obj = v.map(|cell| Obj::from_shared(cell.clone()));
        self.write_obj(field, obj.as_ref(), None)
    }

    fn put_obj(&mut self, field: &str, v: Option<&Obj>) -> Result<()> {
        self.write_obj(field, v, None)
    }

    /// Writes a container with the serializer registered under `type_id`.
    ///
    /// The container's type is known statically to both peers, so the text codec writes
    /// its items as a bare array.
    fn put_container<C: Any>(
        &mut self,
        field: &str,
        v: Option<&Shared<C>>,
        type_id: TypeId,
    ) -> Result<()> {
        let ser = self.registry().get(type_id)?;
        let obj = v.map(|cell| Obj::with_type_id(cell.clone(), type_id));
        self.write_obj(field, obj.as_ref(), Some(&*ser))
    }
}

impl<W: WireOutput + ?Sized> WireOutputExt for W {}
