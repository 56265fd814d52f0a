use crate::{
    errors::*,
    registry::{TypeId, TypeRegistry},
    rep::{Obj, Shared, Transportable},
    serializer::Serializer,
    stream::LazyLoad,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::{any::Any, sync::Arc};

/// The codec-facing surface a [`Serializer`] reads from; the mirror of
/// [`WireOutput`](crate::encoding::WireOutput).
///
/// A member missing from a text object body reads as the type's zero value, so serializers
/// may ask for members that an older peer never wrote.
pub trait WireInput {
    fn registry(&self) -> &Arc<TypeRegistry>;

    fn version(&self) -> i64;

    fn get_bool(&mut self, field: &str) -> Result<bool>;

    fn get_i8(&mut self, field: &str) -> Result<i8>;

    fn get_i16(&mut self, field: &str) -> Result<i16>;

    fn get_i32(&mut self, field: &str) -> Result<i32>;

    fn get_i64(&mut self, field: &str) -> Result<i64>;

    fn get_f32(&mut self, field: &str) -> Result<f32>;

    fn get_f64(&mut self, field: &str) -> Result<f64>;

    fn get_char(&mut self, field: &str) -> Result<char>;

    fn get_str(&mut self, field: &str) -> Result<String>;

    fn get_bytes(&mut self, field: &str) -> Result<Bytes>;

    fn get_date(&mut self, field: &str) -> Result<Option<DateTime<Utc>>>;

    /// Opens a sequence, returning its length.
    fn begin_seq(&mut self) -> Result<usize>;

    fn end_seq(&mut self) -> Result<()>;

    /// Reads a composite value: null, a back-reference or a body.
    ///
    /// A body is read by `ser` if given, otherwise by the serializer registered under the
    /// type id found on the wire.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::Corrupt`] error for malformed content, an unknown type id or
    /// an unresolvable back-reference, and an [`ErrorKind::Internal`] error if the
    /// serializer did not report the value it allocated through
    /// [`on_object_created`](WireInput::on_object_created).
    fn read_obj(&mut self, field: &str, ser: Option<&dyn Serializer>) -> Result<Option<Obj>>;

    /// Registers a freshly allocated composite for back-references.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::Internal`] error if the message holds more composites than
    /// reference ids can number.
    fn on_object_created(&mut self, obj: Obj) -> Result<()>;

    /// State of the lazy-loading pass over this message.
    fn lazy_load(&mut self) -> &mut LazyLoad;
}

/// Typed conveniences over [`WireInput`].
pub trait WireInputExt {
    /// Reads a typed composite.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::Corrupt`] error if the wire holds a value of another type.
    fn get_shared<T: Transportable>(&mut self, field: &str) -> Result<Option<Shared<T>>>;

    fn get_obj(&mut self, field: &str) -> Result<Option<Obj>>;

    /// Reads a container with the serializer registered under `type_id`.
    fn get_container<C: Any>(&mut self, field: &str, type_id: TypeId)
        -> Result<Option<Shared<C>>>;

    /// Runs the lazy-loading preparation of `obj` unless it was already visited in this
    /// pass.
    fn prepare_obj(&mut self, obj: &Obj, ser: Option<&dyn Serializer>) -> Result<()>;

    fn prepare_shared<T: Transportable>(&mut self, v: Option<&Shared<T>>) -> Result<()>;

    fn prepare_container<C: Any>(&mut self, v: Option<&Shared<C>>, type_id: TypeId)
        -> Result<()>;
}

fn downcast<T: Any>(obj: Obj, field: &str) -> Result<Shared<T>> {
    obj.downcast::<T>().ok_or_else(|| {
        WireError::corrupt(format!(
            "member {:?}: expected {}, found {}",
            field,
            std::any::type_name::<T>(),
            obj.type_name()
        ))
    })
}

impl<'a> WireInputExt for dyn WireInput + 'a {
    fn get_shared<T: Transportable>(&mut self, field: &str) -> Result<Option<Shared<T>>> {
        self.read_obj(field, None)?
            .map(|obj| downcast::<T>(obj, field))
            .transpose()
    }

    fn get_obj(&mut self, field: &str) -> Result<Option<Obj>> { self.read_obj(field, None) }

    fn get_container<C: Any>(
        &mut self,
        field: &str,
        type_id: TypeId,
    ) -> Result<Option<Shared<C>>> {
        let ser = self.registry().get(type_id)?;
        self.read_obj(field, Some(&*ser))?
            .map(|obj| downcast::<C>(obj, field))
            .transpose()
    }

    fn prepare_obj(&mut self, obj: &Obj, ser: Option<&dyn Serializer>) -> Result<()> {
        if !self.lazy_load().first_visit(obj) {
            return Ok(());
        }
        let resolved;
        let ser = match ser {
            Some(ser) => ser,
            None => {
                resolved = self.registry().serializer_for(obj)?;
                &*resolved
            }
        };
        let version = self.version();
        ser.prepare_for_lazy_loading(obj, self, version)
    }

    fn prepare_shared<T: Transportable>(&mut self, v: Option<&Shared<T>>) -> Result<()> {
        match v {
            Some(cell) => self.prepare_obj(&Obj::from_shared(cell.clone()), None),
            None => Ok(()),
        }
    }

    fn prepare_container<C: Any>(
        &mut self,
        v: Option<&Shared<C>>,
        type_id: TypeId,
    ) -> Result<()> {
        match v {
            Some(cell) => {
                let ser = self.registry().get(type_id)?;
                self.prepare_obj(&Obj::with_type_id(cell.clone(), type_id), Some(&*ser))
            }
            None => Ok(()),
        }
    }
}
