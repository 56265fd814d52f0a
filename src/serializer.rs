//! The contract every transportable type's serializer satisfies.
//!
//! A [`Serializer`] is bound to exactly one type id and is shared by all messages, so it
//! holds no per-message state: the codec, the reference table and the version are passed in
//! on every call. Serializers of user types are usually written against the typed
//! [`ObjectSerializer`] trait and registered through an [`ObjectAdapter`].
//!
//! # Example
//!
//! ```
//! use graphwire::prelude::*;
//!
//! #[derive(Default)]
//! struct Temperature {
//!     celsius: f64,
//!     // added in version 2
//!     station: String,
//! }
//!
//! impl Transportable for Temperature {
//!     const TYPE_ID: TypeId = 80;
//! }
//!
//! struct TemperatureSerializer;
//!
//! impl ObjectSerializer for TemperatureSerializer {
//!     type Target = Temperature;
//!
//!     fn write_fields(&self, t: &Temperature, out: &mut dyn WireOutput, version: i64) -> Result<()> {
//!         out.put_f64("celsius", t.celsius)?;
//!         if version >= 2 {
//!             out.put_str("station", &t.station)?;
//!         }
//!         Ok(())
//!     }
//!
//!     fn read_fields(
//!         &self,
//!         t: &Shared<Temperature>,
//!         input: &mut dyn WireInput,
//!         version: i64,
//!     ) -> Result<()> {
//!         let celsius = input.get_f64("celsius")?;
//!         let station = if version >= 2 { input.get_str("station")? } else { String::new() };
//!         let mut t = t.borrow_mut();
//!         t.celsius = celsius;
//!         t.station = station;
//!         Ok(())
//!     }
//! }
//!
//! let registry = TypeRegistry::builder()
//!     .register(ObjectAdapter::arc(TemperatureSerializer))
//!     .build()
//!     .unwrap();
//!
//! let reading = shared(Temperature { celsius: 21.5, station: "north".into() });
//! let text = encode_value(&registry, WireFormat::Text, &reading, 1).unwrap();
//!
//! assert_eq!(&text[..], br#"{"_typeId":80,"celsius":21.5}"#);
//! ```

use crate::{
    config::WireConfig,
    encoding::{binary::BinaryOutput, WireInput, WireOutput},
    errors::*,
    registry::{TypeId, TypeRegistry},
    rep::{shared, Obj, Shared, Transportable},
};
use std::{fmt, marker::PhantomData, sync::Arc};

/// How a serializer's body is laid out in the text format.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Shape {
    /// A member list: `{"_typeId":N,...}`.
    Object,
    /// A sequence, opened by [`WireOutput::begin_seq`].
    Array,
}

/// Reads and writes values of one type id.
pub trait Serializer: Send + Sync {
    /// The type id this serializer is bound to.
    fn type_id(&self) -> TypeId;

    fn shape(&self) -> Shape { Shape::Object }

    /// Decodes one value at the input's current position.
    ///
    /// A serializer of a composite type must pass the freshly allocated value to
    /// [`WireInput::on_object_created`] before reading any of its members. If `target` is a
    /// value of the bound type, it is filled instead of allocating a new one.
    fn read(&self, target: Option<Obj>, input: &mut dyn WireInput, version: i64) -> Result<Obj>;

    /// Encodes the body of `value`. The reference table has already been consulted.
    fn write(&self, value: &Obj, out: &mut dyn WireOutput, version: i64) -> Result<()>;

    /// The encoded length of `value`, used to pre-size buffers.
    ///
    /// The default writes the body with the binary codec and measures it.
    fn size(&self, value: &Obj, registry: &Arc<TypeRegistry>, version: i64) -> Result<usize> {
        let mut out = BinaryOutput::new(registry.clone(), &WireConfig::default(), version);
        self.write(value, &mut out, version)?;
        Ok(out.len())
    }

    /// Primes nested members that are loaded lazily, without materializing their payloads.
    fn prepare_for_lazy_loading(
        &self,
        _value: &Obj,
        _input: &mut dyn WireInput,
        _version: i64,
    ) -> Result<()> {
        Ok(())
    }
}

impl fmt::Debug for dyn Serializer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Serializer(typeId={})", self.type_id())
    }
}

/// The typed half of a serializer for a user-defined composite type.
pub trait ObjectSerializer: Send + Sync + 'static {
    type Target: Transportable + Default;

    /// Writes the members of `value`.
    fn write_fields(&self, value: &Self::Target, out: &mut dyn WireOutput, version: i64)
        -> Result<()>;

    /// Reads the members into `value`, which is already registered for back-references.
    ///
    /// Do not hold a borrow of `value` while reading nested objects; one of them may be
    /// `value` itself.
    fn read_fields(
        &self,
        value: &Shared<Self::Target>,
        input: &mut dyn WireInput,
        version: i64,
    ) -> Result<()>;

    fn prepare_fields(
        &self,
        _value: &Self::Target,
        _input: &mut dyn WireInput,
        _version: i64,
    ) -> Result<()> {
        Ok(())
    }
}

/// Adapts an [`ObjectSerializer`] to the erased [`Serializer`] contract.
pub struct ObjectAdapter<S> {
    inner: S,
}

impl<S: ObjectSerializer> ObjectAdapter<S> {
    pub fn new(inner: S) -> Self { ObjectAdapter { inner } }

    /// Wraps `inner`, ready for registration.
    pub fn arc(inner: S) -> Arc<dyn Serializer> { Arc::new(Self::new(inner)) }

    fn typed(&self, value: &Obj) -> Result<Shared<S::Target>> {
        value.downcast::<S::Target>().ok_or_else(|| {
            WireError::internal(format!(
                "serializer for typeId={} cannot handle a value of type {}",
                S::Target::TYPE_ID,
                value.type_name()
            ))
        })
    }
}

fn borrow_err(value: &Obj) -> WireError {
    WireError::internal(format!("{:?} is mutably borrowed while being written", value))
}

impl<S: ObjectSerializer> Serializer for ObjectAdapter<S> {
    fn type_id(&self) -> TypeId { S::Target::TYPE_ID }

    fn read(&self, target: Option<Obj>, input: &mut dyn WireInput, version: i64) -> Result<Obj> {
        let cell = target
            .and_then(|t| t.downcast::<S::Target>())
            .unwrap_or_else(|| shared(S::Target::default()));
        input.on_object_created(Obj::from_shared(cell.clone()))?;
        self.inner.read_fields(&cell, input, version)?;
        Ok(Obj::from_shared(cell))
    }

    fn write(&self, value: &Obj, out: &mut dyn WireOutput, version: i64) -> Result<()> {
        let cell = self.typed(value)?;
        let borrowed = cell.try_borrow().map_err(|_| borrow_err(value))?;
        self.inner.write_fields(&borrowed, out, version)
    }

    fn prepare_for_lazy_loading(
        &self,
        value: &Obj,
        input: &mut dyn WireInput,
        version: i64,
    ) -> Result<()> {
        let cell = self.typed(value)?;
        let borrowed = cell.try_borrow().map_err(|_| borrow_err(value))?;
        self.inner.prepare_fields(&borrowed, input, version)
    }
}

/// A serializer for types whose value carries no members, such as marker types.
pub struct UnitSerializer<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> Default for UnitSerializer<T> {
    fn default() -> Self {
        UnitSerializer {
            _marker: PhantomData,
        }
    }
}

impl<T: Transportable + Default> ObjectSerializer for UnitSerializer<T> {
    type Target = T;

    fn write_fields(&self, _: &T, _: &mut dyn WireOutput, _: i64) -> Result<()> { Ok(()) }

    fn read_fields(&self, _: &Shared<T>, _: &mut dyn WireInput, _: i64) -> Result<()> { Ok(()) }
}
