//! Handles on transportable values.
//!
//! Composite values travel through the codecs as shared, interior-mutable cells
//! ([`Shared<T>`]) so that identity survives a round trip: two fields holding clones of the
//! same [`Shared`] encode one body and one back-reference, and decode to two clones of one
//! cell again. Code that does not know the concrete type of a value (erased containers,
//! polymorphic fields) holds it as an [`Obj`].
//!
//! # Example
//!
//! ```
//! use graphwire::prelude::*;
//!
//! #[derive(Default)]
//! struct Point {
//!     x: i32,
//! }
//!
//! impl Transportable for Point {
//!     const TYPE_ID: TypeId = 100;
//! }
//!
//! let p = shared(Point { x: 1 });
//! let obj = Obj::from_shared(p.clone());
//!
//! assert_eq!(obj.type_id(), Some(100));
//! assert!(Rc::ptr_eq(&obj.downcast::<Point>().unwrap(), &p));
//! ```

use crate::{
    encoding::{WireInput, WireInputExt, WireOutput},
    errors::*,
    registry::{self, TypeId},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::{
    any::{self, Any},
    cell::RefCell,
    collections::{HashMap, HashSet},
    fmt,
    hash::{Hash, Hasher},
    rc::Rc,
};

/// A composite value with reference identity.
pub type Shared<T> = Rc<RefCell<T>>;

/// Wraps a value in a fresh [`Shared`] cell.
pub fn shared<T>(value: T) -> Shared<T> { Rc::new(RefCell::new(value)) }

/// A type that declares a stable type id.
///
/// The id is what lets a value of this type be written where only an erased [`Obj`] is
/// known; values of types without this declaration need an explicit serializer at the call
/// site.
pub trait Transportable: Any {
    /// The type id bound to this type in the registry.
    const TYPE_ID: TypeId;
}

/// Runtime class information of an [`Obj`].
#[derive(Copy, Clone, Debug)]
pub struct Class {
    rust_type: any::TypeId,
    name: &'static str,
    type_id: Option<TypeId>,
}

impl Class {
    fn of<T: Any>(type_id: Option<TypeId>) -> Self {
        Class {
            rust_type: any::TypeId::of::<T>(),
            name: any::type_name::<T>(),
            type_id,
        }
    }

    /// The Rust type held by the cell.
    pub fn rust_type(&self) -> any::TypeId { self.rust_type }

    pub fn name(&self) -> &'static str { self.name }

    /// The declared wire type id, if any.
    pub fn type_id(&self) -> Option<TypeId> { self.type_id }
}

/// A type-erased [`Shared`] cell.
///
/// Equality and hashing go by identity, never by content.
#[derive(Clone)]
pub struct Obj {
    cell: Rc<dyn Any>,
    class: Class,
}

impl Obj {
    /// Wraps `value` in a fresh cell.
    pub fn new<T: Transportable>(value: T) -> Self { Self::from_shared(shared(value)) }

    /// Erases a typed cell, keeping its identity and its declared type id.
    pub fn from_shared<T: Transportable>(cell: Shared<T>) -> Self {
        Self::with_type_id(cell, T::TYPE_ID)
    }

    /// Erases a cell whose type id is not a property of its Rust type, e.g. a `Vec<String>`
    /// registered as some list type.
    pub fn with_type_id<T: Any>(cell: Shared<T>, type_id: TypeId) -> Self {
        Obj {
            class: Class::of::<T>(Some(type_id)),
            cell: cell as Rc<dyn Any>,
        }
    }

    /// Erases a cell without a type id. Such a value can only be written with an explicit
    /// serializer.
    pub fn untyped<T: Any>(cell: Shared<T>) -> Self {
        Obj {
            class: Class::of::<T>(None),
            cell: cell as Rc<dyn Any>,
        }
    }

    pub fn class(&self) -> &Class { &self.class }

    pub fn type_id(&self) -> Option<TypeId> { self.class.type_id }

    pub fn type_name(&self) -> &'static str { self.class.name }

    /// Indicates whether the cell holds a `T`.
    pub fn is<T: Any>(&self) -> bool { self.class.rust_type == any::TypeId::of::<T>() }

    /// Recovers the typed cell, or `None` if it holds another type.
    pub fn downcast<T: Any>(&self) -> Option<Shared<T>> {
        Rc::downcast::<RefCell<T>>(self.cell.clone()).ok()
    }

    /// Indicates whether both handles point at the same cell.
    pub fn ptr_eq(&self, other: &Obj) -> bool { self.identity() == other.identity() }

    /// The address of the cell; unique among live objects.
    pub fn identity(&self) -> usize { Rc::as_ptr(&self.cell) as *const () as usize }
}

impl PartialEq for Obj {
    fn eq(&self, other: &Obj) -> bool { self.ptr_eq(other) }
}

impl Eq for Obj {}

impl Hash for Obj {
    fn hash<H: Hasher>(&self, state: &mut H) { self.identity().hash(state) }
}

impl fmt::Debug for Obj {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Obj({}@{:#x})", self.class.name, self.identity())
    }
}

/// The built-in list of erased objects.
impl Transportable for Vec<Option<Obj>> {
    const TYPE_ID: TypeId = registry::LIST;
}

/// The built-in map of erased objects.
impl Transportable for HashMap<Obj, Option<Obj>> {
    const TYPE_ID: TypeId = registry::MAP;
}

/// The built-in set of erased objects.
impl Transportable for HashSet<Obj> {
    const TYPE_ID: TypeId = registry::SET;
}

/// A type that can be an element, key or value of a container.
///
/// Elements are written positionally; the codec never emits a member name for them.
pub trait Element: Sized + 'static {
    /// The type id reported as the container's type argument.
    const TYPE_ID: TypeId;

    fn write_elem(&self, out: &mut dyn WireOutput) -> Result<()>;

    fn read_elem(input: &mut dyn WireInput) -> Result<Self>;

    /// Primes lazily loaded members reachable from this element.
    fn prepare_elem(&self, _input: &mut dyn WireInput) -> Result<()> { Ok(()) }
}

macro_rules! prim_element {
    ($t:ty, $id:expr, $put:ident, $get:ident) => {
        impl Element for $t {
            const TYPE_ID: TypeId = $id;

            fn write_elem(&self, out: &mut dyn WireOutput) -> Result<()> { out.$put("", *self) }

            fn read_elem(input: &mut dyn WireInput) -> Result<Self> { input.$get("") }
        }
    };
}

prim_element!(bool, registry::BOOL, put_bool, get_bool);
prim_element!(i8, registry::INT8, put_i8, get_i8);
prim_element!(i16, registry::INT16, put_i16, get_i16);
prim_element!(i32, registry::INT32, put_i32, get_i32);
prim_element!(i64, registry::INT64, put_i64, get_i64);
prim_element!(f32, registry::FLOAT, put_f32, get_f32);
prim_element!(f64, registry::DOUBLE, put_f64, get_f64);
prim_element!(char, registry::WCHAR, put_char, get_char);

impl Element for String {
    const TYPE_ID: TypeId = registry::STRING;

    fn write_elem(&self, out: &mut dyn WireOutput) -> Result<()> { out.put_str("", self) }

    fn read_elem(input: &mut dyn WireInput) -> Result<Self> { input.get_str("") }
}

impl Element for Bytes {
    const TYPE_ID: TypeId = registry::BYTES;

    fn write_elem(&self, out: &mut dyn WireOutput) -> Result<()> { out.put_bytes("", self) }

    fn read_elem(input: &mut dyn WireInput) -> Result<Self> { input.get_bytes("") }
}

impl Element for Option<DateTime<Utc>> {
    const TYPE_ID: TypeId = registry::DATE;

    fn write_elem(&self, out: &mut dyn WireOutput) -> Result<()> {
        out.put_date("", self.as_ref())
    }

    fn read_elem(input: &mut dyn WireInput) -> Result<Self> { input.get_date("") }
}

impl Element for Option<Obj> {
    const TYPE_ID: TypeId = registry::OBJECT;

    fn write_elem(&self, out: &mut dyn WireOutput) -> Result<()> {
        out.write_obj("", self.as_ref(), None)
    }

    fn read_elem(input: &mut dyn WireInput) -> Result<Self> { input.read_obj("", None) }

    fn prepare_elem(&self, input: &mut dyn WireInput) -> Result<()> {
        match self {
            Some(obj) => input.prepare_obj(obj, None),
            None => Ok(()),
        }
    }
}

impl Element for Obj {
    const TYPE_ID: TypeId = registry::OBJECT;

    fn write_elem(&self, out: &mut dyn WireOutput) -> Result<()> {
        out.write_obj("", Some(self), None)
    }

    fn read_elem(input: &mut dyn WireInput) -> Result<Self> {
        input
            .read_obj("", None)?
            .ok_or_else(|| WireError::corrupt("null where a non-null element was required"))
    }

    fn prepare_elem(&self, input: &mut dyn WireInput) -> Result<()> {
        input.prepare_obj(self, None)
    }
}

impl<T: Transportable> Element for Shared<T> {
    const TYPE_ID: TypeId = T::TYPE_ID;

    fn write_elem(&self, out: &mut dyn WireOutput) -> Result<()> {
        out.write_obj("", Some(&Obj::from_shared(self.clone())), None)
    }

    fn read_elem(input: &mut dyn WireInput) -> Result<Self> {
        input
            .get_shared::<T>("")?
            .ok_or_else(|| WireError::corrupt("null where a non-null element was required"))
    }

    fn prepare_elem(&self, input: &mut dyn WireInput) -> Result<()> {
        input.prepare_obj(&Obj::from_shared(self.clone()), None)
    }
}

/// A type argument of a container serializer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TypeArg {
    pub type_id: TypeId,
    pub name: &'static str,
}

impl TypeArg {
    /// The type argument describing element type `E`.
    ///
    /// # Example
    ///
    /// ```
    /// use graphwire::{prelude::*, registry};
    ///
    /// assert_eq!(TypeArg::of::<String>().type_id, registry::STRING);
    /// ```
    pub fn of<E: Element>() -> Self {
        TypeArg {
            type_id: E::TYPE_ID,
            name: any::type_name::<E>(),
        }
    }
}
