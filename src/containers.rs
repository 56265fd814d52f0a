//! Serializers of lists, sets and maps.
//!
//! A container serializer is instantiated for concrete element types and bound to a type
//! id: the built-in ids [`LIST`], [`MAP`] and [`SET`] hold erased objects, any other
//! instantiation is registered under a user id. On the wire a container is a sequence: its
//! length followed by its items, and for maps the keys and values alternating.
//!
//! [`LIST`]: crate::registry::LIST
//! [`MAP`]: crate::registry::MAP
//! [`SET`]: crate::registry::SET
//!
//! # Example
//!
//! ```
//! use graphwire::prelude::*;
//!
//! let strings = ListSerializer::<String>::with_type_args(70, &[TypeArg::of::<String>()]);
//! assert!(strings.is_ok());
//!
//! // a map needs two type arguments
//! let err = MapSerializer::<String, i32>::with_type_args(71, &[TypeArg::of::<String>()]);
//! assert!(err.unwrap_err().is_internal());
//! ```

use crate::{
    encoding::{WireInput, WireOutput},
    errors::*,
    registry::TypeId,
    rep::{shared, Element, Obj, Shared, TypeArg},
    serializer::{Serializer, Shape},
};
use std::{
    any::Any,
    collections::{HashMap, HashSet},
    fmt,
    hash::Hash,
    marker::PhantomData,
};

fn check_type_args(type_id: TypeId, given: &[TypeArg], expected: &[TypeArg]) -> Result<()> {
    if given.len() != expected.len() {
        return Err(WireError::internal(format!(
            "container typeId={} takes {} type arguments, {} given",
            type_id,
            expected.len(),
            given.len()
        )));
    }
    for (i, (g, e)) in given.iter().zip(expected).enumerate() {
        if g.type_id != e.type_id {
            return Err(WireError::internal(format!(
                "type argument {} of container typeId={}: expected {} (typeId={}), found {} \
                 (typeId={})",
                i, type_id, e.name, e.type_id, g.name, g.type_id
            )));
        }
    }
    Ok(())
}

fn typed<C: Any>(type_id: TypeId, value: &Obj) -> Result<Shared<C>> {
    value.downcast::<C>().ok_or_else(|| {
        WireError::internal(format!(
            "serializer for typeId={} cannot handle a value of type {}",
            type_id,
            value.type_name()
        ))
    })
}

fn borrow_err(value: &Obj) -> WireError {
    WireError::internal(format!("{:?} is mutably borrowed while being written", value))
}

/// Reuses `target` if it holds a `C`, emptied, or allocates with `alloc`, and registers the
/// result before any item is read.
fn allocate<C: Any>(
    type_id: TypeId,
    target: Option<Obj>,
    input: &mut dyn WireInput,
    clear: impl FnOnce(&mut C),
    alloc: impl FnOnce() -> C,
) -> Result<Shared<C>> {
    let cell = match target.and_then(|t| t.downcast::<C>()) {
        Some(cell) => {
            clear(&mut cell.borrow_mut());
            cell
        }
        None => shared(alloc()),
    };
    input.on_object_created(Obj::with_type_id(cell.clone(), type_id))?;
    Ok(cell)
}

/// Serializer of `Vec<E>`.
pub struct ListSerializer<E> {
    type_id: TypeId,
    _marker: PhantomData<fn() -> E>,
}

impl<E> fmt::Debug for ListSerializer<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ListSerializer(typeId={})", self.type_id)
    }
}

impl<E: Element> ListSerializer<E> {
    pub fn new(type_id: TypeId) -> Self {
        ListSerializer {
            type_id,
            _marker: PhantomData,
        }
    }

    /// Creates the serializer after checking the declared type arguments.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::Internal`] error unless `args` is exactly the element type.
    pub fn with_type_args(type_id: TypeId, args: &[TypeArg]) -> Result<Self> {
        check_type_args(type_id, args, &[TypeArg::of::<E>()])?;
        Ok(Self::new(type_id))
    }
}

impl<E: Element> Serializer for ListSerializer<E> {
    fn type_id(&self) -> TypeId { self.type_id }

    fn shape(&self) -> Shape { Shape::Array }

    fn read(&self, target: Option<Obj>, input: &mut dyn WireInput, _version: i64) -> Result<Obj> {
        let len = input.begin_seq()?;
        let cell = allocate(self.type_id, target, input, Vec::<E>::clear, || {
            Vec::with_capacity(len)
        })?;
        for _ in 0..len {
            let item = E::read_elem(input)?;
            cell.borrow_mut().push(item);
        }
        input.end_seq()?;
        Ok(Obj::with_type_id(cell, self.type_id))
    }

    fn write(&self, value: &Obj, out: &mut dyn WireOutput, _version: i64) -> Result<()> {
        let cell = typed::<Vec<E>>(self.type_id, value)?;
        let items = cell.try_borrow().map_err(|_| borrow_err(value))?;
        out.begin_seq(items.len())?;
        for item in items.iter() {
            item.write_elem(out)?;
        }
        out.end_seq()
    }

    fn prepare_for_lazy_loading(
        &self,
        value: &Obj,
        input: &mut dyn WireInput,
        _version: i64,
    ) -> Result<()> {
        let cell = typed::<Vec<E>>(self.type_id, value)?;
        let items = cell.try_borrow().map_err(|_| borrow_err(value))?;
        items.iter().try_for_each(|item| item.prepare_elem(input))
    }
}

/// Serializer of `HashSet<E>`.
pub struct SetSerializer<E> {
    type_id: TypeId,
    _marker: PhantomData<fn() -> E>,
}

impl<E> fmt::Debug for SetSerializer<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SetSerializer(typeId={})", self.type_id)
    }
}

impl<E: Element + Hash + Eq> SetSerializer<E> {
    pub fn new(type_id: TypeId) -> Self {
        SetSerializer {
            type_id,
            _marker: PhantomData,
        }
    }

    /// Creates the serializer after checking the declared type arguments.
    pub fn with_type_args(type_id: TypeId, args: &[TypeArg]) -> Result<Self> {
        check_type_args(type_id, args, &[TypeArg::of::<E>()])?;
        Ok(Self::new(type_id))
    }
}

impl<E: Element + Hash + Eq> Serializer for SetSerializer<E> {
    fn type_id(&self) -> TypeId { self.type_id }

    fn shape(&self) -> Shape { Shape::Array }

    fn read(&self, target: Option<Obj>, input: &mut dyn WireInput, _version: i64) -> Result<Obj> {
        let len = input.begin_seq()?;
        let cell = allocate(self.type_id, target, input, HashSet::<E>::clear, || {
            HashSet::with_capacity(len)
        })?;
        for _ in 0..len {
            let item = E::read_elem(input)?;
            cell.borrow_mut().insert(item);
        }
        input.end_seq()?;
        Ok(Obj::with_type_id(cell, self.type_id))
    }

    fn write(&self, value: &Obj, out: &mut dyn WireOutput, _version: i64) -> Result<()> {
        let cell = typed::<HashSet<E>>(self.type_id, value)?;
        let items = cell.try_borrow().map_err(|_| borrow_err(value))?;
        out.begin_seq(items.len())?;
        for item in items.iter() {
            item.write_elem(out)?;
        }
        out.end_seq()
    }

    fn prepare_for_lazy_loading(
        &self,
        value: &Obj,
        input: &mut dyn WireInput,
        _version: i64,
    ) -> Result<()> {
        let cell = typed::<HashSet<E>>(self.type_id, value)?;
        let items = cell.try_borrow().map_err(|_| borrow_err(value))?;
        items.iter().try_for_each(|item| item.prepare_elem(input))
    }
}

/// Serializer of `HashMap<K, V>`. Entries are written as a flat sequence of `2 * len`
/// items, each key followed by its value.
pub struct MapSerializer<K, V> {
    type_id: TypeId,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> fmt::Debug for MapSerializer<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "MapSerializer(typeId={})", self.type_id)
    }
}

impl<K: Element + Hash + Eq, V: Element> MapSerializer<K, V> {
    pub fn new(type_id: TypeId) -> Self {
        MapSerializer {
            type_id,
            _marker: PhantomData,
        }
    }

    /// Creates the serializer after checking the declared key and value types.
    pub fn with_type_args(type_id: TypeId, args: &[TypeArg]) -> Result<Self> {
        check_type_args(type_id, args, &[TypeArg::of::<K>(), TypeArg::of::<V>()])?;
        Ok(Self::new(type_id))
    }
}

impl<K: Element + Hash + Eq, V: Element> Serializer for MapSerializer<K, V> {
    fn type_id(&self) -> TypeId { self.type_id }

    fn shape(&self) -> Shape { Shape::Array }

    fn read(&self, target: Option<Obj>, input: &mut dyn WireInput, _version: i64) -> Result<Obj> {
        let items = input.begin_seq()?;
        if items % 2 != 0 {
            return Err(WireError::corrupt(format!(
                "map typeId={} has an odd number of items ({})",
                self.type_id, items
            )));
        }
        let len = items / 2;
        let cell = allocate(self.type_id, target, input, HashMap::<K, V>::clear, || {
            HashMap::with_capacity(len)
        })?;
        for _ in 0..len {
            let key = K::read_elem(input)?;
            let value = V::read_elem(input)?;
            cell.borrow_mut().insert(key, value);
        }
        input.end_seq()?;
        Ok(Obj::with_type_id(cell, self.type_id))
    }

    fn write(&self, value: &Obj, out: &mut dyn WireOutput, _version: i64) -> Result<()> {
        let cell = typed::<HashMap<K, V>>(self.type_id, value)?;
        let entries = cell.try_borrow().map_err(|_| borrow_err(value))?;
        out.begin_seq(entries.len() * 2)?;
        for (k, v) in entries.iter() {
            k.write_elem(out)?;
            v.write_elem(out)?;
        }
        out.end_seq()
    }

    fn prepare_for_lazy_loading(
        &self,
        value: &Obj,
        input: &mut dyn WireInput,
        _version: i64,
    ) -> Result<()> {
        let cell = typed::<HashMap<K, V>>(self.type_id, value)?;
        let entries = cell.try_borrow().map_err(|_| borrow_err(value))?;
        for (k, v) in entries.iter() {
            k.prepare_elem(input)?;
            v.prepare_elem(input)?;
        }
        Ok(())
    }
}
