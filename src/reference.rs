//! Per-message object reference tables.
//!
//! Composite values are numbered in the order they are first met, starting at 1, on both
//! sides of the wire. The encoder writes a back-reference (the negated id) for any value it
//! has already numbered; the decoder registers every value right after allocating it, so
//! that a back-reference nested inside the value's own members resolves to the same
//! instance. A table lives for exactly one message.

use crate::{errors::*, rep::Obj};
use std::collections::HashMap;

/// The id following `count` numbered objects.
fn next_id(count: usize) -> Result<i32> {
    count
        .checked_add(1)
        .and_then(|id| i32::try_from(id).ok())
        .ok_or_else(|| WireError::internal("too many objects in one message"))
}

/// Encode side: object identity to assigned id.
#[derive(Debug, Default)]
pub struct EncodeRefs {
    ids: HashMap<usize, i32>,
    // Keeps numbered objects alive so that their addresses are not reused mid-message.
    pinned: Vec<Obj>,
}

impl EncodeRefs {
    pub fn new() -> Self { Self::default() }

    /// The id already assigned to `obj`, if any.
    pub fn lookup(&self, obj: &Obj) -> Option<i32> { self.ids.get(&obj.identity()).copied() }

    /// Assigns the next sequential id to `obj`.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::Internal`] error if `obj` is already numbered or the id space
    /// is exhausted.
    pub fn assign(&mut self, obj: &Obj) -> Result<i32> {
        if self.ids.contains_key(&obj.identity()) {
            return Err(WireError::internal(format!(
                "{:?} was assigned a reference id twice",
                obj
            )));
        }
        let id = next_id(self.pinned.len())?;
        self.ids.insert(obj.identity(), id);
        self.pinned.push(obj.clone());
        Ok(id)
    }

    /// Number of objects numbered so far.
    pub fn len(&self) -> usize { self.pinned.len() }

    pub fn is_empty(&self) -> bool { self.pinned.is_empty() }
}

/// Decode side: sequential id to materialized object.
#[derive(Debug, Default)]
pub struct DecodeRefs {
    objects: Vec<Obj>,
}

impl DecodeRefs {
    pub fn new() -> Self { Self::default() }

    /// Registers a freshly allocated object under the next id, returning that id.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::Internal`] error if the id space is exhausted.
    pub fn register(&mut self, obj: Obj) -> Result<i32> {
        let id = next_id(self.objects.len())?;
        self.objects.push(obj);
        Ok(id)
    }

    /// Resolves a back-reference id.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::Corrupt`] error if no object was registered under `id`.
    pub fn resolve(&self, id: i32) -> Result<Obj> {
        usize::try_from(id)
            .ok()
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| self.objects.get(i))
            .cloned()
            .ok_or_else(|| {
                WireError::corrupt(format!(
                    "reference id {} does not name one of the {} objects read so far",
                    id,
                    self.objects.len()
                ))
            })
    }

    /// The object registered at zero-based position `index`.
    pub fn get(&self, index: usize) -> Option<&Obj> { self.objects.get(index) }

    pub fn len(&self) -> usize { self.objects.len() }

    pub fn is_empty(&self) -> bool { self.objects.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rep::{shared, Obj};

    #[test]
    fn ids_are_sequential_from_one() {
        let mut refs = EncodeRefs::new();
        let a = Obj::untyped(shared(1u8));
        let b = Obj::untyped(shared(2u8));
        assert_eq!(refs.lookup(&a), None);
        assert_eq!(refs.assign(&a).unwrap(), 1);
        assert_eq!(refs.assign(&b).unwrap(), 2);
        assert_eq!(refs.lookup(&a.clone()), Some(1));
        assert!(refs.assign(&b).unwrap_err().is_internal());
    }

    #[test]
    fn resolve_rejects_unknown_ids() {
        let mut refs = DecodeRefs::new();
        let a = Obj::untyped(shared("a"));
        assert_eq!(refs.register(a.clone()).unwrap(), 1);
        assert!(refs.resolve(1).unwrap().ptr_eq(&a));
        for bad in &[0, 2, -1, i32::min_value()] {
            assert!(refs.resolve(*bad).unwrap_err().is_corrupt());
        }
    }

    #[test]
    fn ids_stop_at_the_end_of_the_id_space() {
        assert_eq!(next_id(0).unwrap(), 1);
        assert_eq!(next_id(i32::max_value() as usize - 1).unwrap(), i32::max_value());
        assert!(next_id(i32::max_value() as usize).unwrap_err().is_internal());
        assert!(next_id(usize::max_value()).unwrap_err().is_internal());
    }
}
