//! Binding of type ids to serializers.
//!
//! A [`TypeRegistry`] holds a table of serializers sorted by type id and resolves ids by
//! binary search. An entry may be registered by name only; the instance is then constructed
//! through the registry's [`SerializerResolver`] the first time the id is looked up, and
//! kept for the lifetime of the registry. The registry is shared read-mostly state: wrap it
//! in an [`Arc`] and hand it to as many concurrent encode and decode passes as needed.

use crate::{
    containers::{ListSerializer, MapSerializer, SetSerializer},
    errors::*,
    rep::Obj,
    serializer::Serializer,
    stream::StreamSerializer,
};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::{any, collections::HashMap, fmt, sync::Arc};
use tracing::{debug, warn};

/// A signed integer identifying a transportable type.
pub type TypeId = i32;

pub const BOOL: TypeId = 1;
pub const INT8: TypeId = 2;
pub const INT16: TypeId = 3;
pub const WCHAR: TypeId = 4;
pub const INT32: TypeId = 5;
pub const INT64: TypeId = 6;
pub const FLOAT: TypeId = 7;
pub const DOUBLE: TypeId = 8;
/// Byte arrays. Only used as a container type argument.
pub const BYTES: TypeId = 9;
pub const STRING: TypeId = 10;
pub const LIST: TypeId = 12;
pub const MAP: TypeId = 13;
pub const SET: TypeId = 14;
pub const STREAM: TypeId = 15;
pub const STUB: TypeId = 16;
pub const DATE: TypeId = 17;
pub const VOID: TypeId = 19;
pub const EXCEPTION: TypeId = 20;
pub const OBJECT: TypeId = 21;
pub const VALUECLASS: TypeId = 22;
pub const PUBLISH_CLIENT: TypeId = 23;
pub const HTTP_REQUEST: TypeId = 24;
pub const HEADER: TypeId = 30;
/// The first id available to user types.
pub const MIN_USER: TypeId = 64;

/// Constructs serializer implementations by name.
pub trait SerializerResolver: Send + Sync {
    fn resolve(&self, name: &str) -> std::result::Result<Arc<dyn Serializer>, failure::Error>;
}

type Factory = Box<dyn Fn() -> std::result::Result<Arc<dyn Serializer>, failure::Error> + Send + Sync>;

/// A [`SerializerResolver`] backed by factories registered at process start.
///
/// # Example
///
/// ```
/// use graphwire::{prelude::*, registry::FactoryResolver};
///
/// #[derive(Default)]
/// struct Ping;
///
/// impl Transportable for Ping {
///     const TYPE_ID: TypeId = 64;
/// }
///
/// let resolver = FactoryResolver::new().with("Ping", || {
///     Ok(ObjectAdapter::arc(UnitSerializer::<Ping>::default()))
/// });
///
/// let registry = TypeRegistry::builder()
///     .resolver(resolver)
///     .register_lazy(64, "Ping")
///     .build()
///     .unwrap();
///
/// assert_eq!(registry.get(64).unwrap().type_id(), 64);
/// ```
#[derive(Default)]
pub struct FactoryResolver {
    factories: HashMap<String, Factory>,
}

impl FactoryResolver {
    pub fn new() -> Self { Self::default() }

    /// Adds a factory for `name`, replacing any earlier one.
    pub fn with<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> std::result::Result<Arc<dyn Serializer>, failure::Error> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
        self
    }
}

impl SerializerResolver for FactoryResolver {
    fn resolve(&self, name: &str) -> std::result::Result<Arc<dyn Serializer>, failure::Error> {
        match self.factories.get(name) {
            Some(factory) => factory(),
            None => Err(failure::format_err!("no factory registered for {:?}", name)),
        }
    }
}

struct RegisteredSerializer {
    type_id: TypeId,
    name: String,
    instance: OnceCell<Arc<dyn Serializer>>,
}

/// The sorted type id table plus the class to serializer cache.
pub struct TypeRegistry {
    serializers: Vec<RegisteredSerializer>,
    builtins: Vec<(TypeId, Arc<dyn Serializer>)>,
    resolver: Arc<dyn SerializerResolver>,
    classes: RwLock<HashMap<(any::TypeId, TypeId), Arc<dyn Serializer>>>,
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("serializers", &self.serializers.len())
            .field("classes", &self.classes.read().len())
            .finish()
    }
}

impl TypeRegistry {
    pub fn builder() -> RegistryBuilder { RegistryBuilder::default() }

    /// Resolves a type id.
    ///
    /// Ids below [`MIN_USER`] resolve to the built-in serializers; all others are searched
    /// in the sorted table. A named entry is constructed on its first lookup; concurrent
    /// first lookups of one id construct it once.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::Corrupt`] error naming the id if nothing is registered
    /// under it or its construction fails. A failed construction is retried on the next
    /// lookup.
    pub fn get(&self, type_id: TypeId) -> Result<Arc<dyn Serializer>> {
        if type_id < MIN_USER {
            return self
                .builtins
                .iter()
                .find(|(id, _)| *id == type_id)
                .map(|(_, ser)| ser.clone())
                .ok_or_else(|| no_serializer(type_id));
        }

        let index = self
            .serializers
            .binary_search_by_key(&type_id, |entry| entry.type_id)
            .map_err(|_| no_serializer(type_id))?;
        let entry = &self.serializers[index];
        entry
            .instance
            .get_or_try_init(|| {
                debug!(type_id, name = %entry.name, "constructing serializer");
                let ser = self.resolver.resolve(&entry.name)?;
                if ser.type_id() != type_id {
                    return Err(failure::format_err!(
                        "{:?} constructed a serializer for typeId={}",
                        entry.name,
                        ser.type_id()
                    ));
                }
                Ok(ser)
            })
            .map(Arc::clone)
            .map_err(|cause: failure::Error| {
                warn!(type_id, name = %entry.name, error = %cause, "serializer construction failed");
                no_serializer(type_id).with_cause(cause)
            })
    }

    /// Resolves the serializer for a value whose static type is erased, from the type id
    /// its class declares. The binding is memoized per class.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::Internal`] error if the value's type declares no type id;
    /// such values must be written with an explicit serializer.
    pub fn serializer_for(&self, value: &Obj) -> Result<Arc<dyn Serializer>> {
        let class = value.class();
        let type_id = class.type_id().ok_or_else(|| {
            WireError::internal(format!(
                "no serializer for {}: only types with a declared type id can be written \
                 without an explicit serializer",
                class.name()
            ))
        })?;
        let key = (class.rust_type(), type_id);

        if let Some(ser) = self.classes.read().get(&key) {
            return Ok(ser.clone());
        }

        let ser = self.get(type_id)?;
        let mut classes = self.classes.write();
        Ok(classes.entry(key).or_insert(ser).clone())
    }

    /// Indicates whether values of `type_id` are reference-tracked composites.
    pub fn is_composite_type_id(type_id: TypeId) -> bool {
        match type_id {
            LIST | MAP | SET | STREAM | EXCEPTION | OBJECT | HTTP_REQUEST | HEADER => true,
            id => id >= MIN_USER,
        }
    }

    /// Number of user entries in the table.
    pub fn len(&self) -> usize { self.serializers.len() }

    pub fn is_empty(&self) -> bool { self.serializers.is_empty() }
}

fn no_serializer(type_id: TypeId) -> WireError {
    WireError::corrupt(format!("No serializer for typeId={}", type_id))
}

enum Entry {
    Lazy(String),
    Ready(Arc<dyn Serializer>),
}

/// Collects the table of a [`TypeRegistry`].
///
/// Registration mistakes are reported by [`build`](RegistryBuilder::build).
#[derive(Default)]
pub struct RegistryBuilder {
    entries: Vec<(TypeId, Entry)>,
    resolver: Option<Arc<dyn SerializerResolver>>,
}

impl RegistryBuilder {
    /// Sets the resolver that constructs entries registered by name.
    pub fn resolver(mut self, resolver: impl SerializerResolver + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Registers a serializer to be constructed by name on first use.
    pub fn register_lazy(mut self, type_id: TypeId, name: impl Into<String>) -> Self {
        self.entries.push((type_id, Entry::Lazy(name.into())));
        self
    }

    /// Registers a constructed serializer under its own type id.
    pub fn register(mut self, ser: Arc<dyn Serializer>) -> Self {
        self.entries.push((ser.type_id(), Entry::Ready(ser)));
        self
    }

    /// Sorts the table and adds the built-in serializers.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::Internal`] error if an id is registered twice or a user
    /// entry uses a reserved id.
    pub fn build(self) -> Result<Arc<TypeRegistry>> {
        let mut serializers = Vec::with_capacity(self.entries.len());
        for (type_id, entry) in self.entries {
            if type_id < MIN_USER {
                return Err(WireError::internal(format!(
                    "typeId={} is reserved for built-in types",
                    type_id
                )));
            }
            let (name, instance) = match entry {
                Entry::Lazy(name) => (name, OnceCell::new()),
                Entry::Ready(ser) => (format!("typeId={}", type_id), OnceCell::from(ser)),
            };
            serializers.push(RegisteredSerializer {
                type_id,
                name,
                instance,
            });
        }

        serializers.sort_unstable_by_key(|entry| entry.type_id);
        if let Some(pair) = serializers.windows(2).find(|w| w[0].type_id == w[1].type_id) {
            return Err(WireError::internal(format!(
                "typeId={} is registered twice",
                pair[0].type_id
            )));
        }

        let builtins: Vec<(TypeId, Arc<dyn Serializer>)> = vec![
            (LIST, Arc::new(ListSerializer::<Option<Obj>>::new(LIST))),
            (MAP, Arc::new(MapSerializer::<Obj, Option<Obj>>::new(MAP))),
            (SET, Arc::new(SetSerializer::<Obj>::new(SET))),
            (STREAM, Arc::new(StreamSerializer)),
        ];

        Ok(Arc::new(TypeRegistry {
            serializers,
            builtins,
            resolver: self
                .resolver
                .unwrap_or_else(|| Arc::new(FactoryResolver::new())),
            classes: RwLock::new(HashMap::new()),
        }))
    }
}
