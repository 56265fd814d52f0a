pub use crate::{
    config::WireConfig,
    containers::{ListSerializer, MapSerializer, SetSerializer},
    encoding::{
        decode, decode_lazy, decode_value, encode, encode_value, WireFormat, WireInput,
        WireInputExt, WireOutput, WireOutputExt,
    },
    errors::{ErrorKind, Result, WireError},
    registry::{TypeId, TypeRegistry},
    rep::{shared, Element, Obj, Shared, Transportable, TypeArg},
    serializer::{ObjectAdapter, ObjectSerializer, Serializer, Shape, UnitSerializer},
    stream::LazyStream,
    value::JsonValue,
};
pub use bytes::Bytes;
pub use std::rc::Rc;
