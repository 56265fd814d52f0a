use super::{decode_base64, parse_date, parse_long, TextWire};
use crate::{
    config::WireConfig,
    encoding::{constants::*, WireInput},
    errors::*,
    fieldmap::FieldMap,
    reference::DecodeRefs,
    registry::{TypeId, TypeRegistry},
    rep::Obj,
    serializer::{Serializer, Shape},
    stream::LazyLoad,
    value::JsonValue,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use num_traits::{NumCast, PrimInt};
use std::{sync::Arc, vec};
use tracing::trace;

enum Frame {
    /// A single value waiting to be consumed: the root, or a container's items.
    Pending(Option<JsonValue>),
    Object(FieldMap<String, JsonValue>),
    Seq(vec::IntoIter<JsonValue>),
}

/// Reads one message in the text format.
///
/// The message is tokenized into a tree up front; serializers then consume it member by
/// member. Members a serializer does not ask for are ignored, and members it asks for that
/// are missing read as zero values.
pub struct TextInput {
    frames: Vec<Frame>,
    refs: DecodeRefs,
    lazy: LazyLoad,
    registry: Arc<TypeRegistry>,
    version: i64,
    max_depth: usize,
}

fn corrupt_member(field: &str, expected: &str, found: &JsonValue) -> WireError {
    WireError::corrupt(format!("member {:?}: expected {}, found {}", field, expected, found))
}

impl TextInput {
    /// Tokenizes `data`.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::Corrupt`] error if `data` is not exactly one well-formed
    /// value.
    pub fn new(
        registry: Arc<TypeRegistry>,
        data: &[u8],
        config: &WireConfig,
        version: i64,
    ) -> Result<Self> {
        let root = TextWire::from_bytes(data, config)?.parse_document()?;
        Ok(TextInput {
            frames: vec![Frame::Pending(Some(root))],
            refs: DecodeRefs::new(),
            lazy: LazyLoad::default(),
            registry,
            version,
            max_depth: config.max_depth,
        })
    }

    fn push(&mut self, frame: Frame) -> Result<()> {
        if self.frames.len() > self.max_depth {
            return Err(WireError::corrupt(format!(
                "message nests deeper than {} levels",
                self.max_depth
            )));
        }
        self.frames.push(frame);
        Ok(())
    }

    /// Takes the next value: the named member inside an object body, otherwise the next
    /// positional value.
    fn take(&mut self, field: &str) -> Result<Option<JsonValue>> {
        match self.frames.last_mut() {
            Some(Frame::Pending(value)) => Ok(value.take()),
            Some(Frame::Object(members)) => Ok(members.remove(field)),
            Some(Frame::Seq(items)) => items
                .next()
                .map(Some)
                .ok_or_else(|| WireError::corrupt("read past the end of a sequence")),
            None => Err(WireError::internal("read after the message was consumed")),
        }
    }

    /// Takes the next value, mapping null, `undefined` and missing members to `None`.
    fn take_present(&mut self, field: &str) -> Result<Option<JsonValue>> {
        Ok(self.take(field)?.filter(|v| !v.is_null()))
    }

    fn take_long(&mut self, field: &str) -> Result<i64> {
        match self.take_present(field)? {
            None => Ok(0),
            Some(JsonValue::Number(n)) if n.fract() == 0.0 && n.abs() <= 9.007_199_254_740_992e15 => {
                Ok(n as i64)
            }
            Some(JsonValue::String(s)) => parse_long(&s),
            Some(other) => Err(corrupt_member(field, "an integer", &other)),
        }
    }

    fn take_int<T: PrimInt>(&mut self, field: &str) -> Result<T> {
        let v = self.take_long(field)?;
        <T as NumCast>::from(v).ok_or_else(|| {
            WireError::corrupt(format!(
                "member {:?}: {} is out of range for {}",
                field,
                v,
                std::any::type_name::<T>()
            ))
        })
    }

    fn take_string(&mut self, field: &str) -> Result<String> {
        match self.take_present(field)? {
            None => Ok(String::new()),
            Some(JsonValue::String(s)) => Ok(s),
            Some(other) => Err(corrupt_member(field, "a string", &other)),
        }
    }

    fn resolve_ref(&self, members: &FieldMap<String, JsonValue>) -> Option<Result<Obj>> {
        if members.len() != 1 {
            return None;
        }
        let id = members.get(REF_MEMBER)?;
        Some(match id.as_f64() {
            Some(n) if n.fract() == 0.0 && n <= 0.0 && n > <f64 as From<i32>>::from(i32::min_value()) => {
                trace!(id = -n, "back-reference");
                self.refs.resolve(-(n as i32))
            }
            _ => Err(corrupt_member(REF_MEMBER, "a negative reference id", id)),
        })
    }

    fn read_body(&mut self, frame: Frame, ser: &dyn Serializer) -> Result<Obj> {
        self.push(frame)?;
        let before = self.refs.len();
        let version = self.version;
        let obj = ser.read(None, self, version)?;
        self.frames.pop();

        match self.refs.get(before) {
            Some(registered) if registered.ptr_eq(&obj) => Ok(obj),
            _ => Err(WireError::internal(format!(
                "serializer for typeId={} did not register the value it created",
                ser.type_id()
            ))),
        }
    }
}

impl WireInput for TextInput {
    fn registry(&self) -> &Arc<TypeRegistry> { &self.registry }

    fn version(&self) -> i64 { self.version }

    fn get_bool(&mut self, field: &str) -> Result<bool> {
        match self.take_present(field)? {
            None => Ok(false),
            Some(JsonValue::Bool(b)) => Ok(b),
            Some(other) => Err(corrupt_member(field, "a boolean", &other)),
        }
    }

    fn get_i8(&mut self, field: &str) -> Result<i8> { self.take_int(field) }

    fn get_i16(&mut self, field: &str) -> Result<i16> { self.take_int(field) }

    fn get_i32(&mut self, field: &str) -> Result<i32> { self.take_int(field) }

    fn get_i64(&mut self, field: &str) -> Result<i64> { self.take_long(field) }

    fn get_f32(&mut self, field: &str) -> Result<f32> { self.get_f64(field).map(|v| v as f32) }

    fn get_f64(&mut self, field: &str) -> Result<f64> {
        match self.take_present(field)? {
            None => Ok(0.0),
            Some(JsonValue::Number(n)) => Ok(n),
            Some(JsonValue::String(s)) => s
                .parse::<f64>()
                .map_err(|_| corrupt_member(field, "a number", &JsonValue::String(s))),
            Some(other) => Err(corrupt_member(field, "a number", &other)),
        }
    }

    fn get_char(&mut self, field: &str) -> Result<char> {
        Ok(self.take_string(field)?.chars().next().unwrap_or('\0'))
    }

    fn get_str(&mut self, field: &str) -> Result<String> { self.take_string(field) }

    fn get_bytes(&mut self, field: &str) -> Result<Bytes> {
        let s = self.take_string(field)?;
        decode_base64(&s)
    }

    fn get_date(&mut self, field: &str) -> Result<Option<DateTime<Utc>>> {
        match self.take_present(field)? {
            None => Ok(None),
            Some(JsonValue::String(s)) => Ok(parse_date(&s)),
            Some(other) => Err(corrupt_member(field, "a date", &other)),
        }
    }

    fn begin_seq(&mut self) -> Result<usize> {
        match self.take("")? {
            Some(JsonValue::Array(items)) => {
                let len = items.len();
                self.push(Frame::Seq(items.into_iter()))?;
                Ok(len)
            }
            Some(other) => Err(corrupt_member("", "an array", &other)),
            None => Err(WireError::corrupt("expected an array, found nothing")),
        }
    }

    fn end_seq(&mut self) -> Result<()> {
        match self.frames.pop() {
            Some(Frame::Seq(rest)) if rest.len() == 0 => Ok(()),
            Some(Frame::Seq(rest)) => Err(WireError::corrupt(format!(
                "{} unread items left in a sequence",
                rest.len()
            ))),
            _ => Err(WireError::internal("end_seq without a matching begin_seq")),
        }
    }

    fn read_obj(&mut self, field: &str, ser: Option<&dyn Serializer>) -> Result<Option<Obj>> {
        let mut members = match self.take_present(field)? {
            None => return Ok(None),
            Some(JsonValue::Object(members)) => members,
            Some(JsonValue::Array(items)) => {
                let ser = match ser {
                    Some(ser) if ser.shape() == Shape::Array => ser,
                    _ => {
                        return Err(WireError::corrupt(format!(
                            "member {:?}: an array is only valid for a statically known \
                             container",
                            field
                        )))
                    }
                };
                let frame = Frame::Pending(Some(JsonValue::Array(items)));
                return self.read_body(frame, ser).map(Some);
            }
            Some(other) => return Err(corrupt_member(field, "an object", &other)),
        };

        if let Some(resolved) = self.resolve_ref(&members) {
            return resolved.map(Some);
        }

        let wire_id = match members.remove(TYPE_ID_MEMBER) {
            Some(JsonValue::Number(n)) if n.fract() == 0.0 && n.abs() <= <f64 as From<i32>>::from(i32::max_value()) => {
                Some(n as TypeId)
            }
            Some(other) => return Err(corrupt_member(TYPE_ID_MEMBER, "a type id", &other)),
            None => None,
        };
        if let Some(id) = wire_id.filter(|id| !TypeRegistry::is_composite_type_id(*id)) {
            return Err(WireError::corrupt(format!(
                "member {:?}: typeId={} does not name a composite type",
                field, id
            )));
        }

        let resolved;
        let ser = match (ser, wire_id) {
            (Some(ser), Some(id)) if ser.type_id() != id => {
                return Err(WireError::corrupt(format!(
                    "member {:?}: expected typeId={}, found typeId={}",
                    field,
                    ser.type_id(),
                    id
                )))
            }
            (Some(ser), _) => ser,
            (None, Some(id)) => {
                resolved = self.registry.get(id)?;
                &*resolved
            }
            (None, None) => {
                return Err(WireError::corrupt(format!(
                    "member {:?}: object without {}",
                    field, TYPE_ID_MEMBER
                )))
            }
        };

        let frame = match ser.shape() {
            Shape::Array => Frame::Pending(members.remove(ITEMS_MEMBER)),
            Shape::Object => Frame::Object(members),
        };
        self.read_body(frame, ser).map(Some)
    }

    fn on_object_created(&mut self, obj: Obj) -> Result<()> {
        let id = self.refs.register(obj)?;
        trace!(id, "registered object");
        Ok(())
    }

    fn lazy_load(&mut self) -> &mut LazyLoad { &mut self.lazy }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(text: &str) -> TextInput {
        let registry = TypeRegistry::builder().build().unwrap();
        TextInput::new(registry, text.as_bytes(), &WireConfig::default(), 1).unwrap()
    }

    #[test]
    fn missing_members_read_as_zero() {
        let registry = TypeRegistry::builder().build().unwrap();
        let mut input =
            TextInput::new(registry, b"{}", &WireConfig::default(), 1).unwrap();
        input.frames = vec![Frame::Object(FieldMap::new())];
        assert_eq!(input.get_i32("a").unwrap(), 0);
        assert_eq!(input.get_str("b").unwrap(), "");
        assert_eq!(input.get_char("c").unwrap(), '\0');
        assert_eq!(input.get_date("d").unwrap(), None);
        assert!(input.get_bytes("e").unwrap().is_empty());
    }

    #[test]
    fn integers_accept_numbers_and_long_text() {
        let mut seq = input(r#"[5,"6.","0x10",300,"-1."]"#);
        assert_eq!(seq.begin_seq().unwrap(), 5);
        assert_eq!(seq.get_i32("").unwrap(), 5);
        assert_eq!(seq.get_i64("").unwrap(), 6);
        assert_eq!(seq.get_i64("").unwrap(), 16);
        assert!(seq.get_i8("").unwrap_err().is_corrupt());
        assert_eq!(seq.get_i16("").unwrap(), -1);
        seq.end_seq().unwrap();
    }

    #[test]
    fn unread_items_are_corrupt() {
        let mut seq = input("[1,2]");
        seq.begin_seq().unwrap();
        seq.get_i32("").unwrap();
        assert!(seq.end_seq().unwrap_err().is_corrupt());
    }

    #[test]
    fn references_must_resolve() {
        assert!(input(r#"{"*i":-1}"#).read_obj("", None).unwrap_err().is_corrupt());
        assert!(input(r#"{"*i":0}"#).read_obj("", None).unwrap_err().is_corrupt());
        assert!(input(r#"{"_typeId":4242}"#).read_obj("", None).unwrap_err().is_corrupt());
        assert!(input(r#"{"x":1}"#).read_obj("", None).unwrap_err().is_corrupt());
        assert_eq!(input("null").read_obj("", None).unwrap(), None);
    }

    #[test]
    fn erased_list() {
        let obj = input(r#"{"_typeId":12,"_items":[null,{"*i":-1}]}"#)
            .read_obj("", None)
            .unwrap()
            .unwrap();
        let list = obj.downcast::<Vec<Option<Obj>>>().unwrap();
        let list = list.borrow();
        assert_eq!(list.len(), 2);
        assert!(list[0].is_none());
        assert!(list[1].as_ref().unwrap().ptr_eq(&obj));
    }
}
