use super::TextWire;
use crate::{
    config::WireConfig,
    encoding::{constants::*, WireOutput},
    errors::*,
    reference::EncodeRefs,
    registry::TypeRegistry,
    rep::Obj,
    serializer::{Serializer, Shape},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::trace;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Frame {
    Root,
    Object,
    Seq,
}

/// Writes one message in the text format.
///
/// Member names are written inside object bodies only; sequence items and the root value
/// are unnamed.
pub struct TextOutput {
    wire: TextWire,
    frames: Vec<Frame>,
    refs: EncodeRefs,
    registry: Arc<TypeRegistry>,
    version: i64,
    max_depth: usize,
}

impl TextOutput {
    pub fn new(registry: Arc<TypeRegistry>, config: &WireConfig, version: i64) -> Self {
        TextOutput {
            wire: TextWire::new(config),
            frames: vec![Frame::Root],
            refs: EncodeRefs::new(),
            registry,
            version,
            max_depth: config.max_depth,
        }
    }

    /// Consumes the output, returning the message.
    pub fn finish(self) -> Bytes { self.wire.into_bytes() }

    fn name<'f>(&self, field: &'f str) -> Option<&'f str> {
        match self.frames.last() {
            Some(Frame::Object) => Some(field),
            _ => None,
        }
    }

    fn push(&mut self, frame: Frame) -> Result<()> {
        if self.frames.len() > self.max_depth {
            return Err(WireError::internal(format!(
                "object graph nests deeper than {} levels",
                self.max_depth
            )));
        }
        self.frames.push(frame);
        Ok(())
    }

    fn pop(&mut self) { self.frames.pop(); }

    fn write_body(
        &mut self,
        name: Option<&str>,
        obj: &Obj,
        ser: &dyn Serializer,
        erased: bool,
    ) -> Result<()> {
        let version = self.version;
        match ser.shape() {
            Shape::Array if !erased => {
                if let Some(name) = name {
                    self.wire.begin_element(name)?;
                }
                ser.write(obj, self, version)
            }
            Shape::Array => {
                self.wire.begin_object(name)?;
                self.wire.put_int(Some(TYPE_ID_MEMBER), ser.type_id())?;
                self.wire.begin_element(ITEMS_MEMBER)?;
                self.push(Frame::Root)?;
                ser.write(obj, self, version)?;
                self.pop();
                self.wire.end_object()
            }
            Shape::Object => {
                self.wire.begin_object(name)?;
                self.wire.put_int(Some(TYPE_ID_MEMBER), ser.type_id())?;
                self.push(Frame::Object)?;
                ser.write(obj, self, version)?;
                self.pop();
                self.wire.end_object()
            }
        }
    }
}

impl WireOutput for TextOutput {
    fn registry(&self) -> &Arc<TypeRegistry> { &self.registry }

    fn version(&self) -> i64 { self.version }

    fn put_bool(&mut self, field: &str, v: bool) -> Result<()> {
        let name = self.name(field);
        self.wire.put_bool(name, v)
    }

    fn put_i8(&mut self, field: &str, v: i8) -> Result<()> {
        let name = self.name(field);
        self.wire.put_int(name, i32::from(v))
    }

    fn put_i16(&mut self, field: &str, v: i16) -> Result<()> {
        let name = self.name(field);
        self.wire.put_int(name, i32::from(v))
    }

    fn put_i32(&mut self, field: &str, v: i32) -> Result<()> {
        let name = self.name(field);
        self.wire.put_int(name, v)
    }

    fn put_i64(&mut self, field: &str, v: i64) -> Result<()> {
        let name = self.name(field);
        self.wire.put_long(name, v)
    }

    fn put_f32(&mut self, field: &str, v: f32) -> Result<()> {
        let name = self.name(field);
        self.wire.put_float(name, v)
    }

    fn put_f64(&mut self, field: &str, v: f64) -> Result<()> {
        let name = self.name(field);
        self.wire.put_double(name, v)
    }

    fn put_char(&mut self, field: &str, v: char) -> Result<()> {
        let name = self.name(field);
        self.wire.put_char(name, v)
    }

    fn put_str(&mut self, field: &str, v: &str) -> Result<()> {
        let name = self.name(field);
        self.wire.put_string(name, v)
    }

    fn put_bytes(&mut self, field: &str, v: &[u8]) -> Result<()> {
        let name = self.name(field);
        self.wire.put_bytes(name, v)
    }

    fn put_date(&mut self, field: &str, v: Option<&DateTime<Utc>>) -> Result<()> {
        let name = self.name(field);
        self.wire.put_date(name, v)
    }

    fn begin_seq(&mut self, _len: usize) -> Result<()> {
        self.wire.begin_array(None)?;
        self.push(Frame::Seq)
    }

    fn end_seq(&mut self) -> Result<()> {
        self.pop();
        self.wire.end_array()
    }

    fn write_obj(
        &mut self,
        field: &str,
        value: Option<&Obj>,
        ser: Option<&dyn Serializer>,
    ) -> Result<()> {
        let name = self.name(field);
        let obj = match value {
            Some(obj) => obj,
            None => return self.wire.put_null(name),
        };
        if let Some(id) = self.refs.lookup(obj) {
            trace!(id, "back-reference");
            return self.wire.put_ref(name, id);
        }

        let resolved;
        let (ser, erased) = match ser {
            Some(ser) => (ser, false),
            None => {
                resolved = self.registry.serializer_for(obj)?;
                (&*resolved, true)
            }
        };
        self.refs.assign(obj)?;
        self.write_body(name, obj, ser, erased)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        encoding::WireOutputExt,
        registry::LIST,
        rep::{shared, Obj},
    };

    fn output() -> TextOutput {
        let registry = TypeRegistry::builder().build().unwrap();
        TextOutput::new(registry, &WireConfig::default(), 1)
    }

    fn text(out: TextOutput) -> String { String::from_utf8(out.finish().to_vec()).unwrap() }

    #[test]
    fn root_primitives_are_unnamed() {
        let mut out = output();
        out.put_i64("ignored", 7).unwrap();
        assert_eq!(text(out), r#""7.""#);
    }

    #[test]
    fn erased_list_is_wrapped() {
        let inner: Vec<Option<Obj>> = vec![None];
        let list = Obj::new(inner);
        let mut out = output();
        out.put_obj("", Some(&list)).unwrap();
        assert_eq!(text(out), r#"{"_typeId":12,"_items":[null]}"#);
    }

    #[test]
    fn static_list_is_bare_and_shared_once() {
        let list = shared(Vec::<Option<Obj>>::new());
        let mut out = output();
        out.begin_seq(2).unwrap();
        out.put_container("", Some(&list), LIST).unwrap();
        out.put_container("", Some(&list), LIST).unwrap();
        out.end_seq().unwrap();
        assert_eq!(text(out), r#"[[],{"*i":-1}]"#);
    }

    #[test]
    fn depth_limit_is_internal() {
        let config = WireConfig::default().with_max_depth(2);
        let registry = TypeRegistry::builder().build().unwrap();
        let mut out = TextOutput::new(registry, &config, 1);
        out.begin_seq(1).unwrap();
        out.begin_seq(1).unwrap();
        assert!(out.begin_seq(1).unwrap_err().is_internal());
    }
}
