//! 一次性编解码门面。

use alloc::{format, rc::Rc, vec::Vec};
use core::any::Any;

use bytes::Bytes;
use tracing::debug;

use crate::channel::{ByteSink, ByteSource, DataReader};
use crate::context::{DeserializationContext, SerializationContext};
use crate::error::{CodecError, Result};
use crate::limits::CodecLimits;
use crate::object::AsObject;
use crate::reference::ObjectReference;
use crate::registry::ObjectCodec;

/// 把“建上下文、写根对象、结束 Pass、校验尾部字节”收拢为一次调用。
///
/// # 契约说明（What）
/// - 每次调用都新建上下文，身份表与挂起槽位不会跨调用残留；
/// - 解码要求输入恰好被消费完，且所有对象都已解析，否则返回 [`CodecError::Malformed`]。
#[derive(Clone, Copy)]
pub struct Pass<'r> {
    registry: &'r dyn ObjectCodec,
    limits: CodecLimits,
}

impl<'r> Pass<'r> {
    pub fn new(registry: &'r dyn ObjectCodec) -> Self {
        Self {
            registry,
            limits: CodecLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: CodecLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn encode_object(&self, root: &impl AsObject) -> Result<Bytes> {
        self.encode(|ctx| ctx.write_object(root))
    }

    pub fn encode_object_list<T: AsObject>(&self, items: &[T]) -> Result<Bytes> {
        self.encode(|ctx| ctx.write_object_list(items))
    }

    pub fn decode_object<T: Any>(&self, bytes: impl Into<Bytes>) -> Result<Rc<T>> {
        let reference = self.decode(bytes, |ctx| ctx.read_object_reference::<T>())?;
        reference.value()
    }

    pub fn decode_object_list<T: Any>(&self, bytes: impl Into<Bytes>) -> Result<Vec<Rc<T>>> {
        let reference = self.decode(bytes, |ctx| {
            let reference = ObjectReference::new();
            let target = reference.clone();
            ctx.try_read_object_list(move |items: Vec<Rc<T>>| target.set_value(items))?;
            Ok(reference)
        })?;
        reference.value()
    }

    pub fn decode_nullable_object_list<T: Any>(
        &self,
        bytes: impl Into<Bytes>,
    ) -> Result<Vec<Option<Rc<T>>>> {
        let reference = self.decode(bytes, |ctx| {
            let reference = ObjectReference::new();
            let target = reference.clone();
            ctx.try_read_nullable_object_list(move |items: Vec<Option<Rc<T>>>| {
                target.set_value(items)
            })?;
            Ok(reference)
        })?;
        reference.value()
    }

    fn encode(
        &self,
        body: impl FnOnce(&mut SerializationContext<'_>) -> Result<()>,
    ) -> Result<Bytes> {
        let mut sink = ByteSink::new();
        let objects = {
            let mut ctx =
                SerializationContext::new(&mut sink, self.registry).with_limits(self.limits);
            body(&mut ctx)?;
            let objects = ctx.objects_written();
            ctx.finish()?;
            objects
        };
        let bytes = sink.freeze();
        debug!(bytes = bytes.len(), objects, "encoded object graph");
        Ok(bytes)
    }

    fn decode<R>(
        &self,
        bytes: impl Into<Bytes>,
        body: impl FnOnce(&mut DeserializationContext<'_>) -> Result<R>,
    ) -> Result<R> {
        let bytes = bytes.into();
        let total = bytes.len();
        let mut source = ByteSource::new(bytes);
        let (output, objects) = {
            let mut ctx =
                DeserializationContext::new(&mut source, self.registry).with_limits(self.limits);
            let output = body(&mut ctx)?;
            let objects = ctx.objects_read();
            ctx.finish()?;
            (output, objects)
        };
        if let Some(trailing) = source.remaining().filter(|&remaining| remaining > 0) {
            return Err(CodecError::malformed(
                "end of pass",
                format!("{trailing} trailing byte(s) after the root object"),
            ));
        }
        debug!(bytes = total, objects, "decoded object graph");
        Ok(output)
    }
}
