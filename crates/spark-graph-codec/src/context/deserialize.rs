use alloc::{boxed::Box, format, rc::Rc, string::String, vec::Vec};
use core::any::{Any, type_name};
use core::cell::RefCell;
use core::cmp::Ordering;

use tracing::{debug, trace};

use super::length_from_wire;
use crate::channel::DataReader;
use crate::codec::{DependentDeserializer, Deserializer, unsupported};
use crate::error::{CodecError, ErrorCollector, Result};
use crate::limits::CodecLimits;
use crate::object::Object;
use crate::reference::ObjectReference;
use crate::registry::{Decoded, ObjectCodec};
use crate::varint;

/// 挂起槽位上登记的续体：解析完成时以槽位的值（空值为 `None`）调用。
type Callback<'a> =
    Box<dyn FnOnce(&mut DeserializationContext<'a>, Option<Object>) -> Result<()> + 'a>;

fn callback<'a, F>(f: F) -> Callback<'a>
where
    F: FnOnce(&mut DeserializationContext<'a>, Option<Object>) -> Result<()> + 'a,
{
    Box::new(f)
}

/// 续体的登记位置：普通等待者，或所有者解析后才能执行的内部对象续体。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Continuation {
    Waiter,
    OwnerResolution,
}

enum Slot<'a> {
    Pending {
        waiters: Vec<Callback<'a>>,
        deferred_inner: Vec<Callback<'a>>,
    },
    Resolved(Option<Object>),
}

impl Slot<'_> {
    fn pending() -> Self {
        Slot::Pending {
            waiters: Vec::new(),
            deferred_inner: Vec::new(),
        }
    }
}

/// 读方向上下文。
///
/// # 教案式说明
/// - **意图 (Why)**：对象可能在自身载荷内部被引用（循环），因此读取对象时不能直接返回值，
///   而是登记回调，由上下文在对象解析完成的那一刻同步调用；
/// - **契约 (What)**：
///   - 槽位的值在完全解析前绝不暴露给任何回调；解析时按登记顺序调用全部等待者，
///     随后执行延迟的内部对象续体，最后调用触发解码的原始回调；
///   - 多个回调各自失败时全部仍会执行，错误按“首错为主、其余附属”聚合；
///   - 上下文只服务一次 Pass，结束时调用 [`finish`](Self::finish) 校验没有残留的挂起槽位；
/// - **风险 (Trade-offs)**：回调以 `Box<dyn FnOnce>` 保存，每个挂起引用一次堆分配；
///   换来的是业务类型无需任何指针修补逻辑。
pub struct DeserializationContext<'a> {
    input: &'a mut dyn DataReader,
    registry: &'a dyn ObjectCodec,
    limits: CodecLimits,
    slots: Vec<Slot<'a>>,
    depth: usize,
}

impl<'a> DeserializationContext<'a> {
    pub fn new(input: &'a mut dyn DataReader, registry: &'a dyn ObjectCodec) -> Self {
        Self {
            input,
            registry,
            limits: CodecLimits::default(),
            slots: Vec::new(),
            depth: 0,
        }
    }

    pub fn with_limits(mut self, limits: CodecLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> &CodecLimits {
        &self.limits
    }

    /// 已遇到的对象个数（含仍在挂起的）。
    pub fn objects_read(&self) -> usize {
        self.slots.len()
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.input.read_u8()
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        self.input.read_i8()
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.input.read_i16()
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.input.read_i32()
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.input.read_i64()
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        self.input.read_f32()
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        self.input.read_f64()
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        self.input.read_bool()
    }

    pub fn read_char(&mut self) -> Result<char> {
        self.input.read_char()
    }

    pub fn read_varint(&mut self) -> Result<i32> {
        varint::read(&mut *self.input)
    }

    pub fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_byte_array_within("string length")?;
        String::from_utf8(bytes)
            .map_err(|error| CodecError::malformed("string", format!("invalid UTF-8: {error}")))
    }

    pub fn read_byte_array(&mut self) -> Result<Vec<u8>> {
        self.read_byte_array_within("byte array length")
    }

    fn read_byte_array_within(&mut self, context: &'static str) -> Result<Vec<u8>> {
        let raw = self.read_varint()?;
        let len = length_from_wire(raw, context)?;
        self.limits.check_string_bytes(len)?;
        if let Some(remaining) = self.input.remaining() {
            if remaining < len {
                return Err(CodecError::StreamTruncated {
                    needed: len,
                    remaining,
                });
            }
        }
        let mut bytes = alloc::vec![0u8; len];
        self.input.read_exact(&mut bytes)?;
        Ok(bytes)
    }

    fn read_len(&mut self) -> Result<usize> {
        let raw = self.read_varint()?;
        let len = length_from_wire(raw, "sequence length")?;
        self.limits.check_sequence_len(len)?;
        // 每个元素至少占一个字节（版本头或对象编号）。
        if let Some(remaining) = self.input.remaining() {
            if remaining < len {
                return Err(CodecError::StreamTruncated {
                    needed: len,
                    remaining,
                });
            }
        }
        Ok(len)
    }

    /// 读取版本头；供自行分派版本的类型擦除编解码器使用。
    pub fn read_version(&mut self) -> Result<i32> {
        self.read_varint()
    }

    /// 读取版本号，并沿编解码器的版本链找到能处理它的解码器。
    pub fn read<D: Deserializer + ?Sized>(&mut self, deserializer: &D) -> Result<D::Value> {
        let version = self.read_version()?;
        if !deserializer.supports_version(version) {
            return Err(unsupported::<D::Value>(version, deserializer.version()));
        }
        deserializer.deserialize_version(self, version)
    }

    /// 依赖解码器的读取，版本协商规则与 [`read`](Self::read) 相同。
    pub fn read_dependent<D: DependentDeserializer + ?Sized>(
        &mut self,
        deserializer: &D,
        extra: &D::Extra,
    ) -> Result<D::Value> {
        let version = self.read_version()?;
        if !deserializer.supports_version(version) {
            return Err(unsupported::<D::Value>(version, deserializer.version()));
        }
        deserializer.deserialize_version(self, version, extra)
    }

    pub fn read_sequence<D: Deserializer + ?Sized>(
        &mut self,
        deserializer: &D,
    ) -> Result<Vec<D::Value>> {
        let len = self.read_len()?;
        let mut items = Vec::new();
        for _ in 0..len {
            items.push(self.read(deserializer)?);
        }
        Ok(items)
    }

    pub fn read_optional<D: Deserializer + ?Sized>(
        &mut self,
        deserializer: &D,
    ) -> Result<Option<D::Value>> {
        if self.read_bool()? {
            self.read(deserializer).map(Some)
        } else {
            Ok(None)
        }
    }

    /// 读取一个非空对象，解析完成时调用 `consumer`。
    ///
    /// 对象可能仍在构造（循环引用），此时 `consumer` 会在对象解析的那一刻才被调用。
    pub fn read_object<T: Any>(&mut self, consumer: impl FnOnce(Rc<T>) + 'a) -> Result<()> {
        self.try_read_object(move |value: Rc<T>| {
            consumer(value);
            Ok(())
        })
    }

    /// 与 [`read_object`](Self::read_object) 相同，但 `consumer` 可以失败；失败按聚合规则上抛。
    pub fn try_read_object<T: Any>(
        &mut self,
        consumer: impl FnOnce(Rc<T>) -> Result<()> + 'a,
    ) -> Result<()> {
        self.read_slot(
            callback(move |_, value| consumer(expect_object::<T>(value)?)),
            Continuation::Waiter,
        )
    }

    /// 读取一个可能为空的对象。
    pub fn read_nullable_object<T: Any>(
        &mut self,
        consumer: impl FnOnce(Option<Rc<T>>) + 'a,
    ) -> Result<()> {
        self.read_slot(
            callback(move |_, value| {
                consumer(value.map(Object::downcast::<T>).transpose()?);
                Ok(())
            }),
            Continuation::Waiter,
        )
    }

    /// 不做类型还原，直接交出类型擦除的句柄。
    pub fn read_any_object(&mut self, consumer: impl FnOnce(Option<Object>) + 'a) -> Result<()> {
        self.read_slot(
            callback(move |_, value| {
                consumer(value);
                Ok(())
            }),
            Continuation::Waiter,
        )
    }

    /// 读取对象并返回前向引用，对象解析后引用即被赋值。
    pub fn read_object_reference<T: Any>(&mut self) -> Result<ObjectReference<Rc<T>>> {
        let reference = ObjectReference::new();
        let target = reference.clone();
        self.try_read_object(move |value: Rc<T>| target.set_value(value))?;
        Ok(reference)
    }

    /// 一个布尔字节，随后仅在存在时读取对象。
    pub fn read_optional_object<T: Any>(
        &mut self,
        consumer: impl FnOnce(Option<Rc<T>>) + 'a,
    ) -> Result<()> {
        if self.read_bool()? {
            self.read_object(move |value: Rc<T>| consumer(Some(value)))
        } else {
            consumer(None);
            Ok(())
        }
    }

    /// 读取对象列表；全部元素解析后按线上顺序一次性交给 `consumer`。
    pub fn read_object_list<T: Any>(
        &mut self,
        consumer: impl FnOnce(Vec<Rc<T>>) + 'a,
    ) -> Result<()> {
        self.try_read_object_list(move |items: Vec<Rc<T>>| {
            consumer(items);
            Ok(())
        })
    }

    /// 与 [`read_object_list`](Self::read_object_list) 相同，但 `consumer` 可以失败。
    pub fn try_read_object_list<T: Any>(
        &mut self,
        consumer: impl FnOnce(Vec<Rc<T>>) -> Result<()> + 'a,
    ) -> Result<()> {
        let len = self.read_len()?;
        let collector = ListCollector::new(len, consumer)?;
        for index in 0..len {
            let collector = Rc::clone(&collector);
            self.try_read_object(move |item: Rc<T>| ListCollector::fill(&collector, index, item))?;
        }
        Ok(())
    }

    pub fn read_nullable_object_list<T: Any>(
        &mut self,
        consumer: impl FnOnce(Vec<Option<Rc<T>>>) + 'a,
    ) -> Result<()> {
        self.try_read_nullable_object_list(move |items: Vec<Option<Rc<T>>>| {
            consumer(items);
            Ok(())
        })
    }

    pub fn try_read_nullable_object_list<T: Any>(
        &mut self,
        consumer: impl FnOnce(Vec<Option<Rc<T>>>) -> Result<()> + 'a,
    ) -> Result<()> {
        let len = self.read_len()?;
        let collector = ListCollector::new(len, consumer)?;
        for index in 0..len {
            let collector = Rc::clone(&collector);
            self.read_slot(
                callback(move |_, value| {
                    let item = value.map(Object::downcast::<T>).transpose()?;
                    ListCollector::fill(&collector, index, item)
                }),
                Continuation::Waiter,
            )?;
        }
        Ok(())
    }

    /// 身份跟踪的读取入口。
    ///
    /// # 执行步骤（How）
    /// 1. 读取对象编号；编号必须是已见过的，或恰好等于下一个待分配编号；
    /// 2. 首次出现：建立挂起槽位并经注册表解码载荷；
    ///    - 解码得到内部标记：递归读取所有者，并以“所有者续体”的身份登记；所有者可用时调用其
    ///      `decode_inner` 得到真实对象，再解析本槽位；
    ///    - 否则直接以解码结果解析本槽位；
    /// 3. 槽位仍挂起（循环）：把回调登记到等待列表或延迟内部列表；
    /// 4. 槽位已解析：立即调用回调。
    fn read_slot(&mut self, callback: Callback<'a>, continuation: Continuation) -> Result<()> {
        let raw = self.read_varint()?;
        let id = usize::try_from(raw)
            .map_err(|_| CodecError::malformed("object id", format!("negative id {raw}")))?;
        match id.cmp(&self.slots.len()) {
            Ordering::Greater => Err(CodecError::malformed(
                "object id",
                format!(
                    "id {id} skips ahead of the next unassigned id {}",
                    self.slots.len()
                ),
            )),
            Ordering::Equal => {
                self.slots.push(Slot::pending());
                self.depth += 1;
                let outcome = self
                    .limits
                    .check_depth(self.depth)
                    .and_then(|()| self.decode_fresh(id, callback));
                self.depth -= 1;
                outcome
            }
            Ordering::Less => match &mut self.slots[id] {
                Slot::Resolved(value) => {
                    let value = value.clone();
                    callback(self, value)
                }
                Slot::Pending {
                    waiters,
                    deferred_inner,
                } => {
                    trace!(object_id = id, ?continuation, "object still pending; queued");
                    match continuation {
                        Continuation::Waiter => waiters.push(callback),
                        Continuation::OwnerResolution => deferred_inner.push(callback),
                    }
                    Ok(())
                }
            },
        }
    }

    fn decode_fresh(&mut self, id: usize, callback: Callback<'a>) -> Result<()> {
        let registry = self.registry;
        match registry.deserialize(self)? {
            Decoded::Value(value) => {
                trace!(
                    object_id = id,
                    type_name = value.as_ref().map_or("null", Object::type_name),
                    "decoded object"
                );
                self.resolve(id, value, callback)
            }
            Decoded::InnerMarker => {
                trace!(object_id = id, "inner object; resolving owner first");
                self.read_slot(
                    callback_for_owner(id, callback),
                    Continuation::OwnerResolution,
                )
            }
        }
    }

    fn decode_inner(
        &mut self,
        id: usize,
        owner: Option<Object>,
        callback: Callback<'a>,
    ) -> Result<()> {
        let owner = owner.ok_or(CodecError::OwnerUnavailable {
            type_name: "null",
            detail: "owner of an inner object decoded as null",
        })?;
        let outer = self.registry.as_outer(&owner)?;
        let inner = outer.decode_inner(self)?;
        trace!(
            object_id = id,
            owner = owner.type_name(),
            inner = inner.type_name(),
            "decoded inner object"
        );
        self.resolve(id, Some(inner), callback)
    }

    fn resolve(&mut self, id: usize, value: Option<Object>, callback: Callback<'a>) -> Result<()> {
        let slot = self.slots.get_mut(id).ok_or_else(|| {
            CodecError::malformed("object id", format!("id {id} has no slot"))
        })?;
        let Slot::Pending {
            waiters,
            deferred_inner,
        } = core::mem::replace(slot, Slot::Resolved(value.clone()))
        else {
            return Err(CodecError::DoubleAssignment {
                what: "object slot",
            });
        };

        let mut errors = ErrorCollector::default();
        for waiter in waiters {
            errors.record(waiter(self, value.clone()));
        }
        for continuation in deferred_inner {
            errors.record(continuation(self, value.clone()));
        }
        errors.record(callback(self, value));
        errors.finish()
    }

    /// 结束 Pass：仍有挂起槽位说明输入中存在悬空的前向引用。
    pub fn finish(self) -> Result<()> {
        let pending = self
            .slots
            .iter()
            .filter(|slot| matches!(slot, Slot::Pending { .. }))
            .count();
        if pending > 0 {
            return Err(CodecError::malformed(
                "end of pass",
                format!("{pending} object(s) were never resolved"),
            ));
        }
        debug!(objects = self.slots.len(), "deserialization pass finished");
        Ok(())
    }
}

fn callback_for_owner<'a>(id: usize, inner_callback: Callback<'a>) -> Callback<'a> {
    callback(move |ctx, owner| ctx.decode_inner(id, owner, inner_callback))
}

fn expect_object<T: Any>(value: Option<Object>) -> Result<Rc<T>> {
    value
        .ok_or(CodecError::TypeMismatch {
            expected: type_name::<T>(),
            found: "null",
        })?
        .downcast::<T>()
}

/// 按下标收集列表元素，全部到齐后一次性交付。
///
/// 声明长度来自线上数据，槽位随实际到达的下标增长，不按声明长度预分配。
struct ListCollector<'a, E> {
    items: Vec<Option<E>>,
    remaining: usize,
    consumer: Option<Box<dyn FnOnce(Vec<E>) -> Result<()> + 'a>>,
}

impl<'a, E: 'a> ListCollector<'a, E> {
    fn new(
        len: usize,
        consumer: impl FnOnce(Vec<E>) -> Result<()> + 'a,
    ) -> Result<Rc<RefCell<Self>>> {
        let collector = Rc::new(RefCell::new(Self {
            items: Vec::new(),
            remaining: len,
            consumer: Some(Box::new(consumer)),
        }));
        if len == 0 {
            Self::deliver(&collector)?;
        }
        Ok(collector)
    }

    fn fill(collector: &Rc<RefCell<Self>>, index: usize, item: E) -> Result<()> {
        let complete = {
            let mut guard = collector.borrow_mut();
            let state = &mut *guard;
            if state.items.len() <= index {
                state.items.resize_with(index + 1, || None);
            }
            if state.items[index].replace(item).is_none() {
                state.remaining -= 1;
            }
            state.remaining == 0
        };
        if complete {
            Self::deliver(collector)?;
        }
        Ok(())
    }

    fn deliver(collector: &Rc<RefCell<Self>>) -> Result<()> {
        let (consumer, items) = {
            let mut state = collector.borrow_mut();
            (state.consumer.take(), core::mem::take(&mut state.items))
        };
        match consumer {
            Some(consumer) => consumer(items.into_iter().flatten().collect()),
            None => Ok(()),
        }
    }
}
