use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;

use tracing::{debug, trace};

use super::length_to_wire;
use crate::channel::DataWriter;
use crate::codec::{Codec, DependentCodec};
use crate::error::{CodecError, ErrorCollector, Result};
use crate::limits::CodecLimits;
use crate::object::{AsObject, IdentityKey, Object, ObjectId};
use crate::registry::ObjectCodec;
use crate::varint;

/// 写方向上下文。
///
/// # 教案式说明
/// - **意图 (Why)**：业务编解码器只描述“写哪些字段”，对象身份、回指与循环切断由上下文负责；
/// - **契约 (What)**：
///   - 同一分配（指针身份）在一次 Pass 内只获得一个 [`ObjectId`]，再次出现时只写编号；
///   - [`write`](Self::write) 先写编解码器当前版本号，再写载荷；
///   - 上下文只服务一次 Pass，结束时调用 [`finish`](Self::finish) 校验不存在未写出的内部载荷；
/// - **执行 (How)**：见 [`write_nullable_object`](Self::write_nullable_object) 的步骤说明。
pub struct SerializationContext<'a> {
    out: &'a mut dyn DataWriter,
    registry: &'a dyn ObjectCodec,
    limits: CodecLimits,
    identities: BTreeMap<IdentityKey, ObjectId>,
    // 持有已编号对象的强引用，保证 Pass 期间地址不会被复用。
    retained: Vec<Object>,
    in_progress: BTreeSet<IdentityKey>,
    deferred_inner: BTreeMap<IdentityKey, Vec<Object>>,
    depth: usize,
}

impl<'a> SerializationContext<'a> {
    pub fn new(out: &'a mut dyn DataWriter, registry: &'a dyn ObjectCodec) -> Self {
        Self {
            out,
            registry,
            limits: CodecLimits::default(),
            identities: BTreeMap::new(),
            retained: Vec::new(),
            in_progress: BTreeSet::new(),
            deferred_inner: BTreeMap::new(),
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

    /// 已分配编号的对象个数（含空值）。
    pub fn objects_written(&self) -> usize {
        self.identities.len()
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.out.write_u8(value)
    }

    pub fn write_i8(&mut self, value: i8) -> Result<()> {
        self.out.write_i8(value)
    }

    pub fn write_i16(&mut self, value: i16) -> Result<()> {
        self.out.write_i16(value)
    }

    /// 4 字节定宽整数；长度、编号等请使用 [`write_varint`](Self::write_varint)。
    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.out.write_i32(value)
    }

    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.out.write_i64(value)
    }

    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.out.write_f32(value)
    }

    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        self.out.write_f64(value)
    }

    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.out.write_bool(value)
    }

    pub fn write_char(&mut self, value: char) -> Result<()> {
        self.out.write_char(value)
    }

    pub fn write_varint(&mut self, value: i32) -> Result<()> {
        varint::write(&mut *self.out, value)
    }

    /// `varint(字节长度)` + UTF-8 字节。
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        self.limits.check_string_bytes(value.len())?;
        self.write_varint(length_to_wire(value.len(), "string length")?)?;
        self.out.write_bytes(value.as_bytes())
    }

    /// `varint(字节长度)` + 原始字节。
    pub fn write_byte_array(&mut self, value: &[u8]) -> Result<()> {
        self.limits.check_string_bytes(value.len())?;
        self.write_varint(length_to_wire(value.len(), "byte array length")?)?;
        self.out.write_bytes(value)
    }

    fn write_len(&mut self, len: usize) -> Result<()> {
        self.limits.check_sequence_len(len)?;
        self.write_varint(length_to_wire(len, "sequence length")?)
    }

    /// 写出版本号与载荷。
    pub fn write<C: Codec + ?Sized>(&mut self, codec: &C, value: &C::Value) -> Result<()> {
        self.write_varint(codec.version())?;
        codec.serialize(self, value)
    }

    /// 依赖编解码器的写出，格式与 [`write`](Self::write) 相同。
    pub fn write_dependent<C: DependentCodec + ?Sized>(
        &mut self,
        codec: &C,
        value: &C::Value,
    ) -> Result<()> {
        self.write_varint(codec.version())?;
        codec.serialize(self, value)
    }

    pub fn write_sequence<C: Codec + ?Sized>(
        &mut self,
        codec: &C,
        items: &[C::Value],
    ) -> Result<()> {
        self.write_len(items.len())?;
        items.iter().try_for_each(|item| self.write(codec, item))
    }

    pub fn write_optional<C: Codec + ?Sized>(
        &mut self,
        codec: &C,
        value: Option<&C::Value>,
    ) -> Result<()> {
        self.write_bool(value.is_some())?;
        match value {
            Some(value) => self.write(codec, value),
            None => Ok(()),
        }
    }

    /// 写出一个对象图节点（首次出现写载荷，否则只写编号）。
    pub fn write_object(&mut self, value: &impl AsObject) -> Result<()> {
        self.write_nullable_object(Some(&value.to_object()))
    }

    pub fn write_null(&mut self) -> Result<()> {
        self.write_nullable_object(None)
    }

    /// 身份跟踪的写入入口。
    ///
    /// # 执行步骤（How）
    /// 1. 身份表命中：只写编号（回指）并返回；
    /// 2. 否则分配下一个编号、写出编号，并把对象标记为进行中；
    /// 3. 若对象是内部类型：写内部标记，递归写出所有者；所有者仍在进行中时把对象登记到
    ///    所有者的延迟列表（对象保持进行中），否则立即调用所有者的 `encode_inner`；
    /// 4. 否则经注册表写出标签、版本与载荷；
    /// 5. 结束进行中状态，并按登记顺序写出排在本对象名下的延迟内部载荷。
    pub fn write_nullable_object(&mut self, value: Option<&Object>) -> Result<()> {
        let key = IdentityKey::of(value);
        if let Some(&id) = self.identities.get(&key) {
            trace!(object_id = id, "back-reference");
            return self.write_varint(id as i32);
        }

        let id = ObjectId::try_from(self.identities.len())
            .ok()
            .filter(|&id| id <= i32::MAX as ObjectId)
            .ok_or(CodecError::LimitExceeded {
                limit: "object count",
                actual: self.identities.len(),
                max: i32::MAX as usize,
            })?;
        self.identities.insert(key, id);
        if let Some(object) = value {
            self.retained.push(object.clone());
        }
        trace!(
            object_id = id,
            type_name = value.map_or("null", Object::type_name),
            "assigned object id"
        );
        self.write_varint(id as i32)?;
        self.in_progress.insert(key);

        self.depth += 1;
        let outcome = self
            .limits
            .check_depth(self.depth)
            .and_then(|()| self.write_fresh(value));
        self.depth -= 1;
        outcome
    }

    fn write_fresh(&mut self, value: Option<&Object>) -> Result<()> {
        let registry = self.registry;
        let owner = match value {
            Some(object) => registry.owner_of(object)?,
            None => None,
        };
        match (value, owner) {
            (Some(inner), Some(owner)) => {
                registry.serialize_inner_marker(self)?;
                self.write_object(&owner)?;
                let owner_key = IdentityKey::of(Some(&owner));
                if self.in_progress.contains(&owner_key) {
                    debug!(
                        owner = owner.type_name(),
                        inner = inner.type_name(),
                        "owner is still being written; deferring inner payload"
                    );
                    self.deferred_inner
                        .entry(owner_key)
                        .or_default()
                        .push(inner.clone());
                    return Ok(());
                }
                self.encode_inner(&owner, inner)?;
            }
            _ => registry.serialize(self, value)?,
        }
        self.complete(value)
    }

    fn encode_inner(&mut self, owner: &Object, inner: &Object) -> Result<()> {
        let outer = self.registry.as_outer(owner)?;
        outer.encode_inner(self, inner)
    }

    fn complete(&mut self, value: Option<&Object>) -> Result<()> {
        let key = IdentityKey::of(value);
        self.in_progress.remove(&key);
        let (Some(owner), Some(deferred)) = (value, self.deferred_inner.remove(&key)) else {
            return Ok(());
        };
        trace!(
            owner = owner.type_name(),
            count = deferred.len(),
            "flushing deferred inner payloads"
        );
        let mut errors = ErrorCollector::default();
        for inner in deferred {
            let outcome = self
                .encode_inner(owner, &inner)
                .and_then(|()| self.complete(Some(&inner)));
            errors.record(outcome);
        }
        errors.finish()
    }

    pub fn write_object_list<T: AsObject>(&mut self, items: &[T]) -> Result<()> {
        self.write_len(items.len())?;
        items.iter().try_for_each(|item| self.write_object(item))
    }

    pub fn write_nullable_object_list(&mut self, items: &[Option<Object>]) -> Result<()> {
        self.write_len(items.len())?;
        items
            .iter()
            .try_for_each(|item| self.write_nullable_object(item.as_ref()))
    }

    /// 一个布尔字节，随后仅在存在时写出对象。
    pub fn write_optional_object<T: AsObject>(&mut self, value: Option<&T>) -> Result<()> {
        self.write_bool(value.is_some())?;
        match value {
            Some(value) => self.write_object(value),
            None => Ok(()),
        }
    }

    /// 结束 Pass。
    ///
    /// 所有延迟内部载荷都应已随其所有者写出；残留说明内部/外部绑定与对象图不一致。
    pub fn finish(self) -> Result<()> {
        if !self.deferred_inner.is_empty() || !self.in_progress.is_empty() {
            return Err(CodecError::OwnerUnavailable {
                type_name: "inner object",
                detail: "pass finished while inner payloads were still deferred",
            });
        }
        debug!(objects = self.identities.len(), "serialization pass finished");
        Ok(())
    }
}
