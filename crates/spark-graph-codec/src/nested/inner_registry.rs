use alloc::{boxed::Box, collections::BTreeMap, format, rc::Rc, vec::Vec};
use core::any::{Any, TypeId, type_name};
use core::marker::PhantomData;

use crate::codec::{DependentCodec, DependentDeserializer};
use crate::context::{DeserializationContext, SerializationContext};
use crate::error::{CodecError, Result};
use crate::object::Object;

type ErasedInnerCodec<O> = Box<dyn DependentCodec<Value = Object, Extra = Rc<O>>>;

/// 内部类型注册表：单字节标签 → 依赖所有者 `O` 的编解码器。
///
/// # 教案式说明
/// - **意图 (Why)**：一个外部类型可能拥有多种内部类型；`InnerTypeRegistry` 在所有者的
///   `encode_inner`/`decode_inner` 中完成多态分派，角色与 [`crate::TypeRegistry`] 对称；
/// - **契约 (What)**：
///   - 自身实现 [`DependentCodec`]，因此拥有版本号并可通过 `.with(...)` 挂接旧版注册表；
///   - 记录格式：`tag(1 字节) + varint(内部编解码器版本) + 载荷`；
///   - 重复标签或重复类型在注册时返回 [`CodecError::Configuration`]。
///
/// ```
/// use std::rc::Rc;
/// use spark_graph_codec::{InnerTypeRegistry, Result};
///
/// struct Outer;
///
/// let registry: Result<InnerTypeRegistry<Outer>> = InnerTypeRegistry::configure(1, |_registry| Ok(()));
/// assert!(registry.is_ok());
/// ```
pub struct InnerTypeRegistry<O> {
    version: i32,
    by_tag: BTreeMap<u8, ErasedInnerCodec<O>>,
    by_type: BTreeMap<TypeId, u8>,
}

impl<O: Any> InnerTypeRegistry<O> {
    pub fn new() -> Self {
        Self::with_version(0)
    }

    pub fn with_version(version: i32) -> Self {
        Self {
            version,
            by_tag: BTreeMap::new(),
            by_type: BTreeMap::new(),
        }
    }

    /// 以构建闭包一次性完成配置。
    pub fn configure(
        version: i32,
        configure: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<Self> {
        let mut registry = Self::with_version(version);
        configure(&mut registry)?;
        Ok(registry)
    }

    pub fn register<T, C>(&mut self, tag: u8, codec: C) -> Result<&mut Self>
    where
        T: Any,
        C: DependentCodec<Value = Rc<T>, Extra = Rc<O>> + 'static,
    {
        if self.by_tag.contains_key(&tag) {
            return Err(CodecError::configuration(format!(
                "inner tag {tag} is already registered"
            )));
        }
        if self.by_type.contains_key(&TypeId::of::<T>()) {
            return Err(CodecError::configuration(format!(
                "inner type `{}` is already registered",
                type_name::<T>()
            )));
        }
        self.by_type.insert(TypeId::of::<T>(), tag);
        self.by_tag.insert(
            tag,
            Box::new(ErasedInner {
                codec,
                _value: PhantomData,
            }),
        );
        Ok(self)
    }
}

impl<O: Any> Default for InnerTypeRegistry<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: Any> DependentDeserializer for InnerTypeRegistry<O> {
    type Value = Object;
    type Extra = Rc<O>;

    fn version(&self) -> i32 {
        self.version
    }

    fn deserialize(&self, ctx: &mut DeserializationContext<'_>, outer: &Rc<O>) -> Result<Object> {
        let tag = ctx.read_u8()?;
        let codec = self.by_tag.get(&tag).ok_or(CodecError::UnknownTag {
            tag: u32::from(tag),
        })?;
        ctx.read_dependent(&**codec, outer)
    }
}

impl<O: Any> DependentCodec for InnerTypeRegistry<O> {
    fn serialize(&self, ctx: &mut SerializationContext<'_>, value: &Object) -> Result<()> {
        let unregistered = || CodecError::UnregisteredType {
            type_name: value.type_name(),
        };
        let tag = self
            .by_type
            .get(&value.type_id())
            .copied()
            .ok_or_else(unregistered)?;
        let codec = self.by_tag.get(&tag).ok_or_else(unregistered)?;
        ctx.write_u8(tag)?;
        ctx.write_dependent(&**codec, value)
    }
}

/// 把值类型为 `Rc<T>` 的依赖编解码器擦除为以 [`Object`] 为值的版本。
struct ErasedInner<T, C> {
    codec: C,
    _value: PhantomData<fn() -> T>,
}

impl<T, C> DependentDeserializer for ErasedInner<T, C>
where
    T: Any,
    C: DependentCodec<Value = Rc<T>>,
{
    type Value = Object;
    type Extra = C::Extra;

    fn version(&self) -> i32 {
        self.codec.version()
    }

    fn deserialize(
        &self,
        ctx: &mut DeserializationContext<'_>,
        extra: &Self::Extra,
    ) -> Result<Object> {
        self.codec.deserialize(ctx, extra).map(Object::new)
    }

    fn supports_version(&self, version: i32) -> bool {
        self.codec.supports_version(version)
    }

    fn versions(&self) -> Vec<i32> {
        self.codec.versions()
    }

    fn deserialize_version(
        &self,
        ctx: &mut DeserializationContext<'_>,
        version: i32,
        extra: &Self::Extra,
    ) -> Result<Object> {
        self.codec
            .deserialize_version(ctx, version, extra)
            .map(Object::new)
    }
}

impl<T, C> DependentCodec for ErasedInner<T, C>
where
    T: Any,
    C: DependentCodec<Value = Rc<T>>,
{
    fn serialize(&self, ctx: &mut SerializationContext<'_>, value: &Object) -> Result<()> {
        let typed = value.clone().downcast::<T>()?;
        self.codec.serialize(ctx, &typed)
    }
}
