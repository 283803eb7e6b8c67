use alloc::{boxed::Box, format, rc::Rc, vec::Vec};
use core::any::{Any, TypeId, type_name};
use core::cell::RefCell;

use crate::codec::{Codec, Deserializer};
use crate::context::{DeserializationContext, SerializationContext};
use crate::error::{CodecError, Result};
use crate::object::Object;

/// 对象安全的编解码契约，供 [`TypeRegistry`](super::TypeRegistry) 统一管理不同类型。
///
/// # 契约说明（What）
/// - `encode_erased` 写出版本头与载荷，`decode_erased` 读取版本头并分派到合适的解码器；
/// - `decode_erased` 返回 `None` 表示解码器产出了空值；对非空标签而言这意味着线上数据损坏，
///   注册表会将其报告为 [`CodecError::NullFromNonNullType`]。
pub trait DynCodec {
    fn value_type_id(&self) -> TypeId;

    fn type_name(&self) -> &'static str;

    fn version(&self) -> i32;

    fn encode_erased(&self, ctx: &mut SerializationContext<'_>, value: &Object) -> Result<()>;

    fn decode_erased(&self, ctx: &mut DeserializationContext<'_>) -> Result<Option<Object>>;
}

type LegacyTable<V> = Rc<RefCell<Vec<Box<dyn Deserializer<Value = V>>>>>;

/// `TypedCodecAdapter` 将值类型为 `Rc<T>` 的泛型 [`Codec`] 装箱为 [`DynCodec`]。
///
/// # 行为逻辑（How）
/// - 编码时把 [`Object`] 还原为 `Rc<T>`，类型不符返回 [`CodecError::TypeMismatch`]；
/// - 解码时先沿编解码器自身的版本链查找，再查注册后追加的历史解码器表。
pub struct TypedCodecAdapter<T, C>
where
    C: Codec<Value = Rc<T>>,
{
    codec: Rc<C>,
    legacy: LegacyTable<Rc<T>>,
}

impl<T, C> TypedCodecAdapter<T, C>
where
    T: Any,
    C: Codec<Value = Rc<T>>,
{
    pub fn new(codec: C) -> Self {
        Self {
            codec: Rc::new(codec),
            legacy: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub(crate) fn registration(&self) -> Registration<T, C> {
        Registration {
            codec: Rc::clone(&self.codec),
            legacy: Rc::clone(&self.legacy),
        }
    }
}

impl<T, C> DynCodec for TypedCodecAdapter<T, C>
where
    T: Any,
    C: Codec<Value = Rc<T>>,
{
    fn value_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn version(&self) -> i32 {
        self.codec.version()
    }

    fn encode_erased(&self, ctx: &mut SerializationContext<'_>, value: &Object) -> Result<()> {
        let typed = value.clone().downcast::<T>()?;
        ctx.write(&*self.codec, &typed)
    }

    fn decode_erased(&self, ctx: &mut DeserializationContext<'_>) -> Result<Option<Object>> {
        let version = ctx.read_version()?;
        let value = if self.codec.supports_version(version) {
            self.codec.deserialize_version(ctx, version)?
        } else {
            let legacy = self.legacy.borrow();
            let decoder = legacy
                .iter()
                .find(|decoder| decoder.supports_version(version))
                .ok_or_else(|| CodecError::UnsupportedVersion {
                    codec: type_name::<T>(),
                    version,
                    current: self.codec.version(),
                })?;
            tracing::debug!(
                codec = type_name::<T>(),
                version,
                current = self.codec.version(),
                "dispatching to registered legacy decoder"
            );
            decoder.deserialize_version(ctx, version)?
        };
        Ok(Some(Object::new(value)))
    }
}

/// 注册回执：在类型注册之后继续挂接历史版本解码器。
///
/// ```
/// use std::rc::Rc;
/// use spark_graph_codec::TypeRegistry;
/// use spark_graph_codec::codec::deserializer_fn;
/// use spark_graph_codec::codec::standard::EmptyCodec;
///
/// struct Marker;
///
/// let mut registry = TypeRegistry::compact();
/// registry
///     .register(7, EmptyCodec::with_version(2, || Rc::new(Marker)))
///     .and_then(|registration| {
///         registration.legacy(deserializer_fn(1, |ctx| {
///             ctx.read_string()?;
///             Ok(Rc::new(Marker))
///         }))
///     })
///     .expect("register marker");
/// ```
pub struct Registration<T, C>
where
    C: Codec<Value = Rc<T>>,
{
    codec: Rc<C>,
    legacy: LegacyTable<Rc<T>>,
}

impl<T, C> Registration<T, C>
where
    T: Any,
    C: Codec<Value = Rc<T>>,
{
    /// 追加一个历史版本解码器；它声明的任一版本已被当前编解码器或已挂接的解码器占用时立即失败。
    pub fn legacy<D>(self, decoder: D) -> Result<Self>
    where
        D: Deserializer<Value = Rc<T>> + 'static,
    {
        let occupied = decoder.versions().into_iter().find(|&version| {
            self.codec.supports_version(version)
                || self
                    .legacy
                    .borrow()
                    .iter()
                    .any(|existing| existing.supports_version(version))
        });
        if let Some(version) = occupied {
            return Err(CodecError::configuration(format!(
                "type `{}` already has a decoder for version {version}",
                type_name::<T>()
            )));
        }
        self.legacy.borrow_mut().push(Box::new(decoder));
        Ok(self)
    }
}
