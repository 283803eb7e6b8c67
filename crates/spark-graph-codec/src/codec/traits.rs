use alloc::vec::Vec;
use core::any::type_name;
use core::fmt;
use core::marker::PhantomData;

use super::versioned::{VersionedCodec, VersionedDependentCodec};
use crate::context::{DeserializationContext, SerializationContext};
use crate::error::{CodecError, Result};

/// 只读方向的编解码契约。
///
/// # 教案式说明
/// - **契约 (What)**：`version` 是本解码器能读取的线上版本号，缺省为 0；
///   `supports_version` / `deserialize_version` 描述版本链上的全部可读版本，普通解码器只认自身版本，
///   [`VersionedCodec`] 会覆盖二者以沿链查找；
/// - **前置条件**：版本头已由上下文读取，`deserialize` 只负责载荷本身。
pub trait Deserializer {
    type Value;

    fn version(&self) -> i32 {
        0
    }

    fn deserialize(&self, ctx: &mut DeserializationContext<'_>) -> Result<Self::Value>;

    fn supports_version(&self, version: i32) -> bool {
        version == self.version()
    }

    /// 版本链上全部可读版本；构造版本链时据此检查冲突。
    fn versions(&self) -> Vec<i32> {
        alloc::vec![self.version()]
    }

    fn deserialize_version(
        &self,
        ctx: &mut DeserializationContext<'_>,
        version: i32,
    ) -> Result<Self::Value> {
        if version == self.version() {
            self.deserialize(ctx)
        } else {
            Err(unsupported::<Self::Value>(version, self.version()))
        }
    }
}

/// 双向编解码契约：写出当前版本的载荷，读取当前或历史版本。
pub trait Codec: Deserializer {
    fn serialize(&self, ctx: &mut SerializationContext<'_>, value: &Self::Value) -> Result<()>;

    /// 挂接一个历史版本解码器；版本号与链上已有版本冲突时立即失败。
    fn with<D>(self, legacy: D) -> Result<VersionedCodec<Self, D>>
    where
        Self: Sized,
        D: Deserializer<Value = Self::Value>,
    {
        VersionedCodec::new(self, legacy)
    }

    /// 以闭包形式挂接历史版本解码器。
    fn with_fn<F>(
        self,
        version: i32,
        decode: F,
    ) -> Result<VersionedCodec<Self, FnDeserializer<F, Self::Value>>>
    where
        Self: Sized,
        F: Fn(&mut DeserializationContext<'_>) -> Result<Self::Value>,
    {
        VersionedCodec::new(self, deserializer_fn(version, decode))
    }
}

/// 依赖额外上下文（通常是外部所有者）的解码契约。
pub trait DependentDeserializer {
    type Value;
    type Extra: ?Sized;

    fn version(&self) -> i32 {
        0
    }

    fn deserialize(
        &self,
        ctx: &mut DeserializationContext<'_>,
        extra: &Self::Extra,
    ) -> Result<Self::Value>;

    fn supports_version(&self, version: i32) -> bool {
        version == self.version()
    }

    fn versions(&self) -> Vec<i32> {
        alloc::vec![self.version()]
    }

    fn deserialize_version(
        &self,
        ctx: &mut DeserializationContext<'_>,
        version: i32,
        extra: &Self::Extra,
    ) -> Result<Self::Value> {
        if version == self.version() {
            self.deserialize(ctx, extra)
        } else {
            Err(unsupported::<Self::Value>(version, self.version()))
        }
    }
}

/// 依赖额外上下文的双向编解码契约；写出时不需要额外上下文。
pub trait DependentCodec: DependentDeserializer {
    fn serialize(&self, ctx: &mut SerializationContext<'_>, value: &Self::Value) -> Result<()>;

    fn with<D>(self, legacy: D) -> Result<VersionedDependentCodec<Self, D>>
    where
        Self: Sized,
        D: DependentDeserializer<Value = Self::Value, Extra = Self::Extra>,
    {
        VersionedDependentCodec::new(self, legacy)
    }

    fn with_fn<F>(
        self,
        version: i32,
        decode: F,
    ) -> Result<VersionedDependentCodec<Self, FnDependentDeserializer<F, Self::Value, Self::Extra>>>
    where
        Self: Sized,
        F: Fn(&mut DeserializationContext<'_>, &Self::Extra) -> Result<Self::Value>,
    {
        VersionedDependentCodec::new(self, dependent_deserializer_fn(version, decode))
    }
}

impl<D: Deserializer + ?Sized> Deserializer for &D {
    type Value = D::Value;

    fn version(&self) -> i32 {
        (**self).version()
    }

    fn deserialize(&self, ctx: &mut DeserializationContext<'_>) -> Result<Self::Value> {
        (**self).deserialize(ctx)
    }

    fn supports_version(&self, version: i32) -> bool {
        (**self).supports_version(version)
    }

    fn versions(&self) -> Vec<i32> {
        (**self).versions()
    }

    fn deserialize_version(
        &self,
        ctx: &mut DeserializationContext<'_>,
        version: i32,
    ) -> Result<Self::Value> {
        (**self).deserialize_version(ctx, version)
    }
}

impl<C: Codec + ?Sized> Codec for &C {
    fn serialize(&self, ctx: &mut SerializationContext<'_>, value: &Self::Value) -> Result<()> {
        (**self).serialize(ctx, value)
    }
}

/// 由闭包构成的单版本解码器，见 [`deserializer_fn`]。
pub struct FnDeserializer<F, T> {
    version: i32,
    decode: F,
    _value: PhantomData<fn() -> T>,
}

impl<F, T> fmt::Debug for FnDeserializer<F, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnDeserializer")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// 用闭包声明某一版本的解码逻辑，常用于挂接历史版本。
pub fn deserializer_fn<T, F>(version: i32, decode: F) -> FnDeserializer<F, T>
where
    F: Fn(&mut DeserializationContext<'_>) -> Result<T>,
{
    FnDeserializer {
        version,
        decode,
        _value: PhantomData,
    }
}

impl<F, T> Deserializer for FnDeserializer<F, T>
where
    F: Fn(&mut DeserializationContext<'_>) -> Result<T>,
{
    type Value = T;

    fn version(&self) -> i32 {
        self.version
    }

    fn deserialize(&self, ctx: &mut DeserializationContext<'_>) -> Result<T> {
        (self.decode)(ctx)
    }
}

/// 由闭包构成的单版本依赖解码器，见 [`dependent_deserializer_fn`]。
pub struct FnDependentDeserializer<F, T, X: ?Sized> {
    version: i32,
    decode: F,
    _value: PhantomData<fn(&X) -> T>,
}

pub fn dependent_deserializer_fn<T, X, F>(
    version: i32,
    decode: F,
) -> FnDependentDeserializer<F, T, X>
where
    X: ?Sized,
    F: Fn(&mut DeserializationContext<'_>, &X) -> Result<T>,
{
    FnDependentDeserializer {
        version,
        decode,
        _value: PhantomData,
    }
}

impl<F, T, X> DependentDeserializer for FnDependentDeserializer<F, T, X>
where
    X: ?Sized,
    F: Fn(&mut DeserializationContext<'_>, &X) -> Result<T>,
{
    type Value = T;
    type Extra = X;

    fn version(&self) -> i32 {
        self.version
    }

    fn deserialize(&self, ctx: &mut DeserializationContext<'_>, extra: &X) -> Result<T> {
        (self.decode)(ctx, extra)
    }
}

pub(crate) fn unsupported<T: ?Sized>(version: i32, current: i32) -> CodecError {
    CodecError::UnsupportedVersion {
        codec: type_name::<T>(),
        version,
        current,
    }
}
