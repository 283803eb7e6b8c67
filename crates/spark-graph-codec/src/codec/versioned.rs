use alloc::{format, vec::Vec};
use core::any::type_name;

use super::traits::{Codec, DependentCodec, DependentDeserializer, Deserializer, unsupported};
use crate::context::{DeserializationContext, SerializationContext};
use crate::error::{CodecError, Result};

/// 当前编解码器加一个历史版本解码器组成的版本链节点。
///
/// # 教案式说明
/// - **意图 (Why)**：类型的线上格式演进后，旧数据仍需可读；把历史解码器挂在当前编解码器上，
///   注册表无需感知版本变化；
/// - **执行 (How)**：按版本号查找时先交给 `core`，`core` 不认识的版本才分派到历史解码器；
///   两侧本身都可以是 `VersionedCodec`，从而形成任意长度、任意嵌套的链；
/// - **契约 (What)**：写出永远使用 `core` 的当前版本；构造时历史一侧 [`Deserializer::versions`]
///   中的任一版本若已被 `core` 声明，立即返回 [`CodecError::Configuration`]。
#[derive(Debug)]
pub struct VersionedCodec<C, D> {
    core: C,
    legacy: D,
}

impl<C, D> VersionedCodec<C, D>
where
    C: Codec,
    D: Deserializer<Value = C::Value>,
{
    pub fn new(core: C, legacy: D) -> Result<Self> {
        check_disjoint::<C::Value>(|version| core.supports_version(version), legacy.versions())?;
        Ok(Self { core, legacy })
    }

    pub fn core(&self) -> &C {
        &self.core
    }
}

impl<C, D> Deserializer for VersionedCodec<C, D>
where
    C: Codec,
    D: Deserializer<Value = C::Value>,
{
    type Value = C::Value;

    fn version(&self) -> i32 {
        self.core.version()
    }

    fn deserialize(&self, ctx: &mut DeserializationContext<'_>) -> Result<Self::Value> {
        self.core.deserialize(ctx)
    }

    fn supports_version(&self, version: i32) -> bool {
        self.core.supports_version(version) || self.legacy.supports_version(version)
    }

    fn versions(&self) -> Vec<i32> {
        let mut versions = self.core.versions();
        versions.extend(self.legacy.versions());
        versions
    }

    fn deserialize_version(
        &self,
        ctx: &mut DeserializationContext<'_>,
        version: i32,
    ) -> Result<Self::Value> {
        if self.core.supports_version(version) {
            return self.core.deserialize_version(ctx, version);
        }
        if !self.legacy.supports_version(version) {
            return Err(unsupported::<C::Value>(version, self.core.version()));
        }
        tracing::debug!(
            codec = type_name::<C::Value>(),
            version,
            current = self.core.version(),
            "dispatching to legacy decoder"
        );
        self.legacy.deserialize_version(ctx, version)
    }
}

impl<C, D> Codec for VersionedCodec<C, D>
where
    C: Codec,
    D: Deserializer<Value = C::Value>,
{
    fn serialize(&self, ctx: &mut SerializationContext<'_>, value: &Self::Value) -> Result<()> {
        self.core.serialize(ctx, value)
    }
}

/// [`VersionedCodec`] 的依赖版本，用于内部类型编解码器与 [`crate::InnerTypeRegistry`]。
#[derive(Debug)]
pub struct VersionedDependentCodec<C, D> {
    core: C,
    legacy: D,
}

impl<C, D> VersionedDependentCodec<C, D>
where
    C: DependentCodec,
    D: DependentDeserializer<Value = C::Value, Extra = C::Extra>,
{
    pub fn new(core: C, legacy: D) -> Result<Self> {
        check_disjoint::<C::Value>(|version| core.supports_version(version), legacy.versions())?;
        Ok(Self { core, legacy })
    }
}

impl<C, D> DependentDeserializer for VersionedDependentCodec<C, D>
where
    C: DependentCodec,
    D: DependentDeserializer<Value = C::Value, Extra = C::Extra>,
{
    type Value = C::Value;
    type Extra = C::Extra;

    fn version(&self) -> i32 {
        self.core.version()
    }

    fn deserialize(
        &self,
        ctx: &mut DeserializationContext<'_>,
        extra: &Self::Extra,
    ) -> Result<Self::Value> {
        self.core.deserialize(ctx, extra)
    }

    fn supports_version(&self, version: i32) -> bool {
        self.core.supports_version(version) || self.legacy.supports_version(version)
    }

    fn versions(&self) -> Vec<i32> {
        let mut versions = self.core.versions();
        versions.extend(self.legacy.versions());
        versions
    }

    fn deserialize_version(
        &self,
        ctx: &mut DeserializationContext<'_>,
        version: i32,
        extra: &Self::Extra,
    ) -> Result<Self::Value> {
        if self.core.supports_version(version) {
            return self.core.deserialize_version(ctx, version, extra);
        }
        if !self.legacy.supports_version(version) {
            return Err(unsupported::<C::Value>(version, self.core.version()));
        }
        tracing::debug!(
            codec = type_name::<C::Value>(),
            version,
            current = self.core.version(),
            "dispatching to legacy dependent decoder"
        );
        self.legacy.deserialize_version(ctx, version, extra)
    }
}

impl<C, D> DependentCodec for VersionedDependentCodec<C, D>
where
    C: DependentCodec,
    D: DependentDeserializer<Value = C::Value, Extra = C::Extra>,
{
    fn serialize(&self, ctx: &mut SerializationContext<'_>, value: &Self::Value) -> Result<()> {
        self.core.serialize(ctx, value)
    }
}

/// 历史解码器声明的每个版本都不得已被 `taken` 认领。
fn check_disjoint<T: ?Sized>(taken: impl Fn(i32) -> bool, legacy: Vec<i32>) -> Result<()> {
    match legacy.into_iter().find(|&version| taken(version)) {
        Some(version) => Err(CodecError::configuration(format!(
            "codec for `{}` already has a decoder for version {version}",
            type_name::<T>()
        ))),
        None => Ok(()),
    }
}
