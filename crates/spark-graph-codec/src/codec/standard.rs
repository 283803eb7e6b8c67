//! 常用编解码器。
//!
//! 标量编解码器都是零尺寸类型，版本号为 0；组合器（[`SequenceCodec`]、[`OptionalCodec`]、
//! [`MappedCodec`]）把元素编解码器的版本头一并写入每个元素，与上下文的 `write`/`read` 保持一致。

use alloc::{string::String, vec::Vec};
use core::fmt;
use core::marker::PhantomData;

use super::traits::{Codec, Deserializer};
use crate::context::{DeserializationContext, SerializationContext};
use crate::error::Result;

macro_rules! scalar_codec {
    ($(#[$meta:meta])* $name:ident, $ty:ty, $write:ident, $read:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default)]
        pub struct $name;

        impl Deserializer for $name {
            type Value = $ty;

            fn deserialize(&self, ctx: &mut DeserializationContext<'_>) -> Result<$ty> {
                ctx.$read()
            }
        }

        impl Codec for $name {
            fn serialize(&self, ctx: &mut SerializationContext<'_>, value: &$ty) -> Result<()> {
                ctx.$write(*value)
            }
        }
    };
}

scalar_codec!(
    /// `i32` 以变长整数写出。
    VarIntCodec, i32, write_varint, read_varint
);
scalar_codec!(I8Codec, i8, write_i8, read_i8);
scalar_codec!(I16Codec, i16, write_i16, read_i16);
scalar_codec!(
    /// `i32` 以 4 字节大端定宽写出。
    I32Codec, i32, write_i32, read_i32
);
scalar_codec!(I64Codec, i64, write_i64, read_i64);
scalar_codec!(F32Codec, f32, write_f32, read_f32);
scalar_codec!(F64Codec, f64, write_f64, read_f64);
scalar_codec!(BoolCodec, bool, write_bool, read_bool);
scalar_codec!(CharCodec, char, write_char, read_char);

/// 长度前缀的 UTF-8 字符串。
#[derive(Clone, Copy, Debug, Default)]
pub struct StringCodec;

impl Deserializer for StringCodec {
    type Value = String;

    fn deserialize(&self, ctx: &mut DeserializationContext<'_>) -> Result<String> {
        ctx.read_string()
    }
}

impl Codec for StringCodec {
    fn serialize(&self, ctx: &mut SerializationContext<'_>, value: &String) -> Result<()> {
        ctx.write_string(value)
    }
}

/// 长度前缀的字节数组。
#[derive(Clone, Copy, Debug, Default)]
pub struct BytesCodec;

impl Deserializer for BytesCodec {
    type Value = Vec<u8>;

    fn deserialize(&self, ctx: &mut DeserializationContext<'_>) -> Result<Vec<u8>> {
        ctx.read_byte_array()
    }
}

impl Codec for BytesCodec {
    fn serialize(&self, ctx: &mut SerializationContext<'_>, value: &Vec<u8>) -> Result<()> {
        ctx.write_byte_array(value)
    }
}

/// `varint(count)` 后接 `count` 个元素。
#[derive(Clone, Copy, Debug, Default)]
pub struct SequenceCodec<C>(pub C);

impl<C: Codec> Deserializer for SequenceCodec<C> {
    type Value = Vec<C::Value>;

    fn deserialize(&self, ctx: &mut DeserializationContext<'_>) -> Result<Self::Value> {
        ctx.read_sequence(&self.0)
    }
}

impl<C: Codec> Codec for SequenceCodec<C> {
    fn serialize(&self, ctx: &mut SerializationContext<'_>, value: &Self::Value) -> Result<()> {
        ctx.write_sequence(&self.0, value)
    }
}

/// 一个布尔字节，随后仅在存在时写出载荷。
#[derive(Clone, Copy, Debug, Default)]
pub struct OptionalCodec<C>(pub C);

impl<C: Codec> Deserializer for OptionalCodec<C> {
    type Value = Option<C::Value>;

    fn deserialize(&self, ctx: &mut DeserializationContext<'_>) -> Result<Self::Value> {
        ctx.read_optional(&self.0)
    }
}

impl<C: Codec> Codec for OptionalCodec<C> {
    fn serialize(&self, ctx: &mut SerializationContext<'_>, value: &Self::Value) -> Result<()> {
        ctx.write_optional(&self.0, value.as_ref())
    }
}

/// 借用另一个编解码器的线上格式，在两端做值映射。
///
/// ```
/// use std::rc::Rc;
/// use spark_graph_codec::codec::standard::{MappedCodec, StringCodec};
///
/// struct Book {
///     title: String,
/// }
///
/// let codec = MappedCodec::new(
///     StringCodec,
///     |title: String| Rc::new(Book { title }),
///     |book: &Rc<Book>| book.title.clone(),
/// );
/// # let _ = codec;
/// ```
pub struct MappedCodec<C, F, G, T> {
    inner: C,
    from_inner: F,
    to_inner: G,
    _value: PhantomData<fn() -> T>,
}

impl<C, F, G, T> MappedCodec<C, F, G, T>
where
    C: Codec,
    F: Fn(C::Value) -> T,
    G: Fn(&T) -> C::Value,
{
    pub fn new(inner: C, from_inner: F, to_inner: G) -> Self {
        Self {
            inner,
            from_inner,
            to_inner,
            _value: PhantomData,
        }
    }
}

impl<C, F, G, T> Deserializer for MappedCodec<C, F, G, T>
where
    C: Codec,
    F: Fn(C::Value) -> T,
    G: Fn(&T) -> C::Value,
{
    type Value = T;

    fn version(&self) -> i32 {
        self.inner.version()
    }

    fn deserialize(&self, ctx: &mut DeserializationContext<'_>) -> Result<T> {
        self.inner.deserialize(ctx).map(&self.from_inner)
    }

    // 内层若是版本链，历史版本同样经过映射交付。
    fn supports_version(&self, version: i32) -> bool {
        self.inner.supports_version(version)
    }

    fn versions(&self) -> Vec<i32> {
        self.inner.versions()
    }

    fn deserialize_version(&self, ctx: &mut DeserializationContext<'_>, version: i32) -> Result<T> {
        self.inner
            .deserialize_version(ctx, version)
            .map(&self.from_inner)
    }
}

impl<C, F, G, T> Codec for MappedCodec<C, F, G, T>
where
    C: Codec,
    F: Fn(C::Value) -> T,
    G: Fn(&T) -> C::Value,
{
    fn serialize(&self, ctx: &mut SerializationContext<'_>, value: &T) -> Result<()> {
        self.inner.serialize(ctx, &(self.to_inner)(value))
    }
}

impl<C: fmt::Debug, F, G, T> fmt::Debug for MappedCodec<C, F, G, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedCodec")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

/// 无载荷编解码器：写出时什么也不写，读取时调用工厂构造新值。
///
/// 适合单例或只靠类型本身携带信息的值；版本号可配置，便于挂接到版本链中。
pub struct EmptyCodec<F, T> {
    version: i32,
    factory: F,
    _value: PhantomData<fn() -> T>,
}

impl<F, T> EmptyCodec<F, T>
where
    F: Fn() -> T,
{
    pub fn new(factory: F) -> Self {
        Self::with_version(0, factory)
    }

    pub fn with_version(version: i32, factory: F) -> Self {
        Self {
            version,
            factory,
            _value: PhantomData,
        }
    }
}

impl<F, T> Deserializer for EmptyCodec<F, T>
where
    F: Fn() -> T,
{
    type Value = T;

    fn version(&self) -> i32 {
        self.version
    }

    fn deserialize(&self, _ctx: &mut DeserializationContext<'_>) -> Result<T> {
        Ok((self.factory)())
    }
}

impl<F, T> Codec for EmptyCodec<F, T>
where
    F: Fn() -> T,
{
    fn serialize(&self, _ctx: &mut SerializationContext<'_>, _value: &T) -> Result<()> {
        Ok(())
    }
}

/// 由一对闭包组成的编解码器。
pub struct FnCodec<S, D, T> {
    version: i32,
    encode: S,
    decode: D,
    _value: PhantomData<fn() -> T>,
}

impl<S, D, T> FnCodec<S, D, T>
where
    S: Fn(&mut SerializationContext<'_>, &T) -> Result<()>,
    D: Fn(&mut DeserializationContext<'_>) -> Result<T>,
{
    pub fn new(version: i32, encode: S, decode: D) -> Self {
        Self {
            version,
            encode,
            decode,
            _value: PhantomData,
        }
    }
}

impl<S, D, T> Deserializer for FnCodec<S, D, T>
where
    S: Fn(&mut SerializationContext<'_>, &T) -> Result<()>,
    D: Fn(&mut DeserializationContext<'_>) -> Result<T>,
{
    type Value = T;

    fn version(&self) -> i32 {
        self.version
    }

    fn deserialize(&self, ctx: &mut DeserializationContext<'_>) -> Result<T> {
        (self.decode)(ctx)
    }
}

impl<S, D, T> Codec for FnCodec<S, D, T>
where
    S: Fn(&mut SerializationContext<'_>, &T) -> Result<()>,
    D: Fn(&mut DeserializationContext<'_>) -> Result<T>,
{
    fn serialize(&self, ctx: &mut SerializationContext<'_>, value: &T) -> Result<()> {
        (self.encode)(ctx, value)
    }
}
