use alloc::{boxed::Box, collections::BTreeMap, format, rc::Rc};
use core::any::{Any, TypeId, type_name};

use super::erased::{DynCodec, Registration, TypedCodecAdapter};
use super::{Decoded, ObjectCodec};
use crate::codec::Codec;
use crate::context::{DeserializationContext, SerializationContext};
use crate::error::{CodecError, Result};
use crate::nested::{InnerType, NestingTable, OuterType};
use crate::object::Object;

/// 空值与内部标记的载荷版本。
const PSEUDO_TYPE_VERSION: i32 = 0;

/// 类型标签的线上宽度。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TagFormat {
    /// 单字节标签，取值 `0..=255`。
    Compact,
    /// 变长整数标签，取值 `0..=i32::MAX`。
    Wide,
}

impl TagFormat {
    pub const fn max_tag(self) -> u32 {
        match self {
            TagFormat::Compact => u8::MAX as u32,
            TagFormat::Wide => i32::MAX as u32,
        }
    }

    fn write(self, ctx: &mut SerializationContext<'_>, tag: u32) -> Result<()> {
        match self {
            TagFormat::Compact => ctx.write_u8(tag as u8),
            TagFormat::Wide => ctx.write_varint(tag as i32),
        }
    }

    fn read(self, ctx: &mut DeserializationContext<'_>) -> Result<u32> {
        match self {
            TagFormat::Compact => ctx.read_u8().map(u32::from),
            TagFormat::Wide => {
                let raw = ctx.read_varint()?;
                u32::try_from(raw)
                    .map_err(|_| CodecError::malformed("type tag", format!("negative tag {raw}")))
            }
        }
    }
}

enum Entry {
    Null,
    InnerMarker,
    Type(Box<dyn DynCodec>),
}

/// 多态类型注册表。
///
/// # 教案式说明
/// - **意图 (Why)**：用显式的“标签 → 编解码器”表取代运行时反射；线上携带标签，解码端据此分派；
/// - **契约 (What)**：
///   - 标签与类型一一对应，重复标签、重复类型、越界标签在注册时即返回
///     [`CodecError::Configuration`]；
///   - 写出记录为 `tag + varint(version) + payload`，标签宽度由 [`TagFormat`] 决定；
///   - 可选的空值标签让 `None` 能够编码；未登记空值标签时编码空值报告
///     [`CodecError::UnregisteredType`]；
///   - 内部类型（[`InnerType`]）不占用标签，只能通过内部标记与其所有者到达；
/// - **执行 (How)**：按类型查标签用 `BTreeMap<TypeId, u32>`，按标签查编解码器用 `BTreeMap<u32, Entry>`。
pub struct TypeRegistry {
    format: TagFormat,
    by_tag: BTreeMap<u32, Entry>,
    by_type: BTreeMap<TypeId, u32>,
    null_tag: Option<u32>,
    inner_marker_tag: Option<u32>,
    nesting: NestingTable,
}

impl TypeRegistry {
    /// 变长整数标签的注册表。
    pub fn new() -> Self {
        Self::with_format(TagFormat::Wide)
    }

    /// 单字节标签的注册表。
    pub fn compact() -> Self {
        Self::with_format(TagFormat::Compact)
    }

    pub fn with_format(format: TagFormat) -> Self {
        Self {
            format,
            by_tag: BTreeMap::new(),
            by_type: BTreeMap::new(),
            null_tag: None,
            inner_marker_tag: None,
            nesting: NestingTable::default(),
        }
    }

    pub fn format(&self) -> TagFormat {
        self.format
    }

    /// 为类型 `T` 注册标签与编解码器，返回可继续挂接历史解码器的回执。
    pub fn register<T, C>(&mut self, tag: u32, codec: C) -> Result<Registration<T, C>>
    where
        T: Any,
        C: Codec<Value = Rc<T>> + 'static,
    {
        let adapter = TypedCodecAdapter::new(codec);
        let registration = adapter.registration();
        self.register_dyn(tag, Box::new(adapter))?;
        Ok(registration)
    }

    /// 注册一个已类型擦除的编解码器。
    pub fn register_dyn(&mut self, tag: u32, codec: Box<dyn DynCodec>) -> Result<()> {
        let type_id = codec.value_type_id();
        if self.by_type.contains_key(&type_id) {
            return Err(CodecError::configuration(format!(
                "type `{}` is already registered",
                codec.type_name()
            )));
        }
        if self.nesting.is_inner(type_id) {
            return Err(CodecError::configuration(format!(
                "type `{}` is registered as an inner type and cannot own a tag",
                codec.type_name()
            )));
        }
        self.claim_tag(tag)?;
        self.by_type.insert(type_id, tag);
        self.by_tag.insert(tag, Entry::Type(codec));
        Ok(())
    }

    /// 登记空值标签。
    pub fn register_null(&mut self, tag: u32) -> Result<()> {
        if self.null_tag.is_some() {
            return Err(CodecError::configuration("null tag is already registered"));
        }
        self.claim_tag(tag)?;
        self.by_tag.insert(tag, Entry::Null);
        self.null_tag = Some(tag);
        Ok(())
    }

    /// 登记内部标记标签；使用内部类型前必须登记。
    pub fn register_inner_marker(&mut self, tag: u32) -> Result<()> {
        if self.inner_marker_tag.is_some() {
            return Err(CodecError::configuration(
                "inner marker tag is already registered",
            ));
        }
        self.claim_tag(tag)?;
        self.by_tag.insert(tag, Entry::InnerMarker);
        self.inner_marker_tag = Some(tag);
        Ok(())
    }

    /// 把 `I` 登记为内部类型，同时登记其所有者类型的内部编解码能力。
    pub fn register_inner<I: InnerType>(&mut self) -> Result<()> {
        if self.by_type.contains_key(&TypeId::of::<I>()) {
            return Err(CodecError::configuration(format!(
                "type `{}` already owns a tag and cannot become an inner type",
                type_name::<I>()
            )));
        }
        self.nesting.bind::<I>()
    }

    /// 查询类型 `T` 的标签。
    pub fn tag_of<T: Any>(&self) -> Option<u32> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    pub fn null_tag(&self) -> Option<u32> {
        self.null_tag
    }

    pub fn inner_marker_tag(&self) -> Option<u32> {
        self.inner_marker_tag
    }

    fn claim_tag(&self, tag: u32) -> Result<()> {
        if tag > self.format.max_tag() {
            return Err(CodecError::configuration(format!(
                "tag {tag} is outside [0, {}] for {:?} tags",
                self.format.max_tag(),
                self.format
            )));
        }
        if self.by_tag.contains_key(&tag) {
            return Err(CodecError::configuration(format!(
                "tag {tag} is already registered"
            )));
        }
        Ok(())
    }

    fn write_pseudo(&self, ctx: &mut SerializationContext<'_>, tag: u32) -> Result<()> {
        self.format.write(ctx, tag)?;
        ctx.write_varint(PSEUDO_TYPE_VERSION)
    }

    fn read_pseudo_version(ctx: &mut DeserializationContext<'_>, name: &'static str) -> Result<()> {
        let version = ctx.read_version()?;
        if version != PSEUDO_TYPE_VERSION {
            return Err(CodecError::UnsupportedVersion {
                codec: name,
                version,
                current: PSEUDO_TYPE_VERSION,
            });
        }
        Ok(())
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectCodec for TypeRegistry {
    fn serialize(&self, ctx: &mut SerializationContext<'_>, value: Option<&Object>) -> Result<()> {
        let Some(value) = value else {
            let tag = self
                .null_tag
                .ok_or(CodecError::UnregisteredType { type_name: "null" })?;
            return self.write_pseudo(ctx, tag);
        };
        let tag = self
            .by_type
            .get(&value.type_id())
            .copied()
            .ok_or(CodecError::UnregisteredType {
                type_name: value.type_name(),
            })?;
        let Some(Entry::Type(codec)) = self.by_tag.get(&tag) else {
            return Err(CodecError::UnregisteredType {
                type_name: value.type_name(),
            });
        };
        self.format.write(ctx, tag)?;
        codec.encode_erased(ctx, value)
    }

    fn serialize_inner_marker(&self, ctx: &mut SerializationContext<'_>) -> Result<()> {
        let tag = self.inner_marker_tag.ok_or(CodecError::UnregisteredType {
            type_name: "inner marker",
        })?;
        self.write_pseudo(ctx, tag)
    }

    fn deserialize(&self, ctx: &mut DeserializationContext<'_>) -> Result<Decoded> {
        let tag = self.format.read(ctx)?;
        match self.by_tag.get(&tag) {
            None => Err(CodecError::UnknownTag { tag }),
            Some(Entry::Null) => {
                Self::read_pseudo_version(ctx, "null")?;
                Ok(Decoded::Value(None))
            }
            Some(Entry::InnerMarker) => {
                Self::read_pseudo_version(ctx, "inner marker")?;
                Ok(Decoded::InnerMarker)
            }
            Some(Entry::Type(codec)) => match codec.decode_erased(ctx)? {
                Some(value) => Ok(Decoded::Value(Some(value))),
                None => Err(CodecError::NullFromNonNullType {
                    type_name: codec.type_name(),
                    tag,
                }),
            },
        }
    }

    fn owner_of(&self, value: &Object) -> Result<Option<Object>> {
        self.nesting.owner_of(value)
    }

    fn as_outer(&self, owner: &Object) -> Result<Rc<dyn OuterType>> {
        self.nesting.as_outer(owner)
    }
}
