//! # registry 模块说明
//!
//! ## 角色定位（Why）
//! - 上下文不认识任何业务类型，它把“写出一个对象的标签与载荷”“读出一个对象”交给
//!   [`ObjectCodec`]，即对象层的通用编解码契约；
//! - [`TypeRegistry`] 是该契约的标准实现：运行时类型 ↔ 线上标签的双向映射，外加空值标签、
//!   内部标记标签与内/外部绑定表。
//!
//! ## 结构安排（How）
//! - `erased`：[`DynCodec`] 对象安全契约与 `TypedCodecAdapter` 桥接，以及注册回执 [`Registration`]；
//! - `type_registry`：[`TypeRegistry`] 与标签宽度 [`TagFormat`]。

mod erased;
mod type_registry;

pub use erased::{DynCodec, Registration, TypedCodecAdapter};
pub use type_registry::{TagFormat, TypeRegistry};

use alloc::rc::Rc;

use crate::context::{DeserializationContext, SerializationContext};
use crate::error::Result;
use crate::nested::OuterType;
use crate::object::Object;

/// 通用对象编解码器解码一条类型记录的结果。
#[derive(Clone, Debug)]
pub enum Decoded {
    /// 普通对象；空值标签解码为 `None`。
    Value(Option<Object>),
    /// 内部标记：真实对象需经其所有者解码。
    InnerMarker,
}

/// 对象层的通用编解码契约，上下文通过它完成多态分派。
///
/// # 契约说明（What）
/// - `serialize`：写出值（或空值）的类型标签、版本与载荷；
/// - `serialize_inner_marker`：写出保留的内部标记记录；
/// - `deserialize`：读出一条类型记录，返回对象、空值或内部标记；
/// - `owner_of`：值若为已登记的内部类型，返回其所有者；普通类型返回 `Ok(None)`；
/// - `as_outer`：把所有者还原为可调用 `encode_inner`/`decode_inner` 的外部类型。
pub trait ObjectCodec {
    fn serialize(&self, ctx: &mut SerializationContext<'_>, value: Option<&Object>) -> Result<()>;

    fn serialize_inner_marker(&self, ctx: &mut SerializationContext<'_>) -> Result<()>;

    fn deserialize(&self, ctx: &mut DeserializationContext<'_>) -> Result<Decoded>;

    fn owner_of(&self, value: &Object) -> Result<Option<Object>>;

    fn as_outer(&self, owner: &Object) -> Result<Rc<dyn OuterType>>;
}
