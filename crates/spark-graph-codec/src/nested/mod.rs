//! # nested 模块说明
//!
//! ## 角色定位（Why）
//! - 某些对象没有独立身份，逻辑上是其“外部”所有者的一部分（例如人的手臂、图的节点）；
//!   它们只能经由所有者编解码：写端由所有者的 [`OuterType::encode_inner`] 写出载荷，
//!   读端由所有者的 [`OuterType::decode_inner`] 重建对象；
//! - 内部对象与所有者可能互相可达：所有者的载荷在写完之前就引用到自己的内部对象。
//!   上下文会把这类内部载荷延迟到所有者载荷之后，详见 [`crate::context`]。
//!
//! ## 契约说明（What）
//! - 内部类型通过 [`InnerType::outer`] 暴露一个弱回指（关系而非所有权）；所有者已被释放时
//!   编码报告 [`CodecError::OwnerUnavailable`]；
//! - [`crate::TypeRegistry::register_inner`] 同时登记“内部类型 → 所有者”与“所有者 → 外部能力”
//!   两张表，后者以所有者的运行时类型为键，解码端据此把通用对象还原为 `Rc<dyn OuterType>`。

mod inner_registry;

pub use inner_registry::InnerTypeRegistry;

use alloc::{collections::BTreeMap, format, rc::Rc};
use core::any::{Any, TypeId, type_name};

use crate::context::{DeserializationContext, SerializationContext};
use crate::error::{CodecError, Result};
use crate::object::Object;

/// 没有独立身份、只能经由所有者编解码的类型。
pub trait InnerType: Any {
    type Outer: OuterType;

    /// 所有者；回指为弱引用，所有者已释放时返回 `None`。
    fn outer(&self) -> Option<Rc<Self::Outer>>;
}

/// 拥有内部对象并负责其编解码的类型。
///
/// `decode_inner` 以 `Rc<Self>` 调用，便于新建的内部对象保存指向所有者的 `Weak`。
pub trait OuterType: Any {
    fn encode_inner(&self, ctx: &mut SerializationContext<'_>, inner: &Object) -> Result<()>;

    fn decode_inner(self: Rc<Self>, ctx: &mut DeserializationContext<'_>) -> Result<Object>;
}

type OwnerFn = fn(&Object) -> Result<Object>;
type OuterFn = fn(&Object) -> Result<Rc<dyn OuterType>>;

/// 内/外部绑定表。
#[derive(Default)]
pub(crate) struct NestingTable {
    owners: BTreeMap<TypeId, OwnerFn>,
    outers: BTreeMap<TypeId, OuterFn>,
}

impl NestingTable {
    pub(crate) fn bind<I: InnerType>(&mut self) -> Result<()> {
        if self.owners.contains_key(&TypeId::of::<I>()) {
            return Err(CodecError::configuration(format!(
                "inner type `{}` is already registered",
                type_name::<I>()
            )));
        }
        self.owners.insert(TypeId::of::<I>(), owner_of::<I>);
        self.outers
            .entry(TypeId::of::<I::Outer>())
            .or_insert(as_outer::<I::Outer>);
        Ok(())
    }

    pub(crate) fn is_inner(&self, type_id: TypeId) -> bool {
        self.owners.contains_key(&type_id)
    }

    pub(crate) fn owner_of(&self, value: &Object) -> Result<Option<Object>> {
        match self.owners.get(&value.type_id()) {
            Some(owner) => owner(value).map(Some),
            None => Ok(None),
        }
    }

    pub(crate) fn as_outer(&self, owner: &Object) -> Result<Rc<dyn OuterType>> {
        let cast = self
            .outers
            .get(&owner.type_id())
            .ok_or(CodecError::OwnerUnavailable {
                type_name: owner.type_name(),
                detail: "type is not the outer type of any registered inner type",
            })?;
        cast(owner)
    }
}

fn owner_of<I: InnerType>(value: &Object) -> Result<Object> {
    let inner = value
        .downcast_ref::<I>()
        .ok_or(CodecError::TypeMismatch {
            expected: type_name::<I>(),
            found: value.type_name(),
        })?;
    inner
        .outer()
        .map(Object::new)
        .ok_or(CodecError::OwnerUnavailable {
            type_name: type_name::<I>(),
            detail: "owner has already been dropped",
        })
}

fn as_outer<O: OuterType>(owner: &Object) -> Result<Rc<dyn OuterType>> {
    let outer: Rc<dyn OuterType> = owner.clone().downcast::<O>()?;
    Ok(outer)
}
