//! 类型擦除的共享对象句柄。
//!
//! 对象图中的节点一律以 `Rc<T>` 共享；[`Object`] 把它擦除为 `Rc<dyn Any>` 并记住原始类型名，
//! 身份判定使用分配地址而非值相等，两个字段完全相同但分属不同分配的对象会得到不同的 [`ObjectId`]。

use alloc::rc::Rc;
use core::any::{Any, TypeId, type_name};
use core::fmt;

use crate::error::{CodecError, Result};

/// Pass 内的对象编号，按首次遇到的顺序从 0 开始分配，不跨 Pass 持久化。
pub type ObjectId = u32;

/// 以分配地址表示的对象身份；空值使用独立的 `Null` 键。
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub(crate) enum IdentityKey {
    Null,
    Address(usize),
}

impl IdentityKey {
    pub(crate) fn of(value: Option<&Object>) -> Self {
        match value {
            None => IdentityKey::Null,
            Some(object) => IdentityKey::Address(object.address()),
        }
    }
}

/// 类型擦除后的共享对象。
///
/// # 教案式说明
/// - **意图 (Why)**：注册表、挂起槽位与回调需要在不知道具体类型的前提下传递对象；
/// - **契约 (What)**：克隆只增加引用计数，克隆前后 [`Object::ptr_eq`] 为真；
///   [`Object::downcast`] 在类型不符时返回 [`CodecError::TypeMismatch`]。
#[derive(Clone)]
pub struct Object {
    value: Rc<dyn Any>,
    type_name: &'static str,
}

impl Object {
    pub fn new<T: Any>(value: Rc<T>) -> Self {
        Self {
            value,
            type_name: type_name::<T>(),
        }
    }

    /// 运行时具体类型的 [`TypeId`]。
    pub fn type_id(&self) -> TypeId {
        Any::type_id(&*self.value)
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// 还原为具体类型的 `Rc<T>`。
    pub fn downcast<T: Any>(self) -> Result<Rc<T>> {
        let found = self.type_name;
        self.value
            .downcast::<T>()
            .map_err(|_| CodecError::TypeMismatch {
                expected: type_name::<T>(),
                found,
            })
    }

    /// 判断两个句柄是否指向同一分配。
    pub fn ptr_eq(&self, other: &Object) -> bool {
        self.address() == other.address()
    }

    pub(crate) fn address(&self) -> usize {
        Rc::as_ptr(&self.value) as *const () as usize
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("type", &self.type_name)
            .field("address", &format_args!("{:#x}", self.address()))
            .finish()
    }
}

impl<T: Any> From<Rc<T>> for Object {
    fn from(value: Rc<T>) -> Self {
        Object::new(value)
    }
}

/// 可以作为对象图节点写出的值。
///
/// 为 `Rc<T>` 与 [`Object`] 实现，使 `write_object` 既接受具体类型也接受已擦除的句柄。
pub trait AsObject {
    fn to_object(&self) -> Object;
}

impl<T: Any> AsObject for Rc<T> {
    fn to_object(&self) -> Object {
        Object::new(Rc::clone(self))
    }
}

impl AsObject for Object {
    fn to_object(&self) -> Object {
        self.clone()
    }
}
