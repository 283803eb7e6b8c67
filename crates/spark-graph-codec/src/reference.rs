//! 单次赋值的前向引用单元。

use alloc::{boxed::Box, rc::Rc, vec::Vec};
use core::any::type_name;
use core::cell::RefCell;
use core::fmt;

use crate::error::{CodecError, Result};

type Waiter<T> = Box<dyn FnOnce(T)>;

enum State<T> {
    Empty(Vec<Waiter<T>>),
    Resolved(T),
}

/// 指向“可能尚未存在”的值的句柄。
///
/// # 教案式说明
/// - **意图 (Why)**：解码循环图时，被引用对象可能仍处于挂起状态；业务编解码器拿到
///   `ObjectReference` 后可以先登记用途，待对象图解析完成再真正使用；
/// - **契约 (What)**：
///   - [`set_value`](Self::set_value) 至多调用一次，第二次返回 [`CodecError::DoubleAssignment`]；
///   - [`get`](Self::get) 在已有值时立即执行回调，否则排队，赋值时按登记顺序同步执行；
///   - [`value`](Self::value) 在赋值前调用返回 [`CodecError::UnresolvedReference`]；
/// - **执行 (How)**：状态保存在 `Rc<RefCell<_>>` 中，克隆句柄共享同一状态；赋值时先切换状态、
///   释放借用，再依次执行等待者，因此回调内部可以安全地再次访问同一引用。
pub struct ObjectReference<T> {
    state: Rc<RefCell<State<T>>>,
}

impl<T: Clone + 'static> ObjectReference<T> {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(State::Empty(Vec::new()))),
        }
    }

    /// 创建一个已经持有值的引用。
    pub fn resolved(value: T) -> Self {
        Self {
            state: Rc::new(RefCell::new(State::Resolved(value))),
        }
    }

    pub fn set_value(&self, value: T) -> Result<()> {
        let previous = {
            let mut state = self.state.borrow_mut();
            if matches!(&*state, State::Resolved(_)) {
                return Err(CodecError::DoubleAssignment {
                    what: "object reference",
                });
            }
            core::mem::replace(&mut *state, State::Resolved(value.clone()))
        };
        if let State::Empty(waiting) = previous {
            for waiter in waiting {
                waiter(value.clone());
            }
        }
        Ok(())
    }

    pub fn get(&self, callback: impl FnOnce(T) + 'static) {
        let resolved = match &mut *self.state.borrow_mut() {
            State::Resolved(value) => value.clone(),
            State::Empty(waiting) => {
                waiting.push(Box::new(callback));
                return;
            }
        };
        callback(resolved);
    }

    pub fn value(&self) -> Result<T> {
        match &*self.state.borrow() {
            State::Resolved(value) => Ok(value.clone()),
            State::Empty(_) => Err(CodecError::UnresolvedReference {
                type_name: type_name::<T>(),
            }),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(&*self.state.borrow(), State::Resolved(_))
    }
}

impl<T: Clone + 'static> Default for ObjectReference<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ObjectReference<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T> fmt::Debug for ObjectReference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let resolved = matches!(&*self.state.borrow(), State::Resolved(_));
        f.debug_struct("ObjectReference")
            .field("type", &type_name::<T>())
            .field("resolved", &resolved)
            .finish()
    }
}
