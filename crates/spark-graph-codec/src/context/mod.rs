//! # context 模块说明
//!
//! ## 角色定位（Why）
//! - 上下文是一次 Pass 的编排者：持有 Pass 级的身份表与挂起槽位，实现对象图（含循环）的
//!   写出与读取算法，并向业务编解码器暴露统一的读写契约；
//! - 内/外部协议的延迟逻辑也集中在这里，写端与读端的延迟决策严格对称。
//!
//! ## 对称性约束（What）
//! - 写端“某对象处于进行中”与读端“某槽位处于挂起”在任意时刻一一对应：
//!   普通对象在载荷写完（读完）并完成延迟内部载荷后结束；内部对象在其所有者调用
//!   `encode_inner`（`decode_inner`）完成后结束；
//! - 所有者进行中时遇到的内部对象，其载荷排在所有者载荷之后、按登记顺序写出；
//!   读端把对应的续体登记在所有者槽位的延迟列表上，在普通等待者之后按相同顺序执行。

mod deserialize;
mod serialize;

pub use deserialize::DeserializationContext;
pub use serialize::SerializationContext;

use alloc::format;

use crate::error::{CodecError, Result};

fn length_to_wire(len: usize, context: &'static str) -> Result<i32> {
    i32::try_from(len).map_err(|_| CodecError::LimitExceeded {
        limit: context,
        actual: len,
        max: i32::MAX as usize,
    })
}

fn length_from_wire(raw: i32, context: &'static str) -> Result<usize> {
    usize::try_from(raw)
        .map_err(|_| CodecError::malformed(context, format!("negative length {raw}")))
}
