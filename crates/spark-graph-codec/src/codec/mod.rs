//! # codec 模块说明
//!
//! ## 角色定位（Why）
//! - 定义业务类型编解码器需要实现的契约：自包含的 [`Codec`] 与依赖外部上下文的 [`DependentCodec`]；
//! - 提供版本链：任意编解码器可通过 `.with(legacy)` 挂接历史版本解码器，线上格式演进时
//!   仍能读取所有曾经发布过的版本。
//!
//! ## 结构安排（How）
//! - `traits`：四个核心 trait 与闭包适配器；
//! - `versioned`：版本链结构，构造时即检查版本号冲突；
//! - [`standard`]：标量、字符串、序列、可选值、映射与空载荷等常用编解码器。

mod traits;
mod versioned;

pub mod standard;

pub use traits::{
    Codec, DependentCodec, DependentDeserializer, Deserializer, FnDependentDeserializer,
    FnDeserializer, dependent_deserializer_fn, deserializer_fn,
};
pub(crate) use traits::unsupported;
pub use versioned::{VersionedCodec, VersionedDependentCodec};
