#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]

//! # spark-graph-codec
//!
//! ## 角色定位（Why）
//! - 将带有共享引用与循环的内存对象图编码为紧凑字节流，并在解码端还原出同构的对象图；
//! - 让业务类型只需提供“逐字段”的编解码函数，指针修补、循环切断、版本协商全部由上下文承担。
//!
//! ## 结构总览（How）
//! - [`channel`]：原始字节通道，负责定宽标量与 UTF-8 文本的顺序读写；
//! - [`varint`]：1~5 字节的有符号变长整数，用于所有长度、对象编号、类型标签与版本号；
//! - [`object`] / [`reference`]：类型擦除的共享对象句柄，以及单次赋值的前向引用单元；
//! - [`codec`]：泛型编解码契约、版本链与标准编解码器；
//! - [`registry`]：多态类型注册表，负责“运行时类型 ↔ 线上标签”的双向映射；
//! - [`nested`]：内/外部类型协议，让没有独立身份的对象只能经由其所有者编解码；
//! - [`context`]：一次编解码过程（Pass）的编排者，维护对象身份表与挂起槽位；
//! - [`pass`]：一次性完成根对象编码/解码的便捷门面。
//!
//! ## 契约说明（What）
//! - 单线程、同步、递归下降执行，一个上下文只服务一次 Pass；
//! - 所有错误以 [`CodecError`] 上抛，不存在部分成功模式，失败的 Pass 必须整体丢弃。
//!
//! ## 快速示例
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use spark_graph_codec::{Codec, Deserializer, DeserializationContext, Pass, Result,
//!     SerializationContext, TypeRegistry};
//!
//! struct Node {
//!     name: String,
//!     next: RefCell<Option<Rc<Node>>>,
//! }
//!
//! struct NodeCodec;
//!
//! impl Deserializer for NodeCodec {
//!     type Value = Rc<Node>;
//!
//!     fn deserialize(&self, ctx: &mut DeserializationContext<'_>) -> Result<Rc<Node>> {
//!         let node = Rc::new(Node { name: ctx.read_string()?, next: RefCell::new(None) });
//!         let target = Rc::clone(&node);
//!         ctx.read_object(move |next: Rc<Node>| *target.next.borrow_mut() = Some(next))?;
//!         Ok(node)
//!     }
//! }
//!
//! impl Codec for NodeCodec {
//!     fn serialize(&self, ctx: &mut SerializationContext<'_>, node: &Rc<Node>) -> Result<()> {
//!         ctx.write_string(&node.name)?;
//!         let next = node.next.borrow().clone().expect("ring is closed");
//!         ctx.write_object(&next)
//!     }
//! }
//!
//! let mut registry = TypeRegistry::new();
//! registry.register(0, NodeCodec).expect("register node");
//!
//! // 两个节点首尾相连，形成环。
//! let a = Rc::new(Node { name: "a".into(), next: RefCell::new(None) });
//! let b = Rc::new(Node { name: "b".into(), next: RefCell::new(Some(Rc::clone(&a))) });
//! *a.next.borrow_mut() = Some(Rc::clone(&b));
//!
//! let bytes = Pass::new(&registry).encode_object(&a).expect("encode");
//! let decoded: Rc<Node> = Pass::new(&registry).decode_object(bytes).expect("decode");
//! let second = decoded.next.borrow().clone().expect("b");
//! assert_eq!(second.name, "b");
//! let back = second.next.borrow().clone().expect("a");
//! assert!(Rc::ptr_eq(&back, &decoded));
//! ```

extern crate alloc;

pub mod channel;
pub mod codec;
pub mod context;
pub mod error;
pub mod limits;
pub mod nested;
pub mod object;
pub mod pass;
pub mod reference;
pub mod registry;
pub mod varint;

pub use channel::{ByteSink, ByteSource, DataReader, DataWriter};
#[cfg(feature = "std")]
pub use channel::{IoSink, IoSource};
pub use codec::{
    Codec, DependentCodec, DependentDeserializer, Deserializer, VersionedCodec,
    VersionedDependentCodec,
};
pub use context::{DeserializationContext, SerializationContext};
pub use error::{CodecError, Result, codes};
pub use limits::CodecLimits;
pub use nested::{InnerType, InnerTypeRegistry, OuterType};
pub use object::{AsObject, Object, ObjectId};
pub use pass::Pass;
pub use reference::ObjectReference;
pub use registry::{Decoded, DynCodec, ObjectCodec, Registration, TagFormat, TypeRegistry};
