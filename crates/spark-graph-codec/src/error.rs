//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 集中定义对象图编解码过程中可能出现的全部失败语义，保证调用方只需处理一种错误类型；
//! - 为每类错误提供稳定的点分错误码，便于日志聚合与告警规则按码匹配。
//!
//! ## 设计要求（What）
//! - 任何错误都不会被吞掉：上下文内部产生的错误一律上抛到 Pass 的顶层调用方；
//! - 同一挂起槽位上的多个回调、或同一所有者下的多个延迟内部载荷各自失败时，
//!   全部回调仍会被执行，第一个错误作为主错误，其余作为附属错误挂在 [`CodecError::Aggregate`] 上。

use alloc::{boxed::Box, string::String, vec::Vec};

use thiserror::Error;

/// crate 统一的结果别名。
pub type Result<T, E = CodecError> = core::result::Result<T, E>;

/// 稳定错误码。
///
/// 错误码与 [`CodecError`] 变体一一对应，可直接作为日志字段或指标标签使用。
pub mod codes {
    pub const STREAM_TRUNCATED: &str = "graph.stream_truncated";
    pub const MALFORMED: &str = "graph.malformed";
    pub const UNKNOWN_TAG: &str = "graph.unknown_tag";
    pub const UNREGISTERED_TYPE: &str = "graph.unregistered_type";
    pub const VERSION_UNSUPPORTED: &str = "graph.version_unsupported";
    pub const CONFIGURATION: &str = "graph.configuration";
    pub const DOUBLE_ASSIGNMENT: &str = "graph.double_assignment";
    pub const NULL_FROM_NON_NULL: &str = "graph.null_from_non_null";
    pub const TYPE_MISMATCH: &str = "graph.type_mismatch";
    pub const UNRESOLVED_REFERENCE: &str = "graph.unresolved_reference";
    pub const OWNER_UNAVAILABLE: &str = "graph.owner_unavailable";
    pub const LIMIT_EXCEEDED: &str = "graph.limit_exceeded";
    pub const IO: &str = "graph.io";
    pub const AGGREGATE: &str = "graph.aggregate";
}

/// 对象图编解码错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：区分“线上数据损坏”“注册配置错误”“调用方误用”三大类失败，
///   让上层能够决定是丢弃数据、修复配置还是修复代码；
/// - **契约 (What)**：所有变体均可 `Clone` 与比较，方便测试断言；通过 [`CodecError::code`]
///   取得稳定错误码；
/// - **设计权衡 (Trade-offs)**：类型名使用 `&'static str`（来自 `core::any::type_name`），
///   零分配但只适合诊断展示，不可作为稳定标识持久化。
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum CodecError {
    /// 字节源在读取中途耗尽。
    #[error("stream truncated: needed {needed} byte(s) but only {remaining} remain")]
    StreamTruncated { needed: usize, remaining: usize },

    /// 字节流结构非法，例如变长整数首字节越界、布尔值不是 0/1、对象编号乱序等。
    #[error("malformed input while reading {context}: {detail}")]
    Malformed {
        context: &'static str,
        detail: String,
    },

    /// 解码时遇到未注册的类型标签。
    #[error("no type registered for tag {tag}")]
    UnknownTag { tag: u32 },

    /// 编码时遇到未注册的运行时类型。
    #[error("type `{type_name}` is not registered")]
    UnregisteredType { type_name: &'static str },

    /// 线上版本号既不是当前版本，也没有对应的遗留解码器。
    #[error("codec for `{codec}` cannot decode version {version} (current version is {current})")]
    UnsupportedVersion {
        codec: &'static str,
        version: i32,
        current: i32,
    },

    /// 注册或构造阶段的配置错误：重复标签、重复类型、标签越界、遗留版本冲突等。
    #[error("invalid codec configuration: {detail}")]
    Configuration { detail: String },

    /// 单次赋值单元被第二次赋值。
    #[error("{what} was assigned twice")]
    DoubleAssignment { what: &'static str },

    /// 非空类型的解码器产出了空值，视为线上数据损坏。
    #[error("decoder for `{type_name}` (tag {tag}) produced null")]
    NullFromNonNullType { type_name: &'static str, tag: u32 },

    /// 解码出的对象与调用方期望的类型不一致。
    #[error("expected an object of type `{expected}` but found `{found}`")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// 在前向引用完成解析之前读取其值。
    #[error("reference to `{type_name}` was read before it was resolved")]
    UnresolvedReference { type_name: &'static str },

    /// 内部对象无法取得其所有者，或所有者类型没有登记内部编解码能力。
    #[error("inner/outer binding for `{type_name}` is unavailable: {detail}")]
    OwnerUnavailable {
        type_name: &'static str,
        detail: &'static str,
    },

    /// 超出 [`crate::CodecLimits`] 设定的边界。
    #[error("{limit} limit exceeded: {actual} > {max}")]
    LimitExceeded {
        limit: &'static str,
        actual: usize,
        max: usize,
    },

    /// 底层 `std::io` 读写失败。
    #[error("i/o failure: {detail}")]
    Io { detail: String },

    /// 多个回调或延迟载荷各自失败后的聚合错误。
    #[error("{primary} (and {} suppressed error(s))", .suppressed.len())]
    Aggregate {
        primary: Box<CodecError>,
        suppressed: Vec<CodecError>,
    },
}

impl CodecError {
    /// 返回错误对应的稳定错误码，聚合错误返回 [`codes::AGGREGATE`]。
    pub fn code(&self) -> &'static str {
        match self {
            CodecError::StreamTruncated { .. } => codes::STREAM_TRUNCATED,
            CodecError::Malformed { .. } => codes::MALFORMED,
            CodecError::UnknownTag { .. } => codes::UNKNOWN_TAG,
            CodecError::UnregisteredType { .. } => codes::UNREGISTERED_TYPE,
            CodecError::UnsupportedVersion { .. } => codes::VERSION_UNSUPPORTED,
            CodecError::Configuration { .. } => codes::CONFIGURATION,
            CodecError::DoubleAssignment { .. } => codes::DOUBLE_ASSIGNMENT,
            CodecError::NullFromNonNullType { .. } => codes::NULL_FROM_NON_NULL,
            CodecError::TypeMismatch { .. } => codes::TYPE_MISMATCH,
            CodecError::UnresolvedReference { .. } => codes::UNRESOLVED_REFERENCE,
            CodecError::OwnerUnavailable { .. } => codes::OWNER_UNAVAILABLE,
            CodecError::LimitExceeded { .. } => codes::LIMIT_EXCEEDED,
            CodecError::Io { .. } => codes::IO,
            CodecError::Aggregate { .. } => codes::AGGREGATE,
        }
    }

    /// 聚合错误返回主错误，其余错误返回自身。
    pub fn primary(&self) -> &CodecError {
        match self {
            CodecError::Aggregate { primary, .. } => primary,
            other => other,
        }
    }

    /// 聚合错误中被附属挂载的错误；非聚合错误返回空切片。
    pub fn suppressed(&self) -> &[CodecError] {
        match self {
            CodecError::Aggregate { suppressed, .. } => suppressed,
            _ => &[],
        }
    }

    pub(crate) fn malformed(context: &'static str, detail: impl Into<String>) -> Self {
        CodecError::Malformed {
            context,
            detail: detail.into(),
        }
    }

    pub(crate) fn configuration(detail: impl Into<String>) -> Self {
        CodecError::Configuration {
            detail: detail.into(),
        }
    }
}

#[cfg(feature = "std")]
impl From<std::io::Error> for CodecError {
    fn from(error: std::io::Error) -> Self {
        use alloc::string::ToString;

        CodecError::Io {
            detail: error.to_string(),
        }
    }
}

/// 按“执行全部、保留首错、附属其余”的规则收集一组回调的结果。
#[derive(Debug, Default)]
pub(crate) struct ErrorCollector {
    primary: Option<CodecError>,
    suppressed: Vec<CodecError>,
}

impl ErrorCollector {
    pub(crate) fn record(&mut self, outcome: Result<()>) {
        if let Err(error) = outcome {
            match self.primary {
                None => self.primary = Some(error),
                Some(_) => self.suppressed.push(error),
            }
        }
    }

    pub(crate) fn finish(self) -> Result<()> {
        match self.primary {
            None => Ok(()),
            Some(primary) if self.suppressed.is_empty() => Err(primary),
            Some(primary) => Err(CodecError::Aggregate {
                primary: Box::new(primary),
                suppressed: self.suppressed,
            }),
        }
    }
}
