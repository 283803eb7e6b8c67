//! 编解码边界配置。
//!
//! 对象图的递归深度等于引用链深度，而长度前缀来自不可信输入；`CodecLimits` 为二者设定上限，
//! 使损坏或恶意的字节流只能得到 [`CodecError::LimitExceeded`]，而不是栈溢出或巨量分配。

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, Result};

/// 单次 Pass 的资源边界。
///
/// # 教案式说明
/// - **意图 (Why)**：写端与读端共享同一份边界，写端拒绝产出读端会拒绝的数据；
/// - **契约 (What)**：
///   - `max_depth`：`write_object`/`read_object` 的最大嵌套层数；
///   - `max_sequence_len`：任意序列或对象列表的元素个数上限；
///   - `max_string_bytes`：任意字符串或字节数组的字节长度上限；
/// - **配置 (How)**：派生 `serde`，缺省字段回落到 [`CodecLimits::default`]，可直接从 TOML 片段加载：
///
/// ```
/// let limits: spark_graph_codec::CodecLimits = toml::from_str("max_depth = 64").unwrap();
/// assert_eq!(limits.max_depth, 64);
/// assert_eq!(limits.max_sequence_len, 1 << 24);
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecLimits {
    pub max_depth: usize,
    pub max_sequence_len: usize,
    pub max_string_bytes: usize,
}

impl CodecLimits {
    pub const DEFAULT_MAX_DEPTH: usize = 1024;
    pub const DEFAULT_MAX_SEQUENCE_LEN: usize = 1 << 24;
    pub const DEFAULT_MAX_STRING_BYTES: usize = 16 * 1024 * 1024;

    /// 关闭全部检查，仅适合可信输入。
    pub const fn unbounded() -> Self {
        Self {
            max_depth: usize::MAX,
            max_sequence_len: usize::MAX,
            max_string_bytes: usize::MAX,
        }
    }

    pub(crate) fn check_depth(&self, depth: usize) -> Result<()> {
        check("depth", depth, self.max_depth)
    }

    pub(crate) fn check_sequence_len(&self, len: usize) -> Result<()> {
        check("sequence length", len, self.max_sequence_len)
    }

    pub(crate) fn check_string_bytes(&self, len: usize) -> Result<()> {
        check("string length", len, self.max_string_bytes)
    }
}

impl Default for CodecLimits {
    fn default() -> Self {
        Self {
            max_depth: Self::DEFAULT_MAX_DEPTH,
            max_sequence_len: Self::DEFAULT_MAX_SEQUENCE_LEN,
            max_string_bytes: Self::DEFAULT_MAX_STRING_BYTES,
        }
    }
}

fn check(limit: &'static str, actual: usize, max: usize) -> Result<()> {
    if actual > max {
        return Err(CodecError::LimitExceeded { limit, actual, max });
    }
    Ok(())
}
