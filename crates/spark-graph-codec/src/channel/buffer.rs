use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{DataReader, DataWriter};
use crate::error::{CodecError, Result};

/// 基于 [`BytesMut`] 的内存写入端。
#[derive(Debug, Default)]
pub struct ByteSink {
    buf: BytesMut,
}

impl ByteSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// 冻结为只读的 [`Bytes`]，零拷贝。
    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}

impl DataWriter for ByteSink {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.buf.put_slice(bytes);
        Ok(())
    }

    fn write_u8(&mut self, value: u8) -> Result<()> {
        self.buf.put_u8(value);
        Ok(())
    }
}

/// 基于 [`Bytes`] 的内存读取端。
///
/// 读取失败时游标不前移，便于调用方在诊断时查看剩余字节。
#[derive(Clone, Debug)]
pub struct ByteSource {
    buf: Bytes,
}

impl ByteSource {
    pub fn new(buf: impl Into<Bytes>) -> Self {
        Self { buf: buf.into() }
    }

    pub fn is_exhausted(&self) -> bool {
        !self.buf.has_remaining()
    }

    /// 取回尚未消费的字节。
    pub fn into_remaining(self) -> Bytes {
        self.buf
    }
}

impl DataReader for ByteSource {
    fn read_exact(&mut self, out: &mut [u8]) -> Result<()> {
        if self.buf.remaining() < out.len() {
            return Err(CodecError::StreamTruncated {
                needed: out.len(),
                remaining: self.buf.remaining(),
            });
        }
        self.buf.copy_to_slice(out);
        Ok(())
    }

    fn remaining(&self) -> Option<usize> {
        Some(self.buf.remaining())
    }

    fn read_u8(&mut self) -> Result<u8> {
        if !self.buf.has_remaining() {
            return Err(CodecError::StreamTruncated {
                needed: 1,
                remaining: 0,
            });
        }
        Ok(self.buf.get_u8())
    }
}
