use std::io::{ErrorKind, Read, Write};

use super::{DataReader, DataWriter};
use crate::error::{CodecError, Result};

/// 把任意 [`Write`] 适配为 [`DataWriter`]。
#[derive(Debug)]
pub struct IoSink<W> {
    inner: W,
}

impl<W: Write> IoSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush().map_err(CodecError::from)
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> DataWriter for IoSink<W> {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes).map_err(CodecError::from)
    }
}

/// 把任意 [`Read`] 适配为 [`DataReader`]。
///
/// 流式来源无法预知剩余长度，`UnexpectedEof` 会被映射为 [`CodecError::StreamTruncated`]，
/// 其中 `remaining` 记为 0。
#[derive(Debug)]
pub struct IoSource<R> {
    inner: R,
}

impl<R: Read> IoSource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> DataReader for IoSource<R> {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let needed = buf.len();
        self.inner.read_exact(buf).map_err(|error| match error.kind() {
            ErrorKind::UnexpectedEof => CodecError::StreamTruncated {
                needed,
                remaining: 0,
            },
            _ => CodecError::from(error),
        })
    }
}
