//! # channel 模块说明
//!
//! ## 角色定位（Why）
//! - 原始字节通道：只负责定宽标量的大端序读写，不理解对象身份、变长整数或对象图语义；
//! - 上下文通过 `&mut dyn DataWriter` / `&mut dyn DataReader` 使用通道，调用方可自由选择
//!   内存缓冲（[`ByteSink`]/[`ByteSource`]）或 `std::io` 流（[`IoSink`]/[`IoSource`]）。
//!
//! ## 契约说明（What）
//! - 实现者只需提供 `write_bytes` / `read_exact`，其余标量方法均有默认实现；
//! - 读端在字节不足时必须返回 [`CodecError::StreamTruncated`]，且不得部分消费。

mod buffer;
#[cfg(feature = "std")]
mod io;

pub use self::buffer::{ByteSink, ByteSource};
#[cfg(feature = "std")]
pub use self::io::{IoSink, IoSource};

use crate::error::{CodecError, Result};

/// 顺序字节写入端。
pub trait DataWriter {
    /// 追加一段原始字节。
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()>;

    fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_bytes(&[value])
    }

    fn write_i8(&mut self, value: i8) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    fn write_i16(&mut self, value: i16) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    fn write_i32(&mut self, value: i32) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    fn write_i64(&mut self, value: i64) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    fn write_f32(&mut self, value: f32) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    fn write_f64(&mut self, value: f64) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_u8(u8::from(value))
    }

    /// 字符按 Unicode 标量值写为 4 字节大端整数。
    fn write_char(&mut self, value: char) -> Result<()> {
        self.write_bytes(&u32::from(value).to_be_bytes())
    }
}

/// 顺序字节读取端。
pub trait DataReader {
    /// 精确读满 `buf`；字节不足时返回 [`CodecError::StreamTruncated`]。
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()>;

    /// 尚未消费的字节数；流式来源无法得知时返回 `None`。
    fn remaining(&self) -> Option<usize> {
        None
    }

    fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn read_i8(&mut self) -> Result<i8> {
        Ok(i8::from_be_bytes(read_array(self)?))
    }

    fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(read_array(self)?))
    }

    fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(read_array(self)?))
    }

    fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(read_array(self)?))
    }

    fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_be_bytes(read_array(self)?))
    }

    fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_be_bytes(read_array(self)?))
    }

    fn read_bool(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::malformed(
                "bool",
                alloc::format!("byte {other:#04x} is neither 0 nor 1"),
            )),
        }
    }

    fn read_char(&mut self) -> Result<char> {
        let raw = u32::from_be_bytes(read_array(self)?);
        char::from_u32(raw).ok_or_else(|| {
            CodecError::malformed("char", alloc::format!("{raw:#x} is not a unicode scalar value"))
        })
    }
}

fn read_array<const N: usize, R: DataReader + ?Sized>(reader: &mut R) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}
