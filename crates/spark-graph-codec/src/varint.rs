//! 有符号 32 位变长整数。
//!
//! # 线上格式
//! | 宽度 | 首字节模式   | 有效位 | 取值范围                      |
//! |------|--------------|--------|-------------------------------|
//! | 1    | `0xxxxxxx`   | 7      | `-64..=63`                    |
//! | 2    | `10xxxxxx`   | 14     | `-8192..=8191`                |
//! | 3    | `110xxxxx`   | 21     | `-1048576..=1048575`          |
//! | 4    | `1110xxxx`   | 28     | `-134217728..=134217727`      |
//! | 5    | `11110000`   | 32     | 其余全部 `i32`                |
//!
//! 有效位按大端顺序排布，解码时从所选宽度的最高有效位做符号扩展。编码总是选择能容纳取值的
//! 最窄宽度；首字节 `0xF1..=0xFF` 没有定义，解码时报告 [`CodecError::Malformed`]。

use crate::channel::{DataReader, DataWriter};
use crate::error::{CodecError, Result};

/// 5 字节形式的固定首字节。
pub const WIDE_LEAD: u8 = 0xF0;

/// 变长整数可能占用的最大字节数。
pub const MAX_LEN: usize = 5;

/// 返回 `value` 编码后占用的字节数。
pub const fn encoded_len(value: i32) -> usize {
    match value {
        -64..=63 => 1,
        -8192..=8191 => 2,
        -1_048_576..=1_048_575 => 3,
        -134_217_728..=134_217_727 => 4,
        _ => 5,
    }
}

/// 以最窄宽度写出 `value`。
pub fn write<W: DataWriter + ?Sized>(writer: &mut W, value: i32) -> Result<()> {
    let mut buf = [0u8; MAX_LEN];
    let len = encode(value, &mut buf);
    writer.write_bytes(&buf[..len])
}

/// 读取一个变长整数。
pub fn read<R: DataReader + ?Sized>(reader: &mut R) -> Result<i32> {
    let lead = reader.read_u8()?;
    let (extra, payload_bits) = match lead {
        0x00..=0x7F => return Ok(sign_extend(u32::from(lead), 7)),
        0x80..=0xBF => (1, 14),
        0xC0..=0xDF => (2, 21),
        0xE0..=0xEF => (3, 28),
        WIDE_LEAD => return reader.read_i32(),
        _ => {
            return Err(CodecError::malformed(
                "varint",
                alloc::format!("lead byte {lead:#04x} does not start a varint"),
            ));
        }
    };
    // 首字节去掉前缀位后剩余的有效位。
    let mask = 0xFFu8 >> (extra + 1);
    let mut raw = u32::from(lead & mask);
    for _ in 0..extra {
        raw = (raw << 8) | u32::from(reader.read_u8()?);
    }
    Ok(sign_extend(raw, payload_bits))
}

/// 编码到定长缓冲，返回实际使用的字节数。
pub fn encode(value: i32, buf: &mut [u8; MAX_LEN]) -> usize {
    let len = encoded_len(value);
    if len == MAX_LEN {
        buf[0] = WIDE_LEAD;
        buf[1..].copy_from_slice(&value.to_be_bytes());
        return len;
    }
    let bytes = value.to_be_bytes();
    buf[..len].copy_from_slice(&bytes[4 - len..]);
    // 首字节高位写入宽度前缀：1 字节为 `0`，n 字节为 n-1 个 `1` 后接一个 `0`。
    let prefix_bits = len as u32;
    let mask = 0xFFu8 >> prefix_bits;
    let prefix = !(0xFFu8 >> (prefix_bits - 1));
    buf[0] = (buf[0] & mask) | prefix;
    len
}

fn sign_extend(raw: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((raw << shift) as i32) >> shift
}
