//! 变长整数的性质测试。
//!
//! - **Why**：对象编号、长度、标签与版本号全部经由变长整数传输，任何宽度选择或符号扩展错误
//!   都会让整条流错位；
//! - **How**：`proptest` 覆盖全部 `i32` 取值，并用独立推导的最窄宽度校验编码长度；
//!   任意字节输入只能得到值或可归类的错误；
//! - **What**：`read(write(x)) == x`，且编码长度等于能容纳 `x` 的最窄宽度。

use proptest::prelude::*;
use spark_graph_codec::varint::{self, MAX_LEN};
use spark_graph_codec::{ByteSink, ByteSource, codes};

/// 依据“有效位数 7/14/21/28/32”推导最窄宽度，不复用库内的区间表。
fn narrowest_width(value: i32) -> usize {
    for (len, bits) in [(1usize, 7u32), (2, 14), (3, 21), (4, 28)] {
        let min = -(1i64 << (bits - 1));
        let max = (1i64 << (bits - 1)) - 1;
        if (min..=max).contains(&i64::from(value)) {
            return len;
        }
    }
    MAX_LEN
}

fn encode(value: i32) -> Vec<u8> {
    let mut sink = ByteSink::new();
    varint::write(&mut sink, value).expect("write varint");
    sink.freeze().to_vec()
}

proptest! {
    #[test]
    fn every_i32_roundtrips_at_minimal_width(value in any::<i32>()) {
        let bytes = encode(value);
        prop_assert_eq!(bytes.len(), narrowest_width(value));
        prop_assert_eq!(bytes.len(), varint::encoded_len(value));

        let mut source = ByteSource::new(bytes);
        prop_assert_eq!(varint::read(&mut source).expect("read varint"), value);
        prop_assert!(source.is_exhausted());
    }

    #[test]
    fn arbitrary_bytes_decode_or_fail_cleanly(bytes in proptest::collection::vec(any::<u8>(), 0..=MAX_LEN)) {
        let mut source = ByteSource::new(bytes.clone());
        match varint::read(&mut source) {
            Ok(_) => prop_assert!(!bytes.is_empty()),
            Err(error) => prop_assert!(
                error.code() == codes::MALFORMED || error.code() == codes::STREAM_TRUNCATED,
                "unexpected error: {:?}",
                error
            ),
        }
    }
}

#[test]
fn width_boundaries_match_the_wire_table() {
    let cases: [(i32, &[u8]); 8] = [
        (63, &[0x3F]),
        (-64, &[0x40]),
        (64, &[0x80, 0x40]),
        (300, &[0x81, 0x2C]),
        (-8192, &[0xA0, 0x00]),
        (8192, &[0xC0, 0x20, 0x00]),
        (134_217_728, &[0xF0, 0x08, 0x00, 0x00, 0x00]),
        (i32::MIN, &[0xF0, 0x80, 0x00, 0x00, 0x00]),
    ];
    for (value, expected) in cases {
        assert_eq!(encode(value), expected, "encoding of {value}");
    }
}

#[test]
fn undefined_lead_bytes_are_malformed() {
    for lead in 0xF1..=0xFFu8 {
        let mut source = ByteSource::new(vec![lead, 0, 0, 0, 0]);
        let error = varint::read(&mut source).expect_err("lead byte is undefined");
        assert_eq!(error.code(), codes::MALFORMED, "lead byte {lead:#04x}");
    }
}
