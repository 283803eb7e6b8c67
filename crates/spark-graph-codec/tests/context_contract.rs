//! 上下文与通道契约测试。
//!
//! # 教案级注释概览
//!
//! - **核心目标 (Why)**：对象图语义之外，上下文还承担三类职责：回调调度（顺序与错误聚合）、
//!   输入校验（编号、截断、尾部字节、悬空引用）以及基础字段编码。本文件逐项锁定这些行为；
//! - **结构 (How)**：
//!   - `ObjectReference`：单次赋值、排队回调、未解析读取；
//!   - `Recorder` 类型：载荷内两次引用自身，用于观察等待者顺序与错误聚合；
//!   - 原始字节构造：覆盖编号跳跃、负编号、截断、尾部字节与自指内部对象；
//!   - 标量与标准编解码器：定宽大端布局、布尔/字符校验、序列与可选值；
//!   - `IoSink`/`IoSource`：`std::io` 适配器的往返与截断映射；
//! - **契约 (What)**：错误一律通过 `codes` 常量或错误变体断言。

use std::cell::RefCell;
use std::io::Cursor;
use std::rc::Rc;

use spark_graph_codec::codec::standard::{
    BoolCodec, CharCodec, F64Codec, I16Codec, OptionalCodec, SequenceCodec, StringCodec,
};
use spark_graph_codec::{
    ByteSink, ByteSource, Codec, CodecError, DeserializationContext, Deserializer, IoSink,
    IoSource, ObjectReference, Pass, Result, SerializationContext, TypeRegistry, codes,
};
use tracing_test::traced_test;

type Log = Rc<RefCell<Vec<&'static str>>>;

/// 载荷中两次引用自身；解码时两个等待者都会排在自身的挂起槽位上。
struct Recorder;

struct RecorderCodec {
    log: Log,
    fail: bool,
}

impl Deserializer for RecorderCodec {
    type Value = Rc<Recorder>;

    fn deserialize(&self, ctx: &mut DeserializationContext<'_>) -> Result<Rc<Recorder>> {
        for name in ["first waiter", "second waiter"] {
            let log = Rc::clone(&self.log);
            let fail = self.fail;
            ctx.try_read_object(move |_: Rc<Recorder>| {
                log.borrow_mut().push(name);
                if fail {
                    return Err(CodecError::Malformed {
                        context: name,
                        detail: "rejected by test".into(),
                    });
                }
                Ok(())
            })?;
        }
        self.log.borrow_mut().push("payload decoded");
        Ok(Rc::new(Recorder))
    }
}

impl Codec for RecorderCodec {
    fn serialize(&self, ctx: &mut SerializationContext<'_>, value: &Rc<Recorder>) -> Result<()> {
        ctx.write_object(value)?;
        ctx.write_object(value)
    }
}

fn recorder_registry(log: &Log, fail: bool) -> TypeRegistry {
    let mut registry = TypeRegistry::compact();
    registry
        .register(
            0,
            RecorderCodec {
                log: Rc::clone(log),
                fail,
            },
        )
        .expect("register Recorder");
    registry
}

#[test]
fn object_reference_is_assigned_once() {
    let reference = ObjectReference::<i32>::new();
    assert!(!reference.is_resolved());
    let error = reference.value().expect_err("nothing assigned yet");
    assert_eq!(error.code(), codes::UNRESOLVED_REFERENCE);

    let seen = Rc::new(RefCell::new(Vec::new()));
    for tag in ["early-1", "early-2"] {
        let seen = Rc::clone(&seen);
        reference.get(move |value| seen.borrow_mut().push((tag, value)));
    }
    reference.set_value(42).expect("first assignment");
    let late = Rc::clone(&seen);
    reference.get(move |value| late.borrow_mut().push(("late", value)));
    assert_eq!(*seen.borrow(), [("early-1", 42), ("early-2", 42), ("late", 42)]);

    let error = reference.set_value(7).expect_err("second assignment");
    assert_eq!(error.code(), codes::DOUBLE_ASSIGNMENT);
    assert_eq!(reference.value().expect("resolved"), 42);

    let shared = reference.clone();
    assert!(shared.is_resolved());
    assert_eq!(ObjectReference::resolved("ready").value().expect("resolved"), "ready");
}

#[test]
fn waiters_run_in_registration_order_before_the_trigger() {
    let log: Log = Rc::default();
    let registry = recorder_registry(&log, false);
    let bytes = Pass::new(&registry)
        .encode_object(&Rc::new(Recorder))
        .expect("encode recorder");
    // id 0、标签 0、版本 0，随后两个回指。
    assert_eq!(&bytes[..], [0x00, 0x00, 0x00, 0x00, 0x00]);

    let mut source = ByteSource::new(bytes);
    let mut ctx = DeserializationContext::new(&mut source, &registry);
    let trigger = Rc::clone(&log);
    ctx.read_object(move |_: Rc<Recorder>| trigger.borrow_mut().push("trigger"))
        .expect("read recorder");
    ctx.finish().expect("finish");
    assert_eq!(
        *log.borrow(),
        ["payload decoded", "first waiter", "second waiter", "trigger"]
    );
}

#[test]
fn failing_waiters_are_aggregated() {
    let log: Log = Rc::default();
    let registry = recorder_registry(&log, true);
    let error = Pass::new(&registry)
        .decode_object::<Recorder>(vec![0x00, 0x00, 0x00, 0x00, 0x00])
        .map(|_| ())
        .expect_err("both waiters fail");

    assert_eq!(error.code(), codes::AGGREGATE);
    assert!(matches!(
        error.primary(),
        CodecError::Malformed { context: "first waiter", .. }
    ));
    assert_eq!(error.suppressed().len(), 1);
    assert!(matches!(
        error.suppressed()[0],
        CodecError::Malformed { context: "second waiter", .. }
    ));
    assert_eq!(
        *log.borrow(),
        ["payload decoded", "first waiter", "second waiter"],
        "a failing waiter does not stop later waiters"
    );
}

#[test]
fn failing_list_consumers_surface_their_error() {
    let log: Log = Rc::default();
    let registry = recorder_registry(&log, false);
    let recorder = Rc::new(Recorder);
    let bytes = Pass::new(&registry)
        .encode_object_list(&[Rc::clone(&recorder), recorder])
        .expect("encode list");
    // 数量 2；首个元素是新对象 0，第二个元素回指对象 0。
    assert_eq!(&bytes[..], [0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);

    let mut source = ByteSource::new(bytes);
    let mut ctx = DeserializationContext::new(&mut source, &registry);
    let error = ctx
        .try_read_object_list(|items: Vec<Rc<Recorder>>| {
            assert_eq!(items.len(), 2);
            Err(CodecError::Malformed {
                context: "list consumer",
                detail: "rejected by test".into(),
            })
        })
        .expect_err("consumer rejects the list");
    assert!(
        matches!(error, CodecError::Malformed { context: "list consumer", .. }),
        "unexpected error: {error:?}"
    );

    let mut source = ByteSource::new(vec![0x00]);
    let mut ctx = DeserializationContext::new(&mut source, &registry);
    let error = ctx
        .try_read_nullable_object_list(|items: Vec<Option<Rc<Recorder>>>| {
            assert!(items.is_empty());
            Err(CodecError::Malformed {
                context: "empty list consumer",
                detail: "rejected by test".into(),
            })
        })
        .expect_err("consumer rejects the empty list");
    assert!(
        matches!(error, CodecError::Malformed { context: "empty list consumer", .. }),
        "unexpected error: {error:?}"
    );
}

fn decode_error(registry: &TypeRegistry, bytes: Vec<u8>) -> CodecError {
    Pass::new(registry)
        .decode_object::<Recorder>(bytes)
        .map(|_| ())
        .expect_err("input must be rejected")
}

#[test]
fn object_ids_must_be_sequential() {
    let log: Log = Rc::default();
    let registry = recorder_registry(&log, false);

    let skipped = decode_error(&registry, vec![0x01, 0x00, 0x00]);
    assert_eq!(skipped.code(), codes::MALFORMED);

    let negative = decode_error(&registry, vec![0x7F, 0x00, 0x00]);
    assert_eq!(negative.code(), codes::MALFORMED);
}

#[test]
fn truncated_and_oversized_inputs_are_rejected() {
    let log: Log = Rc::default();
    let registry = recorder_registry(&log, false);
    let bytes = Pass::new(&registry)
        .encode_object(&Rc::new(Recorder))
        .expect("encode recorder")
        .to_vec();

    let truncated = decode_error(&registry, bytes[..bytes.len() - 1].to_vec());
    assert!(
        matches!(truncated, CodecError::StreamTruncated { needed: 1, remaining: 0 }),
        "unexpected error: {truncated:?}"
    );

    let mut padded = bytes;
    padded.push(0x00);
    let trailing = decode_error(&registry, padded);
    assert_eq!(trailing.code(), codes::MALFORMED);
}

#[test]
fn self_owned_inner_objects_never_resolve() {
    let log: Log = Rc::default();
    let mut registry = recorder_registry(&log, false);
    registry.register_inner_marker(1).expect("register marker");

    // id 0 是内部标记，其所有者又是 id 0 自己：槽位永远挂起。
    let error = decode_error(&registry, vec![0x00, 0x01, 0x00, 0x00]);
    assert_eq!(error.code(), codes::MALFORMED);
    assert!(
        matches!(error, CodecError::Malformed { context: "end of pass", .. }),
        "unexpected error: {error:?}"
    );
}

fn encode_fields(body: impl FnOnce(&mut SerializationContext<'_>) -> Result<()>) -> Vec<u8> {
    let registry = TypeRegistry::new();
    let mut sink = ByteSink::new();
    {
        let mut ctx = SerializationContext::new(&mut sink, &registry);
        body(&mut ctx).expect("write fields");
        ctx.finish().expect("finish");
    }
    sink.freeze().to_vec()
}

fn decode_fields<R>(
    bytes: Vec<u8>,
    body: impl FnOnce(&mut DeserializationContext<'_>) -> Result<R>,
) -> Result<R> {
    let registry = TypeRegistry::new();
    let mut source = ByteSource::new(bytes);
    let mut ctx = DeserializationContext::new(&mut source, &registry);
    body(&mut ctx)
}

#[test]
fn scalars_use_fixed_width_big_endian() {
    let bytes = encode_fields(|ctx| {
        ctx.write_u8(0xAB)?;
        ctx.write_i8(-2)?;
        ctx.write_i16(0x0102)?;
        ctx.write_i32(-1)?;
        ctx.write_i64(1)?;
        ctx.write_f32(1.5)?;
        ctx.write_f64(-0.25)?;
        ctx.write_bool(true)?;
        ctx.write_char('é')?;
        ctx.write_string("hé")?;
        ctx.write_byte_array(&[9, 8])
    });
    let expected: Vec<u8> = [
        &[0xAB][..],
        &[0xFE],
        &[0x01, 0x02],
        &[0xFF; 4],
        &[0, 0, 0, 0, 0, 0, 0, 1],
        &1.5f32.to_be_bytes(),
        &(-0.25f64).to_be_bytes(),
        &[0x01],
        &[0x00, 0x00, 0x00, 0xE9],
        &[0x03, b'h', 0xC3, 0xA9],
        &[0x02, 9, 8],
    ]
    .concat();
    assert_eq!(bytes, expected);

    let decoded = decode_fields(bytes, |ctx| {
        Ok((
            ctx.read_u8()?,
            ctx.read_i8()?,
            ctx.read_i16()?,
            ctx.read_i32()?,
            ctx.read_i64()?,
            ctx.read_f32()?,
            ctx.read_f64()?,
            ctx.read_bool()?,
            ctx.read_char()?,
            ctx.read_string()?,
            ctx.read_byte_array()?,
        ))
    })
    .expect("decode fields");
    assert_eq!(
        decoded,
        (0xAB, -2, 0x0102, -1, 1, 1.5, -0.25, true, 'é', "hé".to_owned(), vec![9, 8])
    );
}

#[test]
fn invalid_scalars_are_malformed() {
    let bool_error = decode_fields(vec![0x02], |ctx| ctx.read_bool()).expect_err("2 is not a bool");
    assert_eq!(bool_error.code(), codes::MALFORMED);

    let char_error = decode_fields(vec![0x00, 0x00, 0xD8, 0x00], |ctx| ctx.read_char())
        .expect_err("surrogates are not chars");
    assert_eq!(char_error.code(), codes::MALFORMED);

    let utf8_error = decode_fields(vec![0x01, 0xFF], |ctx| ctx.read_string())
        .expect_err("0xFF is not UTF-8");
    assert_eq!(utf8_error.code(), codes::MALFORMED);

    let length_error = decode_fields(vec![0x7F], |ctx| ctx.read_string())
        .expect_err("negative length");
    assert_eq!(length_error.code(), codes::MALFORMED);

    let short = decode_fields(vec![0x05, b'a'], |ctx| ctx.read_byte_array())
        .expect_err("declared length exceeds input");
    assert!(matches!(short, CodecError::StreamTruncated { needed: 5, remaining: 1 }));
}

#[test]
fn standard_codecs_compose() {
    let words = SequenceCodec(StringCodec);
    let maybe_short = OptionalCodec(I16Codec);
    let values = vec!["a".to_owned(), "bc".to_owned()];

    let bytes = encode_fields(|ctx| {
        ctx.write(&words, &values)?;
        ctx.write(&maybe_short, &Some(-3))?;
        ctx.write(&maybe_short, &None)?;
        ctx.write_sequence(&BoolCodec, &[true, false])?;
        ctx.write_optional(&CharCodec, Some(&'z'))?;
        ctx.write_optional(&F64Codec, None)
    });
    // 每个元素都带版本头 0。
    assert_eq!(
        &bytes[..11],
        [0x00, 0x02, 0x00, 0x01, b'a', 0x00, 0x02, b'b', b'c', 0x00, 0x01]
    );

    let decoded = decode_fields(bytes, |ctx| {
        Ok((
            ctx.read(&words)?,
            ctx.read(&maybe_short)?,
            ctx.read(&maybe_short)?,
            ctx.read_sequence(&BoolCodec)?,
            ctx.read_optional(&CharCodec)?,
            ctx.read_optional(&F64Codec)?,
        ))
    })
    .expect("decode composed values");
    assert_eq!(
        decoded,
        (values, Some(-3), None, vec![true, false], Some('z'), None)
    );
}

#[test]
fn io_adapters_roundtrip_and_map_eof() {
    let log: Log = Rc::default();
    let registry = recorder_registry(&log, false);

    let mut sink = IoSink::new(Vec::new());
    {
        let mut ctx = SerializationContext::new(&mut sink, &registry);
        ctx.write_object(&Rc::new(Recorder)).expect("write through io sink");
        ctx.finish().expect("finish");
    }
    sink.flush().expect("flush");
    let written = sink.into_inner();
    assert_eq!(written, [0x00, 0x00, 0x00, 0x00, 0x00]);

    let mut source = IoSource::new(Cursor::new(written.clone()));
    {
        let mut ctx = DeserializationContext::new(&mut source, &registry);
        let reference = ctx
            .read_object_reference::<Recorder>()
            .expect("read through io source");
        ctx.finish().expect("finish");
        assert!(reference.is_resolved());
    }

    let mut short = IoSource::new(Cursor::new(written[..2].to_vec()));
    let mut ctx = DeserializationContext::new(&mut short, &registry);
    let error = ctx
        .read_object_reference::<Recorder>()
        .map(|_| ())
        .expect_err("stream ends early");
    assert!(
        matches!(error, CodecError::StreamTruncated { remaining: 0, .. }),
        "unexpected error: {error:?}"
    );
}

#[test]
#[traced_test]
fn passes_report_their_progress() {
    let log: Log = Rc::default();
    let registry = recorder_registry(&log, false);
    let pass = Pass::new(&registry);
    let bytes = pass.encode_object(&Rc::new(Recorder)).expect("encode");
    pass.decode_object::<Recorder>(bytes).expect("decode");

    assert!(logs_contain("serialization pass finished"));
    assert!(logs_contain("deserialization pass finished"));
    assert!(logs_contain("object still pending; queued"));
}
