//! `CodecLimits` 的配置加载与边界执行测试。
//!
//! - **Why**：边界既要能从配置文本加载，又必须在写端与读端同时生效；
//! - **How**：TOML 片段验证缺省回落，随后用链表、字符串与列表三种形状分别触发深度、
//!   字符串长度与序列长度上限；
//! - **What**：超限一律返回 `codes::LIMIT_EXCEEDED`，恰好等于上限时必须成功；
//!   声明数量超出剩余输入时，即使关闭全部上限也只能得到截断错误，不会按声明数量分配内存。

use std::cell::RefCell;
use std::io::Cursor;
use std::rc::Rc;

use spark_graph_codec::codec::standard::{MappedCodec, StringCodec};
use spark_graph_codec::{
    ByteSource, Codec, CodecError, CodecLimits, DeserializationContext, Deserializer, IoSource,
    Pass, Result, SerializationContext, TypeRegistry, codes,
};

struct Link {
    next: Option<Rc<Link>>,
}

struct LinkCodec;

impl Deserializer for LinkCodec {
    type Value = Rc<Link>;

    fn deserialize(&self, ctx: &mut DeserializationContext<'_>) -> Result<Rc<Link>> {
        // 链表无环，后继对象总是先于当前节点完成解析。
        let has_next = ctx.read_varint()? == 1;
        let slot = Rc::new(RefCell::new(None));
        if has_next {
            let target = Rc::clone(&slot);
            ctx.read_object(move |link: Rc<Link>| *target.borrow_mut() = Some(link))?;
        }
        let next = slot.borrow_mut().take();
        Ok(Rc::new(Link { next }))
    }
}

impl Codec for LinkCodec {
    fn serialize(&self, ctx: &mut SerializationContext<'_>, link: &Rc<Link>) -> Result<()> {
        match &link.next {
            Some(next) => {
                ctx.write_varint(1)?;
                ctx.write_object(next)
            }
            None => ctx.write_varint(0),
        }
    }
}

struct Note(String);

fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::compact();
    registry.register(0, LinkCodec).expect("register Link");
    registry
        .register(
            1,
            MappedCodec::new(
                StringCodec,
                |text: String| Rc::new(Note(text)),
                |note: &Rc<Note>| note.0.clone(),
            ),
        )
        .expect("register Note");
    registry
}

fn chain(len: usize) -> Rc<Link> {
    let mut head = Rc::new(Link { next: None });
    for _ in 1..len {
        head = Rc::new(Link { next: Some(head) });
    }
    head
}

fn assert_limit(error: CodecError, limit: &str) {
    assert_eq!(error.code(), codes::LIMIT_EXCEEDED, "unexpected error: {error:?}");
    assert!(
        matches!(&error, CodecError::LimitExceeded { limit: found, .. } if *found == limit),
        "unexpected limit: {error:?}"
    );
}

#[test]
fn limits_load_from_toml_with_defaults() {
    let limits: CodecLimits = toml::from_str(
        r#"
        max_depth = 8
        max_string_bytes = 128
        "#,
    )
    .expect("parse limits");
    assert_eq!(
        limits,
        CodecLimits {
            max_depth: 8,
            max_sequence_len: CodecLimits::DEFAULT_MAX_SEQUENCE_LEN,
            max_string_bytes: 128,
        }
    );

    let empty: CodecLimits = toml::from_str("").expect("parse empty limits");
    assert_eq!(empty, CodecLimits::default());

    let text = toml::to_string(&limits).expect("render limits");
    let reloaded: CodecLimits = toml::from_str(&text).expect("reload limits");
    assert_eq!(reloaded, limits);
}

#[test]
fn depth_is_bounded_on_both_sides() {
    let registry = registry();
    let shallow = CodecLimits {
        max_depth: 3,
        ..CodecLimits::default()
    };

    let fits = Pass::new(&registry).with_limits(shallow);
    let bytes = fits.encode_object(&chain(3)).expect("three links fit");
    let decoded = fits.decode_object::<Link>(bytes).expect("decode three links");
    let tail = decoded
        .next
        .as_ref()
        .and_then(|second| second.next.as_ref())
        .expect("third link");
    assert!(tail.next.is_none());

    let error = fits
        .encode_object(&chain(4))
        .expect_err("four links exceed the depth");
    assert_limit(error, "depth");

    let deep = Pass::new(&registry)
        .encode_object(&chain(4))
        .expect("default limits allow four links");
    let error = fits
        .decode_object::<Link>(deep)
        .map(|_| ())
        .expect_err("reader enforces the depth too");
    assert_limit(error, "depth");
}

#[test]
fn string_length_is_bounded_on_both_sides() {
    let registry = registry();
    let tight = Pass::new(&registry).with_limits(CodecLimits {
        max_string_bytes: 4,
        ..CodecLimits::default()
    });

    tight
        .encode_object(&Rc::new(Note("four".into())))
        .expect("four bytes fit");
    let error = tight
        .encode_object(&Rc::new(Note("fives".into())))
        .expect_err("five bytes exceed the limit");
    assert_limit(error, "string length");

    let long = Pass::new(&registry)
        .encode_object(&Rc::new(Note("fives".into())))
        .expect("default limits allow five bytes");
    let error = tight
        .decode_object::<Note>(long)
        .map(|_| ())
        .expect_err("reader checks the declared length");
    assert_limit(error, "string length");
}

#[test]
fn sequence_length_is_bounded_on_both_sides() {
    let registry = registry();
    let tight = Pass::new(&registry).with_limits(CodecLimits {
        max_sequence_len: 2,
        ..CodecLimits::default()
    });
    let notes: Vec<Rc<Note>> = ["a", "b", "c"]
        .into_iter()
        .map(|text| Rc::new(Note(text.into())))
        .collect();

    tight
        .encode_object_list(&notes[..2])
        .expect("two items fit");
    let error = tight
        .encode_object_list(&notes)
        .expect_err("three items exceed the limit");
    assert_limit(error, "sequence length");

    let bytes = Pass::new(&registry)
        .encode_object_list(&notes)
        .expect("default limits allow three items");
    let error = tight
        .decode_object_list::<Note>(bytes)
        .map(|_| ())
        .expect_err("reader checks the declared count");
    assert_limit(error, "sequence length");
}

#[test]
fn unbounded_limits_disable_every_check() {
    let registry = registry();
    let pass = Pass::new(&registry).with_limits(CodecLimits::unbounded());
    let bytes = pass.encode_object(&chain(64)).expect("encode long chain");
    let mut link = pass.decode_object::<Link>(bytes).expect("decode long chain");
    let mut count = 1;
    while let Some(next) = link.next.clone() {
        link = next;
        count += 1;
    }
    assert_eq!(count, 64);
}

/// 声明 `1 << 24` 个元素，其后没有任何元素字节。
const HUGE_COUNT: [u8; 4] = [0xE1, 0x00, 0x00, 0x00];

#[test]
fn declared_counts_are_checked_against_the_input() {
    let registry = registry();
    let pass = Pass::new(&registry).with_limits(CodecLimits::unbounded());

    let error = pass
        .decode_object_list::<Note>(HUGE_COUNT.to_vec())
        .map(|_| ())
        .expect_err("no element follows the count");
    assert!(
        matches!(error, CodecError::StreamTruncated { needed: 16_777_216, remaining: 0 }),
        "count must be rejected before any element is read: {error:?}"
    );

    let error = pass
        .decode_nullable_object_list::<Note>(HUGE_COUNT.to_vec())
        .map(|_| ())
        .expect_err("no element follows the count");
    assert_eq!(error.code(), codes::STREAM_TRUNCATED);

    let mut source = ByteSource::new(HUGE_COUNT.to_vec());
    let mut ctx = DeserializationContext::new(&mut source, &registry)
        .with_limits(CodecLimits::unbounded());
    let error = ctx
        .read_sequence(&StringCodec)
        .map(|_| ())
        .expect_err("no element follows the count");
    assert!(
        matches!(error, CodecError::StreamTruncated { needed: 16_777_216, remaining: 0 }),
        "unexpected error: {error:?}"
    );
}

#[test]
fn streaming_sources_fail_at_the_first_missing_element() {
    let registry = registry();
    let mut source = IoSource::new(Cursor::new(HUGE_COUNT.to_vec()));
    let mut ctx = DeserializationContext::new(&mut source, &registry)
        .with_limits(CodecLimits::unbounded());
    let delivered = Rc::new(RefCell::new(false));
    let flag = Rc::clone(&delivered);
    let error = ctx
        .read_object_list(move |_: Vec<Rc<Note>>| *flag.borrow_mut() = true)
        .expect_err("stream ends after the count");
    assert_eq!(error.code(), codes::STREAM_TRUNCATED);
    assert!(!*delivered.borrow());

    let mut source = IoSource::new(Cursor::new(HUGE_COUNT.to_vec()));
    let mut ctx = DeserializationContext::new(&mut source, &registry)
        .with_limits(CodecLimits::unbounded());
    let error = ctx
        .read_sequence(&StringCodec)
        .map(|_| ())
        .expect_err("stream ends after the count");
    assert_eq!(error.code(), codes::STREAM_TRUNCATED);
}
