use std::cell::RefCell;
use std::hint::black_box;
use std::rc::Rc;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use spark_graph_codec::{
    Codec, DeserializationContext, Deserializer, Pass, Result, SerializationContext, TypeRegistry,
};

struct Node {
    weight: i32,
    edges: RefCell<Vec<Rc<Node>>>,
}

struct NodeCodec;

impl Deserializer for NodeCodec {
    type Value = Rc<Node>;

    fn deserialize(&self, ctx: &mut DeserializationContext<'_>) -> Result<Rc<Node>> {
        let node = Rc::new(Node {
            weight: ctx.read_varint()?,
            edges: RefCell::new(Vec::new()),
        });
        let target = Rc::clone(&node);
        ctx.read_object_list(move |edges: Vec<Rc<Node>>| *target.edges.borrow_mut() = edges)?;
        Ok(node)
    }
}

impl Codec for NodeCodec {
    fn serialize(&self, ctx: &mut SerializationContext<'_>, node: &Rc<Node>) -> Result<()> {
        ctx.write_varint(node.weight)?;
        ctx.write_object_list(&node.edges.borrow()[..])
    }
}

/// 构造一个带跳边的环：节点 `i` 指向 `i + 1` 与 `i * 7 % n`，同时覆盖循环与共享引用。
fn ring(size: usize) -> Vec<Rc<Node>> {
    let nodes: Vec<Rc<Node>> = (0..size)
        .map(|weight| {
            Rc::new(Node {
                weight: weight as i32,
                edges: RefCell::new(Vec::new()),
            })
        })
        .collect();
    for (index, node) in nodes.iter().enumerate() {
        let mut edges = node.edges.borrow_mut();
        edges.push(Rc::clone(&nodes[(index + 1) % size]));
        edges.push(Rc::clone(&nodes[index * 7 % size]));
    }
    nodes
}

fn release(nodes: &[Rc<Node>]) {
    for node in nodes {
        node.edges.borrow_mut().clear();
    }
}

/// 对象图往返基准。
///
/// # 设计目的（Why）
/// - 编码端的身份表查找与解码端的挂起槽位调度是每个对象都要付出的固定成本，
///   基准按图规模观察二者是否保持线性；
/// - 环沿首条边的遍历深度等于节点数，规模上限受默认 `max_depth` 约束。
///
/// # 执行逻辑（How）
/// - `encode`：对同一张图反复编码，测量身份表与变长整数写出；
/// - `decode`：对预先编码好的字节反复解码，测量槽位解析与回调调度；解码结果在每轮结束时拆环释放。
fn bench_graph_roundtrip(c: &mut Criterion) {
    let mut registry = TypeRegistry::compact();
    registry
        .register(0, NodeCodec)
        .expect("register node codec");
    let pass = Pass::new(&registry);

    let mut group = c.benchmark_group("graph_roundtrip");
    for size in [16usize, 128, 512] {
        let nodes = ring(size);
        let bytes = pass.encode_object(&nodes[0]).expect("encode ring");
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("encode", size), &nodes, |b, nodes| {
            b.iter(|| black_box(pass.encode_object(&nodes[0]).expect("encode ring")));
        });
        group.bench_with_input(BenchmarkId::new("decode", size), &bytes, |b, bytes| {
            b.iter(|| {
                let root = pass
                    .decode_object::<Node>(bytes.clone())
                    .expect("decode ring");
                black_box(root.weight);
                let mut reachable = vec![Rc::clone(&root)];
                let mut cursor = root;
                for _ in 1..size {
                    let next = Rc::clone(&cursor.edges.borrow()[0]);
                    reachable.push(Rc::clone(&next));
                    cursor = next;
                }
                release(&reachable);
            });
        });

        release(&nodes);
    }
    group.finish();
}

criterion_group!(graph_benches, bench_graph_roundtrip);
criterion_main!(graph_benches);
