use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use thrift_json::core::codec::{decode_struct, encode_struct};
use thrift_json::core::framing::read_frame;
use thrift_json::protocol::RawMessage;
use thrift_json::{MemoryBuffer, Processor};

#[path = "../tests/common/mod.rs"]
mod common;

fn bench_codec(c: &mut Criterion) {
    let s = common::schema();
    let request = common::load_vector("apache_request.json");
    let method = s.service.method("test").unwrap();
    let value = common::reference_object(&s);
    let tree = encode_struct(&value).unwrap();

    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Bytes(request.len() as u64));

    group.bench_function("encode_struct", |b| {
        b.iter(|| encode_struct(black_box(&value)).unwrap())
    });

    group.bench_function("decode_struct", |b| {
        b.iter(|| decode_struct(black_box(&tree), &s.test).unwrap())
    });

    group.bench_function("decode_request", |b| {
        b.iter(|| {
            RawMessage::parse(black_box(request.as_bytes()))
                .unwrap()
                .decode_body(method.args())
                .unwrap()
        })
    });

    group.finish();
}

fn bench_processor(c: &mut Criterion) {
    let s = common::schema();
    let request = common::load_vector("apache_request.json");
    let processor = Processor::new(common::identity_dispatcher(&s));

    let mut group = c.benchmark_group("processor");
    group.throughput(Throughput::Bytes(request.len() as u64));

    group.bench_function("frame", |b| {
        b.iter_batched(
            || MemoryBuffer::from(request.as_bytes()),
            |mut input| read_frame(&mut input, usize::MAX).unwrap(),
            BatchSize::SmallInput,
        )
    });

    group.bench_function("round_trip", |b| {
        b.iter_batched(
            || (MemoryBuffer::from(request.as_bytes()), MemoryBuffer::new()),
            |(mut input, mut output)| processor.process(&mut input, &mut output).unwrap(),
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(benches, bench_codec, bench_processor);
criterion_main!(benches);
