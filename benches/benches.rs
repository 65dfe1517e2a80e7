use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use rand::Rng;

use spacelink::coding::{randomize, CltuDecoder, CltuEncoder, ReedSolomon};

fn random_buf(len: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| rng.gen()).collect()
}

fn bench_randomizer(c: &mut Criterion) {
    let mut buf = random_buf(1020);

    let mut group = c.benchmark_group("randomizer");
    group.throughput(Throughput::Bytes(buf.len() as u64));
    group.bench_function("randomize", |b| {
        b.iter(|| randomize(&mut buf));
    });
    group.finish();
}

fn bench_reed_solomon(c: &mut Criterion) {
    let rs = ReedSolomon::rs_255_223();
    let data = random_buf(223);
    let block = rs.encode(&data).unwrap();
    let mut errored = block.clone();
    for i in 0..8 {
        errored[i * 31] ^= 0x5a;
    }

    let mut group = c.benchmark_group("rs");
    group.throughput(Throughput::Bytes(255));
    group.bench_function("encode", |b| {
        b.iter(|| rs.encode(&data).unwrap());
    });
    group.bench_function("decode_clean", |b| {
        b.iter(|| rs.decode(&block).unwrap());
    });
    group.bench_function("decode_8_errors", |b| {
        b.iter(|| rs.decode(&errored).unwrap());
    });
    group.finish();
}

fn bench_cltu(c: &mut Criterion) {
    let frame = random_buf(1017);
    let encoder = CltuEncoder::new().with_randomization(true);
    let decoder = CltuDecoder::new().with_randomization(true);
    let cltu = encoder.encode(&frame);

    let mut group = c.benchmark_group("cltu");
    group.throughput(Throughput::Bytes(frame.len() as u64));
    group.bench_function("encode", |b| {
        b.iter(|| encoder.encode(&frame));
    });
    group.bench_function("decode", |b| {
        b.iter(|| decoder.decode(&cltu).unwrap());
    });
    group.finish();
}

criterion_group!(benches, bench_randomizer, bench_reed_solomon, bench_cltu);
criterion_main!(benches);
