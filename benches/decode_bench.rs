use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hivexml::value::{decode, REG_BINARY, REG_DWORD, REG_MULTI_SZ, REG_SZ};

fn utf16le(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

fn bench_decode(c: &mut Criterion) {
    let sz = utf16le("C:\\Windows\\System32\\drivers\\etc\\hosts\0");
    c.bench_function("decode_sz", |b| {
        b.iter(|| decode(black_box(Some(&sz)), REG_SZ))
    });

    let multi: Vec<u8> = utf16le("alpha\0beta\0gamma\0delta\0\0");
    c.bench_function("decode_multi_sz", |b| {
        b.iter(|| decode(black_box(Some(&multi)), REG_MULTI_SZ))
    });

    let dword = 0x12345678u32.to_le_bytes();
    c.bench_function("decode_dword", |b| {
        b.iter(|| decode(black_box(Some(&dword)), REG_DWORD))
    });

    let binary: Vec<u8> = (0..4096).map(|i| (i % 251) as u8).collect();
    c.bench_function("decode_binary_4k", |b| {
        b.iter(|| decode(black_box(Some(&binary)), REG_BINARY))
    });
}

criterion_group!(benches, bench_decode);
criterion_main!(benches);
