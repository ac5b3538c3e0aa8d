use criterion::{criterion_group, criterion_main, Criterion};
use tildescan::checksum::{checksum, gen8dot3};
use tildescan::levenshtein::distance;

fn bench_checksum(c: &mut Criterion) {
    c.bench_function("checksum", |b| b.iter(|| checksum("index.html")));
}

fn bench_gen8dot3(c: &mut Criterion) {
    c.bench_function("gen8dot3", |b| {
        b.iter(|| gen8dot3("Program Files (x86)", "aspx"))
    });
}

fn bench_levenshtein(c: &mut Criterion) {
    let a = "<html><head><title>404 Not Found</title></head><body>404 Not Found</body></html>";
    let b_body = "<html><head><title>Welcome</title></head><body>Hello World</body></html>";

    c.bench_function("levenshtein", |b| b.iter(|| distance(a, b_body)));
}

criterion_group!(benches, bench_checksum, bench_gen8dot3, bench_levenshtein);
criterion_main!(benches);
