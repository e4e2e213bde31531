use criterion::{black_box, criterion_group, criterion_main, Criterion};
use requery_core::methods::compose;

fn bench_compose(c: &mut Criterion) {
    let query = "what are the long term effects of climate change on coastal cities";
    let generated = "Rising sea levels threaten coastal infrastructure. \
                     Storm surges become more destructive as oceans warm. \
                     Saltwater intrusion degrades freshwater supplies and \
                     agriculture near the shore."
        .repeat(4);
    let passages: Vec<String> = (0..5)
        .map(|i| format!("passage number {i} about coastal climate adaptation"))
        .collect();

    c.bench_function("repeat_5", |b| {
        b.iter(|| compose::repeat(black_box(query), black_box(&generated), 5))
    });

    c.bench_function("adaptive", |b| {
        b.iter(|| compose::adaptive(black_box(query), black_box(&generated), 5))
    });

    c.bench_function("interleave_5", |b| {
        b.iter(|| compose::interleave(black_box(query), black_box(&passages)))
    });

    c.bench_function("clean_messy_input", |b| {
        let messy = "  text\twith\nmany\r\n  whitespace   runs  ".repeat(20);
        b.iter(|| compose::clean(black_box(&messy)))
    });
}

criterion_group!(benches, bench_compose);
criterion_main!(benches);
