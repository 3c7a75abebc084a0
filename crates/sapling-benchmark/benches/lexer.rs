use codspeed_criterion_compat::{
    Criterion, Throughput, black_box, criterion_group, criterion_main,
};
use sapling_benchmark::{arithmetic_source, statements_source};
use sapling_fixtures::languages;
use sapling_input::{ChunkedSource, Length, TextSource};
use sapling_language::{Language, StateId};
use sapling_lexer::Lexer;

fn iterate<S: TextSource + ?Sized>(language: &Language, source: &S) {
    let mut lexer = Lexer::new(language, source);
    let mut position = Length::ZERO;

    loop {
        let token = lexer.next_token(position, StateId::START, None);
        if token.is_end() {
            break;
        }
        position += token.total();
        black_box(token);
    }
}

fn bench_iterate(c: &mut Criterion) {
    let mut group = c.benchmark_group("iterate");

    let arithmetic = languages::arithmetic();
    let statements = languages::statements();
    let candidates = [
        ("arithmetic", &arithmetic, arithmetic_source(2000)),
        ("statements", &statements, statements_source(500)),
    ];

    for (name, language, source) in &candidates {
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(*name, source, |b, s| b.iter(|| iterate(language, s.as_str())));

        let chunked = ChunkedSource::from_str_chunks(source, 64);
        group.bench_with_input(format!("{name}_chunked"), &chunked, |b, s| {
            b.iter(|| iterate(language, s));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_iterate);
criterion_main!(benches);
