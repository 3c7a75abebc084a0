use std::hint::black_box;

use codspeed_criterion_compat::{
    BenchmarkId, Criterion, Throughput, criterion_group, criterion_main,
};
use sapling_benchmark::{arithmetic_source, statements_source};
use sapling_fixtures::languages;
use sapling_input::InputEdit;
use sapling_language::Language;
use sapling_parse::Parser;

fn candidates() -> Vec<(&'static str, Language, String)> {
    vec![
        ("arithmetic", languages::arithmetic(), arithmetic_source(500)),
        ("statements", languages::statements(), statements_source(200)),
    ]
}

fn benchmark_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    for (name, language, source) in candidates() {
        let parser = Parser::new(language);
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::new("fresh", name), &source, |b, source| {
            b.iter(|| black_box(parser.parse(source.as_str(), None)));
        });
    }

    group.finish();
}

fn benchmark_reparse(c: &mut Criterion) {
    let mut group = c.benchmark_group("reparse");

    for (name, language, source) in candidates() {
        let parser = Parser::new(language);
        let Ok(old) = parser.parse(source.as_str(), None) else {
            continue;
        };

        // Turn a digit in the middle of the text into two digits.
        let middle = source.len() / 2;
        let Some(offset) = source[middle..].find(|c: char| c.is_ascii_digit()) else {
            continue;
        };
        let at = middle + offset;
        let edit = InputEdit::insert(&source, at, "9");
        let mut edited = source.clone();
        edited.insert(at, '9');

        group.throughput(Throughput::Bytes(edited.len() as u64));
        group.bench_with_input(BenchmarkId::new("one_digit", name), &edited, |b, edited| {
            b.iter(|| {
                black_box(parser.reparse(&old, std::slice::from_ref(&edit), edited.as_str()))
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_parse, benchmark_reparse);
criterion_main!(benches);
