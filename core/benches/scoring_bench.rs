use criterion::{criterion_group, criterion_main, Criterion};
use trecrank_core::{evaluate, Analyzer, DocumentSink, Fields, InvertedIndex, LengthNorm, Schema, SearchConfig, Term};

const WORDS: &[&str] = &["oil", "spill", "tanker", "price", "market", "airbus", "trade", "dispute", "weather", "storm"];

fn synthetic_index(docs: usize) -> InvertedIndex {
    let mut index = InvertedIndex::new(Schema::trec(), LengthNorm::Classic, Analyzer::default());
    for d in 0..docs {
        let text: Vec<&str> = (0..40).map(|i| WORDS[(d * 7 + i * i) % WORDS.len()]).collect();
        let mut fields = Fields::new();
        fields.insert("DOCNO".into(), format!("SYN-{d}"));
        fields.insert("TEXT".into(), text.join(" "));
        index.add_document(fields).expect("schema fields present");
    }
    index
}

fn bench_evaluate(c: &mut Criterion) {
    let index = synthetic_index(20_000);
    let terms: Vec<Term> = ["oil", "tanker", "storm"].iter().map(|w| Term::new("TEXT", *w)).collect();
    let config = SearchConfig::default().with_k(100);
    c.bench_function("evaluate_3_terms_k100", |b| b.iter(|| evaluate(&terms, &index, &config)));
    let parallel = config.clone().with_partitions(4);
    c.bench_function("evaluate_3_terms_k100_partitioned", |b| b.iter(|| evaluate(&terms, &index, &parallel)));
}

criterion_group!(benches, bench_evaluate);
criterion_main!(benches);
