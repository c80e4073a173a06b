use std::collections::HashMap;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

/// Self-contained re-implementation of the core TF-IDF math for benchmarking
/// in isolation, mirroring `src/vector/tfidf.rs`.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| s.len() > 1)
        .map(str::to_string)
        .collect()
}

fn term_counts(tokens: &[String]) -> HashMap<String, u32> {
    let mut counts = HashMap::new();
    for t in tokens {
        *counts.entry(t.clone()).or_insert(0) += 1;
    }
    counts
}

fn fit_vocabulary(docs: &[String]) -> HashMap<String, u32> {
    let mut df: HashMap<String, u32> = HashMap::new();
    for doc in docs {
        let tokens = tokenize(doc);
        let seen: std::collections::HashSet<String> = tokens.into_iter().collect();
        for t in seen {
            *df.entry(t).or_insert(0) += 1;
        }
    }
    df.into_iter()
        .enumerate()
        .map(|(i, (term, _))| (term, i as u32))
        .collect()
}

fn vectorize(doc: &str, vocab: &HashMap<String, u32>) -> Vec<(u32, f32)> {
    let tokens = tokenize(doc);
    let counts = term_counts(&tokens);
    let mut v: Vec<(u32, f32)> = counts
        .into_iter()
        .filter_map(|(term, c)| vocab.get(&term).map(|&id| (id, c as f32)))
        .collect();
    let norm = v.iter().map(|(_, w)| w * w).sum::<f32>().sqrt().max(1e-9);
    for (_, w) in v.iter_mut() {
        *w /= norm;
    }
    v
}

fn generate_docs(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| {
            format!(
                "article title {i} about policy and the economy and the senate vote number {i}"
            )
        })
        .collect()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("tfidf_fit_transform");
    for size in [50, 500, 5000].iter() {
        let docs = generate_docs(*size);
        group.bench_function(BenchmarkId::new("fit_vocabulary", size), |b| {
            b.iter(|| fit_vocabulary(&docs))
        });

        let vocab = fit_vocabulary(&docs);
        group.bench_function(BenchmarkId::new("vectorize_corpus", size), |b| {
            b.iter(|| {
                docs.iter()
                    .map(|d| vectorize(d, &vocab))
                    .collect::<Vec<_>>()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
