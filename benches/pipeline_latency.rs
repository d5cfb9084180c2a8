// Copyright 2026 The Scriptguard Project
// SPDX-License-Identifier: Apache-2.0

//! Latency benchmarks for the per-token and per-response paths.
//!
//! Measures:
//! - Placeholder resolution per fragment (runs on every streamed token)
//! - Response sanitizing: extraction, validation, normalization
//! - End-to-end stream processing of an SSE body
//!
//! Run: cargo bench --bench pipeline_latency

use std::sync::Arc;

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tokio_stream::StreamExt;

use scriptguard::action::Action;
use scriptguard::config::{StreamConfig, StreamProvider};
use scriptguard::normalize::normalize;
use scriptguard::pipeline::Sanitizer;
use scriptguard::placeholder::{flush, resolve, resolve_all, PlaceholderTable};
use scriptguard::stream::StreamProcessor;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn bench_table(n: usize) -> PlaceholderTable {
    (1..=n)
        .map(|i| (format!("URL{i}"), format!("https://example.com/page/{i}")))
        .collect()
}

fn markdown_links(n: usize) -> String {
    (1..=n)
        .map(|i| format!("{i}. [Result number {i} - Example Site](URL{i})\n"))
        .collect()
}

/// Four-character fragments, roughly the size of model tokens.
fn fragments(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(4).map(|c| c.iter().collect()).collect()
}

const RESPONSE: &str = "Plan:
1. Fetch the orders
2. Fetch the customers
3. Plot orders per customer

```javascript
interface Row {
  name: string;
  total: number;
}

async function load() {
  const [orders, customers] = await Promise.all([getOrders(), listCustomers()]);
  const rows: Row[] = customers.map((c) => ({
    name: c.name,
    total: orders.filter((o) => o.customerId === c.id!).length,
  }));
  plot(\"Orders per customer\", \"bar\", rows, {x: \"name\", y: \"total\"});
}
load();
```

This loads both lists in parallel and plots the totals.";

fn actions() -> Vec<Action> {
    ["get_orders", "list_customers", "plot"]
        .into_iter()
        .map(Action::from)
        .collect()
}

// ---------------------------------------------------------------------------
// Placeholder resolution
// ---------------------------------------------------------------------------

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");
    let table = bench_table(10);

    group.bench_function("fragment_no_run", |b| {
        b.iter(|| resolve(black_box("the quick brown fox "), black_box(""), &table))
    });

    group.bench_function("fragment_completes_key", |b| {
        b.iter(|| resolve(black_box("1) and "), black_box("URL"), &table))
    });

    for n_links in [1, 10, 50] {
        let text = markdown_links(n_links);
        let parts = fragments(&text);
        let table = bench_table(n_links);
        group.bench_with_input(
            BenchmarkId::new("streamed_links", n_links),
            &parts,
            |b, parts| {
                b.iter(|| {
                    let mut buffer = String::new();
                    let mut out = String::new();
                    for part in parts {
                        let result = resolve(black_box(part), &buffer, &table);
                        out.push_str(&result.content);
                        buffer = result.buffer;
                    }
                    out.push_str(&flush(&buffer, &table));
                    out
                })
            },
        );
        group.bench_with_input(BenchmarkId::new("resolve_all", n_links), &text, |b, text| {
            b.iter(|| resolve_all(black_box(text), &table))
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Sanitizing
// ---------------------------------------------------------------------------

fn bench_sanitize(c: &mut Criterion) {
    let mut group = c.benchmark_group("sanitize");
    let sanitizer = Sanitizer::default();
    let actions = actions();

    group.bench_function("parse_response", |b| {
        b.iter(|| sanitizer.parse_response(black_box(RESPONSE), &actions))
    });

    group.bench_function("parse_response_rejected", |b| {
        let response = "```js\nconst r = await fetch(\"https://example.com\");\n```";
        b.iter(|| sanitizer.parse_response(black_box(response), &actions))
    });

    let names = scriptguard::action::fn_names(&actions);
    let code = scriptguard::extract::extract_code(RESPONSE).unwrap_or_default();
    group.bench_function("normalize", |b| {
        b.iter(|| normalize(black_box(&code), &names))
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Stream processing
// ---------------------------------------------------------------------------

fn sse_body(text: &str) -> Vec<Bytes> {
    fragments(text)
        .iter()
        .map(|part| {
            let payload = serde_json::json!({
                "choices": [{"index": 0, "delta": {"content": part}}]
            });
            Bytes::from(format!("data: {payload}\n\n"))
        })
        .chain(std::iter::once(Bytes::from("data: [DONE]\n\n")))
        .collect()
}

fn bench_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream");
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let processor = StreamProcessor::from_config(StreamConfig {
        provider: StreamProvider::OpenAi,
        ..StreamConfig::default()
    });
    let table = Arc::new(bench_table(10));

    for (name, text) in [("links", markdown_links(10)), ("code_response", RESPONSE.to_string())] {
        let chunks = sse_body(&text);
        group.bench_function(name, |b| {
            b.iter(|| {
                rt.block_on(async {
                    let input = tokio_stream::iter(chunks.clone());
                    let events: Vec<_> = processor
                        .process(black_box(input), table.clone())
                        .collect()
                        .await;
                    events
                })
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_resolve, bench_sanitize, bench_stream);
criterion_main!(benches);
