//! Rule processing benchmarks over the in-memory document.
//!
//! Run with: `cargo bench -p hs-core --features memdom --bench processing`

use std::fmt::Write as _;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use hs_core::memdom::MemoryDocument;
use hs_core::processor::{NavigationContext, RuleProcessor};
use hs_core::selector::parse_selector;
use hs_core::types::{ProcessedRules, RuleEntry, RuleType};

// =============================================================================
// Fixtures
// =============================================================================

const SELECTORS: &[&str] = &[
    ".ad-slot",
    "div.sponsored > a[href*=promo]",
    "div:has-text(/claim your prize/)",
    "section:-abp-has(.countdown):not(.editorial)",
    "div:-abp-properties(position: fixed; z-index: 9999)",
    ":xpath(//a[contains(@href,'lottery')])",
];

fn database(domains: usize) -> ProcessedRules {
    let mut rules = ProcessedRules::default();
    for i in 0..domains {
        for (j, selector) in SELECTORS.iter().enumerate() {
            let rule_type = if j % 2 == 0 { RuleType::Adserver } else { RuleType::Scam };
            let token = if selector.contains(':') { "#?#" } else { "##" };
            let domain = if i == 0 { "*".to_string() } else { format!("site{i}\\.example") };
            rules
                .bucket_mut(rule_type)
                .entry(token.to_string())
                .or_default()
                .entry(domain)
                .or_default()
                .push(RuleEntry::new(*selector));
        }
    }
    rules
}

fn page(blocks: usize) -> String {
    let mut html = String::from("<html><body>");
    for i in 0..blocks {
        let _ = write!(
            html,
            r#"<div class="card"><p>Story {i}</p><a href="/story/{i}">more</a></div>
               <div class="sponsored"><a href="/promo/{i}">deal</a></div>
               <section class="editorial"><span class="countdown">{i}</span></section>"#
        );
    }
    html.push_str(r#"<div style="position: fixed; z-index: 9999">Claim your prize</div></body></html>"#);
    html
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_parse(c: &mut Criterion) {
    c.bench_function("parse_selectors", |b| {
        b.iter(|| {
            for selector in SELECTORS {
                let _ = parse_selector(selector);
            }
        })
    });
}

fn bench_process(c: &mut Criterion) {
    let mut group = c.benchmark_group("process_page");
    for blocks in [10usize, 100] {
        let rules = database(20);
        let html = page(blocks);
        group.bench_with_input(BenchmarkId::from_parameter(blocks), &blocks, |b, _| {
            let mut processor = RuleProcessor::new();
            b.iter(|| {
                let doc = MemoryDocument::parse(&html);
                let mut ctx = NavigationContext::new();
                processor.process(&doc, &rules, "https://site1.example/article", &mut ctx)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parse, bench_process);
criterion_main!(benches);
