//! Criterion benchmarks for the signal rule table.
//!
//! The converter performs one lookup per received IR frame, and tables are
//! rebuilt from key sets at start-up.  These benches measure both paths for
//! table sizes typical of one or several remotes.
//!
//! Run with:
//! ```bash
//! cargo bench --package irbridge-core --bench rule_table_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use irbridge_core::domain::protocol::{NEC, RC6};
use irbridge_core::{KeyEntry, KeySet, Signal, SignalRuleTable};

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn keyset(name: &str, protocol: u16, bits: u16, size: usize, base: u64) -> KeySet {
    let mut set = KeySet::new(name, protocol, bits);
    for i in 0..size {
        set.keys
            .push(KeyEntry::new(format!("KEY_{i}"), format!("{:X}", base + i as u64)));
    }
    set
}

fn table_of(size: usize) -> SignalRuleTable {
    let mut table = SignalRuleTable::new();
    for i in 0..size as u64 {
        let _ = table.add_mapping(
            Signal::new(RC6, format!("{:X}", 0x10000 + i), 20),
            Signal::new(NEC, format!("{:X}", 0xE0E0_0000u64 + i), 32),
        );
    }
    table
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("rule_table_lookup");

    for size in [16usize, 64, 512] {
        let table = table_of(size);
        let hit = Signal::new(RC6, format!("{:X}", 0x10000 + size as u64 / 2), 20);
        let miss = Signal::new(RC6, "FFFFFFFF", 20);

        group.bench_with_input(BenchmarkId::new("hit", size), &table, |b, t| {
            b.iter(|| t.lookup_signal(black_box(&hit)))
        });
        group.bench_with_input(BenchmarkId::new("miss", size), &table, |b, t| {
            b.iter(|| t.lookup_signal(black_box(&miss)))
        });
    }

    group.finish();
}

fn bench_derive(c: &mut Criterion) {
    let mut group = c.benchmark_group("rule_table_derive");

    for size in [16usize, 64] {
        let source = keyset("source", RC6, 20, size, 0x10000);
        let target = keyset("target", NEC, 32, size, 0xE0E0_0000);

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| SignalRuleTable::derive(black_box(&source), black_box(&target), 0))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_lookup, bench_derive);
criterion_main!(benches);
