//! History ledger benchmarks

use af_core::{ActionKind, EventKind, FolderId, RuleId};
use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use journal::{ExecutionHistoryEntry, HistoryLedger};
use std::path::PathBuf;

fn entry(folder: FolderId) -> ExecutionHistoryEntry {
    ExecutionHistoryEntry {
        folder_id: folder,
        rule_id: RuleId::new(),
        rule_name: "Archive invoices".to_string(),
        event: EventKind::Created,
        source: PathBuf::from("/in/invoice.pdf"),
        destination: Some(PathBuf::from("/archive/2024/invoice.pdf")),
        action: ActionKind::Move,
        success: true,
        error: None,
        timestamp: Utc::now(),
    }
}

fn bench_append(c: &mut Criterion) {
    let ledger = HistoryLedger::default();
    let folder = FolderId::new();
    c.bench_function("ledger_append", |b| b.iter(|| ledger.append(black_box(entry(folder)))));
}

fn bench_recent(c: &mut Criterion) {
    let ledger = HistoryLedger::default();
    let folders: Vec<_> = (0..4).map(|_| FolderId::new()).collect();
    for n in 0..ledger.capacity() {
        ledger.append(entry(folders[n % folders.len()]));
    }

    c.bench_function("ledger_recent_100_full", |b| {
        b.iter(|| black_box(ledger.recent(None, 100)))
    });
    c.bench_function("ledger_recent_folder_100_full", |b| {
        b.iter(|| black_box(ledger.recent(Some(folders[1]), 100)))
    });
}

criterion_group!(benches, bench_append, bench_recent);
criterion_main!(benches);
