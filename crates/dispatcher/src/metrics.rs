use once_cell::sync::Lazy;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
struct Counters {
    polled: AtomicU64,
    duplicates: AtomicU64,
    skipped: AtomicU64,
    succeeded: AtomicU64,
    not_done: AtomicU64,
    source_failures: AtomicU64,
    report_failures: AtomicU64,
}

static COUNTERS: Lazy<Counters> = Lazy::new(Counters::default);

fn add(counter: &AtomicU64, value: u64) {
    counter.fetch_add(value, Ordering::Relaxed);
}

pub fn record_polled(count: usize) {
    add(&COUNTERS.polled, count as u64);
}

pub fn record_duplicate() {
    add(&COUNTERS.duplicates, 1);
}

pub fn record_skipped() {
    add(&COUNTERS.skipped, 1);
}

pub fn record_succeeded() {
    add(&COUNTERS.succeeded, 1);
}

pub fn record_not_done() {
    add(&COUNTERS.not_done, 1);
}

pub fn record_source_failure() {
    add(&COUNTERS.source_failures, 1);
}

pub fn record_report_failure() {
    add(&COUNTERS.report_failures, 1);
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct DispatcherMetricsSnapshot {
    pub polled: u64,
    pub duplicates: u64,
    pub skipped: u64,
    pub succeeded: u64,
    pub not_done: u64,
    pub source_failures: u64,
    pub report_failures: u64,
}

/// Process-wide totals across every dispatcher.
pub fn snapshot() -> DispatcherMetricsSnapshot {
    DispatcherMetricsSnapshot {
        polled: COUNTERS.polled.load(Ordering::Relaxed),
        duplicates: COUNTERS.duplicates.load(Ordering::Relaxed),
        skipped: COUNTERS.skipped.load(Ordering::Relaxed),
        succeeded: COUNTERS.succeeded.load(Ordering::Relaxed),
        not_done: COUNTERS.not_done.load(Ordering::Relaxed),
        source_failures: COUNTERS.source_failures.load(Ordering::Relaxed),
        report_failures: COUNTERS.report_failures.load(Ordering::Relaxed),
    }
}
