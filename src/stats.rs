use crate::error::FailureKind;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters collected while refining archives. Safe to share across workers.
#[derive(Debug, Default)]
pub struct RunStats {
    pub archives_seen: AtomicU64,
    pub archives_refined: AtomicU64,
    pub baseline_missing: AtomicU64,
    pub detail_rows: AtomicU64,
    pub incomplete_rows: AtomicU64,
    pub skipped_walk: AtomicU64,
    pub skipped_not_an_archive: AtomicU64,
    pub skipped_missing_metadata: AtomicU64,
    pub skipped_invalid_document: AtomicU64,
    pub skipped_no_language_stats: AtomicU64,
    pub skipped_io: AtomicU64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_seen(&self) {
        self.archives_seen.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_refined(&self) {
        self.archives_refined.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_baseline_missing(&self) {
        self.baseline_missing.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_detail_rows(&self, count: u64) {
        self.detail_rows.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_incomplete_rows(&self, count: u64) {
        self.incomplete_rows.fetch_add(count, Ordering::Relaxed);
    }

    fn counter(&self, kind: FailureKind) -> Option<&AtomicU64> {
        match kind {
            FailureKind::NotAnArchive => Some(&self.skipped_not_an_archive),
            FailureKind::MissingCreationMetadata => Some(&self.skipped_missing_metadata),
            FailureKind::InvalidDocument => Some(&self.skipped_invalid_document),
            FailureKind::NoLanguageStats => Some(&self.skipped_no_language_stats),
            FailureKind::Io => Some(&self.skipped_io),
            FailureKind::Walk => Some(&self.skipped_walk),
            FailureKind::InvalidRoot | FailureKind::PathLayout => None,
        }
    }

    /// Counts a skipped archive or subtree. Fatal kinds are not counted.
    pub fn record_skip(&self, kind: FailureKind) {
        if let Some(counter) = self.counter(kind) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn seen(&self) -> u64 {
        self.archives_seen.load(Ordering::Relaxed)
    }

    pub fn refined(&self) -> u64 {
        self.archives_refined.load(Ordering::Relaxed)
    }

    pub fn baseline_missing(&self) -> u64 {
        self.baseline_missing.load(Ordering::Relaxed)
    }

    pub fn detail_rows(&self) -> u64 {
        self.detail_rows.load(Ordering::Relaxed)
    }

    pub fn incomplete_rows(&self) -> u64 {
        self.incomplete_rows.load(Ordering::Relaxed)
    }

    pub fn skipped(&self, kind: FailureKind) -> u64 {
        self.counter(kind)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn skipped_total(&self) -> u64 {
        FailureKind::RECOVERABLE
            .iter()
            .map(|kind| self.skipped(*kind))
            .sum()
    }

    /// Non-zero skip counts, in a fixed order.
    pub fn skipped_by_reason(&self) -> Vec<(FailureKind, u64)> {
        FailureKind::RECOVERABLE
            .iter()
            .map(|kind| (*kind, self.skipped(*kind)))
            .filter(|(_, n)| *n > 0)
            .collect()
    }
}
