//! Wave-based writer: records are created `batch_size` at a time, every create
//! in a wave runs concurrently, and the wave is joined before the next one
//! starts.

use std::fmt;

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::BatchSettings;
use crate::error::StoreError;
use crate::records::{RecordKind, ValidatedRecord};
use crate::store::RecordStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    InvalidRecord,
    WriteFailure,
}

impl FailureCategory {
    fn describe(&self) -> &'static str {
        match self {
            FailureCategory::InvalidRecord => "invalid record",
            FailureCategory::WriteFailure => "write failed",
        }
    }
}

/// One item that did not make it into storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemFailure {
    pub kind: RecordKind,
    /// 1-based position in the kind's payload array.
    pub position: usize,
    pub category: FailureCategory,
    pub message: String,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} #{}: {}: {}",
            self.kind,
            self.position,
            self.category.describe(),
            self.message
        )
    }
}

/// Result of one dispatched wave.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub kind: RecordKind,
    pub size: usize,
    pub successes: usize,
    pub failures: usize,
    pub errors: Vec<ItemFailure>,
    pub created_ids: Vec<String>,
}

/// A validated record with its 1-based position in the payload.
#[derive(Debug, Clone)]
pub struct PendingRecord {
    pub position: usize,
    pub record: ValidatedRecord,
}

pub struct BatchWriter {
    settings: BatchSettings,
}

impl BatchWriter {
    pub fn new(settings: BatchSettings) -> Self {
        Self { settings }
    }

    /// Writes `records` wave by wave, in order. Item failures are captured in
    /// the outcomes and never returned as errors.
    pub async fn write(
        &self,
        store: &dyn RecordStore,
        kind: RecordKind,
        records: &[PendingRecord],
    ) -> Vec<BatchOutcome> {
        let batch_size = self.settings.batch_size.max(1);
        let wave_count = records.len().div_ceil(batch_size);
        let mut outcomes = Vec::with_capacity(wave_count);

        for (wave, chunk) in records.chunks(batch_size).enumerate() {
            if wave > 0 && !self.settings.pause().is_zero() {
                tokio::time::sleep(self.settings.pause()).await;
            }

            let settled = join_all(chunk.iter().map(|pending| self.create_with_retry(store, pending))).await;
            let outcome = fold_wave(kind, chunk, settled);

            if outcome.failures > 0 {
                warn!(
                    kind = %kind,
                    wave = wave + 1,
                    waves = wave_count,
                    size = outcome.size,
                    failures = outcome.failures,
                    "batch wave finished with failures"
                );
            } else {
                debug!(kind = %kind, wave = wave + 1, waves = wave_count, size = outcome.size, "batch wave written");
            }

            outcomes.push(outcome);
        }

        outcomes
    }

    async fn create_with_retry(
        &self,
        store: &dyn RecordStore,
        pending: &PendingRecord,
    ) -> Result<String, StoreError> {
        let mut attempt = 0u32;
        loop {
            match store.create(&pending.record).await {
                Ok(id) => return Ok(id),
                Err(err) if attempt < self.settings.max_retries => {
                    let delay = self.settings.backoff_for(attempt);
                    debug!(
                        slug = pending.record.slug(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying record create"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn fold_wave(
    kind: RecordKind,
    chunk: &[PendingRecord],
    settled: Vec<Result<String, StoreError>>,
) -> BatchOutcome {
    let mut outcome = BatchOutcome {
        kind,
        size: chunk.len(),
        successes: 0,
        failures: 0,
        errors: Vec::new(),
        created_ids: Vec::new(),
    };

    for (pending, result) in chunk.iter().zip(settled) {
        match result {
            Ok(id) => {
                outcome.successes += 1;
                outcome.created_ids.push(id);
            }
            Err(err) => {
                outcome.failures += 1;
                outcome.errors.push(ItemFailure {
                    kind,
                    position: pending.position,
                    category: FailureCategory::WriteFailure,
                    message: err.to_string(),
                });
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::validation::validate_record;
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    fn pending(kind: RecordKind, titles: &[&str]) -> Vec<PendingRecord> {
        titles
            .iter()
            .enumerate()
            .map(|(index, title)| PendingRecord {
                position: index + 1,
                record: validate_record(kind, &json!({ "title": title }), Utc::now())
                    .expect("valid record"),
            })
            .collect()
    }

    fn quick(batch_size: usize, max_retries: u32) -> BatchSettings {
        BatchSettings {
            batch_size,
            pause_ms: 0,
            max_retries,
            retry_backoff_ms: 1,
        }
    }

    #[tokio::test]
    async fn failure_messages_carry_kind_and_position() {
        let store = MemoryStore::new().reject_title("Broken");
        let records = pending(RecordKind::Certification, &["Fine", "Broken", "Also fine"]);

        let outcomes = BatchWriter::new(quick(10, 0))
            .write(&store, RecordKind::Certification, &records)
            .await;

        assert_eq!(outcomes.len(), 1);
        let outcome = &outcomes[0];
        assert_eq!(outcome.successes, 2);
        assert_eq!(outcome.failures, 1);
        assert_eq!(outcome.successes + outcome.failures, outcome.size);
        assert_eq!(
            outcome.errors[0].to_string(),
            "certification #2: write failed: write rejected: store refused 'Broken'"
        );
    }

    #[tokio::test]
    async fn transient_failures_are_retried_when_enabled() {
        let store = MemoryStore::new().fail_title_times("Flaky", 2);
        let records = pending(RecordKind::Course, &["Flaky"]);

        let outcomes = BatchWriter::new(quick(10, 2))
            .write(&store, RecordKind::Course, &records)
            .await;

        assert_eq!(outcomes[0].successes, 1);
        assert_eq!(store.count("courses").await, 1);
    }

    #[tokio::test]
    async fn no_retry_by_default() {
        let store = MemoryStore::new().fail_title_times("Flaky", 1);
        let records = pending(RecordKind::Course, &["Flaky"]);

        let outcomes = BatchWriter::new(quick(10, 0))
            .write(&store, RecordKind::Course, &records)
            .await;

        assert_eq!(outcomes[0].failures, 1);
        assert_eq!(store.count("courses").await, 0);
    }

    #[tokio::test]
    async fn concurrency_is_bounded_by_wave_size() {
        let store = MemoryStore::new().with_latency(Duration::from_millis(5));
        let titles: Vec<String> = (0..12).map(|i| format!("Course {i}")).collect();
        let title_refs: Vec<&str> = titles.iter().map(String::as_str).collect();
        let records = pending(RecordKind::Course, &title_refs);

        let outcomes = BatchWriter::new(quick(4, 0))
            .write(&store, RecordKind::Course, &records)
            .await;

        assert_eq!(outcomes.len(), 3);
        assert!(store.peak_in_flight() <= 4);
        assert!(store.peak_in_flight() > 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pauses_only_between_waves() {
        let store = MemoryStore::new();
        let titles: Vec<String> = (0..25).map(|i| format!("Advisory {i}")).collect();
        let title_refs: Vec<&str> = titles.iter().map(String::as_str).collect();
        let records = pending(RecordKind::Advisory, &title_refs);
        let writer = BatchWriter::new(BatchSettings::default());

        let started = Instant::now();
        let outcomes = writer.write(&store, RecordKind::Advisory, &records).await;
        assert_eq!(outcomes.len(), 3);
        assert_eq!(started.elapsed(), Duration::from_millis(200));

        let started = Instant::now();
        let outcomes = writer
            .write(&store, RecordKind::Advisory, &records[..10])
            .await;
        assert_eq!(outcomes.len(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[derive(Debug, PartialEq)]
    enum Event {
        Started(usize),
        Settled(usize),
    }

    /// Records create start/settle order; item `n` takes `(n % 3 + 1) * 5` ms.
    #[derive(Default)]
    struct RecordingStore {
        events: Mutex<Vec<Event>>,
    }

    impl RecordingStore {
        fn push(&self, event: Event) {
            self.events.lock().expect("events lock").push(event);
        }
    }

    #[async_trait]
    impl RecordStore for RecordingStore {
        async fn create(&self, record: &ValidatedRecord) -> Result<String, StoreError> {
            let index: usize = record
                .title()
                .trim_start_matches("item ")
                .parse()
                .expect("numbered title");
            self.push(Event::Started(index));
            tokio::time::sleep(Duration::from_millis((index % 3 + 1) as u64 * 5)).await;
            self.push(Event::Settled(index));
            Ok(index.to_string())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn next_wave_starts_after_previous_settles() {
        let store = RecordingStore::default();
        let titles: Vec<String> = (0..9).map(|i| format!("item {i}")).collect();
        let title_refs: Vec<&str> = titles.iter().map(String::as_str).collect();
        let records = pending(RecordKind::Course, &title_refs);

        BatchWriter::new(quick(4, 0))
            .write(&store, RecordKind::Course, &records)
            .await;

        let events = store.events.lock().expect("events lock");
        assert_eq!(events.len(), 18);
        let wave_of = |index: usize| index / 4;
        for (at, event) in events.iter().enumerate() {
            let Event::Started(index) = event else {
                continue;
            };
            for earlier in 0..(wave_of(*index) * 4) {
                let settled_at = events
                    .iter()
                    .position(|e| *e == Event::Settled(earlier))
                    .expect("earlier item settled");
                assert!(settled_at < at, "item {index} started before item {earlier} settled");
            }
        }
    }

    #[tokio::test]
    async fn empty_input_dispatches_nothing() {
        let store = MemoryStore::new();
        let outcomes = BatchWriter::new(quick(10, 0))
            .write(&store, RecordKind::Advisory, &[])
            .await;
        assert!(outcomes.is_empty());
    }
}
