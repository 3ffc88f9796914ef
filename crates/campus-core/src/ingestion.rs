//! Bulk import of a mixed catalog payload.
//!
//! ```json
//! { "courses": [...], "advisories": [...], "certifications": [...] }
//! ```
//!
//! Kinds are processed in that order. A bad item becomes an entry in the
//! summary's error list; only a structurally invalid payload aborts the run.

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::batch_writer::{BatchOutcome, BatchWriter, FailureCategory, ItemFailure, PendingRecord};
use crate::config::BatchSettings;
use crate::error::IngestError;
use crate::records::RecordKind;
use crate::store::RecordStore;
use crate::validation::validate_record;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub phase: String,
    pub percent: u8,
    pub total: usize,
    pub processed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreatedCounts {
    pub courses: usize,
    pub advisories: usize,
    pub certifications: usize,
}

impl CreatedCounts {
    fn add(&mut self, kind: RecordKind, created: usize) {
        match kind {
            RecordKind::Course => self.courses += created,
            RecordKind::Advisory => self.advisories += created,
            RecordKind::Certification => self.certifications += created,
        }
    }

    pub fn total(&self) -> usize {
        self.courses + self.advisories + self.certifications
    }
}

/// Validation failures and wave outcomes for one kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KindReport {
    pub kind: RecordKind,
    pub submitted: usize,
    pub created: usize,
    pub failed: usize,
    pub batches: Vec<BatchOutcome>,
    pub errors: Vec<ItemFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportSummary {
    pub total_processed: usize,
    pub total_errors: usize,
    pub created: CreatedCounts,
    pub batches_dispatched: usize,
    pub success: bool,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub kinds: Vec<KindReport>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Succeeded { created: usize },
    SucceededWithErrors { created: usize, errors: usize },
    Failed { errors: usize },
}

impl ImportOutcome {
    pub fn message(&self) -> String {
        match self {
            ImportOutcome::Succeeded { created } => {
                format!("Import completed: {created} records created")
            }
            ImportOutcome::SucceededWithErrors { created, errors } => {
                format!("Import completed with {errors} errors: {created} records created")
            }
            ImportOutcome::Failed { errors } => format!("Import failed with {errors} errors"),
        }
    }
}

impl ImportSummary {
    /// Summary for a run that could not start.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            total_processed: 0,
            total_errors: 1,
            created: CreatedCounts::default(),
            batches_dispatched: 0,
            success: false,
            errors: vec![message.into()],
            kinds: Vec::new(),
        }
    }

    pub fn outcome(&self) -> ImportOutcome {
        let created = self.created.total();
        match (self.success, self.total_errors) {
            (true, 0) => ImportOutcome::Succeeded { created },
            (true, errors) => ImportOutcome::SucceededWithErrors { created, errors },
            (false, errors) => ImportOutcome::Failed { errors },
        }
    }
}

pub struct Ingestor<'a> {
    store: &'a dyn RecordStore,
    writer: BatchWriter,
}

impl<'a> Ingestor<'a> {
    pub fn new(store: &'a dyn RecordStore, settings: BatchSettings) -> Self {
        Self {
            store,
            writer: BatchWriter::new(settings),
        }
    }

    /// Parses raw JSON text and runs the import. Any top-level failure is
    /// folded into a failed summary, so callers always get something to show.
    pub async fn run_json<F>(&self, raw: &str, on_progress: F) -> ImportSummary
    where
        F: FnMut(ProgressEvent),
    {
        let payload = match serde_json::from_str::<Value>(raw) {
            Ok(payload) => payload,
            Err(err) => {
                let err = IngestError::from(err);
                warn!(error = %err, "import payload rejected");
                return ImportSummary::failed(format!("Error processing import: {err}"));
            }
        };

        match self.run(&payload, on_progress).await {
            Ok(summary) => summary,
            Err(err) => {
                warn!(error = %err, "import payload rejected");
                ImportSummary::failed(format!("Error processing import: {err}"))
            }
        }
    }

    pub async fn run<F>(&self, payload: &Value, mut on_progress: F) -> Result<ImportSummary, IngestError>
    where
        F: FnMut(ProgressEvent),
    {
        let sections = sections(payload)?;
        let total: usize = sections.iter().map(|(_, items)| items.len()).sum();
        if total == 0 {
            return Err(IngestError::MalformedPayload(
                "payload contains no courses, advisories or certifications".into(),
            ));
        }

        info!(total_items = total, "import started");

        let mut processed = 0usize;
        let mut kinds = Vec::with_capacity(sections.len());

        for (kind, items) in sections {
            on_progress(ProgressEvent {
                phase: format!("processing {}", kind.collection()),
                percent: percent(processed, total),
                total,
                processed,
            });

            let report = self.import_kind(kind, items).await;
            info!(
                kind = %kind,
                submitted = report.submitted,
                created = report.created,
                failed = report.failed,
                "kind imported"
            );

            processed += items.len();
            kinds.push(report);
        }

        on_progress(ProgressEvent {
            phase: "completed".to_string(),
            percent: 100,
            total,
            processed,
        });

        let summary = summarize(total, kinds);
        info!(
            total_processed = summary.total_processed,
            total_errors = summary.total_errors,
            success = summary.success,
            "import finished"
        );
        Ok(summary)
    }

    async fn import_kind(&self, kind: RecordKind, items: &[Value]) -> KindReport {
        let now = Utc::now();
        let mut pending = Vec::with_capacity(items.len());
        let mut errors = Vec::new();

        for (index, item) in items.iter().enumerate() {
            let position = index + 1;
            match validate_record(kind, item, now) {
                Ok(record) => pending.push(PendingRecord { position, record }),
                Err(err) => errors.push(ItemFailure {
                    kind,
                    position,
                    category: FailureCategory::InvalidRecord,
                    message: err.to_string(),
                }),
            }
        }

        let batches = self.writer.write(self.store, kind, &pending).await;
        let created: usize = batches.iter().map(|batch| batch.successes).sum();

        let mut write_errors: Vec<ItemFailure> = batches
            .iter()
            .flat_map(|batch| batch.errors.iter().cloned())
            .collect();
        errors.append(&mut write_errors);
        errors.sort_by_key(|failure| failure.position);

        KindReport {
            kind,
            submitted: items.len(),
            created,
            failed: errors.len(),
            batches,
            errors,
        }
    }
}

/// Extracts the per-kind arrays in processing order. Missing or null keys
/// are skipped; a key holding anything other than an array is malformed.
fn sections(payload: &Value) -> Result<Vec<(RecordKind, &[Value])>, IngestError> {
    let object: &Map<String, Value> = payload.as_object().ok_or_else(|| {
        IngestError::MalformedPayload("top-level value must be a JSON object".into())
    })?;

    let mut sections = Vec::new();
    for kind in RecordKind::ALL {
        match object.get(kind.collection()) {
            None | Some(Value::Null) => {}
            Some(Value::Array(items)) => sections.push((kind, items.as_slice())),
            Some(_) => {
                return Err(IngestError::MalformedPayload(format!(
                    "'{}' must be an array",
                    kind.collection()
                )))
            }
        }
    }
    Ok(sections)
}

fn percent(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((processed * 100) / total).min(100) as u8
}

fn summarize(total: usize, kinds: Vec<KindReport>) -> ImportSummary {
    let mut created = CreatedCounts::default();
    let mut errors = Vec::new();
    let mut batches_dispatched = 0;

    for report in &kinds {
        created.add(report.kind, report.created);
        batches_dispatched += report.batches.len();
        errors.extend(report.errors.iter().map(ToString::to_string));
    }

    let total_errors = errors.len();
    ImportSummary {
        total_processed: total,
        total_errors,
        created,
        batches_dispatched,
        success: total_errors < total,
        errors,
        kinds,
    }
}
