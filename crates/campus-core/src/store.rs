//! Storage seams for catalog records and maturity reports.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::records::ValidatedRecord;
use crate::scoring::narrative::ActionPlan;
use crate::scoring::report::GlobalReport;

pub const REPORTS_COLLECTION: &str = "maturity_reports";

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Stores one record in its kind's collection and returns the new id.
    async fn create(&self, record: &ValidatedRecord) -> Result<String, StoreError>;
}

#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn save(&self, report: &GlobalReport) -> Result<String, StoreError>;
    async fn fetch(&self, id: &str) -> Result<GlobalReport, StoreError>;
    /// Attaches a narrative to a stored report. A report accepts exactly one.
    async fn attach_narrative(&self, id: &str, narrative: &ActionPlan) -> Result<(), StoreError>;
}

/// In-process document store keyed by collection, used by tests and by the
/// CLI's `--in-memory` mode.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<(String, Value)>>>,
    faults: Mutex<Faults>,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

#[derive(Default)]
struct Faults {
    rejected_titles: HashSet<String>,
    transient: HashMap<String, usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every create so concurrent writes overlap.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Every create for a record with this title fails.
    pub fn reject_title(self, title: impl Into<String>) -> Self {
        self.lock_faults().rejected_titles.insert(title.into());
        self
    }

    /// The first `failures` creates for this title fail, later ones succeed.
    pub fn fail_title_times(self, title: impl Into<String>, failures: usize) -> Self {
        self.lock_faults().transient.insert(title.into(), failures);
        self
    }

    pub async fn documents(&self, collection: &str) -> Vec<Value> {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|docs| docs.iter().map(|(_, body)| body.clone()).collect())
            .unwrap_or_default()
    }

    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, Vec::len)
    }

    /// Highest number of creates observed in flight at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn lock_faults(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn injected_fault(&self, title: &str) -> Option<StoreError> {
        let mut faults = self.lock_faults();
        if faults.rejected_titles.contains(title) {
            return Some(StoreError::Rejected(format!("store refused '{title}'")));
        }
        match faults.transient.get_mut(title) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Some(StoreError::Rejected(format!("transient failure for '{title}'")))
            }
            _ => None,
        }
    }

    async fn insert(&self, collection: &str, body: Value) -> String {
        let id = Uuid::new_v4().to_string();
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .push((id.clone(), body));
        id
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create(&self, record: &ValidatedRecord) -> Result<String, StoreError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let result = match self.injected_fault(record.title()) {
            Some(err) => Err(err),
            None => match serde_json::to_value(record) {
                Ok(body) => Ok(self.insert(record.kind().collection(), body).await),
                Err(err) => Err(err.into()),
            },
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn save(&self, report: &GlobalReport) -> Result<String, StoreError> {
        let body = serde_json::to_value(report)?;
        Ok(self.insert(REPORTS_COLLECTION, body).await)
    }

    async fn fetch(&self, id: &str) -> Result<GlobalReport, StoreError> {
        let collections = self.collections.read().await;
        let body = collections
            .get(REPORTS_COLLECTION)
            .and_then(|docs| docs.iter().find(|(doc_id, _)| doc_id == id))
            .map(|(_, body)| body.clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        Ok(serde_json::from_value(body)?)
    }

    async fn attach_narrative(&self, id: &str, narrative: &ActionPlan) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let body = collections
            .get_mut(REPORTS_COLLECTION)
            .and_then(|docs| docs.iter_mut().find(|(doc_id, _)| doc_id == id))
            .map(|(_, body)| body)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if !body["narrative"].is_null() {
            return Err(StoreError::NarrativeAlreadyAttached(id.to_string()));
        }
        body["narrative"] = serde_json::to_value(narrative)?;
        Ok(())
    }
}
