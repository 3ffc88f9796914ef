use std::sync::Arc;

use anyhow::{Context, Result};
use campus_core::config::{BatchSettings, CampusConfig};
use campus_core::db::{self, PostgresStore};
use campus_core::scoring::narrative::{ChatCompletionsGenerator, NarrativeGenerator};
use campus_core::store::{MemoryStore, RecordStore, ReportStore};
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub records: Arc<dyn RecordStore>,
    pub reports: Arc<dyn ReportStore>,
    pub narrative: Option<Arc<dyn NarrativeGenerator>>,
    pub batch: BatchSettings,
}

impl AppState {
    /// Postgres-backed state; migrations run before the pool is handed out.
    pub async fn from_config(config: &CampusConfig) -> Result<Self> {
        let database_url = config
            .database_url
            .as_deref()
            .context("CAMPUS_DATABASE_URL (or DATABASE_URL) must be set")?;
        let pool = db::connect(database_url, config.batch.pool_connections()).await?;
        db::run_migrations(&pool).await?;

        let store = Arc::new(PostgresStore::new(pool));
        let narrative: Option<Arc<dyn NarrativeGenerator>> = if config.narrative.is_configured() {
            info!(model = %config.narrative.model, "narrative generator enabled");
            Some(Arc::new(ChatCompletionsGenerator::new(&config.narrative)?))
        } else {
            warn!("narrative generator not configured; reports will be stored without action plans");
            None
        };

        Ok(Self {
            records: store.clone(),
            reports: store,
            narrative,
            batch: config.batch.clone(),
        })
    }

    pub fn in_memory(store: Arc<MemoryStore>, batch: BatchSettings) -> Self {
        Self {
            records: store.clone(),
            reports: store,
            narrative: None,
            batch,
        }
    }

    pub fn with_narrative(mut self, generator: Arc<dyn NarrativeGenerator>) -> Self {
        self.narrative = Some(generator);
        self
    }
}

