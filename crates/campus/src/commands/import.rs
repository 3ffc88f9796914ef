use std::path::Path;

use anyhow::{Context, Result};
use campus_core::config::CampusConfig;
use campus_core::ingestion::{Ingestor, ProgressEvent};

use crate::Backend;

pub async fn run(config: &CampusConfig, backend: &Backend, path: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read import file {}", path.display()))?;

    println!("Importing from {}", path.display());
    let ingestor = Ingestor::new(backend.records(), config.batch.clone());
    let summary = ingestor.run_json(&raw, print_progress).await;

    println!("\n--- Import Summary ---");
    println!("{}", serde_json::to_string_pretty(&summary)?);
    println!("\n{}", summary.outcome().message());

    if !summary.success {
        anyhow::bail!("import failed with {} errors", summary.total_errors);
    }
    Ok(())
}

fn print_progress(event: ProgressEvent) {
    println!(
        "[{:>3}%] {} ({}/{})",
        event.percent, event.phase, event.processed, event.total
    );
}
