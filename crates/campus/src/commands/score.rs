use std::path::Path;

use anyhow::{Context, Result};
use campus_core::config::CampusConfig;
use campus_core::scoring::narrative::{enrich_report, ChatCompletionsGenerator, NarrativeGenerator};
use campus_core::scoring::{ActionPlan, GlobalReport, Questionnaire, ReportAssembler, SubmittedReport};
use campus_core::store::ReportStore;
use comfy_table::Table;
use tracing::warn;

use crate::Backend;

pub async fn run(config: &CampusConfig, backend: &Backend, path: &Path, narrative: bool) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read questionnaire {}", path.display()))?;
    let questionnaire: Questionnaire =
        serde_json::from_str(&raw).context("questionnaire is not valid JSON")?;

    let submitted = ReportAssembler::new(backend.reports())
        .submit(questionnaire)
        .await
        .context("failed to store maturity report")?;

    println!("{}", dimension_table(&submitted.report));
    println!(
        "Global: index {:.1}, grade {:.1}, level {}",
        submitted.report.global_index, submitted.report.global_grade, submitted.report.global_level
    );
    println!("Report id: {}", submitted.id);

    if !narrative {
        return Ok(());
    }
    if !config.narrative.is_configured() {
        warn!("narrative generator not configured; skipping action plan");
        return Ok(());
    }

    let generator = match ChatCompletionsGenerator::new(&config.narrative) {
        Ok(generator) => generator,
        Err(err) => {
            warn!(report_id = %submitted.id, error = %err, "narrative generator unavailable; report kept without action plan");
            return Ok(());
        }
    };
    attach_plan(backend.reports(), &generator, &submitted).await;
    Ok(())
}

/// Narrative failures never fail the command: the scored report is already
/// stored.
async fn attach_plan(
    reports: &dyn ReportStore,
    generator: &dyn NarrativeGenerator,
    submitted: &SubmittedReport,
) -> Option<ActionPlan> {
    match enrich_report(reports, generator, &submitted.id, &submitted.report).await {
        Ok(Some(plan)) => {
            print_plan(&plan);
            Some(plan)
        }
        Ok(None) => None,
        Err(err) => {
            warn!(report_id = %submitted.id, error = %err, "failed to attach action plan; report kept");
            None
        }
    }
}

fn dimension_table(report: &GlobalReport) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Dimension", "Items", "Index", "Grade", "Level"]);
    for dimension in &report.dimensions {
        table.add_row(vec![
            dimension.dimension.clone(),
            dimension.item_count.to_string(),
            format!("{:.1}", dimension.index),
            format!("{:.1}", dimension.grade),
            dimension.level.to_string(),
        ]);
    }
    table
}

fn print_plan(plan: &ActionPlan) {
    println!("\n--- Action Plan ---");
    println!("{}", plan.summary);
    for priority in &plan.priorities {
        match &priority.horizon {
            Some(horizon) => println!("\n{} ({horizon})", priority.dimension),
            None => println!("\n{}", priority.dimension),
        }
        for action in &priority.actions {
            println!("  - {action}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use campus_core::error::NarrativeError;
    use campus_core::scoring::{AnswerItem, AnswerType, Respondent};
    use campus_core::store::MemoryStore;
    use serde_json::json;

    struct StaticPlan;

    #[async_trait]
    impl NarrativeGenerator for StaticPlan {
        async fn generate(&self, _prompt: &str) -> Result<String, NarrativeError> {
            Ok(r#"{"summary": "Start with governance", "priorities": []}"#.to_string())
        }
    }

    async fn stored_report(store: &MemoryStore) -> SubmittedReport {
        ReportAssembler::new(store)
            .submit(Questionnaire {
                respondent: Respondent {
                    name: "Ana".into(),
                    email: "ana@example.com".into(),
                    organization: "Acme".into(),
                    role: None,
                    sector: None,
                    organization_size: None,
                },
                answers: vec![AnswerItem {
                    number: 1,
                    dimension: "Governance".into(),
                    prompt: String::new(),
                    answer_type: AnswerType::Likert,
                    raw_answer: Some(json!(3)),
                    normalized_score: 0.0,
                }],
            })
            .await
            .expect("submit")
    }

    #[tokio::test]
    async fn attach_failures_do_not_fail_the_command() {
        let store = MemoryStore::new();
        let submitted = stored_report(&store).await;

        assert!(attach_plan(&store, &StaticPlan, &submitted).await.is_some());
        // Second attach is rejected by the store and only logged.
        assert!(attach_plan(&store, &StaticPlan, &submitted).await.is_none());

        let stored = store.fetch(&submitted.id).await.expect("fetch");
        assert_eq!(stored.global_index, submitted.report.global_index);
    }

    #[tokio::test]
    async fn unreachable_generator_keeps_the_report() {
        let store = MemoryStore::new();
        let backend = Backend::Memory(store);
        let path = std::env::temp_dir().join(format!("campus-score-{}.json", std::process::id()));
        std::fs::write(
            &path,
            json!({
                "respondent": {"name": "Ana", "email": "ana@example.com"},
                "answers": [{"number": 1, "dimension": "Data", "answer_type": "likert", "raw_answer": 4}]
            })
            .to_string(),
        )
        .expect("write questionnaire");

        let mut config = CampusConfig::default();
        config.narrative.base_url = Some("http://localhost:9/v1".into());
        config.narrative.api_key = Some(String::new());
        config.narrative.timeout_secs = 1;

        let result = run(&config, &backend, &path, true).await;
        let _ = std::fs::remove_file(&path);
        assert!(result.is_ok(), "{result:?}");
    }
}
