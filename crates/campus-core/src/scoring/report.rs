use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::aggregate::{aggregate, DimensionResult, MaturityLevel};
use super::answers::{score_answers, AnswerItem};
use super::narrative::ActionPlan;
use crate::error::StoreError;
use crate::store::ReportStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Respondent {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub organization_size: Option<String>,
}

/// A completed questionnaire as submitted by the respondent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Questionnaire {
    pub respondent: Respondent,
    pub answers: Vec<AnswerItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalReport {
    pub respondent: Respondent,
    pub answers: Vec<AnswerItem>,
    pub dimensions: Vec<DimensionResult>,
    pub global_index: f64,
    pub global_grade: f64,
    pub global_level: MaturityLevel,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub narrative: Option<ActionPlan>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmittedReport {
    pub id: String,
    pub report: GlobalReport,
}

/// Scores a questionnaire into a report. Pure: no storage, no clock reads.
pub fn assemble(questionnaire: Questionnaire, now: DateTime<Utc>) -> GlobalReport {
    let answers = score_answers(questionnaire.answers);
    let aggregate = aggregate(&answers);

    GlobalReport {
        respondent: questionnaire.respondent,
        answers,
        dimensions: aggregate.dimensions,
        global_index: aggregate.global.index,
        global_grade: aggregate.global.grade,
        global_level: aggregate.global.level,
        created_at: now,
        narrative: None,
    }
}

pub struct ReportAssembler<'a> {
    store: &'a dyn ReportStore,
}

impl<'a> ReportAssembler<'a> {
    pub fn new(store: &'a dyn ReportStore) -> Self {
        Self { store }
    }

    /// Scores and persists the questionnaire, returning the stored id so a
    /// narrative can be attached later.
    pub async fn submit(&self, questionnaire: Questionnaire) -> Result<SubmittedReport, StoreError> {
        let report = assemble(questionnaire, Utc::now());
        let id = self.store.save(&report).await?;

        info!(
            report_id = %id,
            global_index = report.global_index,
            global_level = %report.global_level,
            dimensions = report.dimensions.len(),
            "maturity report stored"
        );

        Ok(SubmittedReport { id, report })
    }
}
