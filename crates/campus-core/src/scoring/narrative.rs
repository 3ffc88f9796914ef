//! Action-plan narratives produced by an external text-generation service.
//!
//! The scored report is saved before any narrative is requested. Generation
//! or parsing failures are logged and leave the stored report untouched.

use std::fmt::Write as _;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use super::report::GlobalReport;
use crate::config::NarrativeConfig;
use crate::error::{NarrativeError, StoreError};
use crate::store::ReportStore;

const SYSTEM_PROMPT: &str = "You are an advisor in AI adoption for organizations. \
Answer only with a JSON object of the form \
{\"summary\": string, \"priorities\": [{\"dimension\": string, \"actions\": [string], \"horizon\": string}]}.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub priorities: Vec<PlanPriority>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanPriority {
    #[serde(default)]
    pub dimension: String,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub horizon: Option<String>,
}

#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, NarrativeError>;
}

/// Client for OpenAI-compatible `chat/completions` endpoints.
pub struct ChatCompletionsGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl ChatCompletionsGenerator {
    pub fn new(config: &NarrativeConfig) -> Result<Self, NarrativeError> {
        let base_url = config
            .base_url
            .clone()
            .ok_or_else(|| NarrativeError::Configuration("missing base_url".into()))?;
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| NarrativeError::Configuration("missing api_key".into()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    fn endpoint(&self) -> String {
        if self.base_url.ends_with('/') {
            format!("{}chat/completions", self.base_url)
        } else {
            format!("{}/chat/completions", self.base_url)
        }
    }
}

#[async_trait]
impl NarrativeGenerator for ChatCompletionsGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, NarrativeError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt }
            ],
            "temperature": self.temperature,
        });

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(NarrativeError::Request(format!("API error ({status}): {text}")));
        }

        let payload: serde_json::Value = response.json().await?;
        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| NarrativeError::Unparseable("missing choices[0].message.content".into()))
    }
}

/// Renders the scored report as the user prompt for the generator.
pub fn build_prompt(report: &GlobalReport) -> String {
    let mut prompt = String::new();
    let respondent = &report.respondent;

    let _ = writeln!(
        prompt,
        "Organization: {} ({})",
        if respondent.organization.is_empty() { "unknown" } else { respondent.organization.as_str() },
        respondent.sector.as_deref().unwrap_or("sector not given"),
    );
    if let Some(size) = &respondent.organization_size {
        let _ = writeln!(prompt, "Organization size: {size}");
    }
    let _ = writeln!(
        prompt,
        "Global maturity index: {:.1}/100, grade {:.1}/7, level {}",
        report.global_index, report.global_grade, report.global_level
    );
    let _ = writeln!(prompt, "Dimensions:");
    for dimension in &report.dimensions {
        let _ = writeln!(
            prompt,
            "- {}: index {:.1}, grade {:.1}, level {}",
            dimension.dimension, dimension.index, dimension.grade, dimension.level
        );
    }
    let _ = write!(
        prompt,
        "Write a prioritized action plan that starts with the weakest dimensions."
    );

    prompt
}

/// Parses generator output into a plan. Markdown code fences (with any
/// language tag) are tolerated, and when the reply wraps the JSON in prose the
/// outermost `{ ... }` span is tried. Anything that is not a JSON object is
/// rejected.
pub fn parse_action_plan(text: &str) -> Result<ActionPlan, NarrativeError> {
    let value: serde_json::Value = match serde_json::from_str(strip_code_fence(text.trim())) {
        Ok(value) => value,
        Err(err) => embedded_object(text)
            .and_then(|candidate| serde_json::from_str(candidate).ok())
            .ok_or_else(|| NarrativeError::Unparseable(err.to_string()))?,
    };

    if !value.is_object() {
        return Err(NarrativeError::Unparseable("expected a JSON object".into()));
    }

    serde_json::from_value(value).map_err(|err| NarrativeError::Unparseable(err.to_string()))
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    rest.trim().strip_suffix("```").unwrap_or(rest).trim()
}

fn embedded_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Requests a narrative for a stored report and attaches it once.
///
/// Returns `Ok(None)` when generation fails; only storage errors while
/// attaching are propagated.
pub async fn enrich_report(
    store: &dyn ReportStore,
    generator: &dyn NarrativeGenerator,
    report_id: &str,
    report: &GlobalReport,
) -> Result<Option<ActionPlan>, StoreError> {
    let prompt = build_prompt(report);

    let plan = match generator.generate(&prompt).await.and_then(|text| parse_action_plan(&text)) {
        Ok(plan) => plan,
        Err(err) => {
            warn!(report_id, error = %err, "narrative generation failed; report kept without narrative");
            return Ok(None);
        }
    };

    store.attach_narrative(report_id, &plan).await?;
    info!(report_id, priorities = plan.priorities.len(), "narrative attached");
    Ok(Some(plan))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_json() {
        let text = "```json\n{\"summary\": \"Start with data\", \"priorities\": [{\"dimension\": \"Data\", \"actions\": [\"Inventory sources\"]}]}\n```";
        let plan = parse_action_plan(text).expect("plan");
        assert_eq!(plan.summary, "Start with data");
        assert_eq!(plan.priorities[0].actions, vec!["Inventory sources"]);
        assert_eq!(plan.priorities[0].horizon, None);
    }

    #[test]
    fn tolerates_tagged_fences_and_surrounding_prose() {
        let upper = "```JSON\n{\"summary\": \"Upper\", \"priorities\": []}\n```";
        assert_eq!(parse_action_plan(upper).expect("upper-case tag").summary, "Upper");

        let chatty = "Sure! Here is the plan:\n```json\n{\"summary\": \"Chatty\", \"priorities\": []}\n```\nGood luck.";
        assert_eq!(parse_action_plan(chatty).expect("prose around fence").summary, "Chatty");

        let inline = "Plan: {\"summary\": \"Inline\"} (end)";
        assert_eq!(parse_action_plan(inline).expect("inline object").summary, "Inline");
    }

    #[test]
    fn rejects_non_objects() {
        assert!(matches!(
            parse_action_plan("[1, 2]"),
            Err(NarrativeError::Unparseable(_))
        ));
        assert!(matches!(
            parse_action_plan("Here is your plan!"),
            Err(NarrativeError::Unparseable(_))
        ));
    }

    #[test]
    fn generator_requires_credentials() {
        let config = NarrativeConfig::default();
        assert!(matches!(
            ChatCompletionsGenerator::new(&config),
            Err(NarrativeError::Configuration(_))
        ));
    }
}
