//! Normalization of questionnaire answers onto a common 0–100 scale.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The five-step ladder every answer encoding maps onto.
pub const SCORE_LADDER: [f64; 5] = [0.0, 25.0, 50.0, 75.0, 100.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerType {
    /// 5-point agreement scale answered with 1..=5.
    #[serde(alias = "Likert")]
    Likert,
    /// "agree" / "disagree" / "unsure".
    #[serde(alias = "yes_no", alias = "Ternary")]
    Ternary,
    /// Letter A..=E on the maturity ladder.
    #[serde(alias = "maturity", alias = "MaturityLevel")]
    MaturityLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerItem {
    pub number: u32,
    pub dimension: String,
    #[serde(default)]
    pub prompt: String,
    pub answer_type: AnswerType,
    #[serde(default)]
    pub raw_answer: Option<Value>,
    /// Always recomputed from `answer_type` and `raw_answer`.
    #[serde(default)]
    pub normalized_score: f64,
}

/// Maps a raw answer to its 0–100 score. Missing or unrecognised answers
/// score 0, so the function is total over every input.
pub fn normalize(answer_type: AnswerType, raw: Option<&Value>) -> f64 {
    let Some(raw) = raw.filter(|value| !value.is_null()) else {
        return 0.0;
    };

    let step = match answer_type {
        AnswerType::Likert => likert_step(raw),
        AnswerType::Ternary => ternary_step(raw),
        AnswerType::MaturityLevel => maturity_step(raw),
    };

    step.map_or(0.0, |index| SCORE_LADDER[index])
}

/// Recomputes `normalized_score` on every item, discarding whatever the
/// caller supplied.
pub fn score_answers(mut items: Vec<AnswerItem>) -> Vec<AnswerItem> {
    for item in &mut items {
        item.normalized_score = normalize(item.answer_type, item.raw_answer.as_ref());
    }
    items
}

fn likert_step(raw: &Value) -> Option<usize> {
    let value = match raw {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    if value.fract() != 0.0 || !(1.0..=5.0).contains(&value) {
        return None;
    }
    Some(value as usize - 1)
}

fn ternary_step(raw: &Value) -> Option<usize> {
    let agrees = match raw {
        Value::Bool(flag) => *flag,
        Value::String(text) => text.trim().eq_ignore_ascii_case("agree"),
        _ => false,
    };
    agrees.then_some(4)
}

fn maturity_step(raw: &Value) -> Option<usize> {
    let text = raw.as_str()?.trim();
    let mut chars = text.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    if chars.next().is_some() {
        return None;
    }
    match letter {
        'A'..='E' => Some(letter as usize - 'A' as usize),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn likert_uses_the_fixed_ladder() {
        let scores: Vec<f64> = (1..=5)
            .map(|answer| normalize(AnswerType::Likert, Some(&json!(answer))))
            .collect();
        assert_eq!(scores, SCORE_LADDER.to_vec());
        assert_eq!(normalize(AnswerType::Likert, Some(&json!("4"))), 75.0);
        assert_eq!(normalize(AnswerType::Likert, Some(&json!(0))), 0.0);
        assert_eq!(normalize(AnswerType::Likert, Some(&json!(6))), 0.0);
        assert_eq!(normalize(AnswerType::Likert, Some(&json!(2.5))), 0.0);
    }

    #[test]
    fn ternary_only_rewards_agreement() {
        assert_eq!(normalize(AnswerType::Ternary, Some(&json!("agree"))), 100.0);
        assert_eq!(normalize(AnswerType::Ternary, Some(&json!(" Agree "))), 100.0);
        assert_eq!(normalize(AnswerType::Ternary, Some(&json!(true))), 100.0);
        assert_eq!(normalize(AnswerType::Ternary, Some(&json!("disagree"))), 0.0);
        assert_eq!(normalize(AnswerType::Ternary, Some(&json!("unsure"))), 0.0);
    }

    #[test]
    fn maturity_letters_map_onto_the_ladder() {
        assert_eq!(normalize(AnswerType::MaturityLevel, Some(&json!("a"))), 0.0);
        assert_eq!(normalize(AnswerType::MaturityLevel, Some(&json!("C"))), 50.0);
        assert_eq!(normalize(AnswerType::MaturityLevel, Some(&json!("E"))), 100.0);
        assert_eq!(normalize(AnswerType::MaturityLevel, Some(&json!("F"))), 0.0);
        assert_eq!(normalize(AnswerType::MaturityLevel, Some(&json!("AB"))), 0.0);
    }

    #[test]
    fn missing_answers_score_zero() {
        for answer_type in [AnswerType::Likert, AnswerType::Ternary, AnswerType::MaturityLevel] {
            assert_eq!(normalize(answer_type, None), 0.0);
            assert_eq!(normalize(answer_type, Some(&Value::Null)), 0.0);
        }
    }

    #[test]
    fn supplied_scores_are_overwritten() {
        let items = score_answers(vec![AnswerItem {
            number: 1,
            dimension: "Governance".into(),
            prompt: "We have an AI policy".into(),
            answer_type: AnswerType::Likert,
            raw_answer: Some(json!(2)),
            normalized_score: 99.0,
        }]);
        assert_eq!(items[0].normalized_score, 25.0);
    }

    #[test]
    fn answer_type_accepts_aliases() {
        let parsed: AnswerType = serde_json::from_value(json!("yes_no")).expect("alias");
        assert_eq!(parsed, AnswerType::Ternary);
        let parsed: AnswerType = serde_json::from_value(json!("maturity")).expect("alias");
        assert_eq!(parsed, AnswerType::MaturityLevel);
    }

    #[test]
    fn answer_type_accepts_variant_names() {
        for (tag, expected) in [
            ("Likert", AnswerType::Likert),
            ("Ternary", AnswerType::Ternary),
            ("MaturityLevel", AnswerType::MaturityLevel),
        ] {
            let parsed: AnswerType = serde_json::from_value(json!(tag)).expect("variant name");
            assert_eq!(parsed, expected);
        }

        let item: AnswerItem = serde_json::from_value(json!({
            "number": 1,
            "dimension": "Data",
            "answer_type": "MaturityLevel",
            "raw_answer": "E"
        }))
        .expect("answer item");
        assert_eq!(normalize(item.answer_type, item.raw_answer.as_ref()), 100.0);
    }
}
