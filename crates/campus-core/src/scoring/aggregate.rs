use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::answers::AnswerItem;

/// Qualitative maturity buckets, ordered from least to most mature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MaturityLevel {
    Incipiente,
    #[serde(rename = "Básico")]
    Basico,
    Intermedio,
    Avanzado,
    Transformador,
}

impl MaturityLevel {
    /// Buckets an index with the fixed 20-point boundaries; 100 falls in the
    /// top bucket.
    pub fn from_index(index: f64) -> Self {
        match index {
            i if i < 20.0 => MaturityLevel::Incipiente,
            i if i < 40.0 => MaturityLevel::Basico,
            i if i < 60.0 => MaturityLevel::Intermedio,
            i if i < 80.0 => MaturityLevel::Avanzado,
            _ => MaturityLevel::Transformador,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MaturityLevel::Incipiente => "Incipiente",
            MaturityLevel::Basico => "Básico",
            MaturityLevel::Intermedio => "Intermedio",
            MaturityLevel::Avanzado => "Avanzado",
            MaturityLevel::Transformador => "Transformador",
        }
    }
}

impl fmt::Display for MaturityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionResult {
    pub dimension: String,
    pub index: f64,
    pub grade: f64,
    pub level: MaturityLevel,
    pub item_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub index: f64,
    pub grade: f64,
    pub level: MaturityLevel,
}

impl ScoreSummary {
    pub fn from_index(index: f64) -> Self {
        let index = round1(index.clamp(0.0, 100.0));
        Self {
            index,
            grade: grade_for(index),
            level: MaturityLevel::from_index(index),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub dimensions: Vec<DimensionResult>,
    pub global: ScoreSummary,
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Linear rescale of a 0–100 index onto the 1–7 grading scale.
pub fn grade_for(index: f64) -> f64 {
    round1(1.0 + 6.0 * (index / 100.0))
}

fn mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Scores each dimension in first-appearance order, then the global index as
/// the unweighted mean of the dimension indices.
pub fn aggregate(items: &[AnswerItem]) -> Aggregate {
    let mut order: Vec<&str> = Vec::new();
    let mut grouped: HashMap<&str, Vec<f64>> = HashMap::new();

    for item in items {
        let dimension = item.dimension.as_str();
        grouped
            .entry(dimension)
            .or_insert_with(|| {
                order.push(dimension);
                Vec::new()
            })
            .push(item.normalized_score);
    }

    let dimensions: Vec<DimensionResult> = order
        .into_iter()
        .map(|dimension| {
            let scores = &grouped[dimension];
            let summary = ScoreSummary::from_index(mean(scores.iter().copied()));
            DimensionResult {
                dimension: dimension.to_string(),
                index: summary.index,
                grade: summary.grade,
                level: summary.level,
                item_count: scores.len(),
            }
        })
        .collect();

    let global = ScoreSummary::from_index(mean(dimensions.iter().map(|d| d.index)));

    Aggregate { dimensions, global }
}
