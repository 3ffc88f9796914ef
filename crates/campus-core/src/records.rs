use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Course,
    Advisory,
    Certification,
}

impl RecordKind {
    /// Processing order used by the ingestion orchestrator.
    pub const ALL: [RecordKind; 3] = [
        RecordKind::Course,
        RecordKind::Advisory,
        RecordKind::Certification,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Course => "course",
            RecordKind::Advisory => "advisory",
            RecordKind::Certification => "certification",
        }
    }

    /// Top-level payload key and storage collection for this kind.
    pub fn collection(&self) -> &'static str {
        match self {
            RecordKind::Course => "courses",
            RecordKind::Advisory => "advisories",
            RecordKind::Certification => "certifications",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields shared by every catalog record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordBase {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub slug: String,
    pub image_url: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    #[serde(flatten)]
    pub base: RecordBase,
    pub duration: String,
    pub level: String,
    pub instructor: String,
    pub content: Vec<String>,
    pub resources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advisory {
    #[serde(flatten)]
    pub base: RecordBase,
    pub short_description: String,
    pub long_description: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certification {
    #[serde(flatten)]
    pub base: RecordBase,
    pub certifying_body: String,
    pub level: String,
}

/// A payload item that passed validation, decoded into its closed variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidatedRecord {
    Course(Course),
    Advisory(Advisory),
    Certification(Certification),
}

impl ValidatedRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            ValidatedRecord::Course(_) => RecordKind::Course,
            ValidatedRecord::Advisory(_) => RecordKind::Advisory,
            ValidatedRecord::Certification(_) => RecordKind::Certification,
        }
    }

    pub fn base(&self) -> &RecordBase {
        match self {
            ValidatedRecord::Course(course) => &course.base,
            ValidatedRecord::Advisory(advisory) => &advisory.base,
            ValidatedRecord::Certification(certification) => &certification.base,
        }
    }

    pub fn title(&self) -> &str {
        &self.base().title
    }

    pub fn slug(&self) -> &str {
        &self.base().slug
    }
}
