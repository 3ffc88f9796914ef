// crates/campus-core/src/validation.rs

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::InvalidRecord;
use crate::records::{
    Advisory, Certification, Course, RecordBase, RecordKind, ValidatedRecord,
};
use crate::slug;

pub const DEFAULT_DESCRIPTION: &str = "Sin descripción";
pub const DEFAULT_LEVEL: &str = "Principiante";
pub const DEFAULT_UNASSIGNED: &str = "Por definir";

/// Decodes one untyped payload item into a closed record variant.
///
/// Only `title` and `price` can reject an item; every other field falls back
/// to a default. The slug is always regenerated, never read from the input.
pub trait RecordValidator: Send + Sync {
    fn validate(&self, item: &Value, now: DateTime<Utc>) -> Result<ValidatedRecord, InvalidRecord>;
}

pub struct CourseValidator;
pub struct AdvisoryValidator;
pub struct CertificationValidator;

pub fn validator_for(kind: RecordKind) -> &'static dyn RecordValidator {
    match kind {
        RecordKind::Course => &CourseValidator,
        RecordKind::Advisory => &AdvisoryValidator,
        RecordKind::Certification => &CertificationValidator,
    }
}

pub fn validate_record(
    kind: RecordKind,
    item: &Value,
    now: DateTime<Utc>,
) -> Result<ValidatedRecord, InvalidRecord> {
    validator_for(kind).validate(item, now)
}

impl RecordValidator for CourseValidator {
    fn validate(&self, item: &Value, now: DateTime<Utc>) -> Result<ValidatedRecord, InvalidRecord> {
        let fields = Fields::of(item)?;
        let base = fields.base(now, None)?;

        Ok(ValidatedRecord::Course(Course {
            base,
            duration: fields.string(&["duration"], ""),
            level: fields.string(&["level"], DEFAULT_LEVEL),
            instructor: fields.string(&["instructor"], DEFAULT_UNASSIGNED),
            content: fields.list(&["content", "modules"]),
            resources: fields.list(&["resources"]),
        }))
    }
}

impl RecordValidator for AdvisoryValidator {
    fn validate(&self, item: &Value, now: DateTime<Utc>) -> Result<ValidatedRecord, InvalidRecord> {
        let fields = Fields::of(item)?;
        let short_description = fields.string(&["shortDescription", "short_description"], "");
        let fallback = (!short_description.is_empty()).then_some(short_description.as_str());
        let base = fields.base(now, fallback)?;

        Ok(ValidatedRecord::Advisory(Advisory {
            long_description: fields.string(
                &["longDescription", "long_description"],
                &base.description,
            ),
            base,
            short_description,
            tags: fields.list(&["tags"]),
        }))
    }
}

impl RecordValidator for CertificationValidator {
    fn validate(&self, item: &Value, now: DateTime<Utc>) -> Result<ValidatedRecord, InvalidRecord> {
        let fields = Fields::of(item)?;
        let base = fields.base(now, None)?;

        Ok(ValidatedRecord::Certification(Certification {
            base,
            certifying_body: fields.string(
                &["certifyingBody", "certifying_body", "issuer"],
                DEFAULT_UNASSIGNED,
            ),
            level: fields.string(&["level"], DEFAULT_LEVEL),
        }))
    }
}

/// Lenient accessors over one payload object. Keys are tried in order so the
/// camelCase form shape and snake_case exports are both accepted.
struct Fields<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    fn of(item: &'a Value) -> Result<Self, InvalidRecord> {
        item.as_object()
            .map(|map| Self { map })
            .ok_or(InvalidRecord::NotAnObject)
    }

    fn lookup(&self, keys: &[&str]) -> Option<&'a Value> {
        keys.iter()
            .filter_map(|key| self.map.get(*key))
            .find(|value| !value.is_null())
    }

    fn base(
        &self,
        now: DateTime<Utc>,
        description_fallback: Option<&str>,
    ) -> Result<RecordBase, InvalidRecord> {
        let title = self.title()?;
        let price = self.price()?;
        let description = self.string(
            &["description"],
            description_fallback.unwrap_or(DEFAULT_DESCRIPTION),
        );

        Ok(RecordBase {
            slug: slug::generate(&title),
            title,
            description,
            price,
            image_url: self.string(&["imageUrl", "image_url", "image"], ""),
            is_active: self.flag(&["isActive", "is_active", "active"], true),
            created_at: now,
            updated_at: now,
        })
    }

    fn title(&self) -> Result<String, InvalidRecord> {
        match self.map.get("title").and_then(Value::as_str).map(str::trim) {
            Some(title) if !title.is_empty() => Ok(title.to_string()),
            _ => Err(InvalidRecord::MissingTitle),
        }
    }

    fn price(&self) -> Result<f64, InvalidRecord> {
        let Some(raw) = self.lookup(&["price"]) else {
            return Ok(0.0);
        };

        let parsed = match raw {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        };

        match parsed {
            Some(price) if price.is_finite() && price >= 0.0 => Ok(price),
            _ => Err(InvalidRecord::InvalidPrice(raw.to_string())),
        }
    }

    fn string(&self, keys: &[&str], default: &str) -> String {
        match self.lookup(keys) {
            Some(Value::String(text)) if !text.trim().is_empty() => text.trim().to_string(),
            Some(Value::Number(number)) => number.to_string(),
            _ => default.to_string(),
        }
    }

    fn list(&self, keys: &[&str]) -> Vec<String> {
        match self.lookup(keys) {
            Some(Value::Array(values)) => values.iter().filter_map(list_entry).collect(),
            Some(Value::String(text)) => text
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    fn flag(&self, keys: &[&str], default: bool) -> bool {
        match self.lookup(keys) {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(text)) => match text.trim().to_ascii_lowercase().as_str() {
                "false" | "0" | "no" => false,
                "true" | "1" | "yes" | "si" | "sí" => true,
                _ => default,
            },
            Some(Value::Number(number)) => number.as_f64().map_or(default, |n| n != 0.0),
            _ => default,
        }
    }
}

fn list_entry(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => text.as_str(),
        Value::Object(map) => map
            .get("title")
            .or_else(|| map.get("name"))
            .and_then(Value::as_str)?,
        _ => return None,
    };
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn course_defaults_are_filled() {
        let record = validate_record(RecordKind::Course, &json!({"title": "AI 101"}), now())
            .expect("valid course");
        let ValidatedRecord::Course(course) = record else {
            panic!("expected a course");
        };
        assert_eq!(course.base.description, DEFAULT_DESCRIPTION);
        assert_eq!(course.level, DEFAULT_LEVEL);
        assert_eq!(course.instructor, DEFAULT_UNASSIGNED);
        assert_eq!(course.base.price, 0.0);
        assert!(course.base.is_active);
        assert!(course.content.is_empty());
    }

    #[test]
    fn price_is_coerced_from_numeric_strings() {
        let record = validate_record(
            RecordKind::Certification,
            &json!({"title": "ISO 27001", "price": " 149.90 "}),
            now(),
        )
        .expect("valid certification");
        assert_eq!(record.base().price, 149.9);
    }

    #[test]
    fn rejects_bad_price_and_title() {
        let err = validate_record(RecordKind::Course, &json!({"title": "x", "price": -1}), now())
            .unwrap_err();
        assert!(matches!(err, InvalidRecord::InvalidPrice(_)));

        let err = validate_record(RecordKind::Course, &json!({"title": "x", "price": "abc"}), now())
            .unwrap_err();
        assert!(matches!(err, InvalidRecord::InvalidPrice(_)));

        let err = validate_record(RecordKind::Course, &json!({"title": "x", "price": true}), now())
            .unwrap_err();
        assert!(matches!(err, InvalidRecord::InvalidPrice(_)));

        let err = validate_record(RecordKind::Advisory, &json!({"title": "   "}), now()).unwrap_err();
        assert_eq!(err, InvalidRecord::MissingTitle);

        let err = validate_record(RecordKind::Advisory, &json!({"title": 42}), now()).unwrap_err();
        assert_eq!(err, InvalidRecord::MissingTitle);

        let err = validate_record(RecordKind::Advisory, &json!(null), now()).unwrap_err();
        assert_eq!(err, InvalidRecord::NotAnObject);
    }

    #[test]
    fn input_slug_is_ignored() {
        let record = validate_record(
            RecordKind::Course,
            &json!({"title": "AI 101", "slug": "hand-written"}),
            now(),
        )
        .expect("valid course");
        assert!(record.slug().starts_with("ai-101-"));
    }

    #[test]
    fn advisory_accepts_camel_case_and_comma_tags() {
        let record = validate_record(
            RecordKind::Advisory,
            &json!({
                "title": "Data Strategy",
                "shortDescription": "Quick review",
                "tags": "ai, governance , ",
                "isActive": "false"
            }),
            now(),
        )
        .expect("valid advisory");
        let ValidatedRecord::Advisory(advisory) = record else {
            panic!("expected an advisory");
        };
        assert_eq!(advisory.short_description, "Quick review");
        assert_eq!(advisory.base.description, "Quick review");
        assert_eq!(advisory.long_description, "Quick review");
        assert_eq!(advisory.tags, vec!["ai", "governance"]);
        assert!(!advisory.base.is_active);
    }

    #[test]
    fn course_lists_take_strings_and_titled_objects() {
        let record = validate_record(
            RecordKind::Course,
            &json!({
                "title": "Python",
                "content": ["Intro", {"title": "Loops"}, 3, {"other": true}],
                "resources": null
            }),
            now(),
        )
        .expect("valid course");
        let ValidatedRecord::Course(course) = record else {
            panic!("expected a course");
        };
        assert_eq!(course.content, vec!["Intro", "Loops"]);
        assert!(course.resources.is_empty());
    }
}
