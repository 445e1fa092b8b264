//! Record normalization
//!
//! Turns the loosely typed records handed over by the catalog service into
//! canonical [`Category`] values. Optional fields that are missing or
//! unreadable become `None`; only a record without a usable identity (id,
//! name) or with an id already seen in the batch is rejected. Rejections are
//! reported alongside the normalized records, never raised.

use super::models::{Category, CategoryId, RawCategory, RecordEnvelope};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NormalizeError {
    #[error("record is malformed: {reason}")]
    Malformed { reason: String },
    #[error("record has no id")]
    MissingId,
    #[error("record id {value} is not an integer")]
    InvalidId { value: String },
    #[error("category {id} has no name")]
    MissingName { id: CategoryId },
    #[error("category id {id} appears more than once in the batch")]
    DuplicateId { id: CategoryId },
}

/// A record excluded from the batch, with its position in the input
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRecord {
    pub index: usize,
    pub error: NormalizeError,
}

/// Result of normalizing one fetched batch
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub categories: Vec<Category>,
    pub rejected: Vec<RejectedRecord>,
}

/// Parse a record dump: either a bare JSON array or a `{"data": [...]}` envelope.
///
/// Only the outer shape is checked here. Entries are returned untyped and
/// judged one by one in [`normalize_records`].
pub fn parse_records(json: &str) -> Result<Vec<Value>, serde_json::Error> {
    match serde_json::from_str::<Value>(json)? {
        Value::Array(entries) => Ok(entries),
        other => {
            let envelope: RecordEnvelope = serde_json::from_value(other)?;
            Ok(envelope.data)
        }
    }
}

/// Read one dump entry into the loose record shape
pub fn read_entry(entry: &Value) -> Result<RawCategory, NormalizeError> {
    if !entry.is_object() {
        return Err(NormalizeError::Malformed {
            reason: format!("expected an object, found {}", json_kind(entry)),
        });
    }
    RawCategory::deserialize(entry).map_err(|e| NormalizeError::Malformed { reason: e.to_string() })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Normalize a batch, preserving input order among accepted records
pub fn normalize_records(entries: &[Value]) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();
    let mut seen: HashSet<CategoryId> = HashSet::with_capacity(entries.len());

    for (index, entry) in entries.iter().enumerate() {
        let result = read_entry(entry).and_then(|record| normalize_record(&record)).and_then(|category| {
            if seen.insert(category.id) {
                Ok(category)
            } else {
                Err(NormalizeError::DuplicateId { id: category.id })
            }
        });

        match result {
            Ok(category) => batch.categories.push(category),
            Err(error) => {
                tracing::warn!(index, %error, "skipping malformed category record");
                batch.rejected.push(RejectedRecord { index, error });
            }
        }
    }

    tracing::debug!(
        accepted = batch.categories.len(),
        rejected = batch.rejected.len(),
        "normalized category batch"
    );
    batch
}

/// Normalize a single record
pub fn normalize_record(raw: &RawCategory) -> Result<Category, NormalizeError> {
    let id = match raw.id.as_ref() {
        None | Some(Value::Null) => return Err(NormalizeError::MissingId),
        Some(value) => as_integer(value).ok_or_else(|| NormalizeError::InvalidId {
            value: value.to_string(),
        })?,
    };

    let name = as_text(raw.name.as_ref()).ok_or(NormalizeError::MissingName { id })?;

    let slug = as_text(raw.slug.as_ref()).unwrap_or_else(|| slugify(&name));

    // 0 is what the admin form submits for "no parent"
    let parent_id = match raw.parent_id.as_ref() {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(value) => match as_integer(value) {
            Some(parent) => Some(parent).filter(|parent| *parent != 0),
            None => {
                tracing::debug!(id, parent = %value, "unreadable parent_id, placing category at root");
                None
            }
        },
    };

    Ok(Category {
        id,
        name,
        slug,
        description: as_text(raw.description.as_ref()),
        parent_id,
        image: as_text(raw.image.as_ref()),
        is_active: raw.is_active.as_ref().and_then(as_flag).unwrap_or(true),
        sort_order: raw.sort_order.as_ref().and_then(as_integer).unwrap_or(0),
        created_at: raw.created_at.as_ref().and_then(as_timestamp),
        updated_at: raw.updated_at.as_ref().and_then(as_timestamp),
        products_count: raw
            .products_count
            .as_ref()
            .and_then(as_integer)
            .and_then(|count| u64::try_from(count).ok()),
        children: Vec::new(),
    })
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| is_whole_i64(*f)).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// 2^63 is exactly representable; anything at or past it would saturate
fn is_whole_i64(f: f64) -> bool {
    f.fract() == 0.0 && f >= -9_223_372_036_854_775_808.0 && f < 9_223_372_036_854_775_808.0
}

fn as_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Strings are trimmed and blank means absent; numbers are taken as their text
fn as_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.trim()).filter(|s| !s.is_empty()).map(str::to_string),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => n.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0)),
        _ => None,
    }
}

/// Accepts RFC 3339 and the `YYYY-MM-DD HH:MM:SS` form the API uses for older rows
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Lowercase, ASCII alphanumerics kept, every other run collapsed to one dash
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawCategory {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_normalize_full_record() {
        let record = raw(json!({
            "id": 7,
            "name": "Bath",
            "slug": "bath",
            "description": "Everything for the bath",
            "parent_id": null,
            "image": "bath.png",
            "is_active": true,
            "sort_order": 3,
            "created_at": "2024-05-01T10:00:00Z",
            "updated_at": "2024-05-02 08:30:00",
            "products_count": 12
        }));
        let category = normalize_record(&record).unwrap();

        assert_eq!(category.id, 7);
        assert_eq!(category.slug, "bath");
        assert_eq!(category.parent_id, None);
        assert_eq!(category.sort_order, 3);
        assert_eq!(category.products_count, Some(12));
        assert!(category.created_at.is_some());
        assert!(category.updated_at.is_some());
        assert!(category.children.is_empty());
    }

    #[test]
    fn test_absent_optionals_become_none() {
        let category = normalize_record(&raw(json!({"id": 1, "name": "Soap"}))).unwrap();

        assert_eq!(category.description, None);
        assert_eq!(category.image, None);
        assert_eq!(category.parent_id, None);
        assert_eq!(category.created_at, None);
        assert_eq!(category.products_count, None);
        assert!(category.is_active);
        assert_eq!(category.sort_order, 0);
        assert_eq!(category.slug, "soap");
    }

    #[test]
    fn test_loose_types_are_coerced() {
        let category = normalize_record(&raw(json!({
            "id": "42",
            "name": "Shampoo",
            "parent_id": "7",
            "is_active": 0,
            "sort_order": "5",
            "products_count": "3",
            "created_at": "not a date"
        })))
        .unwrap();

        assert_eq!(category.id, 42);
        assert_eq!(category.parent_id, Some(7));
        assert!(!category.is_active);
        assert_eq!(category.sort_order, 5);
        assert_eq!(category.products_count, Some(3));
        assert_eq!(category.created_at, None);
    }

    #[test]
    fn test_zero_parent_means_root() {
        let category = normalize_record(&raw(json!({"id": 2, "name": "X", "parent_id": 0}))).unwrap();
        assert_eq!(category.parent_id, None);
    }

    #[test]
    fn test_input_children_are_ignored() {
        let category = normalize_record(&raw(json!({
            "id": 1,
            "name": "Bath",
            "children": [{"id": 2, "name": "Soap"}]
        })))
        .unwrap();
        assert!(category.children.is_empty());
    }

    #[test]
    fn test_malformed_records_are_rejected_not_fatal() {
        let records = vec![
            json!({"name": "No id"}),
            json!({"id": 1, "name": "Bath"}),
            json!({"id": {"nested": true}, "name": "Bad id"}),
            json!({"id": 2, "name": "   "}),
            json!({"id": 1, "name": "Bath again"}),
            json!({"id": 3, "name": "Shampoo", "parent_id": 1}),
        ];
        let batch = normalize_records(&records);

        let ids: Vec<_> = batch.categories.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(batch.rejected.len(), 4);
        assert_eq!(batch.rejected[0], RejectedRecord { index: 0, error: NormalizeError::MissingId });
        assert!(matches!(batch.rejected[1].error, NormalizeError::InvalidId { .. }));
        assert_eq!(batch.rejected[2].error, NormalizeError::MissingName { id: 2 });
        assert_eq!(batch.rejected[3], RejectedRecord { index: 4, error: NormalizeError::DuplicateId { id: 1 } });
    }

    #[test]
    fn test_parse_records_bare_and_envelope() {
        let bare = r#"[{"id": 1, "name": "Bath"}]"#;
        let envelope = r#"{"data": [{"id": 1, "name": "Bath"}, {"id": 2, "name": "Soap"}], "total": 2, "page": 1}"#;

        assert_eq!(parse_records(bare).unwrap().len(), 1);
        assert_eq!(parse_records(envelope).unwrap().len(), 2);
        assert!(parse_records("{\"rows\": []}").is_err());
    }

    #[test]
    fn test_wrong_typed_entries_do_not_sink_the_batch() {
        let dump = r#"[
            {"id": 1, "name": "Bath"},
            {"id": 2, "name": "Soap", "description": 5, "parent_id": 1},
            {"id": 3, "name": "Shampoo", "created_at": 1714557600, "image": ["a.png"]},
            null,
            "stray",
            [4, "Positional"],
            {"id": 5, "name": 2024}
        ]"#;
        let entries = parse_records(dump).unwrap();
        assert_eq!(entries.len(), 7);

        let batch = normalize_records(&entries);
        let ids: Vec<_> = batch.categories.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 5]);

        assert_eq!(batch.categories[1].description.as_deref(), Some("5"));
        assert_eq!(batch.categories[2].created_at.map(|t| t.timestamp()), Some(1714557600));
        assert_eq!(batch.categories[2].image, None);
        assert_eq!(batch.categories[3].name, "2024");

        let rejected: Vec<usize> = batch.rejected.iter().map(|r| r.index).collect();
        assert_eq!(rejected, vec![3, 4, 5]);
        assert!(batch.rejected.iter().all(|r| matches!(r.error, NormalizeError::Malformed { .. })));
        assert_eq!(
            batch.rejected[0].error.to_string(),
            "record is malformed: expected an object, found null"
        );
    }

    #[test]
    fn test_envelope_with_bad_entry() {
        let entries = parse_records(r#"{"data": [{"id": 1, "name": "Bath"}, 17], "total": 2}"#).unwrap();
        let batch = normalize_records(&entries);

        assert_eq!(batch.categories.len(), 1);
        assert_eq!(batch.rejected[0].index, 1);
    }

    #[test]
    fn test_out_of_range_float_ids_are_invalid() {
        let batch = normalize_records(&[
            json!({"id": 1e300, "name": "Huge"}),
            json!({"id": 2e300, "name": "Huger"}),
            json!({"id": -1e19, "name": "Tiny"}),
            json!({"id": 12.0, "name": "Whole float"}),
            json!({"id": 12.5, "name": "Fraction"}),
        ]);

        let ids: Vec<_> = batch.categories.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![12]);
        assert_eq!(batch.rejected.len(), 4);
        assert!(batch.rejected.iter().all(|r| matches!(r.error, NormalizeError::InvalidId { .. })));
    }

    #[test]
    fn test_unreadable_parent_is_logged() {
        let (category, logs) = crate::capture_logs(|| {
            normalize_record(&raw(json!({"id": 9, "name": "Loose", "parent_id": "abc"})))
        });

        let category = category.unwrap();
        assert_eq!(category.parent_id, None);
        assert!(logs.contains("unreadable parent_id"), "logs were: {logs}");
        assert!(logs.contains("abc"));

        let (blank, logs) = crate::capture_logs(|| {
            normalize_record(&raw(json!({"id": 10, "name": "Blank", "parent_id": " "})))
        });
        assert_eq!(blank.unwrap().parent_id, None);
        assert!(!logs.contains("unreadable parent_id"));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Soap Bars"), "soap-bars");
        assert_eq!(slugify("  Hair & Body  "), "hair-body");
        assert_eq!(slugify("Kids' Toys!"), "kids-toys");
    }
}
