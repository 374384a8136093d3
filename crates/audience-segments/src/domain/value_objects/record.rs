//! Customer records, the candidates segments are evaluated against

use audience_common::EntityId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::field::Field;

/// Raw value stored under a record field
///
/// Strings always deserialize as `Text`, timestamps included; date
/// operators parse them on demand.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Number(f64),
    Text(String),
    Date(DateTime<Utc>),
}

impl FieldValue {
    /// Present, non-null and not the empty string
    pub fn is_set(&self) -> bool {
        match self {
            FieldValue::Null => false,
            FieldValue::Text(s) => !s.is_empty(),
            FieldValue::Number(_) | FieldValue::Date(_) => true,
        }
    }

    /// Stringified form used by text operators
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            FieldValue::Null => None,
            FieldValue::Text(s) => Some(Cow::Borrowed(s)),
            FieldValue::Number(n) => Some(Cow::Owned(format_number(*n))),
            FieldValue::Date(d) => Some(Cow::Owned(d.to_rfc3339())),
        }
    }

    /// Numeric form used by number operators
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Null => None,
            FieldValue::Number(n) => n.is_finite().then_some(*n),
            FieldValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            FieldValue::Date(d) => Some(d.timestamp_millis() as f64),
        }
    }

    /// Epoch-millisecond form used by date operators
    pub fn as_timestamp_millis(&self) -> Option<i64> {
        match self {
            FieldValue::Null => None,
            FieldValue::Date(d) => Some(d.timestamp_millis()),
            FieldValue::Text(s) => parse_date_text(s).map(|d| d.timestamp_millis()),
            FieldValue::Number(n) => n.is_finite().then_some(*n as i64),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value as f64)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Date(value)
    }
}

/// Integral values print without a trailing `.0`
pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// RFC 3339 timestamps or bare `YYYY-MM-DD` dates (midnight UTC)
pub(crate) fn parse_date_text(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// A customer as seen by the evaluator
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub id: EntityId,
    #[serde(default)]
    pub tags: BTreeSet<EntityId>,
    #[serde(default)]
    pub values: BTreeMap<Field, FieldValue>,
}

impl CustomerRecord {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            tags: BTreeSet::new(),
            values: BTreeMap::new(),
        }
    }

    /// Builder-style field assignment
    pub fn with(mut self, field: Field, value: impl Into<FieldValue>) -> Self {
        self.values.insert(field, value.into());
        self
    }

    /// Builder-style tag assignment
    pub fn with_tag(mut self, tag_id: EntityId) -> Self {
        self.tags.insert(tag_id);
        self
    }

    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        self.values.get(&field)
    }

    pub fn has_tag(&self, tag_id: &EntityId) -> bool {
        self.tags.contains(tag_id)
    }
}

/// Immutable, versioned view of every candidate record.
///
/// The version changes whenever the underlying records do, so anything
/// derived from a snapshot can be checked for staleness.
#[derive(Clone, Debug)]
pub struct RecordSnapshot {
    pub version: u64,
    pub records: Arc<[CustomerRecord]>,
}

impl Default for RecordSnapshot {
    fn default() -> Self {
        Self::new(0, vec![])
    }
}

impl RecordSnapshot {
    pub fn new(version: u64, records: Vec<CustomerRecord>) -> Self {
        Self {
            version,
            records: records.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn find(&self, id: &EntityId) -> Option<&CustomerRecord> {
        self.records.iter().find(|r| &r.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_is_set() {
        assert!(!FieldValue::Null.is_set());
        assert!(!FieldValue::from("").is_set());
        assert!(FieldValue::from(" ").is_set());
        assert!(FieldValue::from(0.0).is_set());
    }

    #[test]
    fn test_text_coercion() {
        assert_eq!(FieldValue::from(150.0).as_text().unwrap(), "150");
        assert_eq!(FieldValue::from(1.5).as_text().unwrap(), "1.5");
        assert!(FieldValue::Null.as_text().is_none());
    }

    #[test]
    fn test_number_coercion() {
        assert_eq!(FieldValue::from(" 42.5 ").as_number(), Some(42.5));
        assert_eq!(FieldValue::from("abc").as_number(), None);
        assert_eq!(FieldValue::from(f64::NAN).as_number(), None);
    }

    #[test]
    fn test_timestamp_strings_load_as_text() {
        let value: FieldValue = serde_json::from_str(r#""2024-01-02T03:04:05Z""#).unwrap();
        assert_eq!(value, FieldValue::from("2024-01-02T03:04:05Z"));
        assert_eq!(value.as_text().unwrap(), "2024-01-02T03:04:05Z");

        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap().timestamp_millis();
        assert_eq!(value.as_timestamp_millis(), Some(expected));
        assert_eq!(serde_json::from_str::<FieldValue>("null").unwrap(), FieldValue::Null);
    }

    #[test]
    fn test_date_coercion() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap().timestamp_millis();
        assert_eq!(FieldValue::from("2024-03-01").as_timestamp_millis(), Some(expected));
        assert_eq!(
            FieldValue::from("2024-03-01T00:00:00Z").as_timestamp_millis(),
            Some(expected)
        );
        assert_eq!(FieldValue::from("next tuesday").as_timestamp_millis(), None);
    }

    #[test]
    fn test_record_deserializes_typed_values() {
        let record: CustomerRecord = serde_json::from_str(
            r#"{"id": "c1", "values": {"revenue": 150, "email": "a@b.io", "last_visit_at": "2024-01-02T03:04:05Z", "city": null}}"#,
        )
        .unwrap();

        assert_eq!(record.get(Field::Revenue), Some(&FieldValue::Number(150.0)));
        let last_visit = record.get(Field::LastVisitAt).unwrap();
        assert_eq!(last_visit, &FieldValue::from("2024-01-02T03:04:05Z"));
        assert!(last_visit.as_timestamp_millis().is_some());
        assert_eq!(record.get(Field::City), Some(&FieldValue::Null));
        assert!(record.tags.is_empty());
    }
}
