//! Condition evaluation
//!
//! Pure, infallible predicate evaluation of a condition tree against one
//! customer record. A condition that cannot be evaluated (missing value,
//! value that does not coerce to the condition's class) is `false`; it
//! never aborts the rest of the group.

use audience_common::{EvaluationConfig, TextMatch};
use chrono::{DateTime, NaiveDate, Utc};
use std::borrow::Cow;
use tracing::debug;

use crate::domain::value_objects::{
    Condition, ConditionGroup, CustomerRecord, DateTest, FieldValue, GroupOperator,
    LooseConditionGroup, NumberTest, Test, TextTest, DEFAULT_LIST_DELIMITER,
};

/// Evaluation knobs taken from configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EvaluationOptions {
    pub text_match: TextMatch,
    /// Used only when decoding loose documents
    pub list_delimiter: char,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self {
            text_match: TextMatch::CaseSensitive,
            list_delimiter: DEFAULT_LIST_DELIMITER,
        }
    }
}

impl From<&EvaluationConfig> for EvaluationOptions {
    fn from(config: &EvaluationConfig) -> Self {
        Self {
            text_match: config.text_match,
            list_delimiter: config.list_delimiter,
        }
    }
}

/// Condition evaluator domain service
#[derive(Clone, Debug, Default)]
pub struct ConditionEvaluator {
    options: EvaluationOptions,
}

impl ConditionEvaluator {
    pub fn new(options: EvaluationOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> EvaluationOptions {
        self.options
    }

    /// `AND`: every condition and sub-group holds (vacuously true when empty).
    /// `OR`: at least one holds (false when empty).
    pub fn evaluate(&self, group: &ConditionGroup, record: &CustomerRecord) -> bool {
        match group.operator {
            GroupOperator::And => {
                group.conditions.iter().all(|c| self.evaluate_condition(c, record))
                    && group.groups.iter().all(|g| self.evaluate(g, record))
            }
            GroupOperator::Or => {
                group.conditions.iter().any(|c| self.evaluate_condition(c, record))
                    || group.groups.iter().any(|g| self.evaluate(g, record))
            }
        }
    }

    pub fn evaluate_condition(&self, condition: &Condition, record: &CustomerRecord) -> bool {
        let value = record.get(condition.field());
        match condition.test() {
            Test::Text(test) => self.text(test, value),
            Test::Number(test) => number(test, value),
            Test::Date(test) => date(test, value),
        }
    }

    /// Evaluate untyped documents. A document that does not decode into a
    /// valid condition counts as `false` for its group.
    pub fn evaluate_loose(&self, group: &LooseConditionGroup, record: &CustomerRecord) -> bool {
        let mut conditions = group.conditions.iter().map(|doc| {
            match doc.clone().into_condition(self.options.list_delimiter) {
                Ok(condition) => self.evaluate_condition(&condition, record),
                Err(e) => {
                    debug!(field = %doc.field, operator = %doc.operator, error = %e, "Skipping unevaluable condition");
                    false
                }
            }
        });

        match group.operator {
            GroupOperator::And => {
                conditions.all(|matched| matched)
                    && group.groups.iter().all(|g| self.evaluate_loose(g, record))
            }
            GroupOperator::Or => {
                conditions.any(|matched| matched)
                    || group.groups.iter().any(|g| self.evaluate_loose(g, record))
            }
        }
    }

    fn text(&self, test: &TextTest, value: Option<&FieldValue>) -> bool {
        let raw = value.and_then(FieldValue::as_text);
        let actual = raw.as_deref().map(|r| self.fold(r));

        match (test, actual) {
            (TextTest::IsSet, _) => is_present(value),
            (TextTest::IsNotSet, _) => !is_present(value),
            (_, None) => false,
            (TextTest::Equals(s), Some(a)) => a == self.fold(s),
            (TextTest::NotEquals(s), Some(a)) => a != self.fold(s),
            (TextTest::Contains(s), Some(a)) => a.contains(&*self.fold(s)),
            (TextTest::NotContains(s), Some(a)) => !a.contains(&*self.fold(s)),
            (TextTest::StartsWith(s), Some(a)) => a.starts_with(&*self.fold(s)),
            (TextTest::EndsWith(s), Some(a)) => a.ends_with(&*self.fold(s)),
            (TextTest::InList(items), Some(a)) => items.iter().any(|item| self.fold(item) == a),
            (TextTest::NotInList(items), Some(a)) => !items.iter().any(|item| self.fold(item) == a),
        }
    }

    fn fold<'a>(&self, s: &'a str) -> Cow<'a, str> {
        match self.options.text_match {
            TextMatch::CaseSensitive => Cow::Borrowed(s),
            TextMatch::CaseInsensitive => Cow::Owned(s.to_lowercase()),
        }
    }
}

/// Present, non-null and not the empty string
fn is_present(value: Option<&FieldValue>) -> bool {
    value.is_some_and(FieldValue::is_set)
}

fn number(test: &NumberTest, value: Option<&FieldValue>) -> bool {
    match (test, value.and_then(FieldValue::as_number)) {
        (NumberTest::IsSet, _) => is_present(value),
        (NumberTest::IsNotSet, _) => !is_present(value),
        (_, None) => false,
        (NumberTest::Equals(x), Some(n)) => n == *x,
        (NumberTest::NotEquals(x), Some(n)) => n != *x,
        (NumberTest::GreaterThan(x), Some(n)) => n > *x,
        (NumberTest::LessThan(x), Some(n)) => n < *x,
        (NumberTest::Between(low, high), Some(n)) => *low <= n && n <= *high,
        (NumberTest::InList(items), Some(n)) => items.iter().any(|x| *x == n),
        (NumberTest::NotInList(items), Some(n)) => !items.iter().any(|x| *x == n),
    }
}

fn date(test: &DateTest, value: Option<&FieldValue>) -> bool {
    match (test, value.and_then(FieldValue::as_timestamp_millis)) {
        (DateTest::IsSet, _) => is_present(value),
        (DateTest::IsNotSet, _) => !is_present(value),
        (_, None) => false,
        (DateTest::Equals(d), Some(ms)) => day_of(ms).is_some_and(|day| day == d.date_naive()),
        (DateTest::NotEquals(d), Some(ms)) => day_of(ms).is_some_and(|day| day != d.date_naive()),
        (DateTest::GreaterThan(d), Some(ms)) => ms > d.timestamp_millis(),
        (DateTest::LessThan(d), Some(ms)) => ms < d.timestamp_millis(),
        (DateTest::Between(low, high), Some(ms)) => {
            low.timestamp_millis() <= ms && ms <= high.timestamp_millis()
        }
    }
}

/// UTC calendar day of an epoch-millisecond timestamp
fn day_of(ms: i64) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp_millis(ms).map(|d| d.date_naive())
}
