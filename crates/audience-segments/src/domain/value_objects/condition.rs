//! Condition value object
//!
//! A condition pairs one [`Field`] with a class-specific test. The test enums
//! only carry operators that are legal for their class, and [`Condition`]
//! refuses a test whose class differs from the field's, so an ill-typed
//! condition cannot be built. The stored document form is the flat
//! `{id, field, operator, value}` shape; decoding it goes through the same
//! validation.

use audience_common::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use super::field::{Field, FieldClass, Operator};
use super::record::{format_number, parse_date_text};

/// Separator used when a delimited list operand arrives without configuration
pub const DEFAULT_LIST_DELIMITER: char = ',';

// =============================================================================
// Class-specific tests
// =============================================================================

#[derive(Clone, Debug, PartialEq)]
pub enum TextTest {
    Equals(String),
    NotEquals(String),
    Contains(String),
    NotContains(String),
    StartsWith(String),
    EndsWith(String),
    InList(Vec<String>),
    NotInList(Vec<String>),
    IsSet,
    IsNotSet,
}

#[derive(Clone, Debug, PartialEq)]
pub enum NumberTest {
    Equals(f64),
    NotEquals(f64),
    GreaterThan(f64),
    LessThan(f64),
    /// Inclusive `[low, high]`
    Between(f64, f64),
    InList(Vec<f64>),
    NotInList(Vec<f64>),
    IsSet,
    IsNotSet,
}

/// Date tests. `Equals`/`NotEquals` compare the UTC calendar day.
#[derive(Clone, Debug, PartialEq)]
pub enum DateTest {
    Equals(DateTime<Utc>),
    NotEquals(DateTime<Utc>),
    GreaterThan(DateTime<Utc>),
    LessThan(DateTime<Utc>),
    /// Inclusive `[low, high]`
    Between(DateTime<Utc>, DateTime<Utc>),
    IsSet,
    IsNotSet,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Test {
    Text(TextTest),
    Number(NumberTest),
    Date(DateTest),
}

impl Test {
    pub fn class(&self) -> FieldClass {
        match self {
            Test::Text(_) => FieldClass::Text,
            Test::Number(_) => FieldClass::Number,
            Test::Date(_) => FieldClass::Date,
        }
    }

    pub fn operator(&self) -> Operator {
        match self {
            Test::Text(t) => match t {
                TextTest::Equals(_) => Operator::Equals,
                TextTest::NotEquals(_) => Operator::NotEquals,
                TextTest::Contains(_) => Operator::Contains,
                TextTest::NotContains(_) => Operator::NotContains,
                TextTest::StartsWith(_) => Operator::StartsWith,
                TextTest::EndsWith(_) => Operator::EndsWith,
                TextTest::InList(_) => Operator::InList,
                TextTest::NotInList(_) => Operator::NotInList,
                TextTest::IsSet => Operator::IsSet,
                TextTest::IsNotSet => Operator::IsNotSet,
            },
            Test::Number(t) => match t {
                NumberTest::Equals(_) => Operator::Equals,
                NumberTest::NotEquals(_) => Operator::NotEquals,
                NumberTest::GreaterThan(_) => Operator::GreaterThan,
                NumberTest::LessThan(_) => Operator::LessThan,
                NumberTest::Between(_, _) => Operator::Between,
                NumberTest::InList(_) => Operator::InList,
                NumberTest::NotInList(_) => Operator::NotInList,
                NumberTest::IsSet => Operator::IsSet,
                NumberTest::IsNotSet => Operator::IsNotSet,
            },
            Test::Date(t) => match t {
                DateTest::Equals(_) => Operator::Equals,
                DateTest::NotEquals(_) => Operator::NotEquals,
                DateTest::GreaterThan(_) => Operator::GreaterThan,
                DateTest::LessThan(_) => Operator::LessThan,
                DateTest::Between(_, _) => Operator::Between,
                DateTest::IsSet => Operator::IsSet,
                DateTest::IsNotSet => Operator::IsNotSet,
            },
        }
    }

    /// Operand in document form (`None` for presence tests)
    pub fn operand(&self) -> Option<Value> {
        match self {
            Test::Text(t) => match t {
                TextTest::Equals(s)
                | TextTest::NotEquals(s)
                | TextTest::Contains(s)
                | TextTest::NotContains(s)
                | TextTest::StartsWith(s)
                | TextTest::EndsWith(s) => Some(Value::String(s.clone())),
                TextTest::InList(items) | TextTest::NotInList(items) => Some(json!(items)),
                TextTest::IsSet | TextTest::IsNotSet => None,
            },
            Test::Number(t) => match t {
                NumberTest::Equals(n)
                | NumberTest::NotEquals(n)
                | NumberTest::GreaterThan(n)
                | NumberTest::LessThan(n) => Some(json!(n)),
                NumberTest::Between(low, high) => Some(json!([low, high])),
                NumberTest::InList(items) | NumberTest::NotInList(items) => Some(json!(items)),
                NumberTest::IsSet | NumberTest::IsNotSet => None,
            },
            Test::Date(t) => match t {
                DateTest::Equals(d)
                | DateTest::NotEquals(d)
                | DateTest::GreaterThan(d)
                | DateTest::LessThan(d) => Some(Value::String(d.to_rfc3339())),
                DateTest::Between(low, high) => {
                    Some(json!([low.to_rfc3339(), high.to_rfc3339()]))
                }
                DateTest::IsSet | DateTest::IsNotSet => None,
            },
        }
    }

    fn validate(&self) -> Result<(), ConditionError> {
        let operator = self.operator();
        match self {
            Test::Text(TextTest::InList(items) | TextTest::NotInList(items)) if items.is_empty() => {
                Err(ConditionError::EmptyList(operator))
            }
            Test::Number(NumberTest::InList(items) | NumberTest::NotInList(items)) => {
                if items.is_empty() {
                    return Err(ConditionError::EmptyList(operator));
                }
                if items.iter().any(|n| !n.is_finite()) {
                    return Err(ConditionError::invalid(operator, "non-finite number"));
                }
                Ok(())
            }
            Test::Number(
                NumberTest::Equals(n)
                | NumberTest::NotEquals(n)
                | NumberTest::GreaterThan(n)
                | NumberTest::LessThan(n),
            ) if !n.is_finite() => Err(ConditionError::invalid(operator, "non-finite number")),
            Test::Number(NumberTest::Between(low, high)) => {
                if !low.is_finite() || !high.is_finite() {
                    return Err(ConditionError::invalid(operator, "non-finite number"));
                }
                if low > high {
                    return Err(ConditionError::InvertedRange);
                }
                Ok(())
            }
            Test::Date(DateTest::Between(low, high)) if low > high => {
                Err(ConditionError::InvertedRange)
            }
            _ => Ok(()),
        }
    }
}

// =============================================================================
// Condition
// =============================================================================

/// A single validated predicate over one record field
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ConditionDocument", into = "ConditionDocument")]
pub struct Condition {
    id: EntityId,
    field: Field,
    test: Test,
}

impl Condition {
    /// Build a condition with a fresh id
    pub fn new(field: Field, test: Test) -> Result<Self, ConditionError> {
        Self::with_id(EntityId::new(), field, test)
    }

    pub fn with_id(id: EntityId, field: Field, test: Test) -> Result<Self, ConditionError> {
        if test.class() != field.class() {
            return Err(ConditionError::ClassMismatch {
                field,
                expected: field.class(),
                found: test.class(),
            });
        }
        test.validate()?;
        Ok(Self { id, field, test })
    }

    /// Build from the loose `(field, operator, value)` triple a rule builder emits
    pub fn parse(
        id: EntityId,
        field: Field,
        operator: Operator,
        value: Option<&Value>,
        delimiter: char,
    ) -> Result<Self, ConditionError> {
        if !operator.allowed_for(field.class()) {
            return Err(ConditionError::IllegalOperator { field, operator });
        }

        let test = match field.class() {
            FieldClass::Text => Test::Text(parse_text_test(field, operator, value, delimiter)?),
            FieldClass::Number => Test::Number(parse_number_test(field, operator, value, delimiter)?),
            FieldClass::Date => Test::Date(parse_date_test(field, operator, value)?),
        };
        Self::with_id(id, field, test)
    }

    pub fn id(&self) -> &EntityId { &self.id }
    pub fn field(&self) -> Field { self.field }
    pub fn test(&self) -> &Test { &self.test }
    pub fn operator(&self) -> Operator { self.test.operator() }
    pub fn value(&self) -> Option<Value> { self.test.operand() }
}

// =============================================================================
// Document form
// =============================================================================

/// Untyped condition as stored or submitted by a rule builder
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConditionDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub field: String,
    pub operator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl ConditionDocument {
    pub fn new(field: impl Into<String>, operator: impl Into<String>, value: Option<Value>) -> Self {
        Self {
            id: None,
            field: field.into(),
            operator: operator.into(),
            value,
        }
    }

    /// Validate into a typed condition
    pub fn into_condition(self, delimiter: char) -> Result<Condition, ConditionError> {
        let field = self
            .field
            .parse::<Field>()
            .map_err(ConditionError::UnknownField)?;
        let operator = self
            .operator
            .parse::<Operator>()
            .map_err(ConditionError::UnknownOperator)?;
        let id = self.id.unwrap_or_default();
        Condition::parse(id, field, operator, self.value.as_ref(), delimiter)
    }
}

impl TryFrom<ConditionDocument> for Condition {
    type Error = ConditionError;

    fn try_from(doc: ConditionDocument) -> Result<Self, Self::Error> {
        doc.into_condition(DEFAULT_LIST_DELIMITER)
    }
}

impl From<Condition> for ConditionDocument {
    fn from(condition: Condition) -> Self {
        Self {
            value: condition.value(),
            operator: condition.operator().as_str().to_string(),
            field: condition.field.as_str().to_string(),
            id: Some(condition.id),
        }
    }
}

// =============================================================================
// Operand parsing
// =============================================================================

fn required(operator: Operator, value: Option<&Value>) -> Result<&Value, ConditionError> {
    match value {
        Some(Value::Null) | None => Err(ConditionError::invalid(operator, "missing value")),
        Some(v) => Ok(v),
    }
}

fn text_operand(operator: Operator, value: &Value) -> Result<String, ConditionError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => n
            .as_f64()
            .map(format_number)
            .ok_or_else(|| ConditionError::invalid(operator, "unrepresentable number")),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(ConditionError::invalid(operator, "expected text")),
    }
}

fn number_operand(operator: Operator, value: &Value) -> Result<f64, ConditionError> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|n| n.is_finite())
        .ok_or_else(|| ConditionError::invalid(operator, "expected a number"))
}

fn date_operand(operator: Operator, value: &Value) -> Result<DateTime<Utc>, ConditionError> {
    let date = match value {
        Value::String(s) => parse_date_text(s),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    };
    date.ok_or_else(|| ConditionError::invalid(operator, "expected a date"))
}

fn list_operand<T>(
    operator: Operator,
    value: &Value,
    delimiter: char,
    parse: impl Fn(Operator, &Value) -> Result<T, ConditionError>,
) -> Result<Vec<T>, ConditionError> {
    let items = match value {
        Value::Array(items) => items
            .iter()
            .map(|item| parse(operator, item))
            .collect::<Result<Vec<_>, _>>()?,
        Value::String(s) => s
            .split(delimiter)
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| parse(operator, &Value::String(item.to_string())))
            .collect::<Result<Vec<_>, _>>()?,
        other => vec![parse(operator, other)?],
    };
    if items.is_empty() {
        return Err(ConditionError::EmptyList(operator));
    }
    Ok(items)
}

fn bounds_operand<T>(
    operator: Operator,
    value: &Value,
    parse: impl Fn(Operator, &Value) -> Result<T, ConditionError>,
) -> Result<(T, T), ConditionError> {
    match value {
        Value::Array(items) if items.len() == 2 => {
            Ok((parse(operator, &items[0])?, parse(operator, &items[1])?))
        }
        _ => Err(ConditionError::invalid(operator, "expected [low, high]")),
    }
}

fn parse_text_test(
    field: Field,
    operator: Operator,
    value: Option<&Value>,
    delimiter: char,
) -> Result<TextTest, ConditionError> {
    let test = match operator {
        Operator::IsSet => TextTest::IsSet,
        Operator::IsNotSet => TextTest::IsNotSet,
        Operator::InList => {
            TextTest::InList(list_operand(operator, required(operator, value)?, delimiter, text_operand)?)
        }
        Operator::NotInList => {
            TextTest::NotInList(list_operand(operator, required(operator, value)?, delimiter, text_operand)?)
        }
        _ => {
            let s = text_operand(operator, required(operator, value)?)?;
            match operator {
                Operator::Equals => TextTest::Equals(s),
                Operator::NotEquals => TextTest::NotEquals(s),
                Operator::Contains => TextTest::Contains(s),
                Operator::NotContains => TextTest::NotContains(s),
                Operator::StartsWith => TextTest::StartsWith(s),
                Operator::EndsWith => TextTest::EndsWith(s),
                _ => {
                    return Err(ConditionError::IllegalOperator {
                        field,
                        operator,
                    })
                }
            }
        }
    };
    Ok(test)
}

fn parse_number_test(
    field: Field,
    operator: Operator,
    value: Option<&Value>,
    delimiter: char,
) -> Result<NumberTest, ConditionError> {
    let test = match operator {
        Operator::IsSet => NumberTest::IsSet,
        Operator::IsNotSet => NumberTest::IsNotSet,
        Operator::Equals => NumberTest::Equals(number_operand(operator, required(operator, value)?)?),
        Operator::NotEquals => NumberTest::NotEquals(number_operand(operator, required(operator, value)?)?),
        Operator::GreaterThan => NumberTest::GreaterThan(number_operand(operator, required(operator, value)?)?),
        Operator::LessThan => NumberTest::LessThan(number_operand(operator, required(operator, value)?)?),
        Operator::Between => {
            let (low, high) = bounds_operand(operator, required(operator, value)?, number_operand)?;
            NumberTest::Between(low, high)
        }
        Operator::InList => {
            NumberTest::InList(list_operand(operator, required(operator, value)?, delimiter, number_operand)?)
        }
        Operator::NotInList => {
            NumberTest::NotInList(list_operand(operator, required(operator, value)?, delimiter, number_operand)?)
        }
        _ => {
            return Err(ConditionError::IllegalOperator {
                field,
                operator,
            })
        }
    };
    Ok(test)
}

fn parse_date_test(
    field: Field,
    operator: Operator,
    value: Option<&Value>,
) -> Result<DateTest, ConditionError> {
    let test = match operator {
        Operator::IsSet => DateTest::IsSet,
        Operator::IsNotSet => DateTest::IsNotSet,
        Operator::Equals => DateTest::Equals(date_operand(operator, required(operator, value)?)?),
        Operator::NotEquals => DateTest::NotEquals(date_operand(operator, required(operator, value)?)?),
        Operator::GreaterThan => DateTest::GreaterThan(date_operand(operator, required(operator, value)?)?),
        Operator::LessThan => DateTest::LessThan(date_operand(operator, required(operator, value)?)?),
        Operator::Between => {
            let (low, high) = bounds_operand(operator, required(operator, value)?, date_operand)?;
            DateTest::Between(low, high)
        }
        _ => {
            return Err(ConditionError::IllegalOperator {
                field,
                operator,
            })
        }
    };
    Ok(test)
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConditionError {
    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    #[error("operator {operator} cannot target field {field}")]
    IllegalOperator { field: Field, operator: Operator },

    #[error("field {field} is {expected:?}, test is {found:?}")]
    ClassMismatch {
        field: Field,
        expected: FieldClass,
        found: FieldClass,
    },

    #[error("invalid value for {operator}: {reason}")]
    InvalidOperand { operator: Operator, reason: String },

    #[error("BETWEEN lower bound exceeds upper bound")]
    InvertedRange,

    #[error("{0} requires at least one value")]
    EmptyList(Operator),
}

impl ConditionError {
    fn invalid(operator: Operator, reason: &str) -> Self {
        Self::InvalidOperand {
            operator,
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(field: Field, operator: Operator, value: Value) -> Result<Condition, ConditionError> {
        Condition::parse(EntityId::new(), field, operator, Some(&value), DEFAULT_LIST_DELIMITER)
    }

    #[test]
    fn test_illegal_pairs_rejected() {
        assert!(matches!(
            parse(Field::Revenue, Operator::Contains, json!("1")),
            Err(ConditionError::IllegalOperator { .. })
        ));
        assert!(matches!(
            parse(Field::Email, Operator::GreaterThan, json!(1)),
            Err(ConditionError::IllegalOperator { .. })
        ));
        assert!(matches!(
            parse(Field::Birthday, Operator::InList, json!(["2024-01-01"])),
            Err(ConditionError::IllegalOperator { .. })
        ));
    }

    #[test]
    fn test_class_mismatch_rejected() {
        let result = Condition::new(Field::Email, Test::Number(NumberTest::IsSet));
        assert!(matches!(result, Err(ConditionError::ClassMismatch { .. })));
    }

    #[test]
    fn test_between_requires_ordered_pair() {
        let ok = parse(Field::Revenue, Operator::Between, json!([100, 200])).unwrap();
        assert_eq!(ok.test(), &Test::Number(NumberTest::Between(100.0, 200.0)));

        assert_eq!(
            parse(Field::Revenue, Operator::Between, json!([200, 100])),
            Err(ConditionError::InvertedRange)
        );
        assert!(parse(Field::Revenue, Operator::Between, json!(100)).is_err());
    }

    #[test]
    fn test_delimited_list_operand() {
        let condition = parse(Field::Country, Operator::InList, json!(" US, CA ,,MX ")).unwrap();
        assert_eq!(
            condition.test(),
            &Test::Text(TextTest::InList(vec!["US".into(), "CA".into(), "MX".into()]))
        );

        let custom = Condition::parse(
            EntityId::new(),
            Field::OrderCount,
            Operator::NotInList,
            Some(&json!("1|2")),
            '|',
        )
        .unwrap();
        assert_eq!(custom.test(), &Test::Number(NumberTest::NotInList(vec![1.0, 2.0])));

        assert_eq!(
            parse(Field::Country, Operator::InList, json!(" , ")),
            Err(ConditionError::EmptyList(Operator::InList))
        );
    }

    #[test]
    fn test_epoch_millis_date_operand() {
        let expected = DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000).unwrap();
        for value in [json!(1_700_000_000_000_i64), json!(1700000000000.0), json!(1.7e12)] {
            let condition = parse(Field::LastVisitAt, Operator::GreaterThan, value).unwrap();
            assert_eq!(condition.test(), &Test::Date(DateTest::GreaterThan(expected)));
        }
        assert!(parse(Field::LastVisitAt, Operator::GreaterThan, json!(true)).is_err());
    }

    #[test]
    fn test_presence_ignores_value() {
        let condition =
            Condition::parse(EntityId::new(), Field::Phone, Operator::IsSet, None, DEFAULT_LIST_DELIMITER)
                .unwrap();
        assert_eq!(condition.value(), None);
    }

    #[test]
    fn test_missing_operand_rejected() {
        let result =
            Condition::parse(EntityId::new(), Field::Email, Operator::Equals, None, DEFAULT_LIST_DELIMITER);
        assert!(matches!(result, Err(ConditionError::InvalidOperand { .. })));
    }

    #[test]
    fn test_document_round_trip() {
        let json = json!({"id": "c-1", "field": "revenue", "operator": "GREATER_THAN", "value": 100});
        let condition: Condition = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(condition.operator(), Operator::GreaterThan);
        assert_eq!(serde_json::to_value(&condition).unwrap(), json!({
            "id": "c-1", "field": "revenue", "operator": "GREATER_THAN", "value": 100.0
        }));
    }

    #[test]
    fn test_invalid_document_fails_to_decode() {
        let json = json!({"field": "revenue", "operator": "STARTS_WITH", "value": "1"});
        assert!(serde_json::from_value::<Condition>(json).is_err());

        let json = json!({"field": "shoe_size", "operator": "EQUALS", "value": "9"});
        assert!(serde_json::from_value::<Condition>(json).is_err());
    }
}
