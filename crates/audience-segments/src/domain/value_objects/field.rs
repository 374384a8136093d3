//! Record fields and condition operators
//!
//! Both vocabularies are closed. Every field belongs to exactly one
//! [`FieldClass`], and the class decides which operators may target it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Value class of a field
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldClass {
    Text,
    Number,
    Date,
}

/// Customer record field a condition can target
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    // Text
    FirstName,
    LastName,
    Email,
    Phone,
    Company,
    City,
    Region,
    Country,
    PostalCode,
    Source,
    LifecycleStage,
    // Number
    Revenue,
    OrderCount,
    AverageOrderValue,
    VisitCount,
    LeadScore,
    // Date
    CreatedAt,
    LastVisitAt,
    LastOrderAt,
    Birthday,
}

impl Field {
    pub const ALL: [Field; 20] = [
        Field::FirstName,
        Field::LastName,
        Field::Email,
        Field::Phone,
        Field::Company,
        Field::City,
        Field::Region,
        Field::Country,
        Field::PostalCode,
        Field::Source,
        Field::LifecycleStage,
        Field::Revenue,
        Field::OrderCount,
        Field::AverageOrderValue,
        Field::VisitCount,
        Field::LeadScore,
        Field::CreatedAt,
        Field::LastVisitAt,
        Field::LastOrderAt,
        Field::Birthday,
    ];

    pub fn class(&self) -> FieldClass {
        match self {
            Field::FirstName
            | Field::LastName
            | Field::Email
            | Field::Phone
            | Field::Company
            | Field::City
            | Field::Region
            | Field::Country
            | Field::PostalCode
            | Field::Source
            | Field::LifecycleStage => FieldClass::Text,
            Field::Revenue
            | Field::OrderCount
            | Field::AverageOrderValue
            | Field::VisitCount
            | Field::LeadScore => FieldClass::Number,
            Field::CreatedAt | Field::LastVisitAt | Field::LastOrderAt | Field::Birthday => {
                FieldClass::Date
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::FirstName => "first_name",
            Field::LastName => "last_name",
            Field::Email => "email",
            Field::Phone => "phone",
            Field::Company => "company",
            Field::City => "city",
            Field::Region => "region",
            Field::Country => "country",
            Field::PostalCode => "postal_code",
            Field::Source => "source",
            Field::LifecycleStage => "lifecycle_stage",
            Field::Revenue => "revenue",
            Field::OrderCount => "order_count",
            Field::AverageOrderValue => "average_order_value",
            Field::VisitCount => "visit_count",
            Field::LeadScore => "lead_score",
            Field::CreatedAt => "created_at",
            Field::LastVisitAt => "last_visit_at",
            Field::LastOrderAt => "last_order_at",
            Field::Birthday => "birthday",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .iter()
            .copied()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Comparison operator, as it appears in stored condition documents
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
    Between,
    InList,
    NotInList,
    IsSet,
    IsNotSet,
}

impl Operator {
    pub const ALL: [Operator; 13] = [
        Operator::Equals,
        Operator::NotEquals,
        Operator::Contains,
        Operator::NotContains,
        Operator::StartsWith,
        Operator::EndsWith,
        Operator::GreaterThan,
        Operator::LessThan,
        Operator::Between,
        Operator::InList,
        Operator::NotInList,
        Operator::IsSet,
        Operator::IsNotSet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equals => "EQUALS",
            Operator::NotEquals => "NOT_EQUALS",
            Operator::Contains => "CONTAINS",
            Operator::NotContains => "NOT_CONTAINS",
            Operator::StartsWith => "STARTS_WITH",
            Operator::EndsWith => "ENDS_WITH",
            Operator::GreaterThan => "GREATER_THAN",
            Operator::LessThan => "LESS_THAN",
            Operator::Between => "BETWEEN",
            Operator::InList => "IN_LIST",
            Operator::NotInList => "NOT_IN_LIST",
            Operator::IsSet => "IS_SET",
            Operator::IsNotSet => "IS_NOT_SET",
        }
    }

    /// Presence operators ignore the operand and the value's content
    pub fn is_presence(&self) -> bool {
        matches!(self, Operator::IsSet | Operator::IsNotSet)
    }

    pub fn allowed_for(&self, class: FieldClass) -> bool {
        match self {
            Operator::Equals | Operator::NotEquals | Operator::IsSet | Operator::IsNotSet => true,
            Operator::Contains | Operator::NotContains | Operator::StartsWith | Operator::EndsWith => {
                class == FieldClass::Text
            }
            Operator::GreaterThan | Operator::LessThan | Operator::Between => {
                matches!(class, FieldClass::Number | FieldClass::Date)
            }
            Operator::InList | Operator::NotInList => {
                matches!(class, FieldClass::Text | FieldClass::Number)
            }
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::ALL
            .iter()
            .copied()
            .find(|op| op.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_round_trips_through_str() {
        for field in Field::ALL {
            assert_eq!(field.as_str().parse::<Field>().unwrap(), field);
            assert_eq!(serde_json::to_value(field).unwrap(), field.as_str());
        }
        assert!("favourite_color".parse::<Field>().is_err());
    }

    #[test]
    fn test_operator_names_match_serde() {
        for op in Operator::ALL {
            assert_eq!(serde_json::to_value(op).unwrap(), op.as_str());
        }
        assert_eq!("in_list".parse::<Operator>().unwrap(), Operator::InList);
    }

    #[test]
    fn test_operator_class_matrix() {
        assert!(Operator::Contains.allowed_for(FieldClass::Text));
        assert!(!Operator::Contains.allowed_for(FieldClass::Number));
        assert!(!Operator::GreaterThan.allowed_for(FieldClass::Text));
        assert!(Operator::Between.allowed_for(FieldClass::Date));
        assert!(!Operator::InList.allowed_for(FieldClass::Date));
        for class in [FieldClass::Text, FieldClass::Number, FieldClass::Date] {
            assert!(Operator::IsSet.allowed_for(class));
            assert!(Operator::IsNotSet.allowed_for(class));
        }
    }
}
