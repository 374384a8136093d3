//! Value Objects module
//!
//! Immutable, validated domain primitives.

pub mod color;
pub mod condition;
pub mod field;
pub mod group;
pub mod record;
pub mod stats;

pub use audience_common::EntityId;
pub use color::{ColorError, TagColor};
pub use condition::{
    Condition, ConditionDocument, ConditionError, DateTest, NumberTest, Test, TextTest,
    DEFAULT_LIST_DELIMITER,
};
pub use field::{Field, FieldClass, Operator};
pub use group::{ConditionGroup, GroupOperator, LooseConditionGroup};
pub use record::{CustomerRecord, FieldValue, RecordSnapshot};
pub use stats::{SegmentStats, TagStats};
