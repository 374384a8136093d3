//! Domain services module

pub mod evaluator;
pub mod hierarchy;
pub mod membership;

pub use evaluator::{ConditionEvaluator, EvaluationOptions};
pub use hierarchy::{
    DeleteMode, DeletePlan, HierarchyError, IntegrityReport, PathEnd, SortDirection, TagHierarchy,
    TagPath, TagSort, TagSortKey,
};
pub use membership::{Membership, MembershipResolver, Preview};
