//! Aggregate statistics for tags and segments

use audience_common::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TagStats {
    pub tag_id: EntityId,
    /// `record_count + segment_count`
    pub usage_count: u64,
    /// Customer records carrying the tag
    pub record_count: u64,
    /// Segments labelled with the tag
    pub segment_count: u64,
    pub computed_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SegmentStats {
    pub segment_id: EntityId,
    pub member_count: usize,
    /// Member count at the previous computation, if any
    pub previous_member_count: Option<usize>,
    /// `(current - previous) / previous`; `None` without a non-zero baseline
    pub growth_rate: Option<f64>,
    /// Share of members in `[0, 1]` that converted, when the provider knows
    pub conversion_rate: Option<f64>,
    pub computed_at: DateTime<Utc>,
}

impl SegmentStats {
    pub fn growth_between(previous: Option<usize>, current: usize) -> Option<f64> {
        match previous {
            Some(prev) if prev > 0 => Some((current as f64 - prev as f64) / prev as f64),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_growth_rate() {
        assert_eq!(SegmentStats::growth_between(Some(100), 150), Some(0.5));
        assert_eq!(SegmentStats::growth_between(Some(100), 50), Some(-0.5));
        assert_eq!(SegmentStats::growth_between(Some(0), 50), None);
        assert_eq!(SegmentStats::growth_between(None, 50), None);
    }
}
