//! Aggregates module

pub mod segment;
pub mod tag;

pub use segment::{Segment, SegmentDraft, SegmentError, SegmentPatch, SegmentType};
pub use tag::{Tag, TagDraft, TagError, TagPatch, TagPermissions, TagType};
