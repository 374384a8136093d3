//! Command handlers
//!
//! Application services that orchestrate use cases.

mod segment;
mod tag;

pub use segment::SegmentService;
pub use tag::TagService;
