//! Application layer
//!
//! Orchestrates use cases and coordinates domain objects.

pub mod commands;
pub mod context;
pub mod dto;

pub use commands::{SegmentService, TagService};
pub use context::{AudienceContext, AudiencePorts};
pub use dto::*;
