//! Domain module
//!
//! Value objects, aggregates, events and the pure services that evaluate
//! rules, walk the tag forest and resolve segment membership.

pub mod aggregates;
pub mod events;
pub mod services;
pub mod value_objects;

pub use aggregates::*;
pub use events::*;
pub use value_objects::*;
