//! Ports module (Hexagonal Architecture)
//!
//! Use-case interfaces the application offers and the collaborator
//! interfaces it needs.

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
