//! Audience Segments
//!
//! Customer tagging and audience segmentation, laid out along Domain-Driven
//! Design lines.
//!
//! ## Architecture
//!
//! - **Domain Layer**: Tag and Segment aggregates, condition value objects,
//!   the evaluator and hierarchy services, domain events
//! - **Application Layer**: Use case orchestration, DTOs, the wiring context
//! - **Ports Layer**: Hexagonal architecture interfaces
//! - **Infrastructure Layer**: In-memory repositories, record source, stats,
//!   key-value stores
//!
//! ## Key Aggregates
//!
//! - **Tag**: Node in a label forest with type-derived permissions
//! - **Segment**: Named audience defined by rules, static members and exclusions
//!
//! ## Features
//!
//! - Tag hierarchy with cycle-safe paths and restrict/cascade/reparent deletes
//! - Typed condition groups with AND/OR nesting over text, number and date fields
//! - Membership resolution cached per segment revision and record snapshot
//! - Tag usage and segment growth/conversion stats
//! - JSON snapshot persistence behind a key-value shim

pub mod application;
pub mod cache;
pub mod domain;
pub mod infrastructure;
pub mod ports;

// Re-exports for convenience
pub use application::{AudienceContext, AudiencePorts, SegmentService, TagService};
pub use cache::MembershipCache;
pub use domain::aggregates::{Segment, SegmentType, Tag, TagPermissions, TagType};
pub use domain::events::{DomainEvent, SegmentEvent, TagEvent};
pub use domain::services::{ConditionEvaluator, DeleteMode, Membership, MembershipResolver, TagHierarchy};
pub use domain::value_objects::{Condition, ConditionGroup, CustomerRecord, EntityId, Field, Operator};
pub use ports::inbound::{SegmentUseCases, TagUseCases, UseCaseError};
pub use ports::outbound::{KeyValueStore, RecordSource, RepositoryError, SegmentRepository, TagRepository};
