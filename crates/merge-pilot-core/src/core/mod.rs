// crates/merge-pilot-core/src/core/mod.rs
// ============================================================================
// Module: Merge Pilot Core Types
// Description: Canonical plan schema and execution record structures.
// Purpose: Provide stable, serializable types for plans and run records.
// Dependencies: serde, serde_jcs, serde_json, sha2
// ============================================================================

//! ## Overview
//! Core types define the plan document, the execution policy, the gate and
//! item result records, and the canonical serialization primitives. These
//! types are the single source of truth for every derived artifact.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod canonical;
pub mod hashing;
pub mod identifiers;
pub mod plan;
pub mod policy;
pub mod schema;
pub mod status;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use canonical::EncodingError;
pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use identifiers::ActorId;
pub use identifiers::GateName;
pub use identifiers::ItemName;
pub use plan::ContainerSpec;
pub use plan::Gate;
pub use plan::GateRuntime;
pub use plan::Plan;
pub use plan::PlanError;
pub use plan::PlanItem;
pub use plan::SCHEMA_VERSION_PREFIX;
pub use policy::AdminGreenSpec;
pub use policy::MergeRule;
pub use policy::OverridePolicy;
pub use policy::Policy;
pub use policy::RetrySpec;
pub use schema::SchemaIssue;
pub use schema::SchemaValidationError;
pub use schema::validate_plan;
pub use status::GateResult;
pub use status::GateStatus;
pub use status::NodeResult;
pub use status::NodeStatus;
pub use status::OverrideRecord;
pub use time::Timestamp;
