//! Domain model for diagram and feedback records.
//!
//! # Responsibility
//! - Define canonical record shapes and client input shapes.
//! - Own structural validation of new documents.
//!
//! # Invariants
//! - Every record is addressed by the composite key `(id, user_id)`.
//! - Deletion is a tombstone (`deleted_at`) until permanent delete or expiry.

pub mod diagram;
pub mod feedback;
