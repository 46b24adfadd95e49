//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store calls into use-case level APIs.
//! - Keep transport adapters decoupled from storage details.

pub mod feedback;
pub mod lifecycle;
