//! Core domain types
//!
//! The job entity, the payload it submits, and the identifiers and states
//! reported by the remote runs API.

pub mod job;
pub mod payload;
pub mod status;
