//! Data Transfer Objects for the runs API
//!
//! Wire representations of the responses returned by the remote
//! job-execution API. Request bodies are the domain
//! [`JobPayload`](crate::domain::payload::JobPayload) serialized as-is.

pub mod run;
