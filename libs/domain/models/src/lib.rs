//! Shared domain types used across the faceaccessd workspace: the durable
//! rows owned by the store, the ephemeral protocol session state, and the
//! nested configuration document described in the system's external
//! interfaces.

pub mod audit;
pub mod config;
pub mod employee;

pub use audit::{AuditRecord, EventKind, EventResult, NewAuditRecord};
pub use employee::{Embedding, Employee};
