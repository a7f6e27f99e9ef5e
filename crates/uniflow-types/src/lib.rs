//! Shared domain types for Uniflow.
//!
//! This crate contains the core domain types used across the Uniflow engine:
//! workflows and their steps, execution records, engine events, and their
//! associated error types.
//!
//! Zero infrastructure dependencies -- only serde, serde_json, uuid, chrono,
//! thiserror.

pub mod error;
pub mod event;
pub mod workflow;
