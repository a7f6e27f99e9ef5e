//! Workflow graph execution engine for Uniflow.
//!
//! Runs one execution instance per incoming event over a declarative graph
//! of triggers, conditions, and actions. Business actions are pluggable
//! handlers registered through a capability interface; this crate owns only
//! the graph model operations, the traversal runtime, and the shared
//! registry of workflows and executions.

pub mod catalog;
pub mod engine;
pub mod event;
