//! Event types for the Uniflow engine event bus.
//!
//! `EngineEvent` is the unified event type broadcast during workflow
//! execution. All variants are Clone + Send + Sync for use with tokio
//! broadcast channels. The `running -> completed` and `running -> failed`
//! transitions are the engine's observable contract; transport of these
//! events (WebSocket broadcast, etc.) belongs to external collaborators.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::StepKind;

/// Events emitted during workflow execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// An execution entered the `Running` state.
    ExecutionStarted {
        execution_id: Uuid,
        workflow_id: Uuid,
        workflow_name: String,
    },

    /// Traversal reached a step.
    StepStarted {
        execution_id: Uuid,
        step_id: String,
        kind: StepKind,
    },

    /// A step finished without error.
    StepCompleted {
        execution_id: Uuid,
        step_id: String,
        duration_ms: u64,
    },

    /// An action step's dispatch failed.
    StepFailed {
        execution_id: Uuid,
        step_id: String,
        error: String,
    },

    /// The execution reached `Completed`.
    ExecutionCompleted {
        execution_id: Uuid,
        workflow_id: Uuid,
        duration_ms: u64,
    },

    /// The execution reached `Failed` (including cancellation).
    ExecutionFailed {
        execution_id: Uuid,
        workflow_id: Uuid,
        error: String,
    },
}
