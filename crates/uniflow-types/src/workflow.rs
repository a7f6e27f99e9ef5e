//! Workflow domain types for Uniflow.
//!
//! Defines the canonical representation of a workflow: a linked graph of
//! steps (trigger, action, condition, delay) plus the execution tracking
//! record (`Execution`) produced each time the graph runs. Authoring
//! surfaces (UI, CLI, file loaders) convert to and from these types; the
//! serde derives guarantee a lossless round-trip through JSON or YAML.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// A single step in a workflow's step graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// User-defined step ID (e.g. "welcome-email"). Unique within a workflow.
    pub id: String,
    /// Kind-specific payload.
    pub payload: StepPayload,
    /// The step to advance to after this one completes. Condition steps
    /// follow their branch targets instead and ignore this field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_id: Option<String>,
}

impl Step {
    /// The step's kind, derived from its payload.
    pub fn kind(&self) -> StepKind {
        match self.payload {
            StepPayload::Trigger(_) => StepKind::Trigger,
            StepPayload::Action(_) => StepKind::Action,
            StepPayload::Condition(_) => StepKind::Condition,
            StepPayload::Delay(_) => StepKind::Delay,
        }
    }
}

/// The kind of step in a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Trigger,
    Action,
    Condition,
    Delay,
}

impl StepKind {
    /// Stable lowercase name, used in events and log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Trigger => "trigger",
            StepKind::Action => "action",
            StepKind::Condition => "condition",
            StepKind::Delay => "delay",
        }
    }
}

/// Kind-specific step payload.
///
/// Internally tagged by `type` so serialized steps read naturally:
/// ```yaml
/// payload:
///   type: action
///   kind: send_email
///   name: Welcome Email
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepPayload {
    /// What matched to start the run. Inert during traversal.
    Trigger(TriggerSpec),
    /// Invoke a registered action handler.
    Action(ActionSpec),
    /// Branch on a predicate over the execution context.
    Condition(ConditionSpec),
    /// Suspend the run for a fixed duration.
    Delay(DelaySpec),
}

// ---------------------------------------------------------------------------
// Step payloads
// ---------------------------------------------------------------------------

/// Describes the event that starts a run of this workflow.
///
/// Trigger matching happens in the front end that calls `execute`; by the
/// time traversal reaches a trigger step the event has already matched, so
/// the step is a no-op that records what the workflow listens for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerSpec {
    /// Trigger kind (open set: "webhook", "schedule", "contact_created", ...).
    pub kind: String,
    /// Human-readable trigger name.
    pub name: String,
    /// Kind-specific configuration.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub config: HashMap<String, Value>,
}

/// An action to dispatch through the handler registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSpec {
    /// Action kind used for handler lookup (open set: "send_email",
    /// "create_contact", "generate_content", ...).
    pub kind: String,
    /// Human-readable action name, used in log lines.
    pub name: String,
    /// Handler configuration, passed verbatim to the handler.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub config: HashMap<String, Value>,
    /// Wait this long before dispatching the handler. A suspension point:
    /// the wait never blocks other runs and is cancellable.
    #[serde(default)]
    pub delay_before_ms: u64,
}

/// A branch point: evaluate a predicate against the context and follow
/// `on_true` or `on_false`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionSpec {
    /// Which predicate to apply.
    pub predicate: PredicateKind,
    /// Context key the predicate reads.
    pub field: String,
    /// Comparison operand. For `custom` this is the expression string.
    #[serde(default)]
    pub operand: Value,
    /// Step to follow when the predicate holds. `None` ends the run there.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_true: Option<String>,
    /// Step to follow when the predicate does not hold. `None` ends the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_false: Option<String>,
}

/// Predicate applied by a condition step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateKind {
    Equals,
    Contains,
    GreaterThan,
    LessThan,
    IsEmpty,
    MatchesPattern,
    Custom,
}

/// Suspend the run for a fixed duration, then advance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DelaySpec {
    pub duration_ms: u64,
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// A workflow definition plus its accumulated run statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    /// UUIDv7 assigned at creation.
    pub id: Uuid,
    /// Human-readable workflow name.
    pub name: String,
    /// Optional longer description.
    #[serde(default)]
    pub description: String,
    /// Authoring-surface skin this workflow was created under
    /// (e.g. "zapier", "hubspot", "unified").
    pub skin: String,
    /// Disabled workflows reject new executions; in-flight runs finish.
    pub enabled: bool,
    /// The step graph, in insertion order. Traversal starts at index 0.
    #[serde(default)]
    pub steps: Vec<Step>,
    /// Number of *completed* executions. Failed runs do not count.
    #[serde(default)]
    pub run_count: u64,
    /// Completion time of the most recent completed execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Create an enabled workflow with a fresh id and no steps.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        skin: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            description: description.into(),
            skin: skin.into(),
            enabled: true,
            steps: Vec::new(),
            run_count: 0,
            last_run_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Terminal-state machine of a run: `Running -> {Completed, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
}

/// One run of a workflow in response to one triggering event.
///
/// Mutated only by the run's single logical task; the registry archives a
/// snapshot at start and the final record at the terminal transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    /// UUIDv7 execution ID.
    pub id: Uuid,
    /// ID of the workflow definition being executed.
    pub workflow_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Set at the terminal transition (completed or failed).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub status: ExecutionStatus,
    /// Human-readable error message when `status` is `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Append-only trail of what ran, in the order it ran.
    #[serde(default)]
    pub log: Vec<String>,
    /// Mutable key/value state: trigger payload plus accumulated action
    /// results (namespaced under `action_<step id>`).
    #[serde(default)]
    pub context: HashMap<String, Value>,
}

impl Execution {
    /// Create a run record in `Running` state seeded with the trigger payload.
    pub fn new(id: Uuid, workflow_id: Uuid, trigger_data: HashMap<String, Value>) -> Self {
        Self {
            id,
            workflow_id,
            started_at: Utc::now(),
            completed_at: None,
            status: ExecutionStatus::Running,
            error: None,
            log: Vec::new(),
            context: trigger_data,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
