use thiserror::Error;
use uuid::Uuid;

/// Caller-facing errors from registry and authoring operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("workflow not found: {0}")]
    WorkflowNotFound(Uuid),

    #[error("workflow '{name}' ({id}) is disabled")]
    WorkflowDisabled { id: Uuid, name: String },

    #[error("execution not found: {0}")]
    ExecutionNotFound(Uuid),

    #[error("duplicate step ID: '{0}'")]
    DuplicateStep(String),

    #[error("step not found: '{0}'")]
    StepNotFound(String),

    #[error("invalid workflow name: {0}")]
    InvalidName(String),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Errors surfaced by the action dispatcher.
///
/// A dispatch failure is execution-fatal for the run that hit it: the
/// execution transitions to `Failed` with the message recorded in its log.
/// It never crosses into other runs or the registry.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("no handler registered for action kind '{0}'")]
    NoHandler(String),

    #[error("handler failed: {0}")]
    HandlerFailed(String),
}

/// Errors from condition predicate evaluation.
///
/// Policy: the evaluator coerces these to `false` so traversal stays
/// deterministic instead of aborting the run.
#[derive(Debug, Error)]
pub enum ConditionError {
    #[error("type conversion failed: {0}")]
    TypeConversion(String),

    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("expression error: {0}")]
    Expression(String),
}
