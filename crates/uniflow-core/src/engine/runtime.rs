//! The per-run traversal state machine.
//!
//! `ExecutionRuntime::run` drives one execution of a workflow snapshot:
//! `Running -> {Completed, Failed}`. Steps run strictly sequentially within
//! a run; suspension (action pre-delays and delay steps) is cooperative and
//! raced against the run's cancellation token, so a cancelled run never
//! leaves a timer blocking and never dispatches another step.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use uniflow_types::error::ActionError;
use uniflow_types::event::EngineEvent;
use uniflow_types::workflow::{Execution, ExecutionStatus, Step, StepPayload, Workflow};
use uuid::Uuid;

use crate::event::bus::EventBus;

use super::condition::ConditionEvaluator;
use super::context::{self, ContextOverflow};
use super::dispatch::ActionRegistry;
use super::graph;

/// Cap on steps traversed in one run. Linked `next_id`/branch edges can form
/// a cycle; hitting the cap fails the run instead of spinning forever.
pub const MAX_TRAVERSED_STEPS: usize = 10_000;

/// Error string recorded on an execution terminated by cancellation.
pub const CANCELLED_ERROR: &str = "execution cancelled";

// ---------------------------------------------------------------------------
// WorkflowSnapshot
// ---------------------------------------------------------------------------

/// Immutable snapshot of a workflow taken at execution start.
///
/// Structural edits to the registry's copy never touch a snapshot, so an
/// in-flight run observes a stable step graph even across concurrent
/// `add_step`/`remove_step` calls or deletion of the workflow itself.
#[derive(Debug, Clone)]
pub struct WorkflowSnapshot {
    pub workflow_id: Uuid,
    pub workflow_name: String,
    pub steps: Arc<[Step]>,
}

impl WorkflowSnapshot {
    pub fn of(workflow: &Workflow) -> Self {
        Self {
            workflow_id: workflow.id,
            workflow_name: workflow.name.clone(),
            steps: workflow.steps.clone().into(),
        }
    }
}

// ---------------------------------------------------------------------------
// RunError
// ---------------------------------------------------------------------------

/// Why a run failed. The display string becomes the execution's `error`
/// field and its final `"ERROR: ..."` log entry.
#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error("execution cancelled")]
    Cancelled,

    #[error("action '{name}' failed: {source}")]
    Action { name: String, source: ActionError },

    #[error(transparent)]
    ContextOverflow(#[from] ContextOverflow),

    #[error("traversal exceeded {MAX_TRAVERSED_STEPS} steps; the step graph likely contains a cycle")]
    StepBudgetExceeded,
}

// ---------------------------------------------------------------------------
// ExecutionRuntime
// ---------------------------------------------------------------------------

/// Drives the traversal of workflow snapshots, one execution at a time per
/// call. The runtime itself is stateless across runs and shared by every
/// concurrently executing task.
pub struct ExecutionRuntime {
    conditions: ConditionEvaluator,
    actions: Arc<ActionRegistry>,
    events: EventBus,
}

impl ExecutionRuntime {
    pub fn new(actions: Arc<ActionRegistry>, events: EventBus) -> Self {
        Self {
            conditions: ConditionEvaluator::new(),
            actions,
            events,
        }
    }

    /// Run one execution to its terminal state and return the finished
    /// record. A failed run is a normal return, not an error: the failure
    /// lives in the execution's `status`/`error`/`log`.
    pub async fn run(
        &self,
        snapshot: &WorkflowSnapshot,
        mut execution: Execution,
        cancel: &CancellationToken,
    ) -> Execution {
        self.events.publish(EngineEvent::ExecutionStarted {
            execution_id: execution.id,
            workflow_id: snapshot.workflow_id,
            workflow_name: snapshot.workflow_name.clone(),
        });
        tracing::info!(
            execution_id = %execution.id,
            workflow = snapshot.workflow_name.as_str(),
            "starting execution"
        );

        let run_start = std::time::Instant::now();
        let result = self.walk(snapshot, &mut execution, cancel).await;
        execution.completed_at = Some(Utc::now());

        match result {
            Ok(()) => {
                execution.status = ExecutionStatus::Completed;
                self.events.publish(EngineEvent::ExecutionCompleted {
                    execution_id: execution.id,
                    workflow_id: snapshot.workflow_id,
                    duration_ms: run_start.elapsed().as_millis() as u64,
                });
                tracing::info!(
                    execution_id = %execution.id,
                    workflow = snapshot.workflow_name.as_str(),
                    "execution completed"
                );
            }
            Err(err) => {
                let message = err.to_string();
                execution.status = ExecutionStatus::Failed;
                execution.log.push(format!("ERROR: {message}"));
                execution.error = Some(message.clone());
                self.events.publish(EngineEvent::ExecutionFailed {
                    execution_id: execution.id,
                    workflow_id: snapshot.workflow_id,
                    error: message.clone(),
                });
                tracing::warn!(
                    execution_id = %execution.id,
                    workflow = snapshot.workflow_name.as_str(),
                    error = message.as_str(),
                    "execution failed"
                );
            }
        }

        execution
    }

    /// Traverse the step graph, mutating the execution as steps run.
    async fn walk(
        &self,
        snapshot: &WorkflowSnapshot,
        execution: &mut Execution,
        cancel: &CancellationToken,
    ) -> Result<(), RunError> {
        let mut current = snapshot.steps.first();
        let mut traversed = 0usize;

        while let Some(step) = current {
            // Cancellation stops the run before the next step dispatch.
            if cancel.is_cancelled() {
                return Err(RunError::Cancelled);
            }
            traversed += 1;
            if traversed > MAX_TRAVERSED_STEPS {
                return Err(RunError::StepBudgetExceeded);
            }

            execution.log.push(format!("executing step: {}", step.id));
            self.events.publish(EngineEvent::StepStarted {
                execution_id: execution.id,
                step_id: step.id.clone(),
                kind: step.kind(),
            });
            let step_start = std::time::Instant::now();

            let next = match &step.payload {
                // The triggering event already matched; nothing to do.
                StepPayload::Trigger(_) => next_of(snapshot, step),

                StepPayload::Action(action) => {
                    if action.delay_before_ms > 0 {
                        self.suspend(Duration::from_millis(action.delay_before_ms), cancel)
                            .await?;
                    }

                    match self.actions.dispatch(action, &execution.context).await {
                        Ok(result) => {
                            let summary = context::result_summary(&result);
                            context::merge_action_result(
                                &mut execution.context,
                                &step.id,
                                result,
                            )?;
                            execution
                                .log
                                .push(format!("action {} completed: {summary}", action.name));
                            next_of(snapshot, step)
                        }
                        Err(source) => {
                            self.events.publish(EngineEvent::StepFailed {
                                execution_id: execution.id,
                                step_id: step.id.clone(),
                                error: source.to_string(),
                            });
                            return Err(RunError::Action {
                                name: action.name.clone(),
                                source,
                            });
                        }
                    }
                }

                // A condition follows its branch target instead of next_id;
                // an unresolved target ends the branch without error.
                StepPayload::Condition(cond) => {
                    let outcome = self.conditions.evaluate(cond, &execution.context);
                    tracing::debug!(
                        step_id = step.id.as_str(),
                        outcome,
                        "condition evaluated"
                    );
                    let branch = if outcome {
                        cond.on_true.as_deref()
                    } else {
                        cond.on_false.as_deref()
                    };
                    branch.and_then(|id| graph::lookup(&snapshot.steps, id))
                }

                StepPayload::Delay(delay) => {
                    self.suspend(Duration::from_millis(delay.duration_ms), cancel)
                        .await?;
                    next_of(snapshot, step)
                }
            };

            self.events.publish(EngineEvent::StepCompleted {
                execution_id: execution.id,
                step_id: step.id.clone(),
                duration_ms: step_start.elapsed().as_millis() as u64,
            });

            current = next;
        }

        Ok(())
    }

    /// Cooperative, cancellable sleep. Never blocks other runs; a cancelled
    /// token frees the timer immediately.
    async fn suspend(
        &self,
        duration: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), RunError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(RunError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

/// Resolve a step's `next_id` within the snapshot. Absence or resolution
/// failure ends traversal successfully.
fn next_of<'a>(snapshot: &'a WorkflowSnapshot, step: &Step) -> Option<&'a Step> {
    step.next_id
        .as_deref()
        .and_then(|id| graph::lookup(&snapshot.steps, id))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
