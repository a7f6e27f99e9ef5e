//! The shared registry of workflows, executions, and action handlers.
//!
//! `WorkflowRegistry` is the entry point through which external callers
//! author workflows and submit events. Each `execute` call runs one
//! independent logical task; the registry's maps are the only state shared
//! across tasks, and every mutation happens under the map entry's lock with
//! no lock held across an await point.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uniflow_types::error::{ActionError, EngineError};
use uniflow_types::event::EngineEvent;
use uniflow_types::workflow::{Execution, ExecutionStatus, Step, Workflow};
use uuid::Uuid;

use crate::catalog::{PlatformCatalog, PlatformDescriptor};
use crate::event::bus::EventBus;

use super::dispatch::{ActionHandler, ActionRegistry};
use super::graph;
use super::runtime::{ExecutionRuntime, WorkflowSnapshot};

/// Broadcast channel capacity for engine events.
pub const EVENT_BUS_CAPACITY: usize = 1024;

/// Owns the set of named workflows, their run statistics, and the archive of
/// executions.
pub struct WorkflowRegistry {
    workflows: DashMap<Uuid, Workflow>,
    executions: DashMap<Uuid, Execution>,
    actions: Arc<ActionRegistry>,
    runtime: ExecutionRuntime,
    events: EventBus,
    /// Cancellation tokens for in-flight executions, keyed by execution id.
    cancellations: DashMap<Uuid, CancellationToken>,
    catalog: PlatformCatalog,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        let events = EventBus::new(EVENT_BUS_CAPACITY);
        let actions = Arc::new(ActionRegistry::new());
        Self {
            workflows: DashMap::new(),
            executions: DashMap::new(),
            runtime: ExecutionRuntime::new(Arc::clone(&actions), events.clone()),
            actions,
            events,
            cancellations: DashMap::new(),
            catalog: PlatformCatalog::built_in(),
        }
    }

    // -----------------------------------------------------------------------
    // Capability registration and observation
    // -----------------------------------------------------------------------

    /// Register a handler for an action kind, replacing any previous one.
    pub fn register_action(&self, kind: impl Into<String>, handler: Arc<dyn ActionHandler>) {
        self.actions.register(kind, handler);
    }

    /// Register an async closure as the handler for an action kind.
    pub fn register_action_fn<F, Fut>(&self, kind: impl Into<String>, handler: F)
    where
        F: Fn(HashMap<String, Value>, HashMap<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ActionError>> + Send + 'static,
    {
        self.actions.register_fn(kind, handler);
    }

    /// Subscribe to execution state transitions and step events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    // -----------------------------------------------------------------------
    // Workflow authoring
    // -----------------------------------------------------------------------

    /// Create an enabled workflow with a fresh id and no steps.
    pub fn create_workflow(
        &self,
        name: &str,
        description: &str,
        skin: &str,
    ) -> Result<Workflow, EngineError> {
        if name.trim().is_empty() {
            return Err(EngineError::InvalidName(
                "workflow name must not be empty".to_string(),
            ));
        }

        let workflow = Workflow::new(name, description, skin);
        tracing::info!(workflow_id = %workflow.id, name, "workflow created");
        self.workflows.insert(workflow.id, workflow.clone());
        Ok(workflow)
    }

    /// Add a step to a workflow; see [`graph::add_step`] for insertion rules.
    pub fn add_step(
        &self,
        workflow_id: Uuid,
        step: Step,
        after_id: Option<&str>,
    ) -> Result<(), EngineError> {
        let mut entry = self
            .workflows
            .get_mut(&workflow_id)
            .ok_or(EngineError::WorkflowNotFound(workflow_id))?;
        graph::add_step(&mut entry, step, after_id)
    }

    /// Remove a step from a workflow.
    pub fn remove_step(&self, workflow_id: Uuid, step_id: &str) -> Result<Step, EngineError> {
        let mut entry = self
            .workflows
            .get_mut(&workflow_id)
            .ok_or(EngineError::WorkflowNotFound(workflow_id))?;
        graph::remove_step(&mut entry, step_id)
    }

    /// Enable or disable a workflow. Disabling rejects new executions;
    /// in-flight executions are not interrupted.
    pub fn set_enabled(&self, workflow_id: Uuid, enabled: bool) -> Result<(), EngineError> {
        let mut entry = self
            .workflows
            .get_mut(&workflow_id)
            .ok_or(EngineError::WorkflowNotFound(workflow_id))?;
        entry.enabled = enabled;
        entry.updated_at = Utc::now();
        Ok(())
    }

    /// Validate a workflow's step graph (advisory; see
    /// [`graph::validate_workflow`]).
    pub fn validate(&self, workflow_id: Uuid) -> Result<(), EngineError> {
        let entry = self
            .workflows
            .get(&workflow_id)
            .ok_or(EngineError::WorkflowNotFound(workflow_id))?;
        graph::validate_workflow(&entry)
    }

    /// Delete a workflow. Returns `true` if it existed. In-flight executions
    /// keep running on their snapshots.
    pub fn delete_workflow(&self, workflow_id: Uuid) -> bool {
        self.workflows.remove(&workflow_id).is_some()
    }

    pub fn get_workflow(&self, workflow_id: Uuid) -> Option<Workflow> {
        self.workflows.get(&workflow_id).map(|entry| entry.clone())
    }

    pub fn list_workflows(&self) -> Vec<Workflow> {
        self.workflows.iter().map(|entry| entry.clone()).collect()
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    /// Execute a workflow for one triggering event and return the finished
    /// execution.
    ///
    /// The call resolves once the run reaches a terminal state. A failed run
    /// is a normal `Ok` return carrying `status == Failed`; `Err` is reserved
    /// for an unknown or disabled workflow.
    pub async fn execute(
        &self,
        workflow_id: Uuid,
        trigger_data: HashMap<String, Value>,
    ) -> Result<Execution, EngineError> {
        self.execute_with_token(workflow_id, trigger_data, CancellationToken::new())
            .await
    }

    /// Like [`execute`](Self::execute), with a caller-supplied cancellation
    /// token.
    pub async fn execute_with_token(
        &self,
        workflow_id: Uuid,
        trigger_data: HashMap<String, Value>,
        cancel: CancellationToken,
    ) -> Result<Execution, EngineError> {
        // Snapshot under the entry lock, released before any await. The
        // snapshot makes the step graph read-only for this run: concurrent
        // structural edits only touch the registry's copy.
        let snapshot = {
            let entry = self
                .workflows
                .get(&workflow_id)
                .ok_or(EngineError::WorkflowNotFound(workflow_id))?;
            if !entry.enabled {
                return Err(EngineError::WorkflowDisabled {
                    id: workflow_id,
                    name: entry.name.clone(),
                });
            }
            WorkflowSnapshot::of(&entry)
        };

        let execution = Execution::new(Uuid::now_v7(), workflow_id, trigger_data);
        let execution_id = execution.id;
        self.executions.insert(execution_id, execution.clone());
        self.cancellations.insert(execution_id, cancel.clone());

        let execution = self.runtime.run(&snapshot, execution, &cancel).await;

        self.cancellations.remove(&execution_id);

        if execution.status == ExecutionStatus::Completed {
            // Statistics update under the entry lock. The workflow may have
            // been deleted mid-run; its snapshot-backed execution still
            // finished, there is just nothing left to count it on.
            if let Some(mut entry) = self.workflows.get_mut(&workflow_id) {
                entry.run_count += 1;
                entry.last_run_at = execution.completed_at;
            }
        }

        self.executions.insert(execution_id, execution.clone());
        Ok(execution)
    }

    /// Cancel an in-flight execution. The run stops before its next step
    /// dispatch and finishes as `Failed` with a distinguished error.
    pub fn cancel(&self, execution_id: Uuid) -> Result<(), EngineError> {
        match self.cancellations.remove(&execution_id) {
            Some((_, token)) => {
                token.cancel();
                tracing::info!(execution_id = %execution_id, "execution cancellation requested");
                Ok(())
            }
            None => Err(EngineError::ExecutionNotFound(execution_id)),
        }
    }

    /// Fetch an execution record: the running snapshot while in flight, the
    /// final record once terminal.
    pub fn get_execution(&self, execution_id: Uuid) -> Option<Execution> {
        self.executions.get(&execution_id).map(|entry| entry.clone())
    }

    /// All archived executions of one workflow, oldest first.
    pub fn list_executions(&self, workflow_id: Uuid) -> Vec<Execution> {
        let mut runs: Vec<Execution> = self
            .executions
            .iter()
            .filter(|entry| entry.workflow_id == workflow_id)
            .map(|entry| entry.clone())
            .collect();
        runs.sort_by_key(|run| run.started_at);
        runs
    }

    // -----------------------------------------------------------------------
    // Platform catalog
    // -----------------------------------------------------------------------

    /// Descriptor for one platform skin, if known.
    pub fn platform_info(&self, skin: &str) -> Option<&PlatformDescriptor> {
        self.catalog.get(skin)
    }

    /// All known platform skins.
    pub fn platforms(&self) -> impl Iterator<Item = &PlatformDescriptor> {
        self.catalog.all()
    }
}

impl Default for WorkflowRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WorkflowRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowRegistry")
            .field("workflows", &self.workflows.len())
            .field("executions", &self.executions.len())
            .field("in_flight", &self.cancellations.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
