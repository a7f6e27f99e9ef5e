//! Step graph operations: insertion, removal, lookup, and structural
//! validation.
//!
//! These functions operate on a `Workflow`'s step collection while the
//! registry holds the entry lock. The runtime never calls them on a live
//! workflow -- it works from the immutable snapshot taken at execution start.

use std::collections::HashSet;

use chrono::Utc;
use uniflow_types::error::EngineError;
use uniflow_types::workflow::{Step, StepPayload, Workflow};

/// Insert a step into a workflow's graph.
///
/// If `after_id` is given and found, the step lands immediately after it;
/// otherwise it is appended. Touches `updated_at`.
///
/// # Errors
/// [`EngineError::DuplicateStep`] if a step with the same ID already exists.
pub fn add_step(
    workflow: &mut Workflow,
    step: Step,
    after_id: Option<&str>,
) -> Result<(), EngineError> {
    if workflow.steps.iter().any(|s| s.id == step.id) {
        return Err(EngineError::DuplicateStep(step.id));
    }

    match after_id.and_then(|id| workflow.steps.iter().position(|s| s.id == id)) {
        Some(idx) => workflow.steps.insert(idx + 1, step),
        None => workflow.steps.push(step),
    }

    workflow.updated_at = Utc::now();
    Ok(())
}

/// Remove a step by ID and return it.
///
/// Links that referenced the removed step are left in place; the runtime
/// treats unresolvable IDs as terminal.
pub fn remove_step(workflow: &mut Workflow, step_id: &str) -> Result<Step, EngineError> {
    let idx = workflow
        .steps
        .iter()
        .position(|s| s.id == step_id)
        .ok_or_else(|| EngineError::StepNotFound(step_id.to_string()))?;

    let removed = workflow.steps.remove(idx);
    workflow.updated_at = Utc::now();
    Ok(removed)
}

/// Find a step by ID within a step collection.
pub fn lookup<'a>(steps: &'a [Step], id: &str) -> Option<&'a Step> {
    steps.iter().find(|s| s.id == id)
}

/// Validate structural constraints on a workflow's step graph.
///
/// Checks that step IDs are unique and that every `next_id` and condition
/// branch target resolves to an existing step. The runtime tolerates
/// dangling references (they terminate traversal), so this is an
/// authoring-time check, not an execution precondition.
pub fn validate_workflow(workflow: &Workflow) -> Result<(), EngineError> {
    let mut ids: HashSet<&str> = HashSet::with_capacity(workflow.steps.len());
    for step in &workflow.steps {
        if !ids.insert(step.id.as_str()) {
            return Err(EngineError::DuplicateStep(step.id.clone()));
        }
    }

    for step in &workflow.steps {
        if let Some(next) = &step.next_id {
            if !ids.contains(next.as_str()) {
                return Err(EngineError::Validation(format!(
                    "step '{}' links to unknown step '{}'",
                    step.id, next
                )));
            }
        }
        if let StepPayload::Condition(cond) = &step.payload {
            for target in [&cond.on_true, &cond.on_false].into_iter().flatten() {
                if !ids.contains(target.as_str()) {
                    return Err(EngineError::Validation(format!(
                        "condition '{}' branches to unknown step '{}'",
                        step.id, target
                    )));
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uniflow_types::workflow::{ActionSpec, ConditionSpec, PredicateKind};

    fn action_step(id: &str, next_id: Option<&str>) -> Step {
        Step {
            id: id.to_string(),
            payload: StepPayload::Action(ActionSpec {
                kind: "send_email".to_string(),
                name: id.to_string(),
                config: Default::default(),
                delay_before_ms: 0,
            }),
            next_id: next_id.map(String::from),
        }
    }

    fn empty_workflow() -> Workflow {
        Workflow::new("test-wf", "", "unified")
    }

    // -----------------------------------------------------------------------
    // add_step
    // -----------------------------------------------------------------------

    #[test]
    fn add_step_appends_by_default() {
        let mut wf = empty_workflow();
        add_step(&mut wf, action_step("a", None), None).unwrap();
        add_step(&mut wf, action_step("b", None), None).unwrap();
        let ids: Vec<&str> = wf.steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn add_step_inserts_after_given_id() {
        let mut wf = empty_workflow();
        add_step(&mut wf, action_step("a", None), None).unwrap();
        add_step(&mut wf, action_step("c", None), None).unwrap();
        add_step(&mut wf, action_step("b", None), Some("a")).unwrap();
        let ids: Vec<&str> = wf.steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn add_step_appends_when_after_id_missing() {
        let mut wf = empty_workflow();
        add_step(&mut wf, action_step("a", None), None).unwrap();
        add_step(&mut wf, action_step("b", None), Some("ghost")).unwrap();
        let ids: Vec<&str> = wf.steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn add_step_rejects_duplicate_id() {
        let mut wf = empty_workflow();
        add_step(&mut wf, action_step("a", None), None).unwrap();
        let err = add_step(&mut wf, action_step("a", None), None).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateStep(id) if id == "a"));
    }

    #[test]
    fn add_step_touches_updated_at() {
        let mut wf = empty_workflow();
        let before = wf.updated_at;
        add_step(&mut wf, action_step("a", None), None).unwrap();
        assert!(wf.updated_at >= before);
    }

    // -----------------------------------------------------------------------
    // remove_step / lookup
    // -----------------------------------------------------------------------

    #[test]
    fn remove_step_returns_the_step() {
        let mut wf = empty_workflow();
        add_step(&mut wf, action_step("a", None), None).unwrap();
        let removed = remove_step(&mut wf, "a").unwrap();
        assert_eq!(removed.id, "a");
        assert!(wf.steps.is_empty());
    }

    #[test]
    fn remove_step_unknown_id_fails() {
        let mut wf = empty_workflow();
        let err = remove_step(&mut wf, "ghost").unwrap_err();
        assert!(matches!(err, EngineError::StepNotFound(id) if id == "ghost"));
    }

    #[test]
    fn lookup_finds_step_or_none() {
        let mut wf = empty_workflow();
        add_step(&mut wf, action_step("a", None), None).unwrap();
        assert!(lookup(&wf.steps, "a").is_some());
        assert!(lookup(&wf.steps, "missing").is_none());
    }

    // -----------------------------------------------------------------------
    // validate_workflow
    // -----------------------------------------------------------------------

    #[test]
    fn validate_accepts_linked_graph() {
        let mut wf = empty_workflow();
        add_step(&mut wf, action_step("a", Some("b")), None).unwrap();
        add_step(&mut wf, action_step("b", None), None).unwrap();
        assert!(validate_workflow(&wf).is_ok());
    }

    #[test]
    fn validate_accepts_empty_graph() {
        assert!(validate_workflow(&empty_workflow()).is_ok());
    }

    #[test]
    fn validate_rejects_dangling_next_id() {
        let mut wf = empty_workflow();
        add_step(&mut wf, action_step("a", Some("ghost")), None).unwrap();
        let err = validate_workflow(&wf).unwrap_err();
        assert!(err.to_string().contains("unknown step 'ghost'"));
    }

    #[test]
    fn validate_rejects_dangling_branch_target() {
        let mut wf = empty_workflow();
        let step = Step {
            id: "check".to_string(),
            payload: StepPayload::Condition(ConditionSpec {
                predicate: PredicateKind::Equals,
                field: "status".to_string(),
                operand: serde_json::json!("open"),
                on_true: Some("ghost".to_string()),
                on_false: None,
            }),
            next_id: None,
        };
        add_step(&mut wf, step, None).unwrap();
        let err = validate_workflow(&wf).unwrap_err();
        assert!(err.to_string().contains("branches to unknown step 'ghost'"));
    }
}
