//! Shared worker plumbing: the standard response builders and state
//! accessors every built-in worker uses.
//!
//! The worker contract (normative for all workers):
//! 1. On success: append an assistant message authored with the worker's
//!    name, mark the current step completed with a result summary truncated
//!    to 200 characters, advance the step cursor.
//! 2. On error: append an authored "Execution failed: ..." message, mark the
//!    current step failed, advance the cursor, and record
//!    `metadata.error` / `metadata.error_type`.
//! 3. Thinking steps may be appended but are never required for
//!    correctness.

use agentgraph_core::messages::{Message, MessageRole};
use serde_json::json;

use crate::state::{StateUpdate, SupervisorState, TaskStatus, ThinkingStep};

/// Maximum length of a step-result summary.
pub const MAX_RESULT_LENGTH: usize = 200;

/// Truncate a result summary to `MAX_RESULT_LENGTH` characters.
pub fn truncate_result(content: &str) -> String {
    if content.chars().count() <= MAX_RESULT_LENGTH {
        return content.to_string();
    }
    let truncated: String = content.chars().take(MAX_RESULT_LENGTH).collect();
    format!("{}...", truncated)
}

/// The query a worker should act on: the preserved original query, else the
/// most recent human message, else the last message of any role.
pub fn query_for(state: &SupervisorState) -> Option<String> {
    if !state.original_query.is_empty() {
        return Some(state.original_query.clone());
    }

    state
        .messages
        .iter()
        .rev()
        .find(|m| m.role == MessageRole::Human)
        .or_else(|| state.messages.last())
        .map(|m| m.content.clone())
}

/// A hint describing the current plan step, or empty when there is none.
pub fn task_hint(state: &SupervisorState) -> String {
    match state.current_step() {
        Some(step) if !step.description.is_empty() => {
            format!("Task requirement: {}\n\n", step.description)
        }
        _ => String::new(),
    }
}

/// Every assistant message that carries an author name, in order:
/// `(worker name, content)`.
pub fn worker_outputs(state: &SupervisorState) -> Vec<(String, String)> {
    state
        .messages
        .iter()
        .filter(|m| m.role == MessageRole::Assistant && !m.content.is_empty())
        .filter_map(|m| m.name.clone().map(|name| (name, m.content.clone())))
        .collect()
}

/// Build the standard success response for a worker.
pub fn worker_response(
    worker: &str,
    content: impl Into<String>,
    state: &SupervisorState,
    thinking: Option<ThinkingStep>,
) -> StateUpdate {
    let content = content.into();
    let mut update = StateUpdate {
        messages: vec![Message::assistant(content.clone()).with_name(worker)],
        current_worker: Some(worker.to_string()),
        ..Default::default()
    };

    if let Some(step) = thinking {
        update.thinking_steps.push(step);
    }

    if state.current_step().is_some() {
        let mut plan = state.task_plan.clone();
        let step = &mut plan[state.current_step_index];
        step.status = TaskStatus::Completed;
        step.result = Some(truncate_result(&content));
        update.task_plan = Some(plan);
        update.current_step_index = Some(state.current_step_index + 1);
    }

    update
}

/// Build the standard error response for a worker.
pub fn error_response(
    worker: &str,
    error_message: impl Into<String>,
    state: &SupervisorState,
) -> StateUpdate {
    let error_message = error_message.into();
    let content = format!("Execution failed: {}", error_message);

    let mut update = StateUpdate {
        messages: vec![Message::assistant(content).with_name(worker)],
        current_worker: Some(worker.to_string()),
        ..Default::default()
    };
    update.metadata.insert("error".into(), json!(error_message));
    update.metadata.insert(
        "error_type".into(),
        json!(format!("{}_execution_error", worker.to_lowercase())),
    );

    if state.current_step().is_some() {
        let mut plan = state.task_plan.clone();
        let step = &mut plan[state.current_step_index];
        step.status = TaskStatus::Failed;
        step.error = Some(error_message);
        update.task_plan = Some(plan);
        update.current_step_index = Some(state.current_step_index + 1);
    }

    update
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{TaskStep, UserContext};
    use agentgraph_core::messages::Message;

    fn state_with_plan() -> SupervisorState {
        let mut state = SupervisorState::from_query("the question", UserContext::default());
        state.task_plan = vec![
            TaskStep::new("step_1", "Researcher", "find facts"),
            TaskStep::new("step_2", "Writer", "write it up"),
        ];
        state
    }

    #[test]
    fn test_worker_response_completes_step_and_advances() {
        let state = state_with_plan();
        let update = worker_response("Researcher", "found it", &state, None);

        assert_eq!(update.messages.len(), 1);
        assert_eq!(update.messages[0].name.as_deref(), Some("Researcher"));
        assert_eq!(update.current_worker.as_deref(), Some("Researcher"));

        let plan = update.task_plan.unwrap();
        assert_eq!(plan[0].status, TaskStatus::Completed);
        assert_eq!(plan[0].result.as_deref(), Some("found it"));
        assert_eq!(plan[1].status, TaskStatus::Pending);
        assert_eq!(update.current_step_index, Some(1));
    }

    #[test]
    fn test_worker_response_without_plan_skips_plan_fields() {
        let state = SupervisorState::from_query("q", UserContext::default());
        let update = worker_response("General", "answer", &state, None);
        assert!(update.task_plan.is_none());
        assert!(update.current_step_index.is_none());
    }

    #[test]
    fn test_result_truncated_to_200_chars() {
        let state = state_with_plan();
        let long = "x".repeat(500);
        let update = worker_response("Researcher", long, &state, None);

        let plan = update.task_plan.unwrap();
        let result = plan[0].result.as_ref().unwrap();
        assert_eq!(result.chars().count(), MAX_RESULT_LENGTH + 3); // "..." suffix
        assert!(result.ends_with("..."));
    }

    #[test]
    fn test_truncate_is_char_safe() {
        let content = "数".repeat(300);
        let truncated = truncate_result(&content);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), MAX_RESULT_LENGTH + 3);
    }

    #[test]
    fn test_error_response_fails_step_and_sets_metadata() {
        let state = state_with_plan();
        let update = error_response("Researcher", "search backend down", &state);

        assert!(update.messages[0]
            .content
            .starts_with("Execution failed: search backend down"));
        assert_eq!(update.metadata["error"], "search backend down");
        assert_eq!(update.metadata["error_type"], "researcher_execution_error");

        let plan = update.task_plan.unwrap();
        assert_eq!(plan[0].status, TaskStatus::Failed);
        assert_eq!(plan[0].error.as_deref(), Some("search backend down"));
        assert_eq!(update.current_step_index, Some(1));
    }

    #[test]
    fn test_query_for_prefers_original_query() {
        let mut state = state_with_plan();
        state.messages.push(Message::human("a newer question"));
        assert_eq!(query_for(&state).unwrap(), "the question");

        state.original_query.clear();
        assert_eq!(query_for(&state).unwrap(), "a newer question");
    }

    #[test]
    fn test_task_hint_uses_current_step() {
        let state = state_with_plan();
        assert_eq!(task_hint(&state), "Task requirement: find facts\n\n");

        let mut done = state.clone();
        done.current_step_index = 2;
        assert_eq!(task_hint(&done), "");
    }

    #[test]
    fn test_worker_outputs_collects_named_assistant_messages() {
        let mut state = state_with_plan();
        state
            .messages
            .push(Message::assistant("research notes").with_name("Researcher"));
        state.messages.push(Message::assistant("unnamed"));
        state
            .messages
            .push(Message::assistant("analysis").with_name("DataAnalyst"));

        let outputs = worker_outputs(&state);
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].0, "Researcher");
        assert_eq!(outputs[1].1, "analysis");
    }
}
