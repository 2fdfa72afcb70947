//! The supervisor conversation state and its reducer.
//!
//! [`SupervisorState`] is the root entity of a request: message history, the
//! routing decision, the task plan with its cursor, user context, execution
//! tracking and metadata. Nodes never mutate it - they return a
//! [`StateUpdate`] (every field optional) and the engine merges it through
//! the table-driven reducer in [`GraphState::apply`].
//!
//! Per-field merge rules:
//!
//! | Field | Reducer |
//! |-------|---------|
//! | `messages` | append, dedupe by id |
//! | `thinking_steps` | append |
//! | `metadata` | shallow-merge |
//! | everything else | last-writer wins |
//!
//! Invariants that hold at every supervisor entry (enforced by the
//! supervisor node, checked in tests):
//! - `current_step_index <= task_plan.len()`
//! - `iteration_count <= MAX_ITERATIONS` (breach forces FINISH)
//! - `task_plan.len() <= MAX_TASK_STEPS`
//! - `next` is a registered worker name, `FINISH`, or `""` before the first
//!   decision.

use std::collections::{HashMap, HashSet};

use agentgraph_core::messages::{add_messages, Message};
use agentgraph_core::state::GraphState;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Iteration cap: the supervisor forces FINISH once a request has entered it
/// this many times.
pub const MAX_ITERATIONS: usize = 10;

/// Maximum number of steps a plan may carry; longer plans are truncated.
pub const MAX_TASK_STEPS: usize = 8;

/// Routing sentinel meaning "terminate the graph".
pub const FINISH: &str = "FINISH";

/// Status of one plan step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting to execute.
    Pending,
    /// Currently executing.
    InProgress,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Skipped by the supervisor.
    Skipped,
}

impl TaskStatus {
    /// Whether this step will not execute again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }

    /// Whether this step counts toward completion progress.
    pub fn counts_as_done(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }
}

/// One step of a task plan. Position in the plan list is execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStep {
    /// Stable step id (`step_1`, `step_2`, ...).
    pub step_id: String,

    /// Name of the worker planned to execute this step. A name, not a
    /// reference - resolved against the registry snapshot at decision time.
    pub worker: String,

    /// What the step should accomplish.
    pub description: String,

    /// Current status.
    pub status: TaskStatus,

    /// Result summary, truncated to 200 characters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,

    /// Error description when the step failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskStep {
    /// Create a pending step.
    pub fn new(
        step_id: impl Into<String>,
        worker: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            step_id: step_id.into(),
            worker: worker.into(),
            description: description.into(),
            status: TaskStatus::Pending,
            result: None,
            error: None,
        }
    }
}

/// Kind of an audit-trail entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThinkingKind {
    Planning,
    Reasoning,
    Decision,
    Reflection,
}

/// An audit entry recorded by the supervisor or a worker. Append-only and
/// never consulted for control flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThinkingStep {
    /// Entry kind.
    pub kind: ThinkingKind,

    /// Free-form content.
    pub content: String,

    /// Unix timestamp in seconds.
    pub timestamp: f64,

    /// Worker this entry relates to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker: Option<String>,
}

impl ThinkingStep {
    /// Create an entry stamped with the current time.
    pub fn new(kind: ThinkingKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            timestamp: chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
            worker: None,
        }
    }

    /// Attach the related worker name.
    pub fn with_worker(mut self, worker: impl Into<String>) -> Self {
        self.worker = Some(worker.into());
        self
    }
}

/// Per-request user context. `preferences` carries model-selection hints
/// consumed by the chat-model factory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserContext {
    /// Caller identity, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Conversation session, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Preferred answer language.
    pub language: String,

    /// IANA timezone name used by time-aware tools.
    pub timezone: String,

    /// Permission tags.
    #[serde(default)]
    pub permissions: HashSet<String>,

    /// Free-form preferences (model selection hints and the like).
    #[serde(default)]
    pub preferences: HashMap<String, JsonValue>,
}

impl Default for UserContext {
    fn default() -> Self {
        Self {
            user_id: None,
            session_id: None,
            language: "zh-CN".to_string(),
            timezone: "Asia/Shanghai".to_string(),
            permissions: HashSet::new(),
            preferences: HashMap::new(),
        }
    }
}

/// The root conversation state. See the module docs for field semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorState {
    /// Message history: user input, worker replies.
    pub messages: Vec<Message>,

    /// Routing decision: a worker name, [`FINISH`], or `""` before the first
    /// decision.
    pub next: String,

    /// The task plan. Replaced wholesale by updates.
    pub task_plan: Vec<TaskStep>,

    /// Index of the step currently executing; equals `task_plan.len()` when
    /// every step has been visited.
    pub current_step_index: usize,

    /// The user's original request, preserved verbatim.
    pub original_query: String,

    /// Per-request user context.
    pub user_context: UserContext,

    /// Worker currently (or most recently) executing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_worker: Option<String>,

    /// Number of supervisor entries so far.
    pub iteration_count: usize,

    /// Append-only audit trail.
    pub thinking_steps: Vec<ThinkingStep>,

    /// Shallow-merged metadata: error markers, termination reason.
    pub metadata: HashMap<String, JsonValue>,
}

impl Default for SupervisorState {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            next: String::new(),
            task_plan: Vec::new(),
            current_step_index: 0,
            original_query: String::new(),
            user_context: UserContext::default(),
            current_worker: None,
            iteration_count: 0,
            thinking_steps: Vec::new(),
            metadata: HashMap::new(),
        }
    }
}

impl SupervisorState {
    /// Seed a state from a user message.
    pub fn from_query(query: impl Into<String>, user_context: UserContext) -> Self {
        let query = query.into();
        Self {
            messages: vec![Message::human(query.clone())],
            original_query: query,
            user_context,
            ..Default::default()
        }
    }

    /// The step at `current_step_index`, if the cursor is inside the plan.
    pub fn current_step(&self) -> Option<&TaskStep> {
        self.task_plan.get(self.current_step_index)
    }

    /// Number of steps that count as done (completed or skipped).
    pub fn completed_steps(&self) -> usize {
        self.task_plan
            .iter()
            .filter(|s| s.status.counts_as_done())
            .count()
    }
}

/// A node's partial update. Every field is optional; empty collections mean
/// "nothing to merge".
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    /// Messages to append (dedupe by id).
    pub messages: Vec<Message>,
    /// New routing decision.
    pub next: Option<String>,
    /// Replacement plan (whole list).
    pub task_plan: Option<Vec<TaskStep>>,
    /// New step cursor.
    pub current_step_index: Option<usize>,
    /// New original query.
    pub original_query: Option<String>,
    /// Replacement user context.
    pub user_context: Option<UserContext>,
    /// Worker taking over execution.
    pub current_worker: Option<String>,
    /// New iteration count.
    pub iteration_count: Option<usize>,
    /// Audit entries to append.
    pub thinking_steps: Vec<ThinkingStep>,
    /// Metadata keys to merge in.
    pub metadata: HashMap<String, JsonValue>,
}

impl StateUpdate {
    /// An update that only sets the routing decision.
    pub fn route(next: impl Into<String>) -> Self {
        Self {
            next: Some(next.into()),
            ..Default::default()
        }
    }

    /// Append a message.
    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Append an audit entry.
    pub fn with_thinking(mut self, step: ThinkingStep) -> Self {
        self.thinking_steps.push(step);
        self
    }

    /// Merge one metadata key.
    pub fn with_metadata(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// One row of the reducer table: moves a single field from the update into
/// the state.
type FieldReducer = fn(&mut SupervisorState, &mut StateUpdate);

/// The reducer table. Adding a field to the state means adding one row here
/// rather than growing a merge function.
const REDUCERS: &[(&str, FieldReducer)] = &[
    ("messages", reduce_messages),
    ("next", reduce_next),
    ("task_plan", reduce_task_plan),
    ("current_step_index", reduce_current_step_index),
    ("original_query", reduce_original_query),
    ("user_context", reduce_user_context),
    ("current_worker", reduce_current_worker),
    ("iteration_count", reduce_iteration_count),
    ("thinking_steps", reduce_thinking_steps),
    ("metadata", reduce_metadata),
];

fn reduce_messages(state: &mut SupervisorState, update: &mut StateUpdate) {
    if !update.messages.is_empty() {
        let incoming = std::mem::take(&mut update.messages);
        let current = std::mem::take(&mut state.messages);
        state.messages = add_messages(current, incoming);
    }
}

fn reduce_next(state: &mut SupervisorState, update: &mut StateUpdate) {
    if let Some(next) = update.next.take() {
        state.next = next;
    }
}

fn reduce_task_plan(state: &mut SupervisorState, update: &mut StateUpdate) {
    if let Some(plan) = update.task_plan.take() {
        state.task_plan = plan;
    }
}

fn reduce_current_step_index(state: &mut SupervisorState, update: &mut StateUpdate) {
    if let Some(index) = update.current_step_index.take() {
        state.current_step_index = index;
    }
}

fn reduce_original_query(state: &mut SupervisorState, update: &mut StateUpdate) {
    if let Some(query) = update.original_query.take() {
        state.original_query = query;
    }
}

fn reduce_user_context(state: &mut SupervisorState, update: &mut StateUpdate) {
    if let Some(context) = update.user_context.take() {
        state.user_context = context;
    }
}

fn reduce_current_worker(state: &mut SupervisorState, update: &mut StateUpdate) {
    if let Some(worker) = update.current_worker.take() {
        state.current_worker = Some(worker);
    }
}

fn reduce_iteration_count(state: &mut SupervisorState, update: &mut StateUpdate) {
    if let Some(count) = update.iteration_count.take() {
        state.iteration_count = count;
    }
}

fn reduce_thinking_steps(state: &mut SupervisorState, update: &mut StateUpdate) {
    state
        .thinking_steps
        .append(&mut update.thinking_steps);
}

fn reduce_metadata(state: &mut SupervisorState, update: &mut StateUpdate) {
    state.metadata.extend(std::mem::take(&mut update.metadata));
}

impl GraphState for SupervisorState {
    type Update = StateUpdate;

    fn apply(&mut self, mut update: StateUpdate) {
        for (_field, reduce) in REDUCERS {
            reduce(self, &mut update);
        }
    }
}
