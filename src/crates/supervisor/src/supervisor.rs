//! The supervisor node: a plan → route state machine.
//!
//! On each entry the supervisor:
//! 1. enforces the iteration cap (breach forces FINISH),
//! 2. plans - only when the plan is empty and planning is enabled - by
//!    eliciting a structured `{steps, reasoning}` from the LLM, normalizing
//!    worker names and capping the plan length,
//! 3. routes with deterministic fast paths, falling back to a structured
//!    LLM decision only when no fast path applies:
//!    - **A** all steps done → FINISH,
//!    - **B** single-step plan already answered by a worker → FINISH,
//!    - **C** first non-terminal step's worker is registered (exactly or
//!      case-insensitively) → route to it without any LLM call.
//!
//! The LLM route is validated hard: unknown names are recovered from the
//! reasoning text or the plan, a premature FINISH is overridden while
//! unfinished steps remain, and `should_replan` clears the plan so the next
//! supervisor entry re-plans.
//!
//! The node never fails: every error path degrades to a FINISH decision or
//! a fallback plan.

use std::sync::Arc;

use agentgraph_core::llm::ChatRequest;
use agentgraph_core::messages::Message;
use agentgraph_core::state::GraphState;
use serde::Deserialize;
use serde_json::json;

use crate::config::SupervisorConfig;
use crate::llm_factory::ChatModelFactory;
use crate::prompts::{PromptSnapshot, PromptSource};
use crate::registry::RegistrySnapshot;
use crate::state::{
    StateUpdate, SupervisorState, TaskStatus, TaskStep, ThinkingKind, ThinkingStep, FINISH,
};

/// Structured planning output elicited from the LLM.
#[derive(Debug, Clone, Default, Deserialize)]
struct TaskPlan {
    #[serde(default)]
    steps: Vec<PlannedStep>,
    #[serde(default)]
    reasoning: String,
}

/// One planned step as the LLM produces it.
#[derive(Debug, Clone, Default, Deserialize)]
struct PlannedStep {
    #[serde(default)]
    worker: String,
    #[serde(default)]
    description: String,
}

/// Structured routing output elicited from the LLM.
#[derive(Debug, Clone, Default, Deserialize)]
struct RouteDecision {
    #[serde(default)]
    next: String,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    should_replan: bool,
}

/// Strip a trailing ` [type]` tag the LLM may echo from the worker list
/// (`"Researcher [llm_powered]"` → `"Researcher"`).
fn strip_type_suffix(name: &str) -> String {
    match name.find('[') {
        Some(index) => name[..index].trim().to_string(),
        None => name.trim().to_string(),
    }
}

/// One line per step, with a status emoji, for the routing prompt.
fn format_task_plan(plan: &[TaskStep]) -> String {
    if plan.is_empty() {
        return "no task plan".to_string();
    }

    plan.iter()
        .enumerate()
        .map(|(i, step)| {
            let emoji = match step.status {
                TaskStatus::Pending => "⏳",
                TaskStatus::InProgress => "🔄",
                TaskStatus::Completed => "✅",
                TaskStatus::Failed => "❌",
                TaskStatus::Skipped => "⏭️",
            };
            format!("{}. [{}] {}: {}", i + 1, emoji, step.worker, step.description)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The supervisor node. Holds its dependencies explicitly; construct once
/// per service and share.
pub struct SupervisorNode {
    config: SupervisorConfig,
    factory: Arc<dyn ChatModelFactory>,
    prompts: Arc<PromptSource>,
}

impl SupervisorNode {
    /// Create the node.
    pub fn new(
        config: SupervisorConfig,
        factory: Arc<dyn ChatModelFactory>,
        prompts: Arc<PromptSource>,
    ) -> Self {
        Self {
            config,
            factory,
            prompts,
        }
    }

    /// One supervisor entry: plan if needed, then route. Returns a single
    /// partial update that always sets `next` (directly or by leaving a
    /// replan pending) and accounts the iteration.
    pub async fn run(&self, state: &SupervisorState, registry: &RegistrySnapshot) -> StateUpdate {
        let iteration_count = state.iteration_count;

        // Iteration cap. The count is left as-is so the invariant
        // `iteration_count <= max_iterations` holds in the final state.
        if iteration_count >= self.config.max_iterations {
            tracing::warn!(
                iterations = iteration_count,
                "iteration cap reached, forcing FINISH"
            );
            return StateUpdate::route(FINISH)
                .with_metadata("terminated_reason", json!("max_iterations_reached"));
        }

        tracing::info!(iteration = iteration_count + 1, "supervisor deciding");

        if registry.is_empty() {
            tracing::warn!("no workers registered, forcing FINISH");
            let mut update = StateUpdate::route(FINISH);
            update.iteration_count = Some(iteration_count + 1);
            return update;
        }

        let prompts = self.prompts.snapshot();

        // Plan phase. The planning result must be visible to the routing
        // phase in this same entry, so it is applied to a working copy.
        let mut planning_update = StateUpdate::default();
        let mut working_state = state.clone();
        if self.config.enable_planning && state.task_plan.is_empty() {
            planning_update = self.plan_task(state, registry, &prompts).await;
            working_state.apply(planning_update.clone());
        }

        let routing_update = self.route(&working_state, registry, &prompts).await;

        let mut update = merge_updates(planning_update, routing_update);
        update.iteration_count = Some(iteration_count + 1);
        update
    }

    /// Plan phase: break the request into steps.
    async fn plan_task(
        &self,
        state: &SupervisorState,
        registry: &RegistrySnapshot,
        prompts: &PromptSnapshot,
    ) -> StateUpdate {
        tracing::info!("planning task");

        match self.invoke_planner(state, registry, prompts).await {
            Ok(plan) => {
                let mut steps = Vec::new();
                for (i, planned) in plan.steps.iter().take(self.config.max_task_steps).enumerate() {
                    let stripped = strip_type_suffix(&planned.worker);
                    let worker = registry
                        .resolve(&stripped)
                        .unwrap_or_else(|| "General".to_string());
                    steps.push(TaskStep::new(
                        format!("step_{}", i + 1),
                        worker,
                        planned.description.clone(),
                    ));
                }

                tracing::info!(steps = steps.len(), "task plan ready");

                let thinking = ThinkingStep::new(
                    ThinkingKind::Planning,
                    format!(
                        "Task plan complete: {}\nPlanned steps: {}",
                        plan.reasoning,
                        steps.len()
                    ),
                );

                let mut update = StateUpdate {
                    task_plan: Some(steps),
                    current_step_index: Some(0),
                    ..Default::default()
                }
                .with_thinking(thinking);

                if state.original_query.is_empty() {
                    update.original_query =
                        state.messages.first().map(|m| m.content.clone());
                }
                update
            }
            Err(e) => {
                tracing::warn!(error = %e, "planning failed, using single-step fallback plan");
                StateUpdate {
                    task_plan: Some(vec![TaskStep::new(
                        "step_1",
                        "General",
                        "Process user request",
                    )]),
                    current_step_index: Some(0),
                    ..Default::default()
                }
            }
        }
    }

    async fn invoke_planner(
        &self,
        state: &SupervisorState,
        registry: &RegistrySnapshot,
        prompts: &PromptSnapshot,
    ) -> agentgraph_core::Result<TaskPlan> {
        let worker_list = registry.formatted_descriptions();
        let max_steps = self.config.max_task_steps.to_string();

        let system = prompts.get_or(
            "supervisor.planning",
            "Break the user's request into an ordered plan.\n\nAvailable workers:\n{worker_list}\n\nAt most {max_steps} steps.",
            &[("worker_list", worker_list.as_str()), ("max_steps", max_steps.as_str())],
        );
        let closing = prompts.get_or(
            "supervisor.planning_complete",
            "Return the plan as JSON: {\"steps\": [{\"worker\": \"name\", \"description\": \"task\"}], \"reasoning\": \"why\"}",
            &[],
        );

        let mut messages = vec![Message::system(system)];
        messages.extend(state.messages.iter().cloned());
        messages.push(Message::system(closing));

        let model = self
            .factory
            .create(&state.user_context, self.config.temperature)
            .map_err(|e| agentgraph_core::GraphError::Llm(e.to_string()))?;

        let schema = json!({
            "type": "object",
            "properties": {
                "steps": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "worker": {"type": "string"},
                            "description": {"type": "string"}
                        },
                        "required": ["worker", "description"]
                    }
                },
                "reasoning": {"type": "string"}
            },
            "required": ["steps"]
        });

        let value = model
            .chat_structured(
                ChatRequest::new(messages).with_temperature(self.config.temperature),
                schema,
            )
            .await?;
        serde_json::from_value(value).map_err(agentgraph_core::GraphError::from)
    }

    /// Route phase: fast paths first, the LLM only as a last resort.
    async fn route(
        &self,
        state: &SupervisorState,
        registry: &RegistrySnapshot,
        prompts: &PromptSnapshot,
    ) -> StateUpdate {
        let completed = state.completed_steps();
        let total = state.task_plan.len();

        // Fast path A: every step is done.
        if completed >= total && total > 0 {
            tracing::info!("all steps done, routing FINISH");
            return StateUpdate::route(FINISH).with_thinking(ThinkingStep::new(
                ThinkingKind::Decision,
                "All task steps complete, finishing",
            ));
        }

        // Fast path B: a single-step plan where a registered worker has
        // already replied. Guards against double-executing trivial plans.
        let has_worker_reply = state.messages.iter().any(|m| {
            !m.content.is_empty()
                && m.name
                    .as_deref()
                    .map(|name| registry.contains(name))
                    .unwrap_or(false)
        });
        if total == 1 && completed == 0 && has_worker_reply {
            tracing::info!("single-step plan already answered, routing FINISH");
            return StateUpdate::route(FINISH).with_thinking(ThinkingStep::new(
                ThinkingKind::Decision,
                "Single-step task already answered, finishing",
            ));
        }

        // Fast path C: linear execution of the plan, no LLM involved.
        for (i, step) in state.task_plan.iter().enumerate() {
            if step.status.is_terminal() {
                continue;
            }

            let stripped = strip_type_suffix(&step.worker);
            if let Some(worker) = registry.resolve(&stripped) {
                tracing::info!(step = i + 1, worker = %worker, "executing plan step");
                return StateUpdate::route(worker).with_thinking(ThinkingStep::new(
                    ThinkingKind::Decision,
                    format!("Following the plan: {}", step.description),
                ));
            }

            tracing::warn!(worker = %step.worker, "planned worker not registered");
            if registry.contains("General") {
                return StateUpdate::route("General").with_thinking(ThinkingStep::new(
                    ThinkingKind::Decision,
                    format!("Following the plan: {} (via General)", step.description),
                ));
            }
            // No substitute available; let the next steps (or the LLM
            // route) decide.
        }

        // LLM route: rare - complex plans where no fast path applied.
        match self
            .invoke_router(state, registry, prompts, completed, total)
            .await
        {
            Ok(decision) => self.validate_decision(decision, state, registry, completed, total),
            Err(e) => {
                tracing::error!(error = %e, "routing decision failed");
                StateUpdate::route(FINISH)
                    .with_metadata("error", json!(e.to_string()))
                    .with_metadata("error_type", json!("supervisor_decision_error"))
            }
        }
    }

    async fn invoke_router(
        &self,
        state: &SupervisorState,
        registry: &RegistrySnapshot,
        prompts: &PromptSnapshot,
        completed: usize,
        total: usize,
    ) -> agentgraph_core::Result<RouteDecision> {
        let worker_list = registry.formatted_descriptions();
        let worker_options = registry.names_by_priority().join(", ");
        let task_plan = format_task_plan(&state.task_plan);
        let completed = completed.to_string();
        let total = total.to_string();

        let system = prompts.get_or(
            "supervisor.routing",
            "Workers:\n{worker_list}\n\nPlan:\n{task_plan}\n\nProgress: {completed_steps}/{total_steps}. Options: {worker_options}, or FINISH.",
            &[
                ("worker_list", worker_list.as_str()),
                ("worker_options", worker_options.as_str()),
                ("task_plan", task_plan.as_str()),
                ("completed_steps", completed.as_str()),
                ("total_steps", total.as_str()),
            ],
        );
        let closing = prompts.get_or(
            "supervisor.routing_decision",
            "Decide the next move. Return JSON: {\"next\": \"worker or FINISH\", \"reasoning\": \"why\", \"should_replan\": false}",
            &[],
        );

        let mut messages = vec![Message::system(system)];
        messages.extend(state.messages.iter().cloned());
        messages.push(Message::system(closing));

        let model = self
            .factory
            .create(&state.user_context, self.config.temperature)
            .map_err(|e| agentgraph_core::GraphError::Llm(e.to_string()))?;

        let schema = json!({
            "type": "object",
            "properties": {
                "next": {"type": "string"},
                "reasoning": {"type": "string"},
                "should_replan": {"type": "boolean"}
            },
            "required": ["next"]
        });

        let value = model
            .chat_structured(
                ChatRequest::new(messages).with_temperature(self.config.temperature),
                schema,
            )
            .await?;
        serde_json::from_value(value).map_err(agentgraph_core::GraphError::from)
    }

    /// Validate and, where needed, override an LLM routing decision.
    fn validate_decision(
        &self,
        decision: RouteDecision,
        state: &SupervisorState,
        registry: &RegistrySnapshot,
        completed: usize,
        total: usize,
    ) -> StateUpdate {
        let mut next = decision.next.clone();
        let reasoning = decision.reasoning.clone();

        let first_unfinished_worker = || {
            state
                .task_plan
                .iter()
                .find(|step| !step.status.is_terminal())
                .and_then(|step| registry.resolve(&strip_type_suffix(&step.worker)))
        };

        // Unknown target: recover from the reasoning text, then from the
        // plan, then give up.
        if next != FINISH && registry.resolve(&next).is_none() {
            tracing::warn!(next = %next, "router returned an invalid option");

            let from_reasoning = {
                let lowered = reasoning.to_lowercase();
                registry
                    .names_by_priority()
                    .into_iter()
                    .find(|name| lowered.contains(&name.to_lowercase()))
            };

            next = from_reasoning
                .or_else(first_unfinished_worker)
                .unwrap_or_else(|| {
                    tracing::warn!("could not infer a valid worker, finishing");
                    FINISH.to_string()
                });
        } else if next != FINISH {
            // Normalize case.
            if let Some(resolved) = registry.resolve(&next) {
                next = resolved;
            }
        }

        // Premature FINISH: unfinished steps remain, so keep executing.
        if next == FINISH && completed < total {
            tracing::warn!(
                completed,
                total,
                "router chose FINISH with unfinished steps, overriding"
            );
            next = first_unfinished_worker().unwrap_or_else(|| {
                if registry.contains("General") {
                    "General".to_string()
                } else {
                    FINISH.to_string()
                }
            });
        }

        let thinking = ThinkingStep::new(
            ThinkingKind::Decision,
            if reasoning.is_empty() {
                format!("Handing over to {}", next)
            } else {
                reasoning.clone()
            },
        );

        tracing::info!(next = %next, "router decision");

        if decision.should_replan {
            tracing::info!("router requested replanning, clearing the plan");
            return StateUpdate {
                task_plan: Some(Vec::new()),
                ..Default::default()
            }
            .with_thinking(thinking);
        }

        StateUpdate::route(next).with_thinking(thinking)
    }
}

/// Merge the plan-phase and route-phase updates into one; route-phase fields
/// win where both wrote.
fn merge_updates(planning: StateUpdate, routing: StateUpdate) -> StateUpdate {
    let mut merged = planning;

    merged.messages.extend(routing.messages);
    merged.thinking_steps.extend(routing.thinking_steps);
    merged.metadata.extend(routing.metadata);

    if routing.next.is_some() {
        merged.next = routing.next;
    }
    if routing.task_plan.is_some() {
        merged.task_plan = routing.task_plan;
    }
    if routing.current_step_index.is_some() {
        merged.current_step_index = routing.current_step_index;
    }
    if routing.original_query.is_some() {
        merged.original_query = routing.original_query;
    }
    if routing.user_context.is_some() {
        merged.user_context = routing.user_context;
    }
    if routing.current_worker.is_some() {
        merged.current_worker = routing.current_worker;
    }
    if routing.iteration_count.is_some() {
        merged.iteration_count = routing.iteration_count;
    }

    merged
}
