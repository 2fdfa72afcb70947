//! DataTeam: a subgraph worker for database questions.
//!
//! The worker's body is its own graph over [`SqlState`]:
//!
//! ```text
//! generate_sql ──► execute_sql ──► (no error)  ──► analyze_data ──► END
//!      ▲                │
//!      │                ├─ (error, trials < 3) ──► generate_sql
//!      └────────────────┘
//!                       └─ (error, trials ≥ 3) ──► give_up ──► END
//! ```
//!
//! The self-healing loop feeds the execution error back into the next
//! generation prompt. After three failed trials the team gives up with a
//! structured failure report. The terminal assistant message (authored
//! `DataTeam`) becomes the partial update returned to the parent graph.

use std::sync::Arc;

use agentgraph_core::graph::{StateGraph, END, START};
use agentgraph_core::llm::ChatRequest;
use agentgraph_core::messages::Message;
use agentgraph_core::state::GraphState;
use agentgraph_core::{CompiledGraph, GraphError};
use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::Result;
use crate::llm_factory::ChatModelFactory;
use crate::prompts::PromptSource;
use crate::registry::{Worker, WorkerType};
use crate::state::{StateUpdate, SupervisorState, TaskStatus, UserContext};
use crate::worker::{error_response, query_for, task_hint, truncate_result};

/// Maximum SQL generation attempts before giving up.
const MAX_TRIALS: usize = 3;

/// Database capability: schema introspection plus query execution.
///
/// `run` reports failures as `Err(String)` - the subgraph stores the message
/// in its state for the next generation attempt instead of raising.
#[async_trait]
pub trait Database: Send + Sync {
    /// The schema description shown to the SQL generator.
    fn table_info(&self) -> String;

    /// Execute a query, returning a textual result.
    async fn run(&self, sql: &str) -> std::result::Result<String, String>;
}

/// Canned database used when no real backend is wired up.
#[derive(Default)]
pub struct MockDatabase;

impl MockDatabase {
    const SCHEMA: &'static str = "\
CREATE TABLE users (
    id INTEGER PRIMARY KEY,
    name VARCHAR(100),
    email VARCHAR(200),
    created_at TIMESTAMP
);

CREATE TABLE orders (
    id INTEGER PRIMARY KEY,
    user_id INTEGER REFERENCES users(id),
    product_name VARCHAR(200),
    amount DECIMAL(10,2),
    status VARCHAR(50),
    created_at TIMESTAMP
);

CREATE TABLE products (
    id INTEGER PRIMARY KEY,
    name VARCHAR(200),
    price DECIMAL(10,2),
    stock INTEGER,
    category VARCHAR(100)
);";
}

#[async_trait]
impl Database for MockDatabase {
    fn table_info(&self) -> String {
        Self::SCHEMA.to_string()
    }

    async fn run(&self, sql: &str) -> std::result::Result<String, String> {
        let preview: String = sql.chars().take(100).collect();
        tracing::info!(sql = %preview, "mock database executing");

        let lowered = sql.to_lowercase();
        if lowered.contains("select") {
            if lowered.contains("count") {
                Ok("Query result: count = 1250".to_string())
            } else if lowered.contains("sum") {
                Ok("Query result: sum = 125000.00".to_string())
            } else {
                Ok("Query result:\n| id | name | value |\n|----|------|-------|\n| 1  | A    | 100   |\n| 2  | B    | 200   |\n| 3  | C    | 150   |\n(sample data, connect a real database)".to_string())
            }
        } else {
            Ok("Query executed (no rows returned)".to_string())
        }
    }
}

/// State of the SQL subgraph.
#[derive(Debug, Clone, Default)]
pub struct SqlState {
    /// Terminal assistant messages produced by the subgraph.
    pub messages: Vec<Message>,
    /// The question being answered.
    pub question: String,
    /// The last generated SQL.
    pub sql_query: String,
    /// The last execution result.
    pub query_result: String,
    /// Execution error from the previous attempt, if any.
    pub error: Option<String>,
    /// Number of generation attempts so far.
    pub trials: usize,
    /// Database schema shown to the generator.
    pub schema: String,
}

/// Partial update for [`SqlState`]. `error` uses a nested `Option` so nodes
/// can explicitly reset it to `None`.
#[derive(Debug, Clone, Default)]
pub struct SqlUpdate {
    pub messages: Vec<Message>,
    pub sql_query: Option<String>,
    pub query_result: Option<String>,
    pub error: Option<Option<String>>,
    pub trials: Option<usize>,
    pub schema: Option<String>,
}

impl GraphState for SqlState {
    type Update = SqlUpdate;

    fn apply(&mut self, mut update: SqlUpdate) {
        self.messages.append(&mut update.messages);
        if let Some(sql) = update.sql_query {
            self.sql_query = sql;
        }
        if let Some(result) = update.query_result {
            self.query_result = result;
        }
        if let Some(error) = update.error {
            self.error = error;
        }
        if let Some(trials) = update.trials {
            self.trials = trials;
        }
        if let Some(schema) = update.schema {
            self.schema = schema;
        }
    }
}

/// Strip Markdown fences a model may wrap around SQL.
fn strip_sql_fences(raw: &str) -> String {
    raw.replace("```sql", "").replace("```", "").trim().to_string()
}

/// Build the compiled SQL subgraph.
pub fn build_data_subgraph(
    factory: Arc<dyn ChatModelFactory>,
    prompts: Arc<PromptSource>,
    database: Arc<dyn Database>,
) -> agentgraph_core::Result<CompiledGraph<SqlState>> {
    let mut graph: StateGraph<SqlState> = StateGraph::new();

    // Generator: write (or rewrite) the SQL. A previous error is prepended
    // to the prompt so the model can correct itself.
    let gen_factory = factory.clone();
    let gen_prompts = prompts.clone();
    let gen_db = database.clone();
    graph.add_node("generate_sql", move |state: SqlState| {
        let factory = gen_factory.clone();
        let prompts = gen_prompts.clone();
        let database = gen_db.clone();
        async move {
            let schema = if state.schema.is_empty() {
                database.table_info()
            } else {
                state.schema.clone()
            };

            let error_hint = match &state.error {
                Some(error) => format!(
                    "\nThe previous attempt failed with: {}\nFix the SQL accordingly.",
                    error
                ),
                None => String::new(),
            };

            let system = prompts.get_or(
                "workers.data_team.generate_sql",
                "You are a SQL expert. Write one SQL query for the question below.\n\nSchema:\n{schema}\n{error_hint}",
                &[("schema", schema.as_str()), ("error_hint", error_hint.as_str())],
            );

            let model = factory
                .create(&UserContext::default(), 0.0)
                .map_err(|e| GraphError::Llm(e.to_string()))?;
            let response = model
                .chat(
                    ChatRequest::new(vec![
                        Message::system(system),
                        Message::human(state.question.clone()),
                    ])
                    .with_temperature(0.0),
                )
                .await?;

            let sql = strip_sql_fences(&response.message.content);
            let preview: String = sql.chars().take(100).collect();
            tracing::info!(sql = %preview, trial = state.trials + 1, "generated SQL");

            Ok(SqlUpdate {
                sql_query: Some(sql),
                trials: Some(state.trials + 1),
                error: Some(None),
                schema: Some(schema),
                ..Default::default()
            })
        }
    });

    // Executor: run the SQL. Failures are stored in the state, never raised.
    let exec_db = database.clone();
    graph.add_node("execute_sql", move |state: SqlState| {
        let database = exec_db.clone();
        async move {
            match database.run(&state.sql_query).await {
                Ok(result) => Ok(SqlUpdate {
                    query_result: Some(result),
                    error: Some(None),
                    ..Default::default()
                }),
                Err(error) => {
                    tracing::warn!(error = %error, "SQL execution failed");
                    Ok(SqlUpdate {
                        query_result: Some(String::new()),
                        error: Some(Some(error)),
                        ..Default::default()
                    })
                }
            }
        }
    });

    // Analyst: turn the query result into a human-readable conclusion.
    let analyze_factory = factory.clone();
    let analyze_prompts = prompts.clone();
    graph.add_node("analyze_data", move |state: SqlState| {
        let factory = analyze_factory.clone();
        let prompts = analyze_prompts.clone();
        async move {
            let system = prompts.get_or(
                "workers.data_team.analyze",
                "You are a professional data analyst. Answer the question using the query result.",
                &[],
            );
            let human = format!(
                "User question: {}\n\nQuery result:\n{}",
                state.question, state.query_result
            );

            let model = factory
                .create(&UserContext::default(), 0.3)
                .map_err(|e| GraphError::Llm(e.to_string()))?;
            let response = model
                .chat(
                    ChatRequest::new(vec![Message::system(system), Message::human(human)])
                        .with_temperature(0.3),
                )
                .await?;

            Ok(SqlUpdate {
                messages: vec![Message::assistant(response.message.content).with_name("DataTeam")],
                ..Default::default()
            })
        }
    });

    // Give up: structured failure report after exhausting retries.
    graph.add_node("give_up", move |state: SqlState| async move {
        let error = state.error.clone().unwrap_or_else(|| "unknown error".into());
        let content = format!(
            "## Database query failed\n\n\
             After {} attempts the query could not be executed.\n\n\
             ### Error\n{}\n\n\
             ### Possible causes\n\
             1. The query conditions violate a database constraint\n\
             2. A referenced table or column does not exist\n\
             3. Database connectivity problems\n\n\
             ### Suggestion\n\
             Check the wording of the question, or confirm the table \
             structure with the database administrator.",
            state.trials, error
        );

        tracing::warn!(trials = state.trials, error = %error, "data team giving up");

        Ok(SqlUpdate {
            messages: vec![Message::assistant(content).with_name("DataTeam")],
            ..Default::default()
        })
    });

    graph.add_edge(START, "generate_sql");
    graph.add_edge("generate_sql", "execute_sql");
    graph.add_conditional_edges(
        "execute_sql",
        |state: &SqlState| {
            if state.error.is_some() {
                if state.trials >= MAX_TRIALS {
                    "give_up".to_string()
                } else {
                    "retry".to_string()
                }
            } else {
                "success".to_string()
            }
        },
        HashMap::from([
            ("retry".to_string(), "generate_sql".to_string()),
            ("success".to_string(), "analyze_data".to_string()),
            ("give_up".to_string(), "give_up".to_string()),
        ]),
    );
    graph.add_edge("analyze_data", END);
    graph.add_edge("give_up", END);

    graph.compile()
}

/// The data-analysis team: SQL generation, execution and analysis behind a
/// single worker.
pub struct DataTeamWorker {
    subgraph: CompiledGraph<SqlState>,
}

impl DataTeamWorker {
    /// Build the worker and its subgraph.
    pub fn new(
        factory: Arc<dyn ChatModelFactory>,
        prompts: Arc<PromptSource>,
        database: Arc<dyn Database>,
    ) -> Result<Self> {
        let subgraph = build_data_subgraph(factory, prompts, database)?;
        Ok(Self { subgraph })
    }

    /// The subgraph's question: the original query plus the current step
    /// description, when one exists.
    fn subgraph_question(state: &SupervisorState) -> String {
        let mut question = query_for(state).unwrap_or_default();
        let hint = task_hint(state);
        if !hint.is_empty() {
            question = format!("{}\n\n{}", question, hint.trim_end());
        }
        question
    }
}

#[async_trait]
impl Worker for DataTeamWorker {
    fn name(&self) -> &str {
        "DataTeam"
    }

    fn description(&self) -> &str {
        "Data analysis team. Queries business databases (sales, orders, \
         inventory, users), executes SQL and analyzes the results. Note: \
         does NOT answer questions about the current date, time or weather - \
         route those to General."
    }

    fn priority(&self) -> i32 {
        15
    }

    fn worker_type(&self) -> WorkerType {
        WorkerType::Subgraph
    }

    async fn execute(&self, state: &SupervisorState) -> Result<StateUpdate> {
        tracing::info!(worker = self.name(), "running data subgraph");

        let input = SqlState {
            question: Self::subgraph_question(state),
            ..Default::default()
        };

        let result = match self.subgraph.invoke(input).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(worker = self.name(), error = %e, "subgraph failed");
                return Ok(error_response(self.name(), e.to_string(), state));
            }
        };

        let messages = if result.messages.is_empty() {
            vec![Message::assistant("Data analysis finished without a report.")
                .with_name(self.name())]
        } else {
            result.messages.clone()
        };
        let last_content = messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();

        let mut update = StateUpdate {
            messages,
            current_worker: Some(self.name().to_string()),
            ..Default::default()
        };

        // Mark the parent step from the subgraph outcome. The internal
        // retry count stays internal.
        if state.current_step().is_some() {
            let mut plan = state.task_plan.clone();
            let step = &mut plan[state.current_step_index];
            match &result.error {
                Some(error) => {
                    step.status = TaskStatus::Failed;
                    step.error = Some(error.clone());
                }
                None => {
                    step.status = TaskStatus::Completed;
                    step.result = Some(truncate_result(&last_content));
                }
            }
            update.task_plan = Some(plan);
            update.current_step_index = Some(state.current_step_index + 1);
        }

        Ok(update)
    }
}
