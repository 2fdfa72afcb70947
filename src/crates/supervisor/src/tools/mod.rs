//! Tool schemas and executors.
//!
//! The [`ToolSource`] is a read-mostly registry pairing tool schemas (the
//! JSON-Schema-shaped "function" contract from `agentgraph-core`) with
//! executors. Workers bind schemas to their chat requests and run the
//! executors for any tool calls the model returns.

pub mod fallback;

use std::collections::HashMap;
use std::sync::Arc;

use agentgraph_core::llm::ToolDefinition;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::{json, Value as JsonValue};

use crate::error::{Result, SupervisorError};

/// Executes one tool. Implementations must be cheap to call repeatedly;
/// expensive setup belongs in the constructor.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Synchronous execution.
    fn invoke(&self, params: &JsonValue) -> Result<String>;

    /// Asynchronous execution; defaults to the synchronous path.
    async fn ainvoke(&self, params: &JsonValue) -> Result<String> {
        self.invoke(params)
    }
}

/// Registry of tool schemas and executors, plus per-worker tool lists.
///
/// Read-mostly, single-writer: registrations happen at startup, lookups on
/// every request. Callers must not assume contents are stable across
/// invocations, only within one.
#[derive(Default)]
pub struct ToolSource {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    schemas: HashMap<String, ToolDefinition>,
    executors: HashMap<String, Arc<dyn ToolExecutor>>,
    worker_tools: HashMap<String, Vec<String>>,
}

impl ToolSource {
    /// An empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// A source with the built-in tools registered
    /// (`get_current_datetime`).
    pub fn with_builtins() -> Self {
        let source = Self::new();
        source.register(
            datetime_tool_schema(),
            Arc::new(DatetimeTool::default()),
        );
        source
    }

    /// Register a tool (schema + executor). Re-registering a name replaces
    /// both.
    pub fn register(&self, schema: ToolDefinition, executor: Arc<dyn ToolExecutor>) {
        let mut inner = self.inner.write();
        tracing::debug!(tool = %schema.name, "registered tool");
        inner.executors.insert(schema.name.clone(), executor);
        inner.schemas.insert(schema.name.clone(), schema);
    }

    /// Assign a tool list to a worker name.
    pub fn assign_to_worker(&self, worker: impl Into<String>, tools: Vec<String>) {
        self.inner.write().worker_tools.insert(worker.into(), tools);
    }

    /// The schema for `name`, if registered.
    pub fn get_schema(&self, name: &str) -> Option<ToolDefinition> {
        self.inner.read().schemas.get(name).cloned()
    }

    /// The executor for `name`, if registered.
    pub fn get_executor(&self, name: &str) -> Option<Arc<dyn ToolExecutor>> {
        self.inner.read().executors.get(name).cloned()
    }

    /// Schemas for the given names; unknown names are skipped.
    pub fn schemas_for(&self, names: &[&str]) -> Vec<ToolDefinition> {
        let inner = self.inner.read();
        names
            .iter()
            .filter_map(|name| inner.schemas.get(*name).cloned())
            .collect()
    }

    /// Schemas assigned to a worker.
    pub fn tools_for_worker(&self, worker: &str) -> Vec<ToolDefinition> {
        let inner = self.inner.read();
        inner
            .worker_tools
            .get(worker)
            .map(|names| {
                names
                    .iter()
                    .filter_map(|name| inner.schemas.get(name).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Schema for the built-in datetime tool.
pub fn datetime_tool_schema() -> ToolDefinition {
    ToolDefinition::new(
        "get_current_datetime",
        "Get the current date, time and weekday for a timezone. Use this for any question about the current date or time.",
    )
    .with_parameters(json!({
        "type": "object",
        "properties": {
            "timezone": {
                "type": "string",
                "description": "IANA timezone name, e.g. 'Asia/Shanghai'"
            }
        },
        "required": []
    }))
}

/// Built-in executor returning the current date/time in a timezone.
pub struct DatetimeTool {
    default_timezone: String,
}

impl Default for DatetimeTool {
    fn default() -> Self {
        Self {
            default_timezone: "Asia/Shanghai".to_string(),
        }
    }
}

impl DatetimeTool {
    /// Executor with a custom default timezone.
    pub fn new(default_timezone: impl Into<String>) -> Self {
        Self {
            default_timezone: default_timezone.into(),
        }
    }

    /// Human-readable current date/time for `timezone`.
    pub fn now_in(timezone: &str) -> Result<String> {
        let tz: chrono_tz::Tz = timezone.parse().map_err(|_| {
            SupervisorError::Validation(format!("unknown timezone '{}'", timezone))
        })?;
        let local = Utc::now().with_timezone(&tz);
        Ok(format!(
            "{} {} {} ({})",
            local.format("%Y-%m-%d"),
            local.format("%A"),
            local.format("%H:%M:%S"),
            tz.name()
        ))
    }
}

#[async_trait]
impl ToolExecutor for DatetimeTool {
    fn invoke(&self, params: &JsonValue) -> Result<String> {
        let timezone = params
            .get("timezone")
            .and_then(|v| v.as_str())
            .unwrap_or(&self.default_timezone);
        Self::now_in(timezone)
    }
}
