//! Prompt templates: a read-mostly hierarchical namespace.
//!
//! Prompts live in a YAML tree and are addressed with dot paths
//! (`supervisor.planning`, `workers.researcher.system`). Lookup supports:
//!
//! - `{name}` template variables, substituted by name; variables the caller
//!   does not provide stay literal in the output,
//! - `@path.to.prompt` references to other prompts, resolved recursively
//!   with a hard depth cap (a circular reference is logged and left
//!   literal),
//! - a caller-provided default for missing paths.
//!
//! Reloads are atomic: a reload publishes a new immutable tree, and a
//! [`PromptSnapshot`] taken before the reload keeps serving the old tree.
//! Callers take one snapshot per request.

use std::path::Path;
use std::sync::Arc;
use std::sync::OnceLock;

use parking_lot::RwLock;
use regex::Regex;
use serde_yaml::Value as YamlValue;

use crate::error::{Result, SupervisorError};

/// Maximum `@reference` resolution depth before assuming a cycle.
const MAX_REF_DEPTH: usize = 10;

fn ref_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"@([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)")
            .expect("reference pattern is valid")
    })
}

fn var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("variable pattern is valid")
    })
}

/// Immutable view of the prompt tree, valid for one request.
#[derive(Clone)]
pub struct PromptSnapshot {
    tree: Arc<YamlValue>,
}

impl PromptSnapshot {
    /// Look up `path`, returning `None` when missing or not a string.
    pub fn get(&self, path: &str, vars: &[(&str, &str)]) -> Option<String> {
        let raw = lookup(&self.tree, path)?;
        let resolved = self.resolve_references(raw, MAX_REF_DEPTH);
        Some(substitute(&resolved, vars))
    }

    /// Look up `path`, falling back to `default` when missing.
    pub fn get_or(&self, path: &str, default: &str, vars: &[(&str, &str)]) -> String {
        match self.get(path, vars) {
            Some(value) => value,
            None => substitute(default, vars),
        }
    }

    fn resolve_references(&self, value: &str, depth: usize) -> String {
        if !value.contains('@') {
            return value.to_string();
        }
        if depth == 0 {
            tracing::warn!("prompt reference depth exceeded, possible cycle");
            return value.to_string();
        }

        ref_pattern()
            .replace_all(value, |caps: &regex::Captures<'_>| {
                let path = &caps[1];
                match lookup(&self.tree, path) {
                    Some(referenced) => self.resolve_references(referenced, depth - 1),
                    None => {
                        tracing::warn!(path, "prompt reference not found");
                        caps[0].to_string()
                    }
                }
            })
            .into_owned()
    }
}

/// Thread-safe prompt store with atomic reload.
pub struct PromptSource {
    tree: RwLock<Arc<YamlValue>>,
}

impl PromptSource {
    /// Build from a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let tree = parse_tree(yaml)?;
        Ok(Self {
            tree: RwLock::new(Arc::new(tree)),
        })
    }

    /// Build from a directory of YAML files. Each file contributes a
    /// namespace named after its stem (`supervisor.yaml` → `supervisor.*`);
    /// one level of subdirectories nests the same way
    /// (`workers/writer.yaml` → `workers.writer.*`).
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let tree = load_dir(dir)?;
        Ok(Self {
            tree: RwLock::new(Arc::new(tree)),
        })
    }

    /// The built-in prompt tree.
    pub fn with_defaults() -> Self {
        Self::from_yaml(DEFAULT_PROMPTS).unwrap_or_else(|_| Self {
            tree: RwLock::new(Arc::new(YamlValue::Null)),
        })
    }

    /// Replace the tree from a YAML document. In-flight snapshots are
    /// unaffected.
    pub fn reload_from_yaml(&self, yaml: &str) -> Result<()> {
        let tree = parse_tree(yaml)?;
        *self.tree.write() = Arc::new(tree);
        tracing::info!("prompt tree reloaded");
        Ok(())
    }

    /// Replace the tree from a directory. In-flight snapshots are
    /// unaffected.
    pub fn reload_from_dir(&self, dir: &Path) -> Result<()> {
        let tree = load_dir(dir)?;
        *self.tree.write() = Arc::new(tree);
        tracing::info!(dir = %dir.display(), "prompt tree reloaded");
        Ok(())
    }

    /// Take an immutable snapshot for one request.
    pub fn snapshot(&self) -> PromptSnapshot {
        PromptSnapshot {
            tree: self.tree.read().clone(),
        }
    }

    /// Convenience lookup against a fresh snapshot.
    pub fn get(&self, path: &str, vars: &[(&str, &str)]) -> Option<String> {
        self.snapshot().get(path, vars)
    }

    /// Convenience lookup with default against a fresh snapshot.
    pub fn get_or(&self, path: &str, default: &str, vars: &[(&str, &str)]) -> String {
        self.snapshot().get_or(path, default, vars)
    }
}

fn parse_tree(yaml: &str) -> Result<YamlValue> {
    serde_yaml::from_str(yaml)
        .map_err(|e| SupervisorError::Validation(format!("invalid prompt YAML: {}", e)))
}

fn load_dir(dir: &Path) -> Result<YamlValue> {
    let mut root = serde_yaml::Mapping::new();

    let entries = std::fs::read_dir(dir)
        .map_err(|e| SupervisorError::Validation(format!("prompt dir {}: {}", dir.display(), e)))?;

    for entry in entries.flatten() {
        let path = entry.path();
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()).map(String::from) else {
            continue;
        };

        if path.is_dir() {
            let nested = load_dir(&path)?;
            root.insert(YamlValue::String(stem), nested);
        } else if path.extension().and_then(|e| e.to_str()) == Some("yaml") {
            let text = std::fs::read_to_string(&path).map_err(|e| {
                SupervisorError::Validation(format!("prompt file {}: {}", path.display(), e))
            })?;
            root.insert(YamlValue::String(stem), parse_tree(&text)?);
        }
    }

    Ok(YamlValue::Mapping(root))
}

fn lookup<'a>(tree: &'a YamlValue, path: &str) -> Option<&'a str> {
    let mut node = tree;
    for segment in path.split('.') {
        node = node.get(segment)?;
    }
    node.as_str()
}

fn substitute(template: &str, vars: &[(&str, &str)]) -> String {
    if vars.is_empty() || !template.contains('{') {
        return template.to_string();
    }

    var_pattern()
        .replace_all(template, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
                // Unknown variables stay literal.
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Built-in prompt tree. Deployments override it with `from_yaml`/`from_dir`.
const DEFAULT_PROMPTS: &str = r#"
supervisor:
  planning: |
    You are the supervisor of a team of specialist workers. Analyze the
    user's request and break it into an ordered execution plan.

    Available workers:
    {worker_list}

    Produce at most {max_steps} steps. Each step names exactly one worker
    and describes what it must accomplish. Prefer the fewest steps that
    fully satisfy the request.
  planning_complete: |
    Analyze the conversation and return the plan as JSON:
    {"steps": [{"worker": "worker name", "description": "task description"}], "reasoning": "why this plan"}
  routing: |
    You are the supervisor coordinating these workers:
    {worker_list}

    Current task plan:
    {task_plan}

    Progress: {completed_steps} of {total_steps} steps done.
    Valid options: {worker_options}, or FINISH when the task is complete.
  routing_decision: |
    Based on the conversation and progress above, decide the next move.
    Return JSON: {"next": "worker name or FINISH", "reasoning": "why", "should_replan": false}
workers:
  researcher:
    system: |
      You are a research specialist. Synthesize the search results below
      into an accurate, well-sourced answer. Cite concrete facts and note
      uncertainty where the sources disagree.
    human: |
      {task_hint}Question: {query}

      Search results:
      {search_results}
  data_analyst:
    system: |
      You are a data analysis specialist. Answer with clear, quantified
      findings and call out the assumptions behind them.
    human: |
      {task_hint}Question: {query}
  writer:
    system: |
      You are a writing specialist. Consolidate the team's findings into a
      single, well-structured Markdown answer in {language}. Merge
      overlapping points and keep the user's original question in focus.
    human: |
      {task_hint}Original question: {query}

      Team findings:
      {context}
  general:
    system: |
      You are a helpful general assistant. Answer in {language}. Use the
      available tools when the question needs live information such as the
      current date or time.
    system_with_datetime: |
      You are a helpful general assistant. Answer in {language}.
      Current time information: {datetime_info}
    default_greeting: |
      Hello! How can I help you today?
  data_team:
    generate_sql: |
      You are a SQL expert. Write one SQL query for the question below.

      Schema:
      {schema}

      Rules:
      1. Return only the SQL statement, no Markdown fences.
      2. Use standard SQL syntax.
      3. The statement must be directly executable.
      {error_hint}
    analyze: |
      You are a professional data analyst. Using the query result below,
      answer the user's question with:

      ## Data
      A brief statement of what the query returned.

      ## Conclusion
      The analysis grounded in that data.

      ## Recommendation
      A data-backed suggestion, when one applies.
"#;
