//! Built-in workers.
//!
//! Four LLM workers plus one subgraph worker:
//!
//! | Worker | Type | Priority | Temperature |
//! |--------|------|----------|-------------|
//! | [`DataTeamWorker`] | subgraph | 15 | per node |
//! | [`ResearcherWorker`] | llm_powered | 10 | 0.3 |
//! | [`DataAnalystWorker`] | llm_powered | 10 | 0.1 |
//! | [`WriterWorker`] | llm_powered | 5 | 0.7 |
//! | [`GeneralWorker`] | llm_powered | 1 | 0.5 |
//!
//! Descriptions are planner-facing: they are what steers the supervisor's
//! LLM toward (or away from) a worker, so they spell out responsibilities
//! and refusals in prose rather than code.

mod data_analyst;
mod data_team;
mod general;
mod researcher;
mod writer;

pub use data_analyst::DataAnalystWorker;
pub use data_team::{Database, DataTeamWorker, MockDatabase, SqlState, SqlUpdate};
pub use general::GeneralWorker;
pub use researcher::{ResearcherWorker, SearchTool};
pub use writer::WriterWorker;
