//! Run reports returned by the job runner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of one statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementReport {
    pub index: usize,
    pub iterative: bool,
    /// Executions sent to Neo4j; always 1 for single-run statements.
    pub batches: u32,
    /// Sum of `TotalCompleted` over all batches. For single-run statements,
    /// the `TotalCompleted` of the first row if the statement returns one.
    pub completed: Option<i64>,
    pub elapsed_ms: u64,
}

/// Outcome of a full job run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub job: String,
    pub short_name: Option<String>,
    pub digest: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub statements: Vec<StatementReport>,
}

impl RunSummary {
    pub fn total_batches(&self) -> u32 {
        self.statements.iter().map(|s| s.batches).sum()
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}
