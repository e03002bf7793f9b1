//! Sequential execution of analysis jobs.
//!
//! Statements run strictly in document order. Iterative statements are
//! paged: each batch binds `$LIMIT_SIZE` and reports how many nodes it
//! touched in `TotalCompleted`; paging stops at the first batch that
//! touches none.

use std::future::Future;
use std::time::{Duration, Instant};

use chrono::Utc;
use lookout_core::config::RunnerConfig;
use lookout_core::job::TOTAL_COMPLETED;
use lookout_core::params::LIMIT_SIZE;
use lookout_core::{ExecutionMode, Job, JobParameters};
use lookout_graph::{GraphClient, GraphError};
use uuid::Uuid;

use crate::error::{AnalysisError, Result};
use crate::prepare::{prepare, PreparedStatement};
use crate::types::{RunSummary, StatementReport};

/// Executes jobs against the asset graph.
pub struct JobRunner {
    client: GraphClient,
    config: RunnerConfig,
}

impl JobRunner {
    pub fn new(client: GraphClient, config: RunnerConfig) -> Self {
        Self { client, config }
    }

    /// Run every statement of `job` in order.
    ///
    /// `params` are layered over the configured default parameters. All
    /// statements are bound before the first one executes, so a missing
    /// parameter never leaves the graph half-updated.
    pub async fn run_job(&self, job: &Job, params: &JobParameters) -> Result<RunSummary> {
        job.validate()?;
        let params = self.config.parameters.clone().merged(params);
        params.validate()?;

        let prepared = job
            .statements
            .iter()
            .enumerate()
            .map(|(i, stmt)| prepare(i, stmt, &params))
            .collect::<Result<Vec<_>>>()?;

        let run_id = Uuid::new_v4();
        let digest = job.digest()?;
        let started_at = Utc::now();
        tracing::info!(
            %run_id,
            job = %job.label(),
            digest = %digest,
            statements = prepared.len(),
            parameters = ?params.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            "Starting analysis job"
        );

        let mut reports = Vec::with_capacity(prepared.len());
        for stmt in &prepared {
            let report = self.run_statement(job.label(), stmt).await?;
            tracing::info!(
                %run_id,
                job = %job.label(),
                index = report.index,
                batches = report.batches,
                completed = ?report.completed,
                elapsed_ms = report.elapsed_ms,
                "Statement complete"
            );
            reports.push(report);
        }

        let summary = RunSummary {
            run_id,
            job: job.name.clone(),
            short_name: job.short_name.clone(),
            digest,
            started_at,
            finished_at: Utc::now(),
            statements: reports,
        };
        tracing::info!(
            %run_id,
            job = %job.label(),
            batches = summary.total_batches(),
            duration_ms = summary.duration_ms(),
            "Analysis job complete"
        );
        Ok(summary)
    }

    async fn run_statement(&self, job: &str, stmt: &PreparedStatement) -> Result<StatementReport> {
        let start = Instant::now();
        let failed = |source: GraphError| AnalysisError::StatementFailed {
            job: job.to_string(),
            index: stmt.index,
            source,
        };

        let (iterative, batches, completed) = match stmt.mode {
            ExecutionMode::Once => {
                let rows = self
                    .client
                    .query_rows(stmt.to_query())
                    .await
                    .map_err(failed)?;
                let completed = rows
                    .first()
                    .and_then(|row| row.get::<i64>(TOTAL_COMPLETED).ok());
                (false, 1, completed)
            }
            ExecutionMode::Iterative { .. } => {
                let limit = stmt.binding(LIMIT_SIZE);
                let paging = page_until_done(self.config.max_iterations, |batch| {
                    tracing::debug!(job, index = stmt.index, batch, limit = ?limit, "Running batch");
                    self.client.query_count(stmt.to_query(), TOTAL_COMPLETED)
                })
                .await
                .map_err(failed)?;

                if !paging.finished {
                    return Err(AnalysisError::IterationLimit {
                        job: job.to_string(),
                        index: stmt.index,
                        limit: paging.batches,
                    });
                }
                (true, paging.batches, Some(paging.completed))
            }
        };

        Ok(StatementReport {
            index: stmt.index,
            iterative,
            batches,
            completed,
            elapsed_ms: millis(start.elapsed()),
        })
    }
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Progress of an iterative statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub batches: u32,
    pub completed: i64,
    /// A batch reported no work before the batch limit was reached.
    pub finished: bool,
}

/// Call `batch` until it reports zero completed work (or no row), at most
/// `max_batches` times. `batch` receives the 1-based batch number.
pub async fn page_until_done<F, Fut>(
    max_batches: u32,
    mut batch: F,
) -> std::result::Result<Paging, GraphError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<Option<i64>, GraphError>>,
{
    let max_batches = max_batches.max(1);
    let mut paging = Paging {
        batches: 0,
        completed: 0,
        finished: false,
    };

    while paging.batches < max_batches {
        paging.batches += 1;
        let done = batch(paging.batches).await?.unwrap_or(0);
        if done <= 0 {
            paging.finished = true;
            break;
        }
        paging.completed += done;
    }

    Ok(paging)
}
