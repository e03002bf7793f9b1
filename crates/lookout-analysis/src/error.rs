//! Error types for the lookout-analysis crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error(transparent)]
    Job(#[from] lookout_core::LookoutError),

    #[error("Graph error: {0}")]
    Graph(#[from] lookout_graph::GraphError),

    #[error("Statement #{statement} needs parameter ${name}, which was not supplied")]
    MissingParameter { statement: usize, name: String },

    #[error("Job {job} failed at statement #{index}: {source}")]
    StatementFailed {
        job: String,
        index: usize,
        #[source]
        source: lookout_graph::GraphError,
    },

    #[error("Job {job} statement #{index} still completing work after {limit} batches")]
    IterationLimit {
        job: String,
        index: usize,
        limit: u32,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
