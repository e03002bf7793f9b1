//! lookout-analysis: Runs analysis jobs against the Lookout asset graph.
//!
//! Loads a job document, binds `$LIMIT_SIZE` and job parameters for each
//! statement, and executes the statements in order through the shared
//! Neo4j client, paging iterative statements in bounded batches.

pub mod error;
pub mod prepare;
pub mod runner;
pub mod types;

pub use error::AnalysisError;
pub use runner::JobRunner;
pub use types::{RunSummary, StatementReport};

use std::path::Path;

use lookout_core::{builtin, Job, LookoutError};

/// Resolve a job by built-in short name, or by path to a JSON document.
pub fn resolve_job(spec: &str) -> error::Result<Job> {
    if builtin::builtin_source(spec).is_some() {
        return Ok(builtin::load_builtin(spec)?);
    }
    let path = Path::new(spec);
    if path.exists() || path.extension().is_some_and(|ext| ext == "json") {
        return Ok(Job::from_json_file(path)?);
    }
    Err(LookoutError::UnknownJob(spec.to_string()).into())
}
