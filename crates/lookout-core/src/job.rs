//! Analysis job documents.
//!
//! A job is a named, ordered list of Cypher statements. Statements run in
//! document order: later statements read flags written by earlier ones, so
//! the order is preserved exactly through load and serialize.

use std::num::NonZeroU32;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LookoutError, Result};
use crate::params::{self, LIMIT_SIZE};

/// Column every iterative statement returns with the number of nodes a
/// batch touched. Paging stops once it reports zero.
pub const TOTAL_COMPLETED: &str = "TotalCompleted";

/// How a statement is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Run once over the full match set.
    Once,
    /// Run repeatedly, `batch_size` matches at a time, until a batch
    /// completes nothing.
    Iterative { batch_size: NonZeroU32 },
}

/// One query descriptor in a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawStatement", into = "RawStatement")]
pub struct Statement {
    pub query: String,
    pub mode: ExecutionMode,
}

impl Statement {
    pub fn once(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            mode: ExecutionMode::Once,
        }
    }

    pub fn iterative(query: impl Into<String>, batch_size: NonZeroU32) -> Self {
        Self {
            query: query.into(),
            mode: ExecutionMode::Iterative { batch_size },
        }
    }

    pub fn is_iterative(&self) -> bool {
        matches!(self.mode, ExecutionMode::Iterative { .. })
    }

    pub fn batch_size(&self) -> Option<NonZeroU32> {
        match self.mode {
            ExecutionMode::Once => None,
            ExecutionMode::Iterative { batch_size } => Some(batch_size),
        }
    }
}

/// On-disk shape of a statement.
#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStatement {
    query: String,
    iterative: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iterationsize: Option<u64>,
}

impl TryFrom<RawStatement> for Statement {
    type Error = LookoutError;

    fn try_from(raw: RawStatement) -> Result<Self> {
        let mode = match (raw.iterative, raw.iterationsize) {
            (false, None) => ExecutionMode::Once,
            (false, Some(_)) => {
                return Err(LookoutError::InvalidJob {
                    reason: "non-iterative statement must not set iterationsize".to_string(),
                })
            }
            (true, None) => {
                return Err(LookoutError::InvalidJob {
                    reason: "iterative statement requires iterationsize".to_string(),
                })
            }
            (true, Some(n)) => {
                let batch_size = u32::try_from(n)
                    .ok()
                    .and_then(NonZeroU32::new)
                    .ok_or_else(|| LookoutError::InvalidJob {
                        reason: format!(
                            "iterationsize must be between 1 and {}, got {n}",
                            u32::MAX
                        ),
                    })?;
                ExecutionMode::Iterative { batch_size }
            }
        };
        Ok(Self {
            query: raw.query,
            mode,
        })
    }
}

impl From<Statement> for RawStatement {
    fn from(stmt: Statement) -> Self {
        let (iterative, iterationsize) = match stmt.mode {
            ExecutionMode::Once => (false, None),
            ExecutionMode::Iterative { batch_size } => (true, Some(u64::from(batch_size.get()))),
        };
        Self {
            query: stmt.query,
            iterative,
            iterationsize,
        }
    }
}

/// A named, ordered sequence of statements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub statements: Vec<Statement>,
    pub name: String,
    /// File stem or registry key the job was loaded under.
    #[serde(skip)]
    pub short_name: Option<String>,
}

impl Job {
    /// Parse and validate a job document.
    pub fn from_json(text: &str) -> Result<Self> {
        let job: Job = serde_json::from_str(text)?;
        job.validate()?;
        Ok(job)
    }

    /// Load a job document from disk. The file stem becomes the short name.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut job = Self::from_json(&text)?;
        job.short_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned());
        tracing::debug!(path = %path.display(), job = %job.name, "Loaded job document");
        Ok(job)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Label used in logs: the short name when known, else the job name.
    pub fn label(&self) -> &str {
        self.short_name.as_deref().unwrap_or(&self.name)
    }

    /// Check the rules that span fields or depend on query text.
    ///
    /// `iterationsize` presence is enforced during deserialization; this
    /// covers placeholder usage and the `TotalCompleted` contract.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(LookoutError::InvalidJob {
                reason: "job name is empty".to_string(),
            });
        }
        if self.statements.is_empty() {
            return Err(LookoutError::InvalidJob {
                reason: format!("job {:?} has no statements", self.name),
            });
        }

        for (index, stmt) in self.statements.iter().enumerate() {
            let invalid = |reason: &str| LookoutError::InvalidStatement {
                index,
                reason: reason.to_string(),
            };

            if stmt.query.trim().is_empty() {
                return Err(invalid("query is empty"));
            }

            let uses_limit = params::references(&stmt.query, LIMIT_SIZE);
            match stmt.mode {
                ExecutionMode::Once if uses_limit => {
                    return Err(invalid(
                        "$LIMIT_SIZE is only bound for iterative statements",
                    ));
                }
                ExecutionMode::Iterative { .. } if !uses_limit => {
                    return Err(invalid(
                        "iterative statement must bound each batch with $LIMIT_SIZE",
                    ));
                }
                ExecutionMode::Iterative { .. }
                    if !params::returns_column(&stmt.query, TOTAL_COMPLETED) =>
                {
                    return Err(invalid(
                        "iterative statement must return a TotalCompleted count",
                    ));
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Parameters a caller must supply, excluding `LIMIT_SIZE`.
    pub fn parameters(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .statements
            .iter()
            .flat_map(|s| params::placeholders(&s.query))
            .filter(|p| p != LIMIT_SIZE)
            .collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn iterative_count(&self) -> usize {
        self.statements.iter().filter(|s| s.is_iterative()).count()
    }

    /// BLAKE3 hex digest of the job's canonical JSON.
    pub fn digest(&self) -> Result<String> {
        let json = serde_json::to_vec(self)?;
        Ok(blake3::hash(&json).to_hex().to_string())
    }
}
