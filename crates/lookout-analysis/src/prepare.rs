//! Parameter binding for job statements.

use lookout_core::params::{self, LIMIT_SIZE};
use lookout_core::{ExecutionMode, JobParameters, ParamValue, Statement};
use neo4rs::Query;

use crate::error::{AnalysisError, Result};

/// A statement with every placeholder resolved to a value.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedStatement {
    pub index: usize,
    pub cypher: String,
    pub mode: ExecutionMode,
    pub bindings: Vec<(String, ParamValue)>,
}

impl PreparedStatement {
    /// Value bound to `name`, if the statement uses it.
    pub fn binding(&self, name: &str) -> Option<&ParamValue> {
        self.bindings
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn to_query(&self) -> Query {
        self.bindings
            .iter()
            .fold(neo4rs::query(&self.cypher), |q, (name, value)| match value {
                ParamValue::Bool(b) => q.param(name, *b),
                ParamValue::Int(i) => q.param(name, *i),
                ParamValue::Float(f) => q.param(name, *f),
                ParamValue::Str(s) => q.param(name, s.clone()),
            })
    }
}

/// Bind the placeholders of statement `index`.
///
/// `$LIMIT_SIZE` takes the statement's batch size; every other placeholder
/// must be present in `params`, matched by exact name or else ignoring case.
/// Unused parameters are not bound.
pub fn prepare(
    index: usize,
    stmt: &Statement,
    params: &JobParameters,
) -> Result<PreparedStatement> {
    let mut bindings = Vec::new();

    for name in params::placeholders(&stmt.query) {
        let value = if name == LIMIT_SIZE {
            stmt.batch_size().map(|n| ParamValue::Int(i64::from(n.get())))
        } else {
            params.lookup(&name).cloned()
        };

        match value {
            Some(value) => bindings.push((name, value)),
            None => {
                return Err(AnalysisError::MissingParameter {
                    statement: index,
                    name,
                })
            }
        }
    }

    Ok(PreparedStatement {
        index,
        cypher: stmt.query.clone(),
        mode: stmt.mode,
        bindings,
    })
}
