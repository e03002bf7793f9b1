//! lookout-core: Job model, validation, and configuration for Lookout.
//!
//! This crate provides the pieces shared by every Lookout component:
//! - Job and statement types for analysis job documents
//! - Parameter placeholder scanning and job parameter values
//! - Built-in job documents compiled into the binary
//! - Configuration management
//! - Common error types

pub mod builtin;
pub mod config;
pub mod error;
pub mod job;
pub mod params;

pub use error::LookoutError;
pub use job::{ExecutionMode, Job, Statement};
pub use params::{JobParameters, ParamValue};
