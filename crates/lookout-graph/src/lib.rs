//! Lookout Graph — Neo4j client for analysis jobs.
//!
//! Every statement an analysis job sends to the asset graph goes through the
//! [`GraphClient`] defined here, so connection pooling and error mapping live
//! in one place.

pub mod client;

pub use client::{GraphClient, GraphConfig, GraphError};
