//! Job documents compiled into the binary.

use crate::error::{LookoutError, Result};
use crate::job::Job;

/// Clears and recomputes `exposed_internet` on EC2 instances, load
/// balancers, and auto scaling groups.
pub const AWS_EC2_ASSET_EXPOSURE: &str = "aws_ec2_asset_exposure";

const REGISTRY: &[(&str, &str)] = &[(
    AWS_EC2_ASSET_EXPOSURE,
    include_str!("../jobs/aws_ec2_asset_exposure.json"),
)];

/// Short names of every built-in job, in registry order.
pub fn builtin_jobs() -> Vec<&'static str> {
    REGISTRY.iter().map(|(name, _)| *name).collect()
}

/// Raw document text of a built-in job.
pub fn builtin_source(short_name: &str) -> Option<&'static str> {
    REGISTRY
        .iter()
        .find(|(name, _)| *name == short_name)
        .map(|(_, text)| *text)
}

/// Parse and validate a built-in job.
pub fn load_builtin(short_name: &str) -> Result<Job> {
    let text =
        builtin_source(short_name).ok_or_else(|| LookoutError::UnknownJob(short_name.to_string()))?;
    let mut job = Job::from_json(text)?;
    job.short_name = Some(short_name.to_string());
    Ok(job)
}
