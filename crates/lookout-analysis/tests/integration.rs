//! Integration tests for the job runner against a live Neo4j instance.
//!
//! Run with: cargo test --package lookout-analysis --test integration -- --ignored
//!
//! Skipped automatically if Neo4j is not available.

use std::collections::HashMap;
use std::num::NonZeroU32;

use lookout_analysis::{AnalysisError, JobRunner};
use lookout_core::builtin::{load_builtin, AWS_EC2_ASSET_EXPOSURE};
use lookout_core::config::RunnerConfig;
use lookout_core::{Job, JobParameters, ParamValue, Statement};
use lookout_graph::{GraphClient, GraphConfig};

async fn connect_or_skip() -> Option<GraphClient> {
    let config = GraphConfig::default();
    match GraphClient::connect(&config).await {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("Skipping integration test (Neo4j not available): {e}");
            None
        }
    }
}

fn unique_prefix() -> String {
    format!("{}:", uuid::Uuid::new_v4())
}

async fn cleanup(client: &GraphClient, prefix: &str) {
    let q = neo4rs::query("MATCH (n) WHERE n.id STARTS WITH $prefix DETACH DELETE n")
        .param("prefix", prefix.to_string());
    let _ = client.run(q).await;
}

/// One open security group, reached directly, through a network interface,
/// through an internet-facing ELB, and through an internet-facing ALB with a
/// listener. A second ALB has no listener. One closed group carries a stale
/// flag. The `asg` group mixes `elb` and `direct`+`elbv2` instances.
async fn seed_exposure_graph(client: &GraphClient, prefix: &str) {
    let q = neo4rs::query(
        "MERGE (ip:IpRange {id: '0.0.0.0/0'})
         CREATE (perm:IpPermissionInbound {id: $p + 'perm'})
         CREATE (ip)-[:MEMBER_OF_IP_RULE]->(perm)
         CREATE (open:EC2SecurityGroup {id: $p + 'sg-open'})
         CREATE (perm)-[:MEMBER_OF_EC2_SECURITY_GROUP]->(open)
         CREATE (closed:EC2SecurityGroup {id: $p + 'sg-closed'})
         CREATE (direct:EC2Instance {id: $p + 'i-direct'})
         CREATE (direct)-[:MEMBER_OF_EC2_SECURITY_GROUP]->(open)
         CREATE (eni_host:EC2Instance {id: $p + 'i-eni'})
         CREATE (eni:NetworkInterface {id: $p + 'eni'})
         CREATE (eni_host)-[:NETWORK_INTERFACE]->(eni)
         CREATE (eni)-[:MEMBER_OF_EC2_SECURITY_GROUP]->(open)
         CREATE (private:EC2Instance {id: $p + 'i-private',
                 exposed_internet: true, exposed_internet_type: ['direct']})
         CREATE (private)-[:MEMBER_OF_EC2_SECURITY_GROUP]->(closed)
         CREATE (elb:LoadBalancer {id: $p + 'elb', scheme: 'internet-facing'})
         CREATE (elb)-[:SOURCE_SECURITY_GROUP]->(open)
         CREATE (behind:EC2Instance {id: $p + 'i-elb'})
         CREATE (elb)-[:EXPOSE]->(behind)
         CREATE (asg:AutoScalingGroup {id: $p + 'asg'})
         CREATE (behind)-[:MEMBER_AUTO_SCALE_GROUP]->(asg)
         CREATE (quiet:AutoScalingGroup {id: $p + 'asg-private',
                 exposed_internet: true, exposed_internet_type: ['direct']})
         CREATE (private)-[:MEMBER_AUTO_SCALE_GROUP]->(quiet)
         CREATE (alb:LoadBalancerV2 {id: $p + 'alb', scheme: 'internet-facing'})
         CREATE (alb)-[:MEMBER_OF_EC2_SECURITY_GROUP]->(open)
         CREATE (alb)-[:ELBV2_LISTENER]->(:ELBV2Listener {id: $p + 'alb-listener'})
         CREATE (both:EC2Instance {id: $p + 'i-both'})
         CREATE (both)-[:MEMBER_OF_EC2_SECURITY_GROUP]->(open)
         CREATE (alb)-[:EXPOSE]->(both)
         CREATE (both)-[:MEMBER_AUTO_SCALE_GROUP]->(asg)
         CREATE (silent:LoadBalancerV2 {id: $p + 'alb-nolistener', scheme: 'internet-facing'})
         CREATE (silent)-[:MEMBER_OF_EC2_SECURITY_GROUP]->(open)
         CREATE (unheard:EC2Instance {id: $p + 'i-nolistener'})
         CREATE (silent)-[:EXPOSE]->(unheard)",
    )
    .param("p", prefix.to_string());
    client.run(q).await.unwrap();
}

async fn exposure_flags(client: &GraphClient, prefix: &str) -> HashMap<String, (bool, Vec<String>)> {
    let q = neo4rs::query(
        "MATCH (n) WHERE n.id STARTS WITH $prefix
         RETURN n.id AS id,
                coalesce(n.exposed_internet, false) AS exposed,
                coalesce(n.exposed_internet_type, []) AS types",
    )
    .param("prefix", prefix.to_string());

    let rows = client.query_rows(q).await.unwrap();
    rows.into_iter()
        .map(|row| {
            let id: String = row.get("id").unwrap();
            let exposed: bool = row.get("exposed").unwrap();
            let types: Vec<String> = row.get("types").unwrap();
            (id.trim_start_matches(prefix).to_string(), (exposed, types))
        })
        .collect()
}

async fn seed_scratch(client: &GraphClient, prefix: &str, count: i64) {
    let q = neo4rs::query(
        "UNWIND range(1, $count) AS i
         CREATE (:LookoutScratch {id: $p + toString(i), run: $p})",
    )
    .param("p", prefix.to_string())
    .param("count", count);
    client.run(q).await.unwrap();
}

fn scratch_delete_job(batch_size: u32) -> Job {
    Job {
        statements: vec![Statement::iterative(
            "MATCH (n:LookoutScratch) WHERE n.run = $RUN
             WITH n LIMIT $LIMIT_SIZE DETACH DELETE n
             RETURN count(*) AS TotalCompleted",
            NonZeroU32::new(batch_size).unwrap(),
        )],
        name: "Scratch cleanup".to_string(),
        short_name: None,
    }
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn test_exposure_job_flags_reachable_assets() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    let prefix = unique_prefix();
    seed_exposure_graph(&client, &prefix).await;

    let job = load_builtin(AWS_EC2_ASSET_EXPOSURE).unwrap();
    let runner = JobRunner::new(client.clone(), RunnerConfig::default());
    let summary = runner.run_job(&job, &JobParameters::new()).await.unwrap();

    assert_eq!(summary.statements.len(), job.statements.len());
    assert!(summary.statements[0].iterative);
    assert!(summary.statements[0].completed.unwrap_or(0) >= 2);

    let flags = exposure_flags(&client, &prefix).await;
    let direct = vec!["direct".to_string()];
    let elb = vec!["elb".to_string()];
    assert_eq!(flags["i-direct"], (true, direct.clone()));
    assert_eq!(flags["i-eni"], (true, direct));
    assert_eq!(flags["elb"], (true, elb.clone()));
    assert_eq!(flags["i-elb"], (true, elb));
    assert_eq!(flags["i-private"], (false, vec![]));
    assert_eq!(flags["asg-private"], (false, vec![]));

    // Types from several mechanisms accumulate on one instance.
    assert_eq!(flags["alb"], (true, vec!["elbv2".to_string()]));
    assert_eq!(
        flags["i-both"],
        (true, vec!["direct".to_string(), "elbv2".to_string()])
    );

    // An ALB without a listener exposes nothing.
    assert_eq!(flags["alb-nolistener"], (false, vec![]));
    assert_eq!(flags["i-nolistener"], (false, vec![]));

    // The group merges its instances' types without duplicates.
    let (asg_exposed, mut asg_types) = flags["asg"].clone();
    asg_types.sort();
    assert!(asg_exposed);
    assert_eq!(asg_types, vec!["direct", "elb", "elbv2"]);

    // A second run recomputes the same flags.
    runner.run_job(&job, &JobParameters::new()).await.unwrap();
    assert_eq!(exposure_flags(&client, &prefix).await, flags);

    cleanup(&client, &prefix).await;
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn test_iterative_statement_pages_in_batches() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    let prefix = unique_prefix();
    seed_scratch(&client, &prefix, 5).await;

    let mut params = JobParameters::new();
    params.insert("RUN", ParamValue::Str(prefix.clone())).unwrap();

    let runner = JobRunner::new(client.clone(), RunnerConfig::default());
    let summary = runner
        .run_job(&scratch_delete_job(2), &params)
        .await
        .unwrap();

    let report = &summary.statements[0];
    assert_eq!(report.batches, 4);
    assert_eq!(report.completed, Some(5));

    cleanup(&client, &prefix).await;
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn test_iteration_limit_aborts_job() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    let prefix = unique_prefix();
    seed_scratch(&client, &prefix, 5).await;

    let mut params = JobParameters::new();
    params.insert("RUN", ParamValue::Str(prefix.clone())).unwrap();

    let config = RunnerConfig {
        max_iterations: 2,
        ..Default::default()
    };
    let runner = JobRunner::new(client.clone(), config);
    let err = runner
        .run_job(&scratch_delete_job(1), &params)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::IterationLimit {
            index: 0,
            limit: 2,
            ..
        }
    ));

    cleanup(&client, &prefix).await;
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn test_missing_parameter_runs_nothing() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    let prefix = unique_prefix();
    seed_scratch(&client, &prefix, 3).await;

    let mut job = scratch_delete_job(10);
    job.statements.insert(
        0,
        Statement::once("MATCH (n:LookoutScratch) WHERE n.run = $RUN SET n.touched = true"),
    );
    job.statements.push(Statement::once(
        "MATCH (n:LookoutScratch {id: $NODE_ID}) SET n.touched = false",
    ));

    let mut params = JobParameters::new();
    params.insert("RUN", ParamValue::Str(prefix.clone())).unwrap();

    let runner = JobRunner::new(client.clone(), RunnerConfig::default());
    let err = runner.run_job(&job, &params).await.unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::MissingParameter { statement: 2, ref name } if name == "NODE_ID"
    ));

    let q = neo4rs::query(
        "MATCH (n:LookoutScratch) WHERE n.run = $p AND n.touched IS NULL RETURN count(n) AS TotalCompleted",
    )
    .param("p", prefix.clone());
    let untouched = client.query_count(q, "TotalCompleted").await.unwrap();
    assert_eq!(untouched, Some(3));

    cleanup(&client, &prefix).await;
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn test_configured_parameters_fill_gaps() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    let prefix = unique_prefix();
    seed_scratch(&client, &prefix, 3).await;

    let mut defaults = JobParameters::new();
    defaults.insert("RUN", ParamValue::Str("stale-default".into())).unwrap();
    let config = RunnerConfig {
        parameters: defaults,
        ..Default::default()
    };

    // The caller's RUN overrides the configured one.
    let mut params = JobParameters::new();
    params.insert("RUN", ParamValue::Str(prefix.clone())).unwrap();

    let runner = JobRunner::new(client.clone(), config);
    let summary = runner
        .run_job(&scratch_delete_job(100), &params)
        .await
        .unwrap();
    assert_eq!(summary.statements[0].completed, Some(3));

    cleanup(&client, &prefix).await;
}
