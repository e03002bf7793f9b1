//! CLI entry point for the Lookout analysis job runner.
//!
//! Logs go to stderr; stdout carries only command output, so `run` can be
//! piped straight into other tools as JSON.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use lookout_core::builtin;
use lookout_core::config::{self as settings, RunnerConfig};
use lookout_core::params::parse_assignment;
use lookout_core::{Job, JobParameters, ParamValue};
use lookout_graph::{GraphClient, GraphConfig};

use lookout_analysis::{resolve_job, JobRunner};

#[derive(Parser)]
#[command(name = "lookout")]
#[command(about = "Run graph analysis jobs against the Lookout asset graph")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file prefix (default: lookout).
    #[arg(short, long, default_value = "lookout", global = true)]
    config: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Command {
    /// List built-in jobs.
    List,
    /// Print a job document (built-in name or path to a .json file).
    Show {
        job: String,
    },
    /// Validate one or more job documents.
    Validate {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Run a job and print its run summary as JSON.
    Run {
        /// Built-in job name or path to a .json file.
        job: String,

        /// Job parameter, repeatable (e.g. --param UPDATE_TAG=1700000000).
        #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_assignment)]
        params: Vec<(String, ParamValue)>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.json_logs {
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    }

    match cli.command {
        Command::List => {
            for name in builtin::builtin_jobs() {
                let job = builtin::load_builtin(name)?;
                println!(
                    "{name}\t{}\t{} statements ({} iterative)",
                    job.name,
                    job.statements.len(),
                    job.iterative_count()
                );
            }
        }
        Command::Show { ref job } => {
            let job = resolve_job(job)?;
            println!("{}", job.to_json_pretty()?);
        }
        Command::Validate { ref files } => {
            let mut failures = 0;
            for path in files {
                match Job::from_json_file(path) {
                    Ok(job) => println!(
                        "ok\t{}\t{} ({} statements)",
                        path.display(),
                        job.name,
                        job.statements.len()
                    ),
                    Err(e) => {
                        failures += 1;
                        println!("FAIL\t{}\t{e}", path.display());
                    }
                }
            }
            if failures > 0 {
                anyhow::bail!("{failures} of {} job documents failed validation", files.len());
            }
        }
        Command::Run {
            ref job,
            ref params,
        } => {
            let job = resolve_job(job)?;
            let mut job_params = JobParameters::new();
            for (name, value) in params {
                job_params.insert(name.clone(), value.clone())?;
            }

            let cfg = settings::load_settings(&cli.config)?;
            let graph_config: GraphConfig = settings::section(&cfg, "neo4j")?;
            let runner_config: RunnerConfig = settings::section(&cfg, "runner")?;

            let graph = GraphClient::connect(&graph_config).await?;
            let runner = JobRunner::new(graph, runner_config);
            let summary = runner.run_job(&job, &job_params).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}
