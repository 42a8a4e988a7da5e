//! CLI handler for `haste batch`: many selections, one optimizer.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::cli::{AppContext, BatchArgs};
use crate::cli_ext::select_cmd::{build_optimizer, summary_line};
use crate::core::metrics::OptimizedContext;
use crate::core::optimizer::{OptimizeRequest, Optimizer};
use crate::infra::io::read_file_smart;

/// One line of the jobs file
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Job
{
    /// Relative paths resolve against the jobs file's directory
    pub file: PathBuf,
    pub query: String,
    #[serde(default)]
    pub max_tokens: Option<usize>,
}

/// Outcome of one job, serialized as one JSON line
#[derive(Debug, Serialize)]
pub struct JobOutcome
{
    pub file: PathBuf,
    pub query: String,
    #[serde(flatten)]
    pub result: Option<OptimizedContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Parse JSON Lines, skipping blank lines
pub fn parse_jobs(
    text: &str,
    base: &Path,
) -> Result<Vec<Job>>
{
    text.lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .map(|(i, line)| {
            let mut job: Job = serde_json::from_str(line)
                .with_context(|| format!("invalid job on line {}", i + 1))?;
            if job
                .file
                .is_relative()
            {
                job.file = base.join(&job.file);
            }
            Ok(job)
        })
        .collect()
}

fn run_job(
    optimizer: &Optimizer,
    job: &Job,
) -> Result<OptimizedContext>
{
    let content = read_file_smart(&job.file)?;
    Ok(optimizer.optimize(OptimizeRequest {
        context: content.as_ref(),
        query: &job.query,
        file_path: &job.file,
        max_tokens: job.max_tokens,
    })?)
}

#[instrument(skip_all, fields(jobs = %args.jobs.display()))]
pub fn run(
    args: BatchArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let optimizer = build_optimizer(&args.overrides)?;

    let text = std::fs::read_to_string(&args.jobs)
        .with_context(|| format!("Failed to read {}", args.jobs.display()))?;
    let base = args
        .jobs
        .parent()
        .unwrap_or_else(|| Path::new("."));
    let jobs = parse_jobs(&text, base)?;
    info!(count = jobs.len(), "running batch");

    // Parallel map; collect keeps input order
    let outcomes: Vec<JobOutcome> = jobs
        .par_iter()
        .map(|job| match run_job(&optimizer, job)
        {
            Ok(result) => JobOutcome {
                file: job
                    .file
                    .clone(),
                query: job
                    .query
                    .clone(),
                result: Some(result),
                error: None,
            },
            Err(e) =>
            {
                warn!(file = %job.file.display(), error = %format!("{e:#}"), "job failed");
                JobOutcome {
                    file: job
                        .file
                        .clone(),
                    query: job
                        .query
                        .clone(),
                    result: None,
                    error: Some(format!("{e:#}")),
                }
            }
        })
        .collect();

    for outcome in &outcomes
    {
        print_outcome(outcome, &args, ctx)?;
    }

    let failed = outcomes
        .iter()
        .filter(|o| {
            o.error
                .is_some()
        })
        .count();
    if failed > 0
    {
        anyhow::bail!("{failed} of {} jobs failed", outcomes.len());
    }
    Ok(())
}

fn print_outcome(
    outcome: &JobOutcome,
    args: &BatchArgs,
    ctx: &AppContext,
) -> Result<()>
{
    if args.json
    {
        println!("{}", serde_json::to_string(outcome).context("serialize job outcome")?);
        return Ok(());
    }

    let header = format!("== {} ({}) ==", outcome.file.display(), outcome.query);
    if ctx.no_color
    {
        println!("{header}");
    }
    else
    {
        println!("{}", header.bold());
    }

    match (&outcome.result, &outcome.error)
    {
        (Some(result), _) =>
        {
            println!("{}\n", result.content);
            if !ctx.quiet
            {
                eprintln!("{}", summary_line(result, ctx.no_color));
            }
        }
        (None, Some(err)) =>
        {
            if ctx.no_color
            {
                eprintln!("✗ {err}");
            }
            else
            {
                eprintln!("{} {err}", "✗".red());
            }
        }
        (None, None) =>
        {}
    }
    Ok(())
}
