//! Command-line driver for the parlab harness.
//!
//! Generates a seeded input, runs the requested workload over one or more
//! trials, and renders the timing and correctness results as text or JSON.
//! Memory telemetry (parent-process RSS) is sampled around the run; child
//! process memory is not included.
//!
//! # Usage
//!
//! ```bash
//! parlab sort --size 131072 --workers 4 --substrate process
//! parlab max --size 131072 --workers 8 --substrate thread --nosync --trials 50
//! ```

// CLI tools need to print to stdout/stderr
#![allow(clippy::print_stdout, clippy::print_stderr)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use parlab::{run_max, run_sort, Substrate, SyncStrategy};
use serde::Serialize;
use std::fs;

/// Parallel map-reduce laboratory.
#[derive(Parser, Debug)]
#[command(name = "parlab", version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

/// Workloads.
#[derive(Subcommand, Debug)]
enum Command {
    /// Parallel sort: per-chunk sort mapped across workers, k-way merge reduce.
    Sort(SortArgs),
    /// Max aggregation: per-chunk maxima folded into one shared slot.
    Max(MaxArgs),
}

/// Arguments shared by both workloads.
#[derive(Parser, Debug)]
struct CommonArgs {
    /// Total input size.
    #[arg(long, default_value = "131072")]
    size: usize,

    /// Number of mapper workers.
    #[arg(long, default_value = "4")]
    workers: usize,

    /// Seed for input generation.
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Execution substrate for the mapper workers.
    #[arg(long, value_enum, default_value = "thread")]
    substrate: SubstrateArg,

    /// Number of trials to run over the same input.
    #[arg(long, default_value = "1")]
    trials: usize,

    /// Emit the report as JSON instead of text.
    #[arg(long)]
    json: bool,
}

/// Arguments for the sort workload.
#[derive(Parser, Debug)]
struct SortArgs {
    #[command(flatten)]
    common: CommonArgs,
}

/// Arguments for the max workload.
#[derive(Parser, Debug)]
struct MaxArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Skip synchronization around the shared slot update (race-prone).
    #[arg(long)]
    nosync: bool,
}

/// Substrate selector.
#[derive(ValueEnum, Debug, Clone, Copy)]
enum SubstrateArg {
    /// Shared-memory threads.
    Thread,
    /// Isolated forked processes.
    Process,
}

impl From<SubstrateArg> for Substrate {
    fn from(arg: SubstrateArg) -> Self {
        match arg {
            SubstrateArg::Thread => Substrate::Threaded,
            SubstrateArg::Process => Substrate::ProcessIsolated,
        }
    }
}

/// One trial's rendered results.
#[derive(Debug, Serialize)]
struct TrialReport {
    /// Map phase duration in seconds.
    map_secs: f64,
    /// Reduce phase duration in seconds.
    reduce_secs: f64,
    /// Whether the result matched the sequential recomputation.
    is_correct: bool,
    /// The reported global maximum (max workload only).
    #[serde(skip_serializing_if = "Option::is_none")]
    global_max: Option<i64>,
}

/// Full run report.
#[derive(Debug, Serialize)]
struct RunReport {
    /// Workload name.
    workload: &'static str,
    /// Input size.
    size: usize,
    /// Worker count.
    workers: usize,
    /// Substrate name.
    substrate: String,
    /// Whether the shared slot update was synchronized (max workload only).
    #[serde(skip_serializing_if = "Option::is_none")]
    synchronized: Option<bool>,
    /// Trials run.
    trials: usize,
    /// Trials whose result did not match the sequential recomputation.
    mismatches: usize,
    /// Parent RSS in bytes before the trials, if readable.
    rss_before: Option<u64>,
    /// Parent RSS in bytes after the trials, if readable.
    rss_after: Option<u64>,
    /// Parent peak RSS in bytes after the trials, if readable.
    rss_peak: Option<u64>,
    /// Per-trial results.
    results: Vec<TrialReport>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Sort(sort_args) => run_sort_command(&sort_args),
        Command::Max(max_args) => run_max_command(&max_args),
    }
}

/// Runs the sort workload over the requested trials.
fn run_sort_command(args: &SortArgs) -> Result<()> {
    let common = &args.common;
    let data = parlab::input::generate(common.seed, common.size);
    let substrate = Substrate::from(common.substrate);

    let rss_before = rss_bytes();
    let mut results = Vec::with_capacity(common.trials);
    for trial in 0..common.trials {
        let outcome = run_sort(&data, common.workers, substrate)
            .with_context(|| format!("sort trial {trial} failed"))?;
        results.push(TrialReport {
            map_secs: outcome.map_time.as_secs_f64(),
            reduce_secs: outcome.reduce_time.as_secs_f64(),
            is_correct: outcome.is_correct,
            global_max: None,
        });
    }
    let rss_after = rss_bytes();

    let report = build_report("sort", common, None, results, rss_before, rss_after);
    render(&report, common.json)
}

/// Runs the max workload over the requested trials.
fn run_max_command(args: &MaxArgs) -> Result<()> {
    let common = &args.common;
    let data = parlab::input::generate(common.seed, common.size);
    let substrate = Substrate::from(common.substrate);
    let strategy = if args.nosync {
        SyncStrategy::Unsynchronized
    } else {
        SyncStrategy::Locked
    };

    let rss_before = rss_bytes();
    let mut results = Vec::with_capacity(common.trials);
    for trial in 0..common.trials {
        let outcome = run_max(&data, common.workers, substrate, strategy)
            .with_context(|| format!("max trial {trial} failed"))?;
        results.push(TrialReport {
            map_secs: outcome.map_time.as_secs_f64(),
            reduce_secs: outcome.reduce_time.as_secs_f64(),
            is_correct: outcome.is_correct,
            global_max: Some(outcome.global_max),
        });
    }
    let rss_after = rss_bytes();

    let report = build_report(
        "max",
        common,
        Some(!args.nosync),
        results,
        rss_before,
        rss_after,
    );
    render(&report, common.json)
}

/// Assembles the aggregate report.
fn build_report(
    workload: &'static str,
    common: &CommonArgs,
    synchronized: Option<bool>,
    results: Vec<TrialReport>,
    rss_before: Option<u64>,
    rss_after: Option<u64>,
) -> RunReport {
    let mismatches = results.iter().filter(|r| !r.is_correct).count();
    RunReport {
        workload,
        size: common.size,
        workers: common.workers,
        substrate: Substrate::from(common.substrate).to_string(),
        synchronized,
        trials: results.len(),
        mismatches,
        rss_before,
        rss_after,
        rss_peak: peak_rss_bytes(),
        results,
    }
}

/// Renders the report as JSON or text.
fn render(report: &RunReport, json: bool) -> Result<()> {
    if json {
        let rendered =
            serde_json::to_string_pretty(report).context("failed to serialize report")?;
        println!("{rendered}");
        return Ok(());
    }

    let mode = match report.synchronized {
        Some(true) => " sync=true",
        Some(false) => " sync=false",
        None => "",
    };
    println!(
        "{} [{}]: size={} workers={}{}",
        report.workload, report.substrate, report.size, report.workers, mode
    );

    for (trial, result) in report.results.iter().enumerate() {
        let value = result
            .global_max
            .map_or_else(String::new, |max| format!(" max={max}"));
        println!(
            "  trial {trial}: map {:.6}s reduce {:.6}s{} correct={}",
            result.map_secs, result.reduce_secs, value, result.is_correct
        );
    }

    println!(
        "trials: {} mismatches: {}",
        report.trials, report.mismatches
    );
    match (report.rss_before, report.rss_after) {
        (Some(before), Some(after)) => {
            println!("parent RSS before: {before} bytes after: {after} bytes");
            if let Some(peak) = report.rss_peak {
                println!("parent peak RSS: {peak} bytes");
            }
            println!("note: child process memory is not included in parent RSS");
        }
        _ => println!("memory telemetry unavailable (/proc not readable)"),
    }

    Ok(())
}

/// Reads the parent process resident set size from /proc, if available.
fn rss_bytes() -> Option<u64> {
    proc_status_bytes("VmRSS:")
}

/// Reads the parent process peak resident set size from /proc, if available.
fn peak_rss_bytes() -> Option<u64> {
    proc_status_bytes("VmHWM:")
}

/// Reads one kB-denominated field from /proc/self/status.
fn proc_status_bytes(key: &str) -> Option<u64> {
    let status = fs::read_to_string("/proc/self/status").ok()?;
    let line = status.lines().find(|line| line.starts_with(key))?;
    let kb: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kb * 1024)
}
