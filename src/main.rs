#![forbid(unsafe_code)]

//! `vim-harness`: run the editor end-to-end suites and print a summary.
//!
//! Exits `0` only when at least one suite ran and every suite succeeded.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use vim_harness::aggregator::Aggregator;
use vim_harness::discovery::TestFilter;
use vim_harness::launcher::Launcher;
use vim_harness::models::{RunSummary, SuiteResult};
use vim_harness::{HarnessConfig, HarnessError, Result};

const RULE_WIDTH: usize = 60;

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "vim-harness", about = "Headless Vim end-to-end test runner", version, long_about = None)]
struct Cli {
    /// Test identifiers to run (file stems); all discovered tests if omitted.
    tests: Vec<String>,

    /// List discovered tests and exit.
    #[arg(long)]
    list: bool,

    /// Run only tests whose identifier contains this substring.
    #[arg(long)]
    filter: Option<String>,

    /// Print captured output for every suite and enable debug logging.
    #[arg(short, long)]
    verbose: bool,

    /// Per-suite timeout in seconds, overriding the configuration.
    #[arg(long)]
    timeout: Option<u64>,

    /// Path to `harness.toml`; looked up in the current directory if omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> ExitCode {
    let args = Cli::parse();
    if let Err(err) = init_tracing(args.log_format, args.verbose) {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(%err, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(args)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!(%err, fatal = err.is_fatal(), "harness aborted");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Cli) -> Result<bool> {
    let config = match &args.config {
        Some(path) => HarnessConfig::load_from_path(path)?,
        None => HarnessConfig::discover(&std::env::current_dir()?)?,
    };
    let config = Arc::new(config);
    info!(root = %config.project_root.display(), "configuration loaded");

    if args.list {
        let ids = vim_harness::discovery::discover(&config.test_dir(), &config.test_pattern)?;
        println!("Available tests:");
        for id in ids {
            println!("  - {id}");
        }
        return Ok(true);
    }

    let timeout = match args.timeout {
        Some(0) => {
            return Err(HarnessError::Config(
                "--timeout must be greater than zero".into(),
            ))
        }
        Some(secs) => Duration::from_secs(secs),
        None => config.timeout(),
    };

    let launcher = Launcher::locate(Arc::clone(&config)).await?;
    let aggregator = Aggregator::new(Arc::clone(&config), launcher).with_timeout(timeout);
    let filter = TestFilter::from_args(args.tests, args.filter);

    let results = aggregator.run_all(&filter).await?;
    for result in &results {
        print_suite(result, args.verbose);
    }

    let summary = Aggregator::summarize(&results);
    print_summary(&summary, &results);
    Ok(summary.success)
}

fn print_suite(result: &SuiteResult, verbose: bool) {
    let rule = "=".repeat(RULE_WIDTH);
    println!("\n{rule}\nRunning: {}\n{rule}", result.suite);
    if verbose || !result.success {
        println!("{}", result.output.trim_end());
        if let Some(log) = &result.server_log {
            println!("--- server log (tail) ---\n{log}");
        }
        if let Some(log) = &result.editor_log {
            println!("--- editor log (tail) ---\n{log}");
        }
    }
    let status = if result.success { "PASS" } else { "FAIL" };
    println!(
        "Result: {status} (passed={}, failed={}, skipped={})",
        result.passed, result.failed, result.skipped
    );
}

fn print_summary(summary: &RunSummary, results: &[SuiteResult]) {
    let rule = "=".repeat(RULE_WIDTH);
    println!("\n{rule}\nE2E TEST SUMMARY\n{rule}");
    println!("{summary}");
    println!("{rule}");

    if summary.success {
        println!("ALL TESTS PASSED");
    } else if summary.is_empty() {
        println!("NO TESTS RAN");
    } else {
        println!("SOME TESTS FAILED");
        for result in results.iter().filter(|r| !r.success) {
            println!("  - {}: {} failures", result.suite, result.failed);
        }
    }
}

fn init_tracing(log_format: LogFormat, verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = fmt().with_env_filter(env_filter).with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| HarnessError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| HarnessError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
