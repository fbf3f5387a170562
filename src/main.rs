//! Scenarist CLI entrypoint.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use std::path::PathBuf;
use std::process::ExitCode;

use scenarist::{
    init_project, report_command, run_scenarios, ErrorCode, FileConfig, ReportCommand, RunOptions,
    RunOutcome, ScenaristResult,
};

#[derive(Debug, Parser)]
#[command(name = "scenarist")]
#[command(about = "scenario-based test execution: step sequencing, verdicts, JSON reports")]
struct Cli {
    /// Path to config file. Missing configs are treated as "defaults".
    #[arg(long, global = true, default_value = "scenarist.toml")]
    config: PathBuf,

    /// Log level.
    #[arg(long, global = true, default_value = "warn")]
    log: String,

    /// Machine-readable output to stdout (JSON).
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Execute scenario files
    Run {
        /// Glob patterns for scenario files.
        globs: Vec<String>,

        /// Keep executing steps after a failure.
        #[arg(long)]
        continue_on_error: bool,

        /// Traverse without executing anything.
        #[arg(long)]
        doc_only: bool,

        /// Known issues at or above this level count as errors.
        #[arg(long)]
        issue_level_error: Option<String>,

        /// Known issues below this level are dropped.
        #[arg(long)]
        issue_level_ignored: Option<String>,

        /// Pause between steps, in milliseconds.
        #[arg(long)]
        delay: Option<u64>,

        /// Report path (single scenario only).
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Render scenario documentation without executing
    Doc {
        globs: Vec<String>,

        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Render / query stored reports
    Report {
        #[command(subcommand)]
        command: ReportCommand,
    },

    /// Write the starter config and example scenario
    Init {
        #[arg(long)]
        force: bool,
    },

    /// Print version info
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_tracing(&cli.log) {
        // Tracing is best-effort; if it fails, we still continue.
        eprintln!("warning: failed to init tracing: {err:#}");
    }

    let config = FileConfig::load_optional(&cli.config);

    match run_command(&cli, &config) {
        Ok(code) => ExitCode::from(code.exit_code()),
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(err.error_code().exit_code())
        }
    }
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
    Ok(())
}

fn run_command(cli: &Cli, config: &FileConfig) -> ScenaristResult<ErrorCode> {
    match &cli.command {
        Command::Run {
            globs,
            continue_on_error,
            doc_only,
            issue_level_error,
            issue_level_ignored,
            delay,
            report,
        } => {
            let outcome = run_scenarios(
                config,
                globs,
                &RunOptions {
                    doc_only: *doc_only,
                    continue_on_error: *continue_on_error,
                    issue_level_error: issue_level_error.clone(),
                    issue_level_ignored: issue_level_ignored.clone(),
                    delay_ms: *delay,
                    report_to: report.clone(),
                },
            )?;
            print_outcome(cli, &outcome)?;
            Ok(outcome.code)
        }

        Command::Doc { globs, report } => {
            let outcome = run_scenarios(
                config,
                globs,
                &RunOptions {
                    doc_only: true,
                    report_to: report.clone(),
                    ..RunOptions::default()
                },
            )?;
            print_outcome(cli, &outcome)?;
            Ok(outcome.code)
        }

        Command::Report { command } => {
            println!("{}", report_command(command, cli.json)?);
            Ok(ErrorCode::Success)
        }

        Command::Init { force } => {
            for path in init_project(*force)? {
                println!("wrote {}", path.display());
            }
            Ok(ErrorCode::Success)
        }

        Command::Version => {
            println!("scenarist {}", env!("CARGO_PKG_VERSION"));
            Ok(ErrorCode::Success)
        }
    }
}

fn print_outcome(cli: &Cli, outcome: &RunOutcome) -> ScenaristResult<()> {
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome.reports)?);
        return Ok(());
    }
    for (report, path) in outcome.reports.iter().zip(&outcome.report_paths) {
        print!("{}", report.pretty());
        println!("  report: {}", path.display());
    }
    Ok(())
}
