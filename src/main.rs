use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gistbench::aggregate::AggregateState;
use gistbench::config::{HarnessConfig, Overrides};
use gistbench::harness::{EXIT_OK, Harness};
use gistbench::interrupt;
use gistbench::record;
use gistbench::report;
use gistbench::typeset::{self, SampleUnit};
use gistbench::types::ChartLayout;

#[derive(Parser)]
#[command(name = "gistbench", version, about = "Benchmark an analysis tool over a set of workloads")]
struct Cli {
    /// Log supervisor and extraction details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tool over every workload and print a summary table
    Run(RunArgs),
    /// Run the tool over buggy workloads and check that it rejects each one
    Stress(StressArgs),
    /// Summarise a flat evaluation log written by the tool
    Stats(StatsArgs),
}

/// Settings shared by every mode that launches the tool.
#[derive(Args)]
struct HarnessArgs {
    /// Workload files; replaces the configured list when given
    workloads: Vec<String>,

    /// Config file (default: <config dir>/gistbench/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    executable: Option<PathBuf>,

    /// Flag passed before the workload path
    #[arg(long, allow_hyphen_values = true)]
    flag: Option<String>,

    /// Per-run timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Milliseconds a signalled run may take to exit before it is killed
    #[arg(long)]
    grace: Option<u64>,

    #[arg(short, long)]
    repetitions: Option<u32>,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    harness: HarnessArgs,

    /// Name for this configuration in the typeset table
    #[arg(long)]
    variant: Option<String>,

    /// Print the summary as JSON (progress goes to stderr)
    #[arg(long)]
    json: bool,

    /// Also write a LaTeX summary to this file
    #[arg(long)]
    latex: Option<PathBuf>,
}

#[derive(Args)]
struct StressArgs {
    #[command(flatten)]
    harness: HarnessArgs,
}

#[derive(Args)]
struct StatsArgs {
    /// Comma-separated log: method,footprint,time_ns,workload,repetition,...
    log: PathBuf,

    /// Print a LaTeX table and charts instead of console tables
    #[arg(long)]
    latex: bool,

    #[arg(long, value_enum, default_value = "shared")]
    layout: ChartLayout,

    /// Workloads to report even when the log has no records for them
    #[arg(long = "workload")]
    workloads: Vec<String>,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "gistbench=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn load_config(args: HarnessArgs, variant: Option<String>) -> Result<HarnessConfig> {
    let mut config = HarnessConfig::resolve(args.config.as_deref())?;
    config.apply(Overrides {
        executable: args.executable,
        flag: args.flag,
        timeout_secs: args.timeout,
        grace_ms: args.grace,
        repetitions: args.repetitions,
        variant,
        workloads: args.workloads,
    });
    config.validate()?;
    Ok(config)
}

fn run_benchmarks(args: RunArgs) -> Result<i32> {
    let config = load_config(args.harness, args.variant)?;

    let cancel = interrupt::install()?;
    let harness = Harness::new(&config, cancel);

    let outcome = if args.json {
        harness.run(&mut io::stderr())?
    } else {
        println!("{}", harness.settings_line());
        println!("Running benchmarks...");
        println!();
        harness.run(&mut io::stdout().lock())?
    };

    if args.json {
        println!("{}", report::format_json(&outcome.state, Utc::now())?);
    } else {
        println!();
        println!();
        if outcome.interrupted {
            println!("[interrupted]");
        }
        print!("{}", report::format_table(&outcome.state));
    }
    io::stdout().flush()?;

    if let Some(path) = args.latex {
        let document = typeset::render_document(&outcome.state, ChartLayout::Shared, SampleUnit::Milliseconds);
        std::fs::write(&path, document)
            .with_context(|| format!("Failed to write LaTeX output to {}", path.display()))?;
    }

    Ok(outcome.exit_code())
}

fn run_stress(args: StressArgs) -> Result<i32> {
    let config = load_config(args.harness, None)?;

    let cancel = interrupt::install()?;
    let harness = Harness::new(&config, cancel);

    println!("{}", harness.settings_line());
    println!("Running stress tests...");
    println!();
    let outcome = harness.stress(&mut io::stdout().lock())?;

    println!();
    println!();
    if outcome.interrupted {
        println!("[interrupted]");
    }
    print!("{}", report::format_stress_table(&outcome.state));
    io::stdout().flush()?;

    Ok(outcome.exit_code())
}

fn summarize_log(args: StatsArgs) -> Result<i32> {
    let mut state = AggregateState::new(args.workloads.as_slice());
    record::read_log_file(&args.log, |record| state.fold_record(&record))?;

    if args.latex {
        print!("{}", typeset::render_document(&state, args.layout, SampleUnit::Nanoseconds));
    } else {
        print!("{}", report::format_footprint_table(&state));
        println!();
        print!("{}", report::format_totals_table(&state));
    }

    Ok(EXIT_OK)
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run(args) => run_benchmarks(args),
        Commands::Stress(args) => run_stress(args),
        Commands::Stats(args) => summarize_log(args),
    }
}

fn main() {
    match run() {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("{}", err);
            process::exit(1);
        }
    }
}
