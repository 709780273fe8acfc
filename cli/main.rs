#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

// ========================================================================================
//
//                              THE BRIGADE ORCHESTRATOR
//
// ========================================================================================
//
// Bootstraps the shared worker pool once from configuration, hands it to a
// batch coordinator, and plays the part of several waiters: one caller thread
// per menu entry, each submitting its own order and waiting for its own report.

use brigade::config::{BrigadeConfig, PoolConfig};
use brigade::{
    BatchCoordinator, BatchError, BatchReport, FixedDelayWork, WorkError, WorkFn, WorkItem,
    WorkerPool,
};
use clap::{Args, CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::info;
use std::error::Error;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(
    name = "brigade",
    version,
    about = "Run batches of work concurrently on one shared, fixed-capacity worker pool."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit one batch per menu entry, all at once, and wait for every report
    #[command(about = "Run concurrent batches against the shared pool")]
    Run(RunArgs),

    /// Print the effective configuration as TOML
    #[command(about = "Print the effective configuration")]
    Config {
        /// Configuration file to load instead of the defaults
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Display version and host information
    #[command(about = "Display version and host information")]
    Version,
}

#[derive(Args)]
struct RunArgs {
    /// Menu entries; each becomes one batch of `<entry>1..<entry>N` items
    #[arg(value_name = "ENTRY", required = true)]
    menu: Vec<String>,

    /// Number of items per batch
    #[arg(long, default_value = "20", value_name = "N")]
    count: usize,

    /// Configuration file (TOML)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Pool capacity, overriding the configuration
    #[arg(long, value_name = "N", conflicts_with = "per_cpu")]
    cooks: Option<usize>,

    /// Size the pool to the number of logical CPUs
    #[arg(long)]
    per_cpu: bool,

    /// Per-item delay in milliseconds, overriding the configuration
    #[arg(long, value_name = "MS")]
    delay_ms: Option<u64>,

    /// Give up on a batch after this many milliseconds (0 waits forever)
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Print every item of every report
    #[arg(long)]
    verbose: bool,
}

/// Wraps the placeholder work so the shared progress bar advances per item.
struct ProgressWork<W> {
    inner: W,
    progress: ProgressBar,
}

impl<W: WorkFn> WorkFn for ProgressWork<W> {
    fn perform(&self, item: &WorkItem) -> Result<String, WorkError> {
        let result = self.inner.perform(item);
        self.progress.inc(1);
        result
    }
}

fn create_progress_bar(len: u64, message: &str) -> ProgressBar {
    let draw_target = if std::io::stderr().is_terminal() {
        ProgressDrawTarget::stderr_with_hz(20)
    } else {
        ProgressDrawTarget::hidden()
    };

    let pb = ProgressBar::with_draw_target(Some(len), draw_target);
    if let Ok(style) =
        ProgressStyle::with_template("> [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
    }
    pb.set_message(message.to_string());
    pb
}

/// Items across all batches, clamped instead of wrapping for absurd counts.
fn progress_total(batches: usize, count: usize) -> u64 {
    u64::try_from(batches.saturating_mul(count)).unwrap_or(u64::MAX)
}

fn order_of(entry: &str, count: usize) -> Vec<WorkItem> {
    (1..=count)
        .map(|i| WorkItem::new(format!("{entry}{i}")))
        .collect()
}

fn load_config(path: Option<&PathBuf>) -> Result<BrigadeConfig, Box<dyn Error>> {
    match path {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            Ok(BrigadeConfig::load(path)?)
        }
        None => Ok(BrigadeConfig::default()),
    }
}

fn run_batches(args: RunArgs) -> Result<(), Box<dyn Error>> {
    let mut config = load_config(args.config.as_ref())?;
    if let Some(cooks) = args.cooks {
        config.pool = PoolConfig {
            thread_name_prefix: config.pool.thread_name_prefix.clone(),
            ..PoolConfig::fixed(cooks)
        };
    } else if args.per_cpu {
        config.pool = PoolConfig {
            thread_name_prefix: config.pool.thread_name_prefix.clone(),
            ..PoolConfig::per_cpu()
        };
    }
    if let Some(delay_ms) = args.delay_ms {
        config.work.delay_ms = delay_ms;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.coordinator.wait_timeout_ms = timeout_ms;
    }

    let pool = Arc::new(WorkerPool::from_config(&config.pool)?);
    let progress = create_progress_bar(progress_total(args.menu.len(), args.count), "items finished");
    let work = ProgressWork {
        inner: FixedDelayWork::new(config.work.delay()),
        progress: progress.clone(),
    };
    let coordinator = BatchCoordinator::new(Arc::clone(&pool), work)
        .with_default_timeout(config.coordinator.wait_timeout());

    info!(
        "Submitting {} batches of {} items to a pool of {} workers ({:?} per item).",
        args.menu.len(),
        args.count,
        pool.capacity(),
        config.work.delay()
    );

    let started = Instant::now();
    let outcomes = thread::scope(|scope| {
        let waiters: Vec<_> = args
            .menu
            .iter()
            .map(|entry| {
                let coordinator = &coordinator;
                let order = order_of(entry, args.count);
                scope.spawn(move || coordinator.process(order))
            })
            .collect();
        waiters
            .into_iter()
            .map(|waiter| {
                waiter
                    .join()
                    .map_err(|_| "a waiter thread panicked".to_string())
            })
            .collect::<Result<Vec<Result<BatchReport, BatchError>>, String>>()
    })?;
    progress.finish_and_clear();

    let mut failed_batches = 0;
    for (entry, outcome) in args.menu.iter().zip(outcomes) {
        match outcome {
            Ok(report) => {
                println!(
                    "{entry}: {} items, {} finished, {} failed",
                    report.len(),
                    report.finished_count(),
                    report.failed().count()
                );
                if args.verbose {
                    for (item, result) in report.sorted() {
                        println!("  {item}\t{result}");
                    }
                }
            }
            Err(e) => {
                failed_batches += 1;
                eprintln!("{entry}: {e}");
            }
        }
    }
    println!(
        "All batches returned in {}",
        format_elapsed(started.elapsed())
    );

    if failed_batches > 0 {
        return Err(format!("{failed_batches} of {} batches did not complete", args.menu.len()).into());
    }
    Ok(())
}

fn print_config(path: Option<PathBuf>) -> Result<(), Box<dyn Error>> {
    let config = load_config(path.as_ref())?;
    print!("{}", config.to_toml_string()?);
    Ok(())
}

fn print_version_info() {
    println!("brigade {}", env!("CARGO_PKG_VERSION"));
    println!("Logical CPUs: {}", num_cpus::get());
}

fn format_elapsed(elapsed: Duration) -> String {
    if elapsed.as_secs() >= 1 {
        format!("{:.2}s", elapsed.as_secs_f64())
    } else {
        format!("{}ms", elapsed.as_millis())
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let Cli { command } = cli;

    let result = match command {
        Some(Commands::Run(args)) => run_batches(args),
        Some(Commands::Config { config }) => print_config(config),
        Some(Commands::Version) => {
            print_version_info();
            Ok(())
        }
        None => {
            let _ = Cli::command().print_help();
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
