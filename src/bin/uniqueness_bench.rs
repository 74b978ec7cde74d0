//! Contention benchmark for the constraint-enforcing write path.
//!
//! Spawns writer threads that race to claim values from a shared pool under a
//! uniqueness constraint, then verifies that no value was claimed twice.
#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::error::Error;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use sombra_kernel::kernel::{ConstraintEnforcingWriter, EntityRead, EntityWrite};
use sombra_kernel::logging::init_logging;
use sombra_kernel::storage::index::ValueKey;
use sombra_kernel::storage::{CounterMetrics, Graph, KernelOptions, PropEntry};
use sombra_kernel::types::{ConstraintValidationError, LabelId, PropId, SombraError};

type GraphWriter = ConstraintEnforcingWriter<Graph, Graph, Graph>;

const PERSON: LabelId = LabelId(1);
const EMAIL: PropId = PropId(1);

#[derive(Parser, Debug)]
#[command(
    name = "uniqueness-bench",
    version,
    about = "Race writers against a uniqueness constraint and verify the outcome"
)]
struct Args {
    #[arg(long, default_value_t = 8, help = "Number of writer threads")]
    threads: usize,

    #[arg(long, default_value_t = 64, help = "Size of the shared value pool")]
    values: u64,

    #[arg(long, default_value_t = 500, help = "Claim attempts per thread")]
    attempts: usize,

    #[arg(long, help = "Seed for value selection (random when omitted)")]
    seed: Option<u64>,

    #[arg(long, help = "Index-entry lock wait timeout in milliseconds")]
    lock_timeout_ms: Option<u64>,

    #[arg(long, value_name = "FILE", help = "TOML options file")]
    config: Option<PathBuf>,

    #[arg(long, default_value = "warn", help = "Tracing filter directive")]
    log_level: String,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text, help = "Report format")]
    format: OutputFormat,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Default)]
struct Tally {
    claimed: AtomicU64,
    violations: AtomicU64,
    errors: AtomicU64,
}

#[derive(Debug, Serialize)]
struct Report {
    threads: usize,
    attempts: u64,
    claimed: u64,
    violations: u64,
    errors: u64,
    duplicates: u64,
    locks_acquired: u64,
    elapsed_ms: u128,
    attempts_per_sec: f64,
}

fn main() {
    let args = Args::parse();
    match run(&args) {
        Ok(report) => {
            if let Err(err) = print_report(&report, args.format) {
                eprintln!("error: {err}");
                process::exit(2);
            }
            if report.duplicates > 0 {
                eprintln!("uniqueness violated: {} duplicate values", report.duplicates);
                process::exit(1);
            }
        }
        Err(err) => {
            eprintln!("error: {err}");
            process::exit(2);
        }
    }
}

fn run(args: &Args) -> Result<Report, Box<dyn Error>> {
    init_logging(&args.log_level)?;
    let metrics = Arc::new(CounterMetrics::default());
    let mut opts = match &args.config {
        Some(path) => KernelOptions::load(path)?,
        None => KernelOptions::new(),
    };
    if let Some(ms) = args.lock_timeout_ms {
        opts = opts.lock_wait_timeout(Duration::from_millis(ms));
    }
    let graph = Graph::new(opts.metrics(metrics.clone()));

    let tx = graph.begin();
    graph.create_uniqueness_constraint(&tx.statement(), PERSON, EMAIL)?;
    tx.commit()?;

    let seed = args.seed.unwrap_or_else(rand::random);
    let tally = Arc::new(Tally::default());
    let barrier = Arc::new(Barrier::new(args.threads));
    let started = Instant::now();
    let handles: Vec<_> = (0..args.threads)
        .map(|worker| {
            let graph = graph.clone();
            let tally = Arc::clone(&tally);
            let barrier = Arc::clone(&barrier);
            let attempts = args.attempts;
            let values = args.values.max(1);
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(worker as u64));
                let writer = graph.enforcing_writer();
                barrier.wait();
                for _ in 0..attempts {
                    let email = format!("user{}@example.com", rng.gen_range(0..values));
                    claim(&graph, &writer, &email, &tally);
                }
            })
        })
        .collect();
    for handle in handles {
        handle
            .join()
            .map_err(|_| "writer thread panicked".to_string())?;
    }
    let elapsed = started.elapsed();

    let duplicates = count_duplicates(&graph)?;
    let attempts = (args.threads * args.attempts) as u64;
    Ok(Report {
        threads: args.threads,
        attempts,
        claimed: tally.claimed.load(Ordering::Relaxed),
        violations: tally.violations.load(Ordering::Relaxed),
        errors: tally.errors.load(Ordering::Relaxed),
        duplicates,
        locks_acquired: CounterMetrics::load(&metrics.locks_acquired),
        elapsed_ms: elapsed.as_millis(),
        attempts_per_sec: attempts as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
    })
}

/// One claim attempt: a fresh labelled node takes `email` or rolls back.
fn claim(graph: &Graph, writer: &GraphWriter, email: &str, tally: &Tally) {
    let tx = graph.begin();
    let stmt = tx.statement();
    let outcome = graph.create_node(&stmt).and_then(|node| {
        writer.node_add_label(&stmt, node, PERSON)?;
        writer.node_set_property(&stmt, node, PropEntry::new(EMAIL, email))
    });
    match outcome {
        Ok(_) => match tx.commit() {
            Ok(()) => {
                tally.claimed.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                tally.errors.fetch_add(1, Ordering::Relaxed);
            }
        },
        Err(SombraError::ConstraintValidation(ConstraintValidationError::UniquenessViolation {
            ..
        })) => {
            tally.violations.fetch_add(1, Ordering::Relaxed);
            tx.rollback();
        }
        Err(_) => {
            tally.errors.fetch_add(1, Ordering::Relaxed);
            tx.rollback();
        }
    }
}

fn count_duplicates(graph: &Graph) -> Result<u64, SombraError> {
    let tx = graph.begin();
    let stmt = tx.statement();
    let mut holders: HashMap<ValueKey, u64> = HashMap::new();
    for node in graph.nodes_for_label(&stmt, PERSON)? {
        if let Some(value) = graph.node_get_property(&stmt, node, EMAIL)?.value() {
            *holders.entry(ValueKey::encode(value)?).or_default() += 1;
        }
    }
    Ok(holders.values().map(|count| count.saturating_sub(1)).sum())
}

fn print_report(report: &Report, format: OutputFormat) -> Result<(), Box<dyn Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Text => {
            println!("{:<16} {:>12}", "threads", report.threads);
            println!("{:<16} {:>12}", "attempts", report.attempts);
            println!("{:<16} {:>12}", "claimed", report.claimed);
            println!("{:<16} {:>12}", "violations", report.violations);
            println!("{:<16} {:>12}", "errors", report.errors);
            println!("{:<16} {:>12}", "duplicates", report.duplicates);
            println!("{:<16} {:>12}", "locks acquired", report.locks_acquired);
            println!("{:<16} {:>9} ms", "elapsed", report.elapsed_ms);
            println!("{:<16} {:>12.0}", "attempts/sec", report.attempts_per_sec);
        }
    }
    Ok(())
}
