use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use events::{EventBus, EventEnvelope, RunEvent};
use ledger::{FileLedger, Ledger, MemoryLedger};
use orchestrator::{CommandInvoker, Orchestrator};
use rollout_core::StepOutcome;

const DEFAULT_LEDGER_FILE: &str = "address.txt";

#[derive(Parser)]
#[command(name = "rollout")]
#[command(about = "Idempotent, dependency-ordered deployment runner", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a plan, skipping steps already recorded in the ledger
    Run {
        /// Plan definition (TOML)
        plan: PathBuf,

        /// Ledger file recording provisioned values
        #[arg(short, long, default_value = DEFAULT_LEDGER_FILE)]
        ledger: PathBuf,

        /// Extra external input, repeatable
        #[arg(long = "input", value_name = "NAME=VALUE")]
        inputs: Vec<String>,

        /// Run against a throwaway in-memory ledger (nothing is persisted)
        #[arg(long)]
        no_ledger: bool,

        /// Suppress per-step progress output
        #[arg(short, long)]
        quiet: bool,
    },
    /// Check a plan file without executing anything
    Validate {
        /// Plan definition (TOML)
        plan: PathBuf,
    },
    /// List the entries recorded in a ledger file
    Ledger {
        #[arg(short, long, default_value = DEFAULT_LEDGER_FILE)]
        ledger: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            plan,
            ledger,
            inputs,
            no_ledger,
            quiet,
        } => run(&plan, &ledger, &inputs, no_ledger, quiet).await,
        Commands::Validate { plan } => validate(&plan),
        Commands::Ledger { ledger } => show_ledger(&ledger),
    }
}

async fn run(
    plan_path: &Path,
    ledger_path: &Path,
    inputs: &[String],
    no_ledger: bool,
    quiet: bool,
) -> Result<()> {
    let mut plan = orchestrator::load_plan(plan_path)?;
    for raw in inputs {
        let (name, value) = parse_input(raw)?;
        plan.declare_input(name, value);
    }
    plan.validate()?;
    tracing::debug!(plan = %plan_path.display(), steps = plan.len(), "Plan loaded");

    let bus = EventBus::new();
    let printer = (!quiet).then(|| spawn_progress_printer(bus.subscribe()));

    let orchestrator = Orchestrator::new().with_event_bus(bus);
    let cancel = orchestrator.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancellation requested; letting the step in flight settle");
            cancel.cancel();
        }
    });

    let invoker = CommandInvoker::new();
    let report = if no_ledger {
        let mut ledger = MemoryLedger::new();
        orchestrator.run(&plan, &mut ledger, &invoker).await?
    } else {
        let mut ledger = FileLedger::open(ledger_path)
            .with_context(|| format!("Cannot open ledger {}", ledger_path.display()))?;
        orchestrator.run(&plan, &mut ledger, &invoker).await?
    };

    // Dropping the orchestrator closes the bus so the printer drains and
    // finishes before the report goes out.
    drop(orchestrator);
    if let Some(handle) = printer {
        let _ = handle.await;
    }

    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.succeeded {
        if let Some(failure) = report.failure() {
            if let StepOutcome::Failed { error } = &failure.outcome {
                eprintln!("Step '{}' failed: {}", failure.step, error.message);
                if error.retryable {
                    eprintln!("The failure looks transient; re-run to retry from this step.");
                }
            }
        } else if report.cancelled {
            eprintln!("Run cancelled; re-run to resume from the first unprovisioned step.");
        }
        std::process::exit(1);
    }

    Ok(())
}

fn validate(plan_path: &Path) -> Result<()> {
    let plan = orchestrator::load_plan(plan_path)?;
    let ordered = plan.order()?;

    println!("Plan OK: {} step(s)", ordered.len());
    for step in ordered {
        if step.depends_on.is_empty() {
            println!("  {} <- {}", step.name, step.action);
        } else {
            let deps: Vec<&str> = step.depends_on.iter().map(String::as_str).collect();
            println!("  {} <- {} (after {})", step.name, step.action, deps.join(", "));
        }
    }
    Ok(())
}

fn show_ledger(ledger_path: &Path) -> Result<()> {
    if !ledger_path.exists() {
        println!("No ledger at {}", ledger_path.display());
        return Ok(());
    }

    let ledger = FileLedger::open(ledger_path)
        .with_context(|| format!("Cannot open ledger {}", ledger_path.display()))?;
    let entries = ledger.entries();

    if entries.is_empty() {
        println!("Ledger {} is empty", ledger_path.display());
        return Ok(());
    }

    println!("Ledger {} ({} entries):", ledger_path.display(), entries.len());
    for entry in entries {
        println!("  {} = {}", entry.name, entry.value);
    }
    Ok(())
}

fn parse_input(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => bail!("Invalid --input '{raw}', expected NAME=VALUE"),
    }
}

fn spawn_progress_printer(rx: broadcast::Receiver<EventEnvelope>) -> JoinHandle<()> {
    tokio::spawn(pump_events(rx, print_event))
}

/// Forward bus events to `on_event` until the channel closes. A lagged
/// receiver loses the overwritten events but keeps following the run.
async fn pump_events(
    mut rx: broadcast::Receiver<EventEnvelope>,
    mut on_event: impl FnMut(EventEnvelope),
) {
    loop {
        match rx.recv().await {
            Ok(envelope) => on_event(envelope),
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn print_event(envelope: EventEnvelope) {
    match envelope.event {
        RunEvent::RunStarted { plan_steps } => {
            eprintln!("Running {plan_steps} step(s)");
        }
        RunEvent::StepStarted { step, action } => {
            eprintln!("  … {step} ({action})");
        }
        RunEvent::StepSkipped { step, value } => {
            eprintln!("  ○ {step} = {value} (already provisioned)");
        }
        RunEvent::StepRan { step, value } => {
            eprintln!("  ● {step} = {value}");
        }
        RunEvent::StepFailed { step, message, .. } => {
            eprintln!("  ✗ {step}: {message}");
        }
        RunEvent::RunFinished {
            succeeded,
            cancelled,
        } => {
            if cancelled {
                eprintln!("Cancelled.");
            } else if succeeded {
                eprintln!("Done.");
            } else {
                eprintln!("Halted.");
            }
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rollout=warn,orchestrator=warn,ledger=warn".into()),
        )
        .init();
}
