//! GoalDaemon - autonomous goal decomposition and task execution
//!
//! CLI entry point: create objectives, run them to completion, inspect
//! progress.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tokio::sync::broadcast;
use tracing::{info, warn};

use goaldaemon::cli::{Cli, Command, OutputFormat};
use goaldaemon::config::Config;
use goaldaemon::domain::{ObjectiveStatus, Task, TaskStatus};
use goaldaemon::evaluator::{EvaluationTimer, HeuristicEvaluator};
use goaldaemon::events::{EngineEvent, EventBus};
use goaldaemon::generator::{HttpGenerator, TaskGenerator};
use goaldaemon::lifecycle::{KnowledgeLog, LifecycleEmitter};
use goaldaemon::manager::ObjectiveManager;
use goaldaemon::persistence::Storage;
use goaldaemon::scheduler::{Engine, RunOutcome};
use goaldaemon::store::StoreHandle;

fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("goaldaemon")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Setup tracing subscriber - write to log file, not stdout/stderr
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_file = fs::File::create(log_dir.join("goaldaemon.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate()?;

    match cli.command {
        Some(Command::Run {
            title,
            description,
            delay_ms,
        }) => cmd_run(&config, &title, description.as_deref().unwrap_or(""), delay_ms).await,
        Some(Command::Status { format }) => cmd_status(&config, format),
        Some(Command::Tasks { objective }) => cmd_tasks(&config, objective.as_deref()),
        Some(Command::Reset { id }) => cmd_reset(&config, &id).await,
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

/// Create an objective, generate tasks, and run the engine to a stop
async fn cmd_run(config: &Config, title: &str, description: &str, delay_ms: Option<u64>) -> Result<()> {
    let mut config = config.clone();
    if let Some(delay) = delay_ms {
        config.engine.execution_delay_ms = delay;
    }
    let data_dir = config.storage.data_dir();

    let bus = Arc::new(EventBus::with_default_capacity());
    let store = StoreHandle::spawn();
    let storage = Storage::new(&data_dir);

    // A missing API key means fallback tasks, never a failed run
    let generator: Option<Arc<dyn TaskGenerator>> = if config.generator.enabled {
        match HttpGenerator::from_config(&config.generator) {
            Ok(generator) => Some(Arc::new(generator)),
            Err(e) => {
                warn!(error = %e, "Generator unavailable");
                println!("{} {}", "note:".yellow(), "generator unavailable, using the fixed task list");
                None
            }
        }
    } else {
        None
    };

    let mut manager = ObjectiveManager::open(storage, store.clone(), generator, bus.clone()).await?;

    let printer = tokio::spawn(print_events(bus.subscribe()));

    let objective = manager.create_objective(title, description).await?;
    println!(
        "{} {} ({})",
        "objective:".bold(),
        objective.title,
        objective.id.dimmed()
    );
    if let Some(insights) = &objective.ai_insights {
        println!("{} {}", "insights:".bold(), insights.dimmed());
    }

    let lifecycle = Arc::new(
        LifecycleEmitter::new(bus.clone(), config.engine.history_cap).with_sink(Arc::new(KnowledgeLog::new(&data_dir))),
    );
    let engine = Engine::new(
        objective.clone(),
        store.clone(),
        lifecycle,
        bus.clone(),
        config.engine.clone(),
    );

    let mut timer = EvaluationTimer::new();
    if config.evaluation.enabled {
        timer.start(
            Duration::from_secs(config.evaluation.interval_secs),
            objective.clone(),
            store.clone(),
            Arc::new(HeuristicEvaluator),
            bus.clone(),
        );
    }

    engine.start();
    let outcome = engine.run().await?;
    timer.cancel();

    if outcome == RunOutcome::Done {
        manager.set_status(&objective.id, ObjectiveStatus::Completed).await?;
    }
    manager.save().await?;

    // Let the printer drain before the summary
    tokio::time::sleep(Duration::from_millis(50)).await;
    printer.abort();

    let snapshot = store.snapshot().await?;
    let completed = snapshot.iter().filter(|t| t.status == TaskStatus::Completed).count();
    match outcome {
        RunOutcome::Done => println!(
            "\n{} {}/{} tasks completed",
            "objective complete:".green().bold(),
            completed,
            snapshot.len()
        ),
        RunOutcome::Blocked => println!(
            "\n{} {}/{} tasks completed; edit dependencies and run again",
            "blocked:".yellow().bold(),
            completed,
            snapshot.len()
        ),
        RunOutcome::Drained => println!("\n{}", "nothing to do".dimmed()),
        RunOutcome::Paused => println!("\n{}", "paused".yellow()),
    }
    Ok(())
}

/// Stream engine events to stdout while a run is in progress
async fn print_events(mut rx: broadcast::Receiver<EngineEvent>) {
    loop {
        match rx.recv().await {
            Ok(EngineEvent::TasksGenerated { count, fallback, .. }) => {
                let source = if fallback { " (fallback)" } else { "" };
                println!("{} {} tasks{}", "generated:".bold(), count, source.dimmed());
            }
            Ok(EngineEvent::TaskStarted { title, .. }) => {
                println!("  {} {}", "▶".cyan(), title);
            }
            Ok(EngineEvent::TaskCompleted { title, .. }) => {
                println!("  {} {}", "✓".green(), title);
            }
            Ok(EngineEvent::SubtasksAttached { count, .. }) => {
                println!("  {} {} subtasks attached", "+".cyan(), count);
            }
            Ok(EngineEvent::Blocked { pending, unmet }) => {
                println!(
                    "  {} {} pending task(s) with unmet dependencies",
                    "blocked:".yellow(),
                    pending
                );
                for entry in unmet {
                    println!("      {} waiting on {}", entry.task_id, entry.missing.join(", ").dimmed());
                }
            }
            Ok(EngineEvent::EvaluationReady { recommendations, .. }) => {
                for rec in recommendations {
                    println!("  {} {}", "eval:".dimmed(), rec.message.dimmed());
                }
            }
            Ok(EngineEvent::ObjectiveCompleted { .. }) => {}
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Show persisted objectives and their progress
fn cmd_status(config: &Config, format: OutputFormat) -> Result<()> {
    let storage = Storage::new(config.storage.data_dir());
    let state = storage.load();

    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    if state.objectives.is_empty() {
        println!("{}", "no objectives yet".dimmed());
        return Ok(());
    }

    for stored in &state.objectives {
        let completed = stored
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .count();
        let active_marker = if state.active.as_deref() == Some(stored.objective.id.as_str()) {
            "*".green().to_string()
        } else {
            " ".to_string()
        };
        println!(
            "{} {} [{}] {}/{} tasks  {}",
            active_marker,
            stored.objective.title.bold(),
            stored.objective.status,
            completed,
            stored.tasks.len(),
            stored.objective.id.dimmed()
        );
    }
    Ok(())
}

/// Print the task tree of an objective
fn cmd_tasks(config: &Config, objective_id: Option<&str>) -> Result<()> {
    let storage = Storage::new(config.storage.data_dir());
    let state = storage.load();

    let stored = match objective_id {
        Some(id) => state.objectives.iter().find(|s| s.objective.id == id),
        None => state
            .active
            .as_deref()
            .and_then(|id| state.objectives.iter().find(|s| s.objective.id == id)),
    };

    let Some(stored) = stored else {
        println!("{}", "no matching objective".dimmed());
        return Ok(());
    };

    println!("{} ({})", stored.objective.title.bold(), stored.objective.id.dimmed());
    for task in &stored.tasks {
        println!("{}", format_task_line(task));
    }
    Ok(())
}

fn format_task_line(task: &Task) -> String {
    let glyph = match task.status {
        TaskStatus::Pending => "○".normal(),
        TaskStatus::Executing => "▶".cyan(),
        TaskStatus::Completed => "✓".green(),
    };
    let indent = "  ".repeat(task.depth as usize + 1);
    let mut line = format!("{}{} P{} {}", indent, glyph, task.priority, task.title);
    if let Some(category) = &task.category {
        line.push_str(&format!(" {}", format!("[{}]", category).dimmed()));
    }
    if let Some(estimate) = &task.estimated_time {
        line.push_str(&format!(" {}", format!("~{}", estimate).dimmed()));
    }
    if !task.dependencies.is_empty() {
        line.push_str(&format!(" {}", format!("deps: {}", task.dependencies.join(", ")).dimmed()));
    }
    line
}

/// Clear an objective's tasks back to the empty set
async fn cmd_reset(config: &Config, id: &str) -> Result<()> {
    let storage = Storage::new(config.storage.data_dir());
    let store = StoreHandle::spawn();
    let bus = Arc::new(EventBus::with_default_capacity());
    let mut manager = ObjectiveManager::open(storage, store, None, bus).await?;

    manager.reset_objective(id).await?;
    println!("{} {}", "reset:".bold(), id);
    Ok(())
}
