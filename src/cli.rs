//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// GoalDaemon - autonomous goal decomposition and task execution
#[derive(Parser)]
#[command(
    name = "gd",
    about = "Break an objective into tasks and execute them autonomously",
    version,
    after_help = "Logs are written to: <data-dir>/goaldaemon/logs/goaldaemon.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Create an objective, generate its tasks, and run to completion
    Run {
        /// Objective title
        title: String,

        /// Optional description / context
        description: Option<String>,

        /// Simulated per-task execution delay in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,
    },

    /// Show persisted objectives and their progress
    Status {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the task tree of the active (or a given) objective
    Tasks {
        /// Objective id (defaults to the active objective)
        #[arg(short, long)]
        objective: Option<String>,
    },

    /// Clear an objective's tasks back to the empty set
    Reset {
        /// Objective id
        id: String,
    },
}

/// Output format for status output
#[derive(Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}
