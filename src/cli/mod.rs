// src/cli/mod.rs — CLI definition (clap derive)

pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "foresight",
    about = "Learn behavior patterns and predict what comes next",
    version
)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// SQLite database path (overrides config)
    #[arg(long, global = true)]
    pub db: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record one user action
    Record {
        /// task_interaction, page_navigation, gesture_use, voice_command or time_spent
        kind: String,
        /// Action payload as a JSON object
        #[arg(long)]
        payload: Option<String>,
        /// Current route or screen
        #[arg(long, default_value = "/")]
        location: String,
        /// Viewport width in pixels
        #[arg(long)]
        width: Option<u32>,
    },
    /// Run one mining pass over the recorded actions
    Mine,
    /// Generate predictions for the current context
    Predict,
    /// Suggest tasks for the current context
    Suggest,
    /// List learned behavior patterns
    Patterns,
    /// Show recorded actions, newest last
    History {
        /// Show at most this many actions
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Summary statistics over learned state
    Insights,
    /// Forget all recorded actions and learned patterns
    Clear,
}

impl Commands {
    /// Surroundings the command runs in. Only `record` carries any.
    pub fn surroundings(&self) -> (Option<u32>, String) {
        match self {
            Commands::Record {
                location, width, ..
            } => (*width, location.clone()),
            _ => (None, "/".to_string()),
        }
    }
}
