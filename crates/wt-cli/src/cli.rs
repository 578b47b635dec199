//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::export::ExportArgs;
use crate::commands::import::ImportArgs;
use crate::commands::push::PushArgs;
use crate::commands::resume::ResumeArgs;
use crate::commands::status::StatusArgs;
use crate::commands::stop::StopArgs;
use crate::commands::toggle::ToggleArgs;

/// Work-item timer.
///
/// Tracks time against tasks one at a time, keeps a conflict-free log of
/// completed intervals, and exports or pushes that log to a work-log service.
#[derive(Debug, Parser)]
#[command(name = "wt", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the timer for a task, or stop it if it is the one running.
    Toggle(ToggleArgs),

    /// Stop whatever timer is running.
    Stop(StopArgs),

    /// Show the running timer and recent records.
    Status(StatusArgs),

    /// Start the timer again for a logged record's task.
    Resume(ResumeArgs),

    /// Delete every logged record. The running timer is kept.
    Clear,

    /// Export records as JSON or CSV.
    Export(ExportArgs),

    /// Import records from a JSON or CSV file (or stdin).
    Import(ImportArgs),

    /// Send unsent records to the remote work-log service.
    Push(PushArgs),

    /// Handle one JSON request from stdin and print the JSON response.
    Message,
}
