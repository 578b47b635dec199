//! Export command: write records as JSON or CSV.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, ValueEnum};
use wt_core::{ExportData, ExportOptions, StateStore, Tracker, export};

use crate::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Csv,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Output format.
    #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
    pub format: ExportFormat,

    /// Leave the running timer out instead of ending it at export time.
    #[arg(long)]
    pub no_running: bool,

    /// Only export records with a recorded end.
    #[arg(long)]
    pub only_ended: bool,

    /// Minimum duration per row in seconds (defaults to `min_export_seconds`).
    #[arg(long)]
    pub min_seconds: Option<i64>,

    /// Write to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl ExportArgs {
    fn options(&self, config: &Config) -> ExportOptions {
        ExportOptions {
            include_running_as_ended: !self.no_running,
            only_ended: self.only_ended || self.no_running,
            min_duration_seconds: self.min_seconds.unwrap_or(config.min_export_seconds),
        }
    }
}

pub fn run<W: Write, S: StateStore>(
    writer: &mut W,
    tracker: &Tracker<S>,
    args: &ExportArgs,
    config: &Config,
    now: DateTime<Utc>,
) -> Result<()> {
    let data = tracker.export_data_at(args.options(config), now)?;

    if let Some(path) = &args.output {
        let file = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        let mut file = BufWriter::new(file);
        write_data(&mut file, &data, args.format)?;
        file.flush()
            .with_context(|| format!("failed to write {}", path.display()))?;
        writeln!(
            writer,
            "Exported {} rows to {}",
            data.rows.len(),
            path.display()
        )?;
        return Ok(());
    }

    write_data(writer, &data, args.format)
}

fn write_data<W: Write>(writer: &mut W, data: &ExportData, format: ExportFormat) -> Result<()> {
    match format {
        ExportFormat::Json => {
            writeln!(writer, "{}", serde_json::to_string_pretty(data)?)?;
        }
        ExportFormat::Csv => {
            export::write_csv(writer, &data.rows).context("failed to write CSV")?;
        }
    }
    Ok(())
}
