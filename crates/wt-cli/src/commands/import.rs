//! Import command for adding externally recorded intervals.
//!
//! Accepts a JSON array of rows, a JSON object with a `rows` array, or CSV
//! with a header line using the export column names.

use std::io::{self, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Deserialize;
use serde_json::{Map, Value};
use wt_core::{RawRow, StateStore, Tracker};

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// File to read. Reads stdin when omitted or `-`.
    pub file: Option<PathBuf>,
}

impl ImportArgs {
    /// Reads the whole input named by the arguments.
    pub fn read_input(&self) -> Result<String> {
        match self.file.as_deref() {
            Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display())),
            _ => {
                let mut input = String::new();
                io::stdin()
                    .read_to_string(&mut input)
                    .context("failed to read stdin")?;
                Ok(input)
            }
        }
    }
}

pub fn run<W: Write, S: StateStore>(
    writer: &mut W,
    tracker: &mut Tracker<S>,
    input: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    let rows = parse_rows(input)?;
    let imported = tracker
        .import_logs_at(&rows, now)
        .context("import rejected; nothing was imported")?;
    writeln!(writer, "Imported {imported} records.")?;
    Ok(())
}

fn parse_rows(input: &str) -> Result<Vec<RawRow>> {
    let trimmed = input.trim_start();
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        parse_json_rows(trimmed)
    } else {
        parse_csv_rows(input)
    }
}

fn parse_json_rows(input: &str) -> Result<Vec<RawRow>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Document {
        Rows(Vec<RawRow>),
        Wrapped { rows: Vec<RawRow> },
    }

    let document: Document = serde_json::from_str(input).context("invalid JSON import")?;
    Ok(match document {
        Document::Rows(rows) | Document::Wrapped { rows } => rows,
    })
}

fn parse_csv_rows(input: &str) -> Result<Vec<RawRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input.as_bytes());
    let headers = reader.headers().context("invalid CSV header")?.clone();

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("invalid CSV on line {}", idx + 2))?;
        let fields: Map<String, Value> = headers
            .iter()
            .zip(record.iter())
            .filter(|(_, value)| !value.is_empty())
            .map(|(name, value)| (name.to_string(), Value::String(value.to_string())))
            .collect();
        let row: RawRow = serde_json::from_value(Value::Object(fields))
            .with_context(|| format!("invalid row on line {}", idx + 2))?;
        rows.push(row);
    }
    Ok(rows)
}
