use std::io::{self, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wt_cli::commands::{clear, export, import, message, push, resume, status, stop, toggle};
use wt_cli::{Cli, Commands, Config};
use wt_core::Tracker;
use wt_db::SqliteStore;

/// Load config and open the state store, ensuring the parent directory exists.
fn open_tracker(config_path: Option<&Path>) -> Result<(Tracker<SqliteStore>, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let store = SqliteStore::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    Ok((Tracker::new(store), config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let (mut tracker, config) = open_tracker(cli.config.as_deref())?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let now = Utc::now();

    match command {
        Commands::Toggle(args) => toggle::run(&mut out, &mut tracker, args, now)?,
        Commands::Stop(args) => stop::run(&mut out, &mut tracker, args, now)?,
        Commands::Status(args) => status::run(&mut out, &tracker, args, now)?,
        Commands::Resume(args) => resume::run(&mut out, &mut tracker, args, now)?,
        Commands::Clear => clear::run(&mut out, &mut tracker)?,
        Commands::Export(args) => export::run(&mut out, &tracker, args, &config, now)?,
        Commands::Import(args) => {
            let input = args.read_input()?;
            import::run(&mut out, &mut tracker, &input, now)?;
        }
        Commands::Push(args) => push::run(&mut out, &mut tracker, args, &config, now)?,
        Commands::Message => {
            let mut input = String::new();
            io::stdin()
                .read_to_string(&mut input)
                .context("failed to read request from stdin")?;
            message::run(&mut out, &mut tracker, &input, now)?;
        }
    }

    out.flush()?;
    Ok(())
}
