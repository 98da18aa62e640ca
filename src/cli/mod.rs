use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::ConfigLoader;
use crate::storage::{self, StateFile};

pub mod commands;

use self::commands::{AdvanceArgs, InitArgs, ParseArgs, ScheduleArgs, Workspace};

#[derive(Parser, Debug)]
#[command(
    name = "planner",
    version,
    about = "Plain-text planner that rolls daily, weekly and longer logs forward"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over PLANNER_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over PLANNER_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the first logs and start tracking a day
    Init(InitArgs),
    /// Move the planner to the next day, ending every period that runs out
    Advance(AdvanceArgs),
    /// Resolve a date expression and print its canonical form
    Parse(ParseArgs),
    /// File a task with a [$date$] marker on the tasklist
    Schedule(ScheduleArgs),
    /// Show the tracked date and current logs (default)
    Status,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var("PLANNER_CONFIG", path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var("PLANNER_DATA", path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    init_tracing(&cli.log_level)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let config = loader.load_or_init()?;
    let store = storage::init(&paths, &config.storage)?;
    let mut ws = Workspace {
        config,
        store,
        state: StateFile::in_dir(&paths.state_dir),
    };

    let now = commands::local_now();
    let command = cli.command.unwrap_or(Commands::Status);
    let output = match command {
        Commands::Init(args) => commands::init(&mut ws, args, now.date()),
        Commands::Advance(args) => commands::advance(&mut ws, args, now),
        Commands::Parse(args) => commands::parse_expr(args, now.date()),
        Commands::Schedule(args) => commands::schedule(&mut ws, args, now.date()),
        Commands::Status => commands::status(&ws),
    }?;
    print!("{output}");
    Ok(())
}

fn init_tracing(level: &str) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
        Ok(())
    })
    .map(|_| ())
}
