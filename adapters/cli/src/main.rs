#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Terminal adapter that runs Tower Catch against a catalog directory.

mod catalog_files;
mod config;
mod input;
mod render;

use std::{
    fs::OpenOptions,
    io::{self, BufRead},
    path::{Path, PathBuf},
    process::ExitCode,
    sync::{mpsc, Mutex},
    thread,
    time::Duration,
};

use anyhow::{Context, Result};
use clap::Parser;
use tower_catch_core::{Command, Event, Timestamp};
use tower_catch_store::{FileStore, KeyValueStore, MemoryStore};
use tower_catch_world::{apply, query, Config, Session};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{config::Settings, input::Input};

const DEFAULT_CONFIG_PATH: &str = "tower-catch.toml";
const DEFAULT_LOG_FILTER: &str = "tower_catch=info";
const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Command-line arguments for the Tower Catch terminal game.
#[derive(Debug, Parser)]
#[command(name = "tower-catch", version, about = "Catch rare towers by typing their names")]
struct Args {
    /// TOML settings file; defaults apply when the default file is absent.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Directory holding saved accounts and progress.
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,
    /// Directory holding the per-tier catalog files.
    #[arg(long, value_name = "DIR")]
    catalog_dir: Option<PathBuf>,
    /// Seed for every random stream.
    #[arg(long)]
    seed: Option<u64>,
    /// Keep everything in memory instead of on disk.
    #[arg(long)]
    memory: bool,
    /// Append logs to this file instead of standard error.
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

/// Entry point for the Tower Catch command-line interface.
fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    init_logging(args.log_file.as_deref())?;

    let settings = match &args.config {
        Some(path) => Settings::load(path, true)?,
        None => Settings::load(Path::new(DEFAULT_CONFIG_PATH), false)?,
    };
    let data_dir = args.data_dir.unwrap_or(settings.data_dir);
    let catalog_dir = args.catalog_dir.unwrap_or(settings.catalog_dir);
    let seed = args
        .seed
        .or(settings.seed)
        .unwrap_or_else(|| Timestamp::now().as_millis());

    let catalog = catalog_files::load(&catalog_dir, &settings.catalog_files);
    let store: Box<dyn KeyValueStore> = if args.memory {
        Box::new(MemoryStore::new())
    } else {
        Box::new(
            FileStore::open(&data_dir)
                .with_context(|| format!("failed to open save directory {}", data_dir.display()))?,
        )
    };

    let now = Timestamp::now();
    let mut session = Session::open(store, catalog, Config::new(seed), now).with_context(|| {
        format!(
            "cannot start without towers; add tier lists to {}",
            catalog_dir.display()
        )
    })?;
    info!(seed, data_dir = %data_dir.display(), "session opened");

    println!("{}", query::welcome_banner(&session));
    let mut events = Vec::new();
    if !session.resume(now, &mut events) {
        println!("{}", render::sign_in_hint());
    }
    print_events(&events);

    play(&mut session);
    Ok(())
}

/// Feeds typed lines and one tick per interval into the session until quit.
fn play<S: KeyValueStore>(session: &mut Session<S>) {
    let (lines_tx, lines_rx) = mpsc::channel();
    let _ = thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if lines_tx.send(line).is_err() {
                break;
            }
        }
    });

    loop {
        let mut events = Vec::new();
        match lines_rx.recv_timeout(TICK_INTERVAL) {
            Ok(line) => match input::parse(&line) {
                Ok(Input::Command(command)) => {
                    apply(session, command, Timestamp::now(), &mut events);
                }
                Ok(Input::Show(view)) => {
                    println!("{}", render::view(session, &view, Timestamp::now()));
                }
                Ok(Input::Quit) => break,
                Ok(Input::Empty) => {}
                Err(error) => println!("{error}"),
            },
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
        apply(session, Command::Tick, Timestamp::now(), &mut events);
        print_events(&events);
    }

    // Commit the playtime accrued since the last whole second.
    let mut events = Vec::new();
    apply(session, Command::Tick, Timestamp::now(), &mut events);
    print_events(&events);
    info!("terminal closed");
}

fn print_events(events: &[Event]) {
    for event in events {
        if let Some(line) = render::event(event) {
            println!("{line}");
        }
    }
}

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(io::stderr).init(),
    }
    Ok(())
}
