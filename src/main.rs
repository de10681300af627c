//! Daily Meals shell - drives the recipe stores from the terminal
//!
//! Architecture:
//! - Shell loop - reads lines, prints rendered events
//! - App actor - runs each command as its own task against the stores
//! - Backend - Parse REST API, or an in-memory one with `--offline`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use daily_meals::app::{render, AppActor};
use daily_meals::backend::{Backend, MemoryBackend, ParseBackend};
use daily_meals::config::Config;
use daily_meals::constants::{APP_NAME, APP_VERSION, DEFAULT_LOG_FILE, LOG_FILTER_ENV};
use daily_meals::messages::{parse_command, Command, Event};
use daily_meals::storage::Storage;
use daily_meals::store::{AuthService, RecipeStore, SessionStore};

#[derive(Parser, Debug)]
#[command(name = "daily-meals", version, about = "Browse and manage Daily Meals recipes")]
struct Args {
    /// Config file (default: ~/.daily-meals/config.yaml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Use an in-memory backend seeded with sample cuisine types
    #[arg(long)]
    offline: bool,

    /// Log file
    #[arg(long, value_name = "PATH", default_value = DEFAULT_LOG_FILE)]
    log_file: PathBuf,
}

/// Log to a file so output never interleaves with the shell
fn init_logging(path: &Path) -> anyhow::Result<WorkerGuard> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .with_context(|| format!("invalid log file path {}", path.display()))?;

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();
    Ok(guard)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _log_guard = init_logging(&args.log_file)?;

    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let config = Config::load(&config_path)?.with_env_overrides();

    let backend: Arc<dyn Backend> = if args.offline {
        tracing::info!("Using in-memory backend");
        Arc::new(MemoryBackend::seeded())
    } else {
        tracing::info!(server = %config.server_url, "Using Parse backend");
        Arc::new(ParseBackend::new(&config)?)
    };

    let session = Arc::new(SessionStore::new());
    let store = Arc::new(RecipeStore::new(backend.clone(), session.clone()));
    let mut auth = AuthService::new(backend, session);
    // offline accounts vanish on exit, so their sessions are not kept
    if !args.offline {
        auth = auth.with_storage(Storage::new());
    }

    println!("{} {} - type 'help' for commands", APP_NAME, APP_VERSION);
    match auth.restore().await {
        Ok(Some(user)) => println!("Welcome back, {}", user.username),
        Ok(None) => {}
        Err(e) => println!("Could not restore session: {}", e),
    }

    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<Command>();
    let (event_tx, event_rx) = mpsc::unbounded_channel::<Event>();

    let app_actor = AppActor::new(Arc::new(auth), store, event_tx);
    let actor = tokio::spawn(app_actor.run(cmd_rx));

    run_shell(cmd_tx, event_rx).await?;
    actor.await?;
    Ok(())
}

/// Read commands until `quit` or end of input, printing events as they come
async fn run_shell(
    cmd_tx: mpsc::UnboundedSender<Command>,
    mut event_rx: mpsc::UnboundedReceiver<Event>,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match parse_command(&line) {
                    Ok(Some(command)) => {
                        let quit = command == Command::Quit;
                        let _ = cmd_tx.send(command);
                        if quit {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => println!("{}", e),
                }
            }
            Some(event) = event_rx.recv() => {
                println!("{}", render(&event));
            }
        }
    }

    // the actor finishes running commands, then closes the channel
    drop(cmd_tx);
    while let Some(event) = event_rx.recv().await {
        println!("{}", render(&event));
    }
    Ok(())
}
