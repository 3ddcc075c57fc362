pub mod companion;
pub mod daily_flow;
pub mod gateway;
pub mod models;
pub mod session;
pub mod settings;
pub mod signals;
pub mod store;
mod utils;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};

use companion::Companion;
use session::FocusEvent;
use settings::SettingsStore;
use store::{JsonFileStore, KeyValueStore, SqliteStore};

pub fn run() {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("Companion starting up...");

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            log::error!("Failed to start async runtime: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(serve()) {
        log::error!("Companion stopped: {err:#}");
        std::process::exit(1);
    }
}

async fn serve() -> Result<()> {
    let data_dir = settings::data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;

    let store: Arc<dyn KeyValueStore> = match std::env::var("COMPANION_STORE").as_deref() {
        Ok("json") => Arc::new(JsonFileStore::new(data_dir.join("companion.json"))?),
        _ => Arc::new(SqliteStore::new(data_dir.join("companion.sqlite3"))?),
    };
    let settings = SettingsStore::new(data_dir.join("settings.json"))?.get();
    log::info!("Using data directory {}", data_dir.display());

    let mut companion = Companion::new(store, &settings);

    // Timer completions arrive outside the request/response loop.
    let mut events = companion.focus().subscribe();
    let notifier = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(FocusEvent::Completed { session }) => {
                    let minutes = session.active_ms(chrono::Utc::now()) / 60_000;
                    println!("Focus session finished after {minutes} min. Nice work!");
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                log::error!("Failed to read input: {err}");
                break;
            }
        };
        if matches!(line.trim(), "/quit" | "/exit") {
            break;
        }
        for reply in companion.handle_line(&line).await {
            println!("{reply}");
        }
    }

    companion.shutdown().await;
    notifier.abort();
    log::info!("Companion shut down");
    Ok(())
}
