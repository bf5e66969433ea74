//! # rfremoted — RF remote daemon
//!
//! Composition root that wires all adapters together and drives the session
//! from a line console on stdin.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars)
//! - Install the tracing subscriber
//! - Initialize the `SQLite` connection pool and run migrations
//! - Construct the BLE gateway, the stores and the notification router
//! - Spawn the connection session and restore the remembered peripheral
//! - Read console commands until `quit`, end of input or Ctrl-C
//! - Shut the session down so the link is released
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;
mod console;

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use rfremote_adapter_ble::BtleplugGateway;
use rfremote_adapter_storage_sqlite_sqlx::{
    Config as StorageConfig, SqliteKeyValueStore, SqliteSavedCodeRepository, SqliteSessionStore,
};
use rfremote_app::router::{NotificationEvent, NotificationRouter};
use rfremote_app::services::saved_code_service::SavedCodeService;
use rfremote_app::session::{ConnectionSession, SessionHandle};

use crate::config::Config;
use crate::console::{Command, Console, Outcome, ParseError};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    init_tracing(&config.logging.filter);

    // Database
    let db = StorageConfig {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await?;
    let kv = SqliteKeyValueStore::new(db.pool().clone());

    // Stores
    let session_store = SqliteSessionStore::new(kv.clone());
    let saved_codes = SavedCodeService::new(SqliteSavedCodeRepository::new(kv));

    // Radio
    let gateway = BtleplugGateway::new(config.ble.clone());
    let router = Arc::new(NotificationRouter::new(&config.router));

    // Session
    let session = ConnectionSession::spawn(
        gateway,
        session_store,
        Arc::clone(&router),
        config.session.clone(),
        config.ble.profile(),
    );
    tokio::spawn(report(session.clone(), router.subscribe()));

    if config.session.restore_on_start {
        match session.restore().await {
            Ok(true) => tracing::info!("remembered peripheral restored"),
            Ok(false) => tracing::debug!("no peripheral to restore"),
            Err(err) => tracing::warn!(%err, "restoring remembered peripheral failed"),
        }
    }

    let console = Console::new(session.clone(), saved_codes);
    eprintln!("rfremoted ready, type `help` for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = &mut ctrl_c => {
                tracing::info!("interrupted");
                break;
            }
        };
        let Some(line) = line else { break };

        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(ParseError::Empty) => continue,
            Err(err) => {
                eprintln!("error: {err}");
                continue;
            }
        };
        match console.execute(command).await {
            Ok(Outcome::Print(text)) => println!("{text}"),
            Ok(Outcome::Quit) => break,
            Err(err) => eprintln!("error: {err}"),
        }
    }

    session.shutdown().await;
    tracing::info!("session closed");
    Ok(())
}

fn init_tracing(filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}

/// Print state changes and captured codes as they happen.
async fn report(session: SessionHandle, mut events: broadcast::Receiver<NotificationEvent>) {
    let mut state = session.watch_state();
    loop {
        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                println!("state: {}", *state.borrow_and_update());
            }
            event = events.recv() => match event {
                Ok(NotificationEvent::Sniffed(code)) => {
                    println!("captured: {} {} protocol {}", code.raw, code.band, code.protocol);
                }
                Ok(NotificationEvent::Telemetry(_) | NotificationEvent::Malformed { .. }) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "console fell behind on notifications");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}
