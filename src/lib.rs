pub mod bridge;
pub mod classifier;
pub mod db;
pub mod grouping;
pub mod lifecycle;
pub mod models;
pub mod sessionizer;
pub mod settings;
pub mod store;
pub mod utils;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};

use bridge::ObservedTabs;
use classifier::HttpClassifier;
use db::Database;
use lifecycle::{EngineConfig, EngineEvent, SessionEngine};
use utils::SystemClock;

const DEFAULT_DB_PATH: &str = "sessionswitch.sqlite3";

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn engine_config(debug_mode: bool) -> EngineConfig {
    let config = if debug_mode {
        EngineConfig::debug()
    } else {
        EngineConfig::default()
    };

    match std::env::var("SESSIONSWITCH_SINGLE_TAB_GRACE_MINUTES") {
        Ok(raw) => match raw.trim().parse::<i64>() {
            Ok(minutes) if minutes >= 0 => {
                config.with_single_tab_grace(chrono::Duration::minutes(minutes))
            }
            _ => {
                warn!("Ignoring invalid SESSIONSWITCH_SINGLE_TAB_GRACE_MINUTES={raw}");
                config
            }
        },
        Err(_) => config,
    }
}

async fn emit<T: Serialize>(stdout: &mut io::Stdout, value: &T) -> Result<()> {
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    stdout.write_all(&line).await?;
    stdout.flush().await?;
    Ok(())
}

async fn dispatch(
    engine: &SessionEngine,
    observed: &ObservedTabs,
    stdout: &mut io::Stdout,
    event: EngineEvent,
) -> Result<()> {
    match event {
        EngineEvent::Tab(observation) => {
            observed.record(&observation);
            let outcome = engine.capture_tab(observation).await;
            emit(stdout, &outcome).await?;
        }
        EngineEvent::IdleState { state } => engine.handle_signal(state).await,
        EngineEvent::TabRemoved { tab_id } => {
            observed.remove(tab_id);
            engine.forget_tab(tab_id).await;
        }
        EngineEvent::Clear => engine.clear().await?,
        EngineEvent::DeleteSession { session_id } => {
            if !engine.delete_session(&session_id).await? {
                warn!("Delete requested for unknown session {session_id}");
            }
        }
        EngineEvent::ClearSessions => {
            engine.clear_all_sessions().await?;
        }
        EngineEvent::SaveSettings { settings } => {
            let saved = engine.save_settings(&settings).await?;
            emit(stdout, &saved).await?;
        }
        EngineEvent::ListSessions => {
            let overview = engine.session_overview().await?;
            emit(stdout, &overview).await?;
        }
    }
    Ok(())
}

/// Host driver: newline-delimited JSON [`EngineEvent`]s on stdin, JSON replies on stdout.
pub async fn run() -> Result<()> {
    let debug_mode = env_flag("SESSIONSWITCH_DEBUG");
    utils::logging::init(debug_mode);

    info!("SessionSwitch starting up...");

    let db_path = std::env::var("SESSIONSWITCH_DB")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_DB_PATH));
    let database = Database::new(db_path)?;

    let config = engine_config(debug_mode);
    let classifier = Arc::new(HttpClassifier::new(config.classifier_timeout)?);
    let observed = Arc::new(ObservedTabs::new());

    let settings = database.load_settings().await?;
    if let Some(server_url) = settings.server_url() {
        match classifier.health(server_url).await {
            Ok(status) => info!("Classifier at {server_url} is reachable: {status}"),
            Err(err) => warn!("Classifier at {server_url} is unreachable: {err}"),
        }
    }

    let engine = SessionEngine::new(
        Arc::new(database),
        classifier,
        observed.clone(),
        Arc::new(SystemClock),
        config,
    );
    engine
        .initialize()
        .await
        .context("failed to initialize session engine")?;

    let mut stdout = io::stdout();
    let mut lines = BufReader::new(io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event: EngineEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(err) => {
                warn!("Ignoring malformed event: {err}");
                continue;
            }
        };

        if let Err(err) = dispatch(&engine, &observed, &mut stdout, event).await {
            warn!("Event handling failed: {err:#}");
        }
    }

    info!("Input closed, shutting down");
    engine.shutdown().await
}
