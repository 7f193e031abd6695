#![forbid(unsafe_code)]

//! `mission-relay` — mission orchestration server binary.
//!
//! Bootstraps configuration, connects the database, wires the delegate
//! router, and serves the mission streaming API until a shutdown signal
//! arrives.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use mission_relay::api::{routes, AppState};
use mission_relay::config::GlobalConfig;
use mission_relay::delegate::evidence::EvidenceDelegate;
use mission_relay::delegate::http::HttpDelegate;
use mission_relay::delegate::router::DelegateRouter;
use mission_relay::delegate::scripted::ScriptedDelegate;
use mission_relay::delegate::Delegate;
use mission_relay::models::mission::MissionStatus;
use mission_relay::models::step::DelegateTier;
use mission_relay::orchestrator::bus::ResumeBus;
use mission_relay::persistence::db;
use mission_relay::persistence::mission_repo::{MissionPatch, MissionRepo};
use mission_relay::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "mission-relay", about = "Mission orchestration server", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the configured HTTP port.
    #[arg(long)]
    port: Option<u16>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("mission-relay server bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => GlobalConfig::load_from_path(path)?,
        None => GlobalConfig::default(),
    };
    if let Some(port) = args.port {
        config.http_port = port;
    }
    info!(port = config.http_port, "configuration loaded");

    let db = Arc::new(db::connect(&config.db_path()).await?);
    info!("database connected");

    recover_interrupted(&db).await;

    let router = Arc::new(build_delegate_router(&config)?);
    let state = AppState {
        config: config.clone(),
        db,
        bus: ResumeBus::new(),
        router,
    };

    let app = routes::build_router(state);
    let bind = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .map_err(|err| AppError::Config(format!("failed to bind {bind}: {err}")))?;
    info!(%bind, "mission API listening");

    let ct = CancellationToken::new();
    let server_ct = ct.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("shutdown signal received");
            server_ct.cancel();
        })
        .await
        .map_err(|err| AppError::Config(format!("server error: {err}")))?;

    info!("mission-relay shut down");
    Ok(())
}

/// Wire the tier routing table from configuration.
///
/// L3 runs the multi-source evidence adapter; L2 and L4 run either the
/// remote HTTP adapter or the in-process scripted one.
fn build_delegate_router(config: &GlobalConfig) -> Result<DelegateRouter> {
    let evidence = Arc::new(EvidenceDelegate::with_default_sources());

    let router = match &config.delegate.http_endpoint {
        Some(endpoint) => {
            info!(endpoint, "routing L2/L4 to remote delegate workers");
            let remote: Arc<dyn Delegate> = Arc::new(HttpDelegate::new(endpoint.clone())?);
            DelegateRouter::new()
                .with_tier(DelegateTier::L2, Arc::clone(&remote))
                .with_tier(DelegateTier::L3, evidence)
                .with_tier(DelegateTier::L4, remote)
        }
        None => {
            info!("no delegate endpoint configured; using in-process workers");
            let scripted: Arc<dyn Delegate> = Arc::new(ScriptedDelegate::new());
            DelegateRouter::new()
                .with_tier(DelegateTier::L2, Arc::clone(&scripted))
                .with_tier(DelegateTier::L3, evidence)
                .with_tier(DelegateTier::L4, scripted)
        }
    };

    Ok(router)
}

/// Fail missions stranded mid-run by a prior crash.
///
/// Engine tasks do not survive a restart, so any non-terminal mission
/// found on startup can never resume.
async fn recover_interrupted(db: &Arc<db::Database>) {
    let repo = MissionRepo::new(Arc::clone(db));
    let stranded = match repo.list_unfinished().await {
        Ok(missions) => missions,
        Err(err) => {
            error!(%err, "startup recovery scan failed");
            return;
        }
    };

    if stranded.is_empty() {
        info!("no interrupted missions found on startup");
        return;
    }

    info!(count = stranded.len(), "failing interrupted missions");
    for mission in &stranded {
        let patch = MissionPatch {
            status: Some(MissionStatus::Failed),
            failure_reason: Some("interrupted_by_restart".to_owned()),
            checkpoint_id: Some(None),
            completed_at: Some(Utc::now()),
            ..Default::default()
        };
        if let Err(err) = repo.save_state(&mission.id, patch).await {
            error!(mission_id = %mission.id, %err, "failed to mark mission interrupted");
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
