use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use relay_hub::ConnectionRegistry;
use relay_protocol::ModelProviderPort;
use relay_runtime::StubModelProvider;
use serde::Serialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

mod ws;

use crate::ws::{RunTable, ws_upgrade};

#[derive(Debug, Parser)]
#[command(name = "relay-api")]
#[command(about = "Agent run execution and real-time broadcast server")]
struct Cli {
    #[arg(long, default_value = "127.0.0.1:8900")]
    listen: SocketAddr,
    /// Model used when a run request does not name one.
    #[arg(long)]
    default_model: Option<String>,
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) registry: Arc<ConnectionRegistry>,
    pub(crate) provider: Arc<dyn ModelProviderPort>,
    pub(crate) runs: RunTable,
    pub(crate) default_model: Option<String>,
}

#[derive(Debug, Serialize)]
struct ModelsResponse {
    models: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();
    let state = AppState {
        registry: Arc::new(ConnectionRegistry::new()),
        provider: Arc::new(StubModelProvider),
        runs: RunTable::default(),
        default_model: cli.default_model,
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/models", get(list_models))
        .route("/ws", get(ws_upgrade))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(cli.listen).await?;
    info!(listen = %cli.listen, "relay-api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "relay-api"
    }))
}

async fn list_models() -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: available_models(),
    })
}

fn available_models() -> Vec<String> {
    [
        "gpt-4o",
        "gpt-4-turbo",
        "claude-3-opus",
        "claude-3-sonnet",
        "claude-3-haiku",
    ]
    .map(str::to_owned)
    .to_vec()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    {
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(error) => {
                    tracing::error!(%error, "failed to install SIGTERM handler");
                }
            }
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
}
