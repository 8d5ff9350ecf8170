#![forbid(unsafe_code)]

//! **orch-cli** – Command-line entry point for the agent pipeline
//! orchestrator.
//!
//! `serve` boots an in-memory bus and store, spawns the Reasoner and
//! Executor as background tasks, and runs the ingress HTTP server —
//! mirroring `toka-orchestration-service::main`'s daemon wiring. `health`
//! hits `GET /health` once and exits with the matching status code, the way
//! `toka-cli` shells out a single request per subcommand rather than
//! keeping a long-lived client around.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use orch_bus::{EventBus, InMemoryBus};
use orch_executor::{ExecutorContext, ToolFn, ToolOutput};
use orch_reasoner::{ReasoningFn, ReasoningOutput, ReasonerContext};
use orch_store::{DocumentStore, InMemoryStore};
use orch_types::Action;
use serde_json::Map;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

//─────────────────────────────
//  CLI structure
//─────────────────────────────

#[derive(Parser)]
#[command(name = "orch-cli")]
#[command(about = "Agent pipeline orchestrator - ingress/reasoner/executor demo")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run ingress, reasoner, and executor against the in-memory bus/store.
    Serve {
        /// Socket address the HTTP listener binds to, overriding `BIND_ADDR`.
        #[arg(long)]
        bind: Option<String>,
    },
    /// Probe a running instance's `GET /health` once and exit.
    Health {
        /// Base URL of the ingress service.
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    match cli.command {
        Commands::Serve { bind } => serve(bind).await,
        Commands::Health { url } => health(url).await,
    }
}

//─────────────────────────────
//  serve
//─────────────────────────────

async fn serve(bind_override: Option<String>) -> Result<()> {
    let mut ingress_config = orch_ingress::Config::from_env();
    if let Some(bind) = bind_override {
        ingress_config.bind_addr = bind;
    }
    let topic_action = std::env::var("TOPIC_ACTION")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| orch_bus::TOPIC_ACTION_REQUESTED.to_string());

    let store: Arc<dyn DocumentStore> = Arc::new(InMemoryStore::new());
    let bus: Arc<dyn EventBus> = Arc::new(InMemoryBus::default());

    let reasoner_ctx = ReasonerContext {
        store: store.clone(),
        bus: bus.clone(),
        reasoning_fn: Arc::new(DemoReasoningFn),
        topic_action: topic_action.clone(),
        receipt_stale_threshold: ingress_config.receipt_stale_threshold,
    };
    let executor_ctx = ExecutorContext {
        store: store.clone(),
        bus: bus.clone(),
        tool_fn: Arc::new(DemoToolFn),
        receipt_stale_threshold: ingress_config.receipt_stale_threshold,
    };

    let reasoning_topic = ingress_config.topic_reasoning.clone();
    tokio::spawn(async move { orch_reasoner::run(&reasoning_topic, reasoner_ctx).await });
    let action_topic = topic_action.clone();
    tokio::spawn(async move { orch_executor::run(&action_topic, executor_ctx).await });

    let state = orch_ingress::AppState {
        store,
        bus,
        config: Arc::new(ingress_config.clone()),
    };
    let app = orch_ingress::router(state);

    let listener = tokio::net::TcpListener::bind(&ingress_config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", ingress_config.bind_addr))?;
    info!("ingress listening on {}", ingress_config.bind_addr);

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            if let Err(err) = result {
                error!("HTTP server error: {}", err);
            }
        }
        _ = shutdown_signal() => {
            info!("received shutdown signal");
        }
    }

    info!("orch-cli shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

//─────────────────────────────
//  health
//─────────────────────────────

async fn health(url: String) -> Result<()> {
    let endpoint = format!("{}/health", url.trim_end_matches('/'));
    let response = reqwest::get(&endpoint)
        .await
        .with_context(|| format!("failed to reach {endpoint}"))?;
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    println!("{body}");
    if status.is_success() {
        Ok(())
    } else {
        std::process::exit(1)
    }
}

//─────────────────────────────
//  Demo reasoning / tool functions
//
//  Spec §1 treats these as external collaborators; these implementations
//  exist only so `serve` has something to run, per SPEC_FULL §3.8.
//─────────────────────────────

struct DemoReasoningFn;

#[async_trait]
impl ReasoningFn for DemoReasoningFn {
    async fn reason(&self, content: &str) -> ReasoningOutput {
        let lowered = content.to_lowercase();
        let action = if lowered.contains("calculate") || lowered.contains("compute") {
            Action::Calculate
        } else if lowered.contains("summarize") || lowered.contains("summary") {
            Action::Summarize
        } else if lowered.contains("translate") {
            Action::Translate
        } else {
            Action::Search
        };

        let mut parameters = Map::new();
        parameters.insert(
            "query".to_string(),
            serde_json::Value::String(content.to_string()),
        );

        ReasoningOutput {
            action: action.as_str().to_string(),
            parameters,
            confidence: 0.9,
        }
    }
}

struct DemoToolFn;

#[async_trait]
impl ToolFn for DemoToolFn {
    async fn invoke(&self, action: Action, parameters: &Map<String, serde_json::Value>) -> ToolOutput {
        let mut result = Map::new();
        result.insert(
            "tool".to_string(),
            serde_json::Value::String(action.as_str().to_string()),
        );
        result.insert(
            "echo".to_string(),
            serde_json::Value::Object(parameters.clone()),
        );
        ToolOutput {
            success: true,
            result,
            error: None,
        }
    }
}

//─────────────────────────────
//  Utility functions
//─────────────────────────────

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}
