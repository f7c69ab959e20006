mod app;
mod calculate;
mod config;
mod error;
mod extractors;
mod solve;
mod tracing_init;

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use clap::{Parser, Subcommand};
use inkcalc_engine::{CalculationService, GeminiVisionClient};

use crate::app::{build_router, AppState};
use crate::config::{ServerConfig, VisionConfig};
use crate::solve::SolveArgs;
use crate::tracing_init::init_tracing;

#[derive(Debug, Parser)]
#[command(name = "inkcalc", version, about = "Solves hand-drawn math with a vision model")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP service.
    Serve,
    /// Solve drawings from image files.
    Solve(SolveArgs),
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    init_tracing("info");

    match run().await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("inkcalc error: {err:#}");
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve => {
            serve().await?;
            Ok(0)
        }
        Command::Solve(args) => {
            let vision = VisionConfig::from_env()?;
            let service = build_service(&vision)?;
            solve::run_solve(args, &service, vision.prompt_variant, &mut io::stdout()).await
        }
    }
}

fn build_service(vision: &VisionConfig) -> Result<CalculationService> {
    match (&vision.model_fallback_reason, &vision.requested_model) {
        (Some(reason), Some(requested)) => {
            tracing::warn!(requested = %requested, model = %vision.model, "{reason}")
        }
        (Some(reason), None) => tracing::info!(model = %vision.model, "{reason}"),
        (None, _) => {}
    }
    let settings = vision.gemini_settings();
    let budget = settings.call_budget();
    let client = GeminiVisionClient::new(settings)?;
    Ok(CalculationService::new(Arc::new(client)).with_timeout(budget))
}

async fn serve() -> Result<()> {
    let config = ServerConfig::from_env()?;
    let service = build_service(&config.vision)?;
    let origin = HeaderValue::from_str(&config.client_url)
        .with_context(|| format!("CLIENT_URL is not a valid origin: {}", config.client_url))?;

    let state = AppState {
        calculator: Arc::new(service),
        default_variant: config.vision.prompt_variant,
    };
    let app = build_router(state, origin, config.body_limit_bytes);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(
        %addr,
        model = %config.vision.model,
        variant = %config.vision.prompt_variant,
        client_url = %config.client_url,
        "listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
