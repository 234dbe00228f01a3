//! goalplan API gateway
//!
//! HTTP front end for AI plan generation:
//! - breaks goals into tasks and tasks into subtasks via a completion endpoint
//! - persists generated plans in SQLite
//! - serves the resulting task tree

use std::time::Duration;

use anyhow::{Context, Result};
use axum::http::{header, HeaderName, HeaderValue, Method};
use goalplan_planner::{GenerationOptions, HttpCompletionClient, PlanGenerator};
use goalplan_store::Store;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod auth;
mod config;
mod error;
mod routes;

use config::{GoalplanConfig, LogFormat, LoggingConfig};

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(auth::USER_ID_HEADER),
        ])
}

fn build_planner(config: &GoalplanConfig) -> Result<PlanGenerator<HttpCompletionClient>> {
    let completion = &config.completion;
    let client = HttpCompletionClient::with_timeout(
        &completion.base_url,
        Duration::from_secs(completion.timeout_seconds),
    )
    .context("Failed to build completion client")?;

    Ok(PlanGenerator::new(client)
        .with_model(completion.model.clone())
        .with_options(GenerationOptions {
            temperature: Some(completion.temperature),
            max_tokens: Some(completion.max_tokens),
        }))
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load_config()?;
    init_tracing(&config.logging);

    info!("goalplan API gateway starting...");
    match &config.source {
        Some(path) => info!(path = %path, "Configuration loaded"),
        None => info!("No config file found, using defaults"),
    }

    let store = Store::open(&config.database.path)
        .with_context(|| format!("Failed to open database at {}", config.database.path))?;
    info!(path = %config.database.path, "Database ready");

    let planner = build_planner(&config)?;
    info!(
        endpoint = %config.completion.base_url,
        model = %config.completion.model,
        "Completion backend configured"
    );

    let app = routes::router(routes::AppState::new(store, planner))
        .layer(cors_layer(&config.server.cors_origins))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.server.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.listen_addr))?;
    info!("API gateway listening on http://{}", config.server.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
        .context("HTTP server failed")?;
    Ok(())
}
