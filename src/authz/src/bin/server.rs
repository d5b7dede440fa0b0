//! # Scopegate Demo Server
//!
//! HTTP server showing the authorization gate in front of a small item API.
//!
//! ## Endpoints
//!
//! - `GET /items/:id` - requires scope `item:read`
//! - `PUT /items/:id` - requires scope `item:update`
//! - `GET /admin` - requires role `admin`
//! - `GET /me` - requires a verified credential
//! - `GET /health` - Health check
//! - `GET /metrics` - Prometheus metrics
//!
//! ## Configuration
//!
//! Environment variables:
//! - `PORT` - HTTP server port (default: 8080)
//! - `RUST_LOG` - Log level (default: info)
//! - gate settings as read by `GateConfig::from_env` (`JWT_SECRET`, `PERMISSIONS`, ...)

use anyhow::Context;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::{IntoResponse, Json, Response},
    routing::{get, put},
    serve, Extension, Router,
};
use scopegate_authz::http::{enforce, GateLayer};
use scopegate_authz::{
    AuthorizationGate, ConditionRegistry, GateConfig, Identity, MetricsCollector, RequestContext,
    Requirement,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Shared application state
#[derive(Clone)]
struct AppState {
    metrics: Arc<MetricsCollector>,
    start_time: std::time::Instant,
}

/// Identity echoed back to the caller
#[derive(Debug, Serialize)]
struct WhoAmI {
    subject: Option<String>,
    identity: Option<Identity>,
}

impl WhoAmI {
    fn from_context(context: &RequestContext) -> Self {
        Self {
            subject: context.subject_id("sub").map(str::to_string),
            identity: context.identity.clone(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    uptime_seconds: u64,
    version: String,
}

/// GET /items/:id
async fn get_item(Path(id): Path<String>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "id": id, "name": format!("item {}", id) }))
}

/// PUT /items/:id
async fn update_item(
    Path(id): Path<String>,
    Extension(context): Extension<RequestContext>,
) -> Json<serde_json::Value> {
    info!(item = %id, subject = ?context.subject_id("sub"), "Item updated");
    Json(serde_json::json!({ "id": id, "updated": true }))
}

/// GET /admin
async fn admin() -> &'static str {
    "welcome, administrator"
}

/// GET /me
async fn me(Extension(context): Extension<RequestContext>) -> Json<WhoAmI> {
    Json(WhoAmI::from_context(&context))
}

/// GET /health - Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        version: scopegate_authz::VERSION.to_string(),
    })
}

/// GET /metrics - Prometheus metrics endpoint
async fn metrics(State(state): State<AppState>) -> Response {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        state.metrics.export_prometheus().await,
    )
        .into_response()
}

/// Create the HTTP router with all endpoints
fn create_router(gate: Arc<AuthorizationGate>, state: AppState) -> Router {
    let guard = |requirement: Requirement| {
        from_fn_with_state(
            GateLayer::new(gate.clone(), requirement).with_trailing_path_id(),
            enforce,
        )
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace = TraceLayer::new_for_http().on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route(
            "/items/:id",
            get(get_item)
                .route_layer(guard(Requirement::scopes(["item:read"])))
                .merge(put(update_item).route_layer(guard(Requirement::scopes(["item:update"])))),
        )
        .route("/admin", get(admin).route_layer(guard(Requirement::roles(["admin"]))))
        .route("/me", get(me).route_layer(guard(Requirement::Authenticated)))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .layer(ServiceBuilder::new().layer(trace).layer(cors))
        .with_state(state)
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }

    info!("Starting graceful shutdown");
}

/// Main server entrypoint
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Scopegate demo server v{}", scopegate_authz::VERSION);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8080);

    let config = GateConfig::from_env().context("invalid gate configuration")?;
    let metrics = Arc::new(MetricsCollector::new());
    let gate = AuthorizationGate::from_config(&config, Arc::new(ConditionRegistry::new()), None)
        .context("failed to build authorization gate")?
        .with_metrics(metrics.clone());

    let state = AppState {
        metrics,
        start_time: std::time::Instant::now(),
    };

    let app = create_router(Arc::new(gate), state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Server shut down gracefully");
    Ok(())
}
