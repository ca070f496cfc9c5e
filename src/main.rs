use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use verdant_api::database::{pool, PgStore, Store};
use verdant_api::imagehost::ImageHost;
use verdant_api::state::AppState;
use verdant_api::{config, handlers, middleware, rpc};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Initialize configuration (this loads the config singleton)
    let config = config::config();
    tracing::info!("Starting Verdant API in {:?} mode", config.environment);

    let pool = pool::connect().await?;
    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
    let images = Arc::new(ImageHost::from_config(&config.imagehost));

    let app = app(AppState::new(store, images));

    // Allow tests or deployments to override port via env
    let port = std::env::var("VERDANT_API_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("Verdant API listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

fn app(state: AppState) -> Router {
    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .route("/auth/login", post(handlers::auth::login))
        // Operation surface (guards are per-operation)
        .route("/api/rpc/:operation", post(rpc::rpc_entry))
        .route("/api/upload", post(handlers::upload::upload))
        // Global middleware
        .layer(axum::middleware::from_fn(middleware::identity_middleware))
        .layer(DefaultBodyLimit::max(config::config().api.max_upload_size_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    let operations: Vec<Value> = rpc::catalogue()
        .into_iter()
        .map(|(name, kind)| json!({ "name": name, "kind": kind }))
        .collect();

    axum::response::Json(json!({
        "success": true,
        "data": {
            "name": "Verdant API",
            "version": version,
            "description": "Customer portal backend for a landscaping service",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "login": "/auth/login (public - token acquisition)",
                "rpc": "/api/rpc/:operation (guard per operation)",
                "upload": "/api/upload (staff)",
            },
            "operations": operations,
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match state.store.ping().await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            axum::response::Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            axum::response::Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }
            })),
        ),
    }
}
