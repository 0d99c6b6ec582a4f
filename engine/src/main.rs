use acoustic_engine::audit::AuditLogger;
use acoustic_engine::server::{self, AppState};
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use socketioxide::SocketIo;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "acoustic_engine=info,socketioxide=warn".into()),
        )
        .init();

    info!("acoustic-engine v{} starting", env!("CARGO_PKG_VERSION"));

    let audit_logger = AuditLogger::new();
    let (socket_layer, io) = SocketIo::builder().build_layer();
    let state = AppState::new(audit_logger, io);

    let cors_origins_env = std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "http://localhost:5173".to_string());
    let cors = if cors_origins_env.trim() == "*" {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = cors_origins_env.split(',').filter_map(|o| o.trim().parse().ok()).collect();
        CorsLayer::new().allow_origin(origins).allow_methods(Any).allow_headers(Any)
    };

    let app = Router::new()
        .route("/health", get(server::health_check))
        .route("/runs", post(server::submit_run))
        .route("/runs/:id", get(server::get_run))
        .route("/runs/:id/provenance", get(server::get_run_provenance))
        .layer(socket_layer)
        .layer(cors)
        .with_state(state);

    let port = std::env::var("PORT").unwrap_or_else(|_| "3001".to_string());
    let addr = format!("0.0.0.0:{port}");
    info!("listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
