use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use interlink_store::Database;

use crate::config::ServerConfig;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::realtime::{session, ConnectionRegistry, MessageDispatcher, ReadStateReconciler};

pub mod chat;
pub mod extract;
pub mod notifications;

/// The store shared by every handler. Each call locks it for one statement
/// (or a short group of them); nothing assumes atomicity across two calls.
pub type SharedDb = Arc<Mutex<Database>>;

#[derive(Clone)]
pub struct AppState {
    pub db: SharedDb,
    pub registry: ConnectionRegistry,
    pub dispatcher: MessageDispatcher,
    pub reconciler: ReadStateReconciler,
    pub rate_limiter: RateLimiter,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(database: Database, config: ServerConfig) -> Self {
        let db: SharedDb = Arc::new(Mutex::new(database));
        let registry = ConnectionRegistry::new();
        Self {
            dispatcher: MessageDispatcher::new(db.clone(), registry.clone()),
            reconciler: ReadStateReconciler::new(db.clone(), registry.clone()),
            rate_limiter: RateLimiter::new(config.rate_limit_per_sec, config.rate_limit_burst),
            config: Arc::new(config),
            db,
            registry,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = match HeaderValue::from_str(&state.config.frontend_url) {
        Ok(origin) => CorsLayer::new().allow_origin(origin),
        Err(_) => {
            warn!(url = %state.config.frontend_url, "Invalid FRONTEND_URL, allowing any origin");
            CorsLayer::new().allow_origin(Any)
        }
    }
    .allow_methods([
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ])
    .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let api = Router::new()
        .nest("/chat", chat::router())
        .nest("/notifications", notifications::router())
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        .route("/ws", get(session::ws_handler))
        .nest("/api", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
    live_connections: usize,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        live_connections: state.registry.live_connection_count().await,
    })
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::test_support::{body_json, TestHarness};

    #[tokio::test]
    async fn test_health() {
        let harness = TestHarness::new();
        let response = build_router(harness.state.clone())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_info_reports_live_connections() {
        let harness = TestHarness::new();
        let student = harness
            .account(interlink_shared::Role::Student, "Ada", "Lovelace")
            .await;
        let (_conn, _rx) = harness.connect(&student).await;

        let response = build_router(harness.state.clone())
            .oneshot(Request::get("/info").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["name"], "Interlink");
        assert_eq!(body["liveConnections"], 1);
    }

    #[tokio::test]
    async fn test_ws_handshake_rejected_without_credential() {
        let harness = TestHarness::new();
        let response = build_router(harness.state.clone())
            .oneshot(Request::get("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(harness.state.registry.live_connection_count().await, 0);

        let response = build_router(harness.state.clone())
            .oneshot(Request::get("/ws?token=forged").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
