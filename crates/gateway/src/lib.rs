//! HTTP API gateway for Codewright.
//!
//! Exposes the chat endpoints under `/api/chat` plus a health check.
//! Built on Axum.

pub mod api;

use axum::extract::DefaultBodyLimit;
use axum::{Router, response::Json, routing::get};
use codewright_agent::{ConversationCache, Orchestrator};
use codewright_config::{AppConfig, GatewayConfig};
use codewright_core::provider::Provider;
use codewright_core::store::MetadataStore;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

/// Shared application state for the gateway.
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub store: Arc<dyn MetadataStore>,
    pub cache: Arc<ConversationCache>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Wire an orchestrator around an existing store.
    pub fn new(orchestrator: Orchestrator) -> Self {
        let cache = Arc::clone(orchestrator.cache());
        let store = Arc::clone(cache.store());
        Self {
            orchestrator: Arc::new(orchestrator),
            store,
            cache,
        }
    }

    /// Build every subsystem from configuration: provider, store, tools,
    /// cache and orchestrator.
    pub async fn from_config(config: &AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let provider = codewright_providers::build_from_config(config)?;
        let store =
            codewright_store::open(&config.store.database_url, config.store.max_connections)
                .await?;
        let tools = Arc::new(codewright_tools::default_registry(&config.tools));
        let cache = Arc::new(ConversationCache::new(store));

        info!(
            provider = provider.name(),
            store = cache.store().name(),
            model = %config.model,
            workspace = %config.tools.workspace_root.display(),
            "Subsystems ready"
        );

        Ok(Self::new(Orchestrator::from_config(
            config, provider, tools, cache,
        )))
    }
}

/// Build the Axum router with all gateway routes.
///
/// Layers applied:
/// - Request body size limit
/// - CORS, fully permissive unless disabled in configuration
/// - HTTP trace logging
pub fn build_router(state: SharedState, config: &GatewayConfig) -> Router {
    let router = Router::new()
        .route("/health", get(health_handler))
        .nest("/api/chat", api::chat_router())
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.body_limit));

    let router = if config.permissive_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    };

    router.layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    if !config.has_api_key() {
        warn!("No API key configured; chat requests will fail until one is set");
    }

    let state = Arc::new(AppState::from_config(&config).await?);
    let app = build_router(state, &config.gateway);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use codewright_agent::testing::ScriptedProvider;
    use codewright_core::tool::ToolRegistry;
    use codewright_store::InMemoryStore;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_state() -> SharedState {
        let store: Arc<dyn MetadataStore> = Arc::new(InMemoryStore::new());
        let cache = Arc::new(ConversationCache::new(store));
        let orchestrator = Orchestrator::new(
            Arc::new(ScriptedProvider::default()),
            Arc::new(ToolRegistry::new()),
            cache,
        );
        Arc::new(AppState::new(orchestrator))
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = build_router(test_state(), &GatewayConfig::default());

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn permissive_cors_answers_any_origin() {
        let app = build_router(test_state(), &GatewayConfig::default());

        let req = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "http://example.com")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
    }

    #[tokio::test]
    async fn cors_can_be_disabled() {
        let config = GatewayConfig {
            permissive_cors: false,
            ..GatewayConfig::default()
        };
        let app = build_router(test_state(), &config);

        let req = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "http://example.com")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert!(
            !response
                .headers()
                .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        );
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let config = GatewayConfig {
            body_limit: 64,
            ..GatewayConfig::default()
        };
        let app = build_router(test_state(), &config);

        let message = "x".repeat(256);
        let req = Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                serde_json::json!({"project_id": 1, "message": message}).to_string(),
            ))
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
