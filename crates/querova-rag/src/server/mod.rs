//! HTTP server exposing the Q&A service

pub mod routes;

use axum::{extract::State, routing::get, Json, Router};
use std::net::SocketAddr;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::error::{Error, Result};
use crate::service::QaService;

/// Querova HTTP server
pub struct QuerovaServer {
    service: QaService,
}

impl QuerovaServer {
    pub fn new(service: QaService) -> Self {
        Self { service }
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        let config = &self.service.config().server;

        let router = Router::new()
            .route("/health", get(health))
            .nest("/api/v1", routes::api_routes(config.max_upload_size))
            .with_state(self.service.clone())
            .layer(TraceLayer::new_for_http());

        if config.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
            router.layer(cors)
        } else {
            router
        }
    }

    pub async fn start(self) -> Result<()> {
        let server = &self.service.config().server;
        let addr: SocketAddr = format!("{}:{}", server.host, server.port)
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

        let router = self.router();

        tracing::info!("Starting Querova server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind {}: {}", addr, e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| Error::internal(format!("Server error: {}", e)))?;

        Ok(())
    }
}

/// Liveness plus backend reachability
async fn health(State(service): State<QaService>) -> Json<serde_json::Value> {
    let (embedding, llm) = service.health().await;
    Json(serde_json::json!({
        "status": if embedding && llm { "ok" } else { "degraded" },
        "embedding_backend": embedding,
        "llm_backend": llm,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
