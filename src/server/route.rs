use crate::server::websocket_listener;
use crate::session::SupervisorHandle;
use axum::extract::{State, WebSocketUpgrade};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use axum::{routing::get, Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

pub fn create_router(supervisor: SupervisorHandle, allowed_origin: HeaderValue) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_methods([Method::GET, Method::POST]);

    Router::new()
        .route("/socket", get(socket_handler))
        .route("/health", get(health_handler))
        .with_state(supervisor)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn socket_handler(
    ws: WebSocketUpgrade,
    State(supervisor): State<SupervisorHandle>,
) -> impl IntoResponse {
    websocket_listener::handle_websocket(ws, supervisor).await
}

async fn health_handler(State(supervisor): State<SupervisorHandle>) -> impl IntoResponse {
    match supervisor.snapshot().await {
        Ok(snapshot) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "clients": snapshot.clients.len(),
                "waiting": snapshot.waiting.is_some(),
                "rooms": snapshot.rooms.len(),
            })),
        ),
        Err(e) => {
            warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
        }
    }
}
