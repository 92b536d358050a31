use std::sync::Arc;

use apss_core::SecurityEvent;
use axum::extract::{FromRequest, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::state::AppState;

const ALERTS_PAGE_SIZE: usize = 100;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/events", post(ingest_event))
        .route("/api/v1/agents", get(list_agents))
        .route("/api/v1/alerts", get(list_alerts))
        .route("/metrics", get(metrics))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy", "version": env!("CARGO_PKG_VERSION") }))
}

/// `Json` alone rejects a malformed body with 422; callers expect 400 on a
/// decode failure, so this wraps the rejection into our own response.
struct DecodedEvent(SecurityEvent);

impl<S> FromRequest<S> for DecodedEvent
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<SecurityEvent>::from_request(req, state).await {
            Ok(Json(event)) => Ok(Self(event)),
            Err(rejection) => {
                Err((StatusCode::BAD_REQUEST, Json(json!({ "error": rejection.body_text() }))).into_response())
            }
        }
    }
}

/// Updates agent liveness unconditionally, then offers the event to the
/// bounded queue. The two are deliberately not atomic: an agent must be
/// recognized as alive even while its event is dropped for a full queue.
async fn ingest_event(State(state): State<Arc<AppState>>, DecodedEvent(event): DecodedEvent) -> Response {
    state.touch_agent(&event.agent_id, &event.pod_name, &event.pod_namespace);

    match state.event_tx.try_send(event) {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(TrySendError::Full(_)) => {
            warn!("aggregator: event queue full, rejecting ingress");
            (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "error": "event queue full" }))).into_response()
        }
        Err(TrySendError::Closed(_)) => {
            debug!("aggregator: event queue closed, rejecting ingress");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

async fn list_agents(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.agent_snapshot())
}

async fn list_alerts(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.recent_alerts(ALERTS_PAGE_SIZE))
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.metrics_handle.render()
}
