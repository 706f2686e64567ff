//! HTTP request handlers

use super::types::{ChatRequest, ErrorResponse, SessionRequest, SuccessResponse};
use super::AppState;
use crate::engine::Reply;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/session/reset", post(reset_session))
        .route("/api/orders/reset", post(reset_orders))
        .route("/health", get(health))
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Chat
// ============================================================

async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<Reply>, AppError> {
    let session_id = req
        .session_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("sessionId is required".to_string()))?;

    let message = req.message.unwrap_or_default();
    let reply = state.engine.handle_message(session_id, &message).await;
    Ok(Json(reply))
}

// ============================================================
// Session lifecycle
// ============================================================

async fn reset_session(
    State(state): State<AppState>,
    Json(req): Json<SessionRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    let session_id = req
        .session_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("sessionId is required".to_string()))?;

    state.engine.sessions().remove(session_id);
    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================
// Admin
// ============================================================

async fn reset_orders(State(state): State<AppState>) -> Result<Json<SuccessResponse>, AppError> {
    state
        .orders
        .reset_to_seed()
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================
// Health / Version
// ============================================================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn get_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// ============================================================
// Error handling
// ============================================================

enum AppError {
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => {
                // Detail stays in the logs, not on the wire.
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{in_transit_order, MockOrderStore, MockResolver, RecordingNotifier};
    use crate::resolver::{IntentAction, IntentOutcome};
    use crate::session::SessionStore;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::sync::Arc;
    use tower::util::ServiceExt;

    fn test_state() -> (AppState, Arc<MockResolver>) {
        let resolver = Arc::new(MockResolver::new());
        let state = AppState::new(
            Arc::new(SessionStore::new()),
            resolver.clone(),
            Arc::new(MockOrderStore::new().with_order(in_transit_order("AWB123456"))),
            Arc::new(RecordingNotifier::new()),
        );
        (state, resolver)
    }

    async fn post_json(router: Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(
                Request::post(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn missing_session_id_is_bad_request() {
        let (state, _) = test_state();
        let router = create_router(state);

        let (status, json) =
            post_json(router, "/api/chat", serde_json::json!({ "message": "hi" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "sessionId is required");
    }

    #[tokio::test]
    async fn blank_session_id_is_bad_request() {
        let (state, _) = test_state();
        let router = create_router(state);

        let (status, _) = post_json(
            router,
            "/api/chat",
            serde_json::json!({ "sessionId": "  ", "message": "hi" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn chat_round_trip_serializes_reply() {
        let (state, resolver) = test_state();
        resolver.queue(IntentOutcome::new(IntentAction::Greeting));
        let router = create_router(state);

        let (status, json) = post_json(
            router,
            "/api/chat",
            serde_json::json!({ "sessionId": "s1", "message": "hello" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["conversationState"], "INITIAL");
        assert!(json["response"].is_string());
        assert!(json.get("sessionExpired").is_none());
    }

    #[tokio::test]
    async fn tracking_message_returns_otp_flags() {
        let (state, _) = test_state();
        let router = create_router(state);

        let (status, json) = post_json(
            router,
            "/api/chat",
            serde_json::json!({ "sessionId": "s1", "message": "track AWB123456" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["conversationState"], "AWAITING_OTP");
        assert_eq!(json["requiresOtp"], true);
    }

    #[tokio::test]
    async fn session_reset_succeeds() {
        let (state, _) = test_state();
        let router = create_router(state);

        let (status, json) = post_json(
            router,
            "/api/session/reset",
            serde_json::json!({ "sessionId": "s1" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
    }

    #[tokio::test]
    async fn health_endpoint() {
        let (state, _) = test_state();
        let router = create_router(state);

        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
