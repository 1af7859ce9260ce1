use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use relay_api::{LogRecord, PublishError};

use super::{AppState, send_log};

/// Body returned for every accepted record.
pub const ACK_MESSAGE: &str = "Log message sent to Kafka";

// ═══════════════════════════════════════════════════════════════
//  REST: POST /api/logs  {"level": "...", "message": "..."}
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_send_log(
    State(state): State<AppState>,
    Json(record): Json<LogRecord>,
) -> Response {
    match send_log(state.publisher.as_ref(), &state.topic, &record).await {
        Ok(delivery) => {
            tracing::debug!(
                topic = %delivery.topic,
                partition = delivery.partition,
                offset = ?delivery.offset,
                level = %record.level(),
                "log record published"
            );
            (StatusCode::OK, ACK_MESSAGE).into_response()
        }
        Err(e) => {
            tracing::error!(topic = %state.topic, kind = %e.kind(), error = %e, "publish failed");
            (status_for(&e), format!("error: {e}")).into_response()
        }
    }
}

fn status_for(err: &PublishError) -> StatusCode {
    match err {
        PublishError::Disconnected(_) | PublishError::Closed => StatusCode::SERVICE_UNAVAILABLE,
        PublishError::Rejected { .. } => StatusCode::BAD_GATEWAY,
        PublishError::EmptyTopic | PublishError::Serialization(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
