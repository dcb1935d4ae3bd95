use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use meridian_agent::confirmation::ConfirmationError;
use meridian_shared::models::chat::ChatMessage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct TurnResponse {
    pub messages: Vec<ChatMessage>,
    pub handoff: bool,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmationRequest {
    pub approve: bool,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/conversation/messages", post(post_message))
        .route(
            "/v1/conversation/confirmations/{id}",
            post(resolve_confirmation),
        )
}

async fn post_message(
    State(state): State<AppState>,
    Json(req): Json<MessageRequest>,
) -> Result<Json<TurnResponse>, AppError> {
    if req.message.trim().is_empty() {
        return Err(AppError::ValidationError(
            "message must not be empty".to_string(),
        ));
    }

    let mut session = state.session.lock().await;
    let outcome = session.handle_turn(&req.message).await;
    if outcome.handoff {
        tracing::warn!("conversation flagged for human handoff");
    }
    Ok(Json(TurnResponse {
        messages: outcome.messages,
        handoff: outcome.handoff,
    }))
}

async fn resolve_confirmation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ConfirmationRequest>,
) -> Result<Json<TurnResponse>, AppError> {
    let mut session = state.session.lock().await;
    match session.resolve_confirmation(id, req.approve) {
        Ok(messages) => Ok(Json(TurnResponse {
            messages,
            handoff: false,
        })),
        Err(ConfirmationError::NotFound(id)) => Err(AppError::NotFoundError(format!(
            "no pending confirmation {}",
            id
        ))),
        Err(err @ ConfirmationError::AwaitingSeatSelection) => {
            Err(AppError::ConflictError(err.to_string()))
        }
        Err(err) => Err(AppError::InternalServerError(err.to_string())),
    }
}
