//! Status message endpoint
//!
//! - GET /api/v1/messages - Pending messages for the session, shown once

use axum::{extract::State, routing::get, Json, Router};

use crate::api::middleware::{AppState, SessionToken};
use crate::services::FlashMessage;

/// Build the message routes (requires auth middleware)
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(take_messages))
}

/// GET /api/v1/messages
async fn take_messages(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
) -> Json<Vec<FlashMessage>> {
    Json(state.flash.take(&token).await)
}
