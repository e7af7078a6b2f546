use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};

use crate::error::AppResult;
use crate::services::poll::{PollOutcome, PollService};
use crate::AppState;

/// Telegram endpoints, mounted under `/telegram`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/poll", get(poll))
}

/// Send the song poll if every expected participant has submitted.
async fn poll(State(state): State<Arc<AppState>>) -> AppResult<Json<PollOutcome>> {
    let outcome = PollService::new(&state).poll_if_complete().await?;
    Ok(Json(outcome))
}
