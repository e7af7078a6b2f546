use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::db::{SongSubmission, User, UserRepository};
use crate::error::{AppError, AppResult};
use crate::AppState;

/// Participant and song-submission endpoints, mounted under `/api`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/user", get(get_user))
        .route("/createUser", get(create_user))
        .route("/updateUser", get(update_user))
        .route("/count", get(count))
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserQuery {
    pub user_id: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserQuery {
    pub user_id: Option<String>,
    pub song_uri: Option<String>,
    pub song_title: Option<String>,
    pub song_artist: Option<String>,
}

fn required(value: Option<String>, name: &str) -> AppResult<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("Missing query parameter: {}", name)))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<User>> {
    let user_id = required(query.user_id, "user_id")?;

    let user = UserRepository::find_by_user_id(&state.db, &user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CreateUserQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let user_id = required(query.user_id, "user_id")?;
    let email = required(query.email, "email")?;

    UserRepository::create(&state.db, &user_id, &email).await?;
    tracing::info!("Created user {}", user_id);

    Ok(Json(
        serde_json::json!({ "message": "Table updated successfully" }),
    ))
}

async fn update_user(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UpdateUserQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let user_id = required(query.user_id, "user_id")?;
    let song = SongSubmission {
        uri: query.song_uri,
        title: query.song_title,
        artist: query.song_artist,
    };

    UserRepository::update_song(&state.db, &user_id, &song).await?;

    Ok(Json(
        serde_json::json!({ "message": "User updated successfully" }),
    ))
}

async fn count(State(state): State<Arc<AppState>>) -> AppResult<Json<i64>> {
    Ok(Json(UserRepository::count(&state.db).await?))
}
