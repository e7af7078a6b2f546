use sqlx::SqlitePool;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// User Repository
// ============================================================================

pub struct UserRepository;

impl UserRepository {
    /// Look up a participant by Spotify id. `None` means no such row.
    pub async fn find_by_user_id(pool: &SqlitePool, user_id: &str) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT
                id, user_id, email,
                last_song_uri, last_song_title, last_song_artist
            FROM users
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Insert a participant with no song yet. A second insert for the same
    /// `user_id` is rejected with `Conflict`.
    pub async fn create(pool: &SqlitePool, user_id: &str, email: &str) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (user_id, email)
            VALUES (?, ?)
            "#,
        )
        .bind(user_id)
        .bind(email)
        .execute(pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                tracing::debug!("Rejected duplicate user {}", user_id);
                Err(AppError::Conflict(format!("User {} already exists", user_id)))
            }
            Err(e) => Err(AppError::Database(e)),
        }
    }

    /// Record the latest song submission. No existence check; returns the number
    /// of rows touched, which is zero for an unknown `user_id`.
    pub async fn update_song(
        pool: &SqlitePool,
        user_id: &str,
        song: &SongSubmission,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET last_song_uri = ?,
                last_song_title = ?,
                last_song_artist = ?
            WHERE user_id = ?
            "#,
        )
        .bind(song.uri.as_deref())
        .bind(song.title.as_deref())
        .bind(song.artist.as_deref())
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        if result.rows_affected() == 0 {
            tracing::debug!("Song update for unknown user {} matched no rows", user_id);
        }

        Ok(result.rows_affected())
    }

    pub async fn count(pool: &SqlitePool) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await
            .map_err(AppError::Database)
    }

    /// One entry per user row, submitted or not, in insertion order.
    pub async fn list_songs(pool: &SqlitePool) -> AppResult<Vec<SongChoice>> {
        sqlx::query_as::<_, SongChoice>(
            r#"
            SELECT
                last_song_title AS title,
                last_song_artist AS artist
            FROM users
            ORDER BY id
            "#,
        )
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn list_emails(pool: &SqlitePool) -> AppResult<Vec<String>> {
        sqlx::query_scalar::<_, String>("SELECT email FROM users ORDER BY id")
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)
    }
}
