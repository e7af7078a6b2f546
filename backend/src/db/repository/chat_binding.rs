use sqlx::SqlitePool;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Chat Binding Repository
// ============================================================================

pub struct ChatBindingRepository;

impl ChatBindingRepository {
    pub async fn exists(pool: &SqlitePool, user_name: &str) -> AppResult<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT id FROM telegram_bindings WHERE user_name = ?")
                .bind(user_name)
                .fetch_optional(pool)
                .await
                .map_err(AppError::Database)?;
        Ok(found.is_some())
    }

    pub async fn create(pool: &SqlitePool, user_name: &str, chat_id: i64) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO telegram_bindings (user_name, chat_id)
            VALUES (?, ?)
            "#,
        )
        .bind(user_name)
        .bind(chat_id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;
        Ok(())
    }

    pub async fn update(pool: &SqlitePool, user_name: &str, chat_id: i64) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE telegram_bindings
            SET chat_id = ?
            WHERE user_name = ?
            "#,
        )
        .bind(chat_id)
        .bind(user_name)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;
        Ok(())
    }

    /// Create the binding on first contact, refresh its chat id afterwards.
    pub async fn bind(pool: &SqlitePool, binding: &ChatBinding) -> AppResult<()> {
        if Self::exists(pool, &binding.user_name).await? {
            Self::update(pool, &binding.user_name, binding.chat_id).await
        } else {
            Self::create(pool, &binding.user_name, binding.chat_id).await
        }
    }

    /// Chat ids of every binding, oldest first.
    pub async fn list_chat_ids(pool: &SqlitePool) -> AppResult<Vec<i64>> {
        sqlx::query_scalar::<_, i64>("SELECT chat_id FROM telegram_bindings ORDER BY id")
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::memory_pool;

    #[tokio::test]
    async fn bind_creates_then_refreshes() {
        let pool = memory_pool().await;
        assert!(!ChatBindingRepository::exists(&pool, "alice").await.unwrap());

        let mut binding = ChatBinding {
            user_name: "alice".to_string(),
            chat_id: 100,
        };
        ChatBindingRepository::bind(&pool, &binding).await.unwrap();
        assert!(ChatBindingRepository::exists(&pool, "alice").await.unwrap());
        assert_eq!(ChatBindingRepository::list_chat_ids(&pool).await.unwrap(), vec![100]);

        binding.chat_id = -200;
        ChatBindingRepository::bind(&pool, &binding).await.unwrap();
        assert_eq!(ChatBindingRepository::list_chat_ids(&pool).await.unwrap(), vec![-200]);
    }

    #[tokio::test]
    async fn chat_ids_keep_insertion_order() {
        let pool = memory_pool().await;
        ChatBindingRepository::create(&pool, "alice", 1).await.unwrap();
        ChatBindingRepository::create(&pool, "bob", 2).await.unwrap();
        ChatBindingRepository::update(&pool, "alice", 3).await.unwrap();

        assert_eq!(
            ChatBindingRepository::list_chat_ids(&pool).await.unwrap(),
            vec![3, 2]
        );
    }

    #[tokio::test]
    async fn duplicate_binding_is_rejected_by_the_store() {
        let pool = memory_pool().await;
        ChatBindingRepository::create(&pool, "alice", 1).await.unwrap();
        assert!(matches!(
            ChatBindingRepository::create(&pool, "alice", 2).await,
            Err(AppError::Database(_))
        ));
    }
}
