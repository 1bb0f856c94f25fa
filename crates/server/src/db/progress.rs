use std::sync::Arc;

use chess_puzzler::ProgressRepository;
use serde_json::Value as JsonValue;
use sqlx::PgPool;

use crate::error::AppError;

/// Where the progress document is kept.
#[derive(Clone)]
pub enum ProgressBackend {
    Postgres(PgPool),
    Local(Arc<dyn ProgressRepository>),
}

impl ProgressBackend {
    pub fn name(&self) -> &'static str {
        match self {
            ProgressBackend::Postgres(_) => "postgres",
            ProgressBackend::Local(_) => "local",
        }
    }

    pub async fn load(&self, key: &str) -> Result<Option<String>, AppError> {
        match self {
            ProgressBackend::Postgres(pool) => Ok(load_progress(pool, key)
                .await?
                .map(|value| value.to_string())),
            ProgressBackend::Local(repo) => Ok(repo.load(key)?),
        }
    }

    pub async fn save(&self, key: &str, document: &str) -> Result<(), AppError> {
        match self {
            ProgressBackend::Postgres(pool) => {
                let value: JsonValue = serde_json::from_str(document)
                    .map_err(|e| AppError::Internal(format!("Unserializable progress: {e}")))?;
                save_progress(pool, key, &value).await?;
                Ok(())
            }
            ProgressBackend::Local(repo) => Ok(repo.save(key, document)?),
        }
    }
}

pub async fn load_progress(pool: &PgPool, key: &str) -> Result<Option<JsonValue>, sqlx::Error> {
    sqlx::query_scalar::<_, JsonValue>("SELECT value FROM progress_store WHERE key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await
}

pub async fn save_progress(pool: &PgPool, key: &str, value: &JsonValue) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO progress_store (key, value, updated_at)
        VALUES ($1, $2, NOW())
        ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value,
                updated_at = NOW()
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}
