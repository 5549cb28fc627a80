use anyhow::Context;
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::predictions::repo_types::Prediction;

const PREDICTION_COLUMNS: &str = "id, user_id, image_path, label, confidence, created_at";

impl Prediction {
    pub async fn insert_tx(
        tx: &mut Transaction<'_, Sqlite>,
        user_id: i64,
        image_path: &str,
        label: &str,
        confidence: f64,
    ) -> anyhow::Result<Prediction> {
        let row = sqlx::query_as::<_, Prediction>(&format!(
            r#"
            INSERT INTO predictions (user_id, image_path, label, confidence)
            VALUES (?, ?, ?, ?)
            RETURNING {PREDICTION_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(image_path)
        .bind(label)
        .bind(confidence)
        .fetch_one(&mut **tx)
        .await
        .context("insert prediction")?;
        Ok(row)
    }

    /// Newest first; rows created in the same instant keep insertion order reversed.
    pub async fn list_by_user(
        db: &SqlitePool,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Prediction>> {
        let rows = sqlx::query_as::<_, Prediction>(&format!(
            r#"
            SELECT {PREDICTION_COLUMNS}
            FROM predictions
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
        .context("list predictions")?;
        Ok(rows)
    }

    pub async fn count_by_user(db: &SqlitePool, user_id: i64) -> anyhow::Result<i64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM predictions WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(db)
            .await
            .context("count predictions")?;
        Ok(total)
    }

    pub async fn find_by_image_path(
        db: &SqlitePool,
        image_path: &str,
    ) -> anyhow::Result<Option<Prediction>> {
        let row = sqlx::query_as::<_, Prediction>(&format!(
            "SELECT {PREDICTION_COLUMNS} FROM predictions WHERE image_path = ?"
        ))
        .bind(image_path)
        .fetch_optional(db)
        .await
        .context("find prediction by image path")?;
        Ok(row)
    }
}
