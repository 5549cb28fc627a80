use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Prediction {
    pub id: i64,
    pub user_id: i64,
    pub image_path: String,
    pub label: String,
    pub confidence: f64,
    pub created_at: OffsetDateTime,
}
