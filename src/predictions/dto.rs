use serde::{Deserialize, Serialize};
use time::{macros::format_description, OffsetDateTime};

use crate::predictions::repo_types::Prediction;

pub const DEFAULT_PER_PAGE: i64 = 10;
pub const MAX_PER_PAGE: i64 = 50;

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// A page request after clamping: `page >= 1`, `1 <= per_page <= 50`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub page: i64,
    pub per_page: i64,
}

impl From<HistoryQuery> for Paging {
    fn from(q: HistoryQuery) -> Self {
        Self {
            page: q.page.unwrap_or(1).max(1),
            per_page: q.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
        }
    }
}

impl Paging {
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }

    pub fn meta(&self, total: i64) -> PageMeta {
        let pages = (total + self.per_page - 1) / self.per_page;
        PageMeta {
            total,
            pages,
            current_page: self.page,
            has_next: self.page < pages,
            has_prev: self.page > 1,
        }
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PageMeta {
    pub total: i64,
    pub pages: i64,
    pub current_page: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Debug, Serialize)]
pub struct HistoryItem {
    pub id: i64,
    pub image_url: String,
    pub prediction: String,
    pub confidence: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub date_formatted: String,
}

impl HistoryItem {
    pub fn from_row(row: Prediction, image_url: String) -> Self {
        Self {
            id: row.id,
            image_url,
            date_formatted: format_date(row.created_at),
            prediction: row.label,
            confidence: row.confidence,
            timestamp: row.created_at,
        }
    }
}

/// "October 19, 2026 01:05 PM"
pub fn format_date(t: OffsetDateTime) -> String {
    let fmt = format_description!("[month repr:long] [day], [year] [hour repr:12]:[minute] [period]");
    t.format(fmt).unwrap_or_default()
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub status: &'static str,
    pub predictions: Vec<HistoryItem>,
    #[serde(flatten)]
    pub meta: PageMeta,
}

#[derive(Debug, Serialize)]
pub struct PredictionItem {
    pub filename: String,
    pub prediction: String,
    pub confidence: f64,
    pub image_url: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FileError {
    pub filename: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub status: &'static str,
    pub predictions: Vec<PredictionItem>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FileError>,
}

/// Whole-request rejection of an upload, e.g. `missing_files`.
#[derive(Debug, Serialize)]
pub struct UploadRejection {
    pub status: &'static str,
    pub error: &'static str,
    pub message: String,
}
