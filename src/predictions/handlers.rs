use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, Path, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::{Bytes, BytesMut};
use tracing::{info, instrument, warn};

use crate::{
    auth::extractors::CurrentUser,
    config::UploadConfig,
    error::{error_response, ApiError},
    extract::ValidQuery,
    images::services::{image_url, reference_from_request, IncomingFile},
    predictions::{
        dto::{HistoryItem, HistoryQuery, HistoryResponse, Paging, PredictResponse, UploadRejection},
        repo_types::Prediction,
        services::predict_batch,
    },
    state::AppState,
    storage::sanitize_key,
};

pub fn prediction_routes(upload: &UploadConfig) -> Router<AppState> {
    // per-file limits are enforced while reading; this only bounds the whole request
    let body_limit = upload
        .max_files
        .saturating_mul(upload.max_file_bytes)
        .saturating_mul(2);
    Router::new()
        .route(
            "/api/predict",
            post(predict).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/api/history", get(history))
        .route("/api/image/*path", get(serve_image))
}

fn reject_upload(error: &'static str, message: impl Into<String>) -> Response {
    let body = UploadRejection {
        status: "error",
        error,
        message: message.into(),
    };
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

/// Reads every `files` part. Parts over `max_bytes` are drained and flagged
/// instead of buffered.
async fn read_files(
    mut mp: Multipart,
    max_bytes: usize,
    max_files: usize,
) -> Result<Vec<IncomingFile>, Response> {
    // an over-limit body surfaces here as a 413
    let malformed = |e: MultipartError| error_response(e.status(), e.body_text());

    let mut files = Vec::new();
    while let Some(mut field) = mp.next_field().await.map_err(malformed)? {
        if !matches!(field.name(), Some("files" | "files[]")) {
            continue;
        }
        if files.len() == max_files {
            return Err(reject_upload(
                "too_many_files",
                format!("Maximum {max_files} images allowed"),
            ));
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let mut buf = BytesMut::new();
        let mut oversized = false;
        while let Some(chunk) = field.chunk().await.map_err(malformed)? {
            if oversized {
                continue;
            }
            if buf.len() + chunk.len() > max_bytes {
                oversized = true;
                buf = BytesMut::new();
            } else {
                buf.extend_from_slice(&chunk);
            }
        }

        files.push(IncomingFile {
            filename,
            body: if oversized { Bytes::new() } else { buf.freeze() },
            oversized,
        });
    }
    Ok(files)
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn predict(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mp: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let Ok(mp) = mp else {
        return Ok(reject_upload("missing_files", "No images uploaded"));
    };
    let upload = &state.config.upload;
    let files = match read_files(mp, upload.max_file_bytes, upload.max_files).await {
        Ok(f) => f,
        Err(resp) => return Ok(resp),
    };
    if files.is_empty() {
        return Ok(reject_upload("missing_files", "No images uploaded"));
    }

    let received = files.len();
    let outcome = predict_batch(&state, user.id, files).await?;
    info!(
        received,
        succeeded = outcome.predictions.len(),
        failed = outcome.errors.len(),
        "batch processed"
    );

    let all_failed = outcome.predictions.is_empty();
    let body = PredictResponse {
        status: if all_failed { "error" } else { "success" },
        predictions: outcome.predictions,
        errors: outcome.errors,
    };
    let status = if all_failed {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };
    Ok((status, Json(body)).into_response())
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn history(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidQuery(query): ValidQuery<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let paging = Paging::from(query);
    let total = Prediction::count_by_user(&state.db, user.id).await?;
    let rows =
        Prediction::list_by_user(&state.db, user.id, paging.per_page, paging.offset()).await?;

    let base = &state.config.public_base_url;
    let predictions = rows
        .into_iter()
        .map(|row| {
            let url = image_url(base, &row.image_path);
            HistoryItem::from_row(row, url)
        })
        .collect();

    Ok(Json(HistoryResponse {
        status: "success",
        predictions,
        meta: paging.meta(total),
    }))
}

/// Streams back an uploaded image, but only to the user whose prediction
/// references it.
#[instrument(skip_all, fields(user_id = user.id))]
pub async fn serve_image(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(path): Path<String>,
) -> Result<Response, ApiError> {
    let reference = reference_from_request(&path, &state.config.public_base_url);
    let Some(key) = sanitize_key(reference) else {
        warn!(path = %path, "rejected image path");
        return Err(ApiError::bad_request("Invalid image path"));
    };

    let prediction = Prediction::find_by_image_path(&state.db, &key)
        .await?
        .ok_or_else(|| ApiError::not_found("Image not found"))?;
    if prediction.user_id != user.id {
        warn!(key = %key, owner = prediction.user_id, "image requested by non-owner");
        return Err(ApiError::forbidden(
            "You do not have permission to access this image.",
        ));
    }

    let Some(bytes) = state.storage.get_object(&key).await? else {
        warn!(key = %key, "prediction references a missing file");
        return Err(ApiError::not_found("Image not found"));
    };

    let mime = mime_guess::from_path(&key).first_or_octet_stream();
    Ok(([(header::CONTENT_TYPE, mime.to_string())], bytes).into_response())
}
