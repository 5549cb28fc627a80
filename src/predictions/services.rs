use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};

use crate::{
    images::services::{accept, image_url, IncomingFile},
    inference::Classification,
    predictions::{
        dto::{FileError, PredictionItem},
        repo_types::Prediction,
    },
    state::AppState,
};

/// What came out of one upload batch: successes in upload order plus one
/// error per rejected file.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub predictions: Vec<PredictionItem>,
    pub errors: Vec<FileError>,
}

struct Stored {
    filename: String,
    key: String,
    result: Classification,
}

fn file_error(filename: &str, message: impl Into<String>) -> FileError {
    FileError {
        filename: filename.to_string(),
        message: message.into(),
    }
}

/// Classifies and stores each file in turn, then records every success in a
/// single transaction. Per-file problems become `errors`; only a failed
/// commit fails the batch, after removing the files it had written.
pub async fn predict_batch(
    state: &AppState,
    user_id: i64,
    files: Vec<IncomingFile>,
) -> anyhow::Result<BatchOutcome> {
    let mut outcome = BatchOutcome::default();
    let mut stored: Vec<Stored> = Vec::new();

    for file in files {
        let accepted = match accept(&file, state.config.upload.max_file_bytes) {
            Ok(a) => a,
            Err(e) => {
                warn!(filename = %file.filename, reason = %e, "upload rejected");
                outcome.errors.push(file_error(&file.filename, e.to_string()));
                continue;
            }
        };

        let classifier = Arc::clone(&state.classifier);
        let body = file.body.clone();
        let classified = tokio::task::spawn_blocking(move || classifier.classify(&body))
            .await
            .context("classification task panicked")
            .and_then(|r| r);
        let result = match classified {
            Ok(r) => r,
            Err(e) => {
                warn!(filename = %file.filename, error = %e, "classification failed");
                outcome.errors.push(file_error(
                    &file.filename,
                    format!("Failed to analyze \"{}\".", file.filename),
                ));
                continue;
            }
        };

        let key = match accepted
            .store(state.storage.as_ref(), file.body, state.clock.now())
            .await
        {
            Ok(k) => k,
            Err(e) => {
                error!(filename = %file.filename, error = ?e, "storing upload failed");
                outcome.errors.push(file_error(
                    &file.filename,
                    format!("Failed to save file \"{}\". Please try again.", file.filename),
                ));
                continue;
            }
        };

        stored.push(Stored {
            filename: file.filename,
            key,
            result,
        });
    }

    if stored.is_empty() {
        return Ok(outcome);
    }

    if let Err(e) = record_all(state, user_id, &stored).await {
        for s in &stored {
            if let Err(del) = state.storage.delete_object(&s.key).await {
                warn!(key = %s.key, error = %del, "orphaned upload left behind");
            }
        }
        return Err(e);
    }

    info!(user_id, count = stored.len(), "predictions recorded");
    let base = &state.config.public_base_url;
    outcome.predictions = stored
        .into_iter()
        .map(|s| PredictionItem {
            image_url: image_url(base, &s.key),
            filename: s.filename,
            prediction: s.result.label,
            confidence: s.result.confidence,
        })
        .collect();
    Ok(outcome)
}

async fn record_all(state: &AppState, user_id: i64, stored: &[Stored]) -> anyhow::Result<()> {
    let mut tx = state.db.begin().await.context("begin prediction batch")?;
    for s in stored {
        Prediction::insert_tx(&mut tx, user_id, &s.key, &s.result.label, s.result.confidence)
            .await?;
    }
    tx.commit().await.context("commit prediction batch")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::test_support::{png_bytes, TestApp, TEST_MAX_FILE_BYTES};

    fn upload(name: &str, body: Vec<u8>) -> IncomingFile {
        IncomingFile {
            filename: name.into(),
            body: Bytes::from(body),
            oversized: false,
        }
    }

    fn stored_files(app: &TestApp) -> usize {
        fn walk(dir: &std::path::Path) -> usize {
            std::fs::read_dir(dir)
                .map(|entries| {
                    entries
                        .flatten()
                        .map(|e| if e.path().is_dir() { walk(&e.path()) } else { 1 })
                        .sum()
                })
                .unwrap_or(0)
        }
        walk(app.storage_dir.path())
    }

    #[tokio::test]
    async fn mixed_batch_keeps_successes_and_reports_failures() {
        let app = TestApp::new().await;
        let user = app.create_user("a@example.com", None, true).await;

        let files = vec![
            upload("scan.png", png_bytes()),
            upload("notes.txt", b"hello".to_vec()),
            upload("broken.jpg", b"not really a jpeg".to_vec()),
            upload("huge.png", vec![0; TEST_MAX_FILE_BYTES + 1]),
        ];
        let outcome = predict_batch(&app.state, user.id, files).await.unwrap();

        assert_eq!(outcome.predictions.len(), 1);
        let item = &outcome.predictions[0];
        assert_eq!(item.filename, "scan.png");
        assert_eq!(item.prediction, "Normal");
        assert!(item.image_url.starts_with("http://api.test/api/image/uploads/"));

        let names: Vec<_> = outcome.errors.iter().map(|e| e.filename.as_str()).collect();
        assert_eq!(names, ["notes.txt", "broken.jpg", "huge.png"]);
        assert_eq!(outcome.errors[1].message, "Failed to analyze \"broken.jpg\".");

        // undecodable images are never written
        assert_eq!(stored_files(&app), 1);
        assert_eq!(Prediction::count_by_user(&app.state.db, user.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn failed_commit_removes_written_files() {
        let app = TestApp::new().await;
        // no such user: the foreign key fails the insert
        let result = predict_batch(&app.state, 4242, vec![upload("scan.png", png_bytes())]).await;

        assert!(result.is_err());
        assert_eq!(stored_files(&app), 0);
    }
}
