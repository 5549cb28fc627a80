use anyhow::Context;
use bytes::Bytes;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::storage::StorageClient;

pub const ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// One `files` part of a multipart upload. `oversized` parts were drained
/// without buffering and carry an empty body.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub filename: String,
    pub body: Bytes,
    pub oversized: bool,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IntakeError {
    #[error("File \"{0}\" is not supported. Please use PNG, JPG or JPEG images.")]
    UnsupportedType(String),
    #[error("File \"{filename}\" exceeds the maximum size limit of {limit}.")]
    TooLarge { filename: String, limit: String },
}

/// An upload that passed type and size checks and may be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedImage {
    pub extension: String,
}

/// Lower-cased extension when `filename` ends in an allowed one.
pub fn allowed_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

pub fn accept(file: &IncomingFile, max_bytes: usize) -> Result<AcceptedImage, IntakeError> {
    let extension = allowed_extension(&file.filename)
        .ok_or_else(|| IntakeError::UnsupportedType(file.filename.clone()))?;
    if file.oversized || file.body.len() > max_bytes {
        return Err(IntakeError::TooLarge {
            filename: file.filename.clone(),
            limit: format_limit(max_bytes),
        });
    }
    Ok(AcceptedImage { extension })
}

/// `uploads/YYYY/MM/<uuid>.<ext>`; the client's filename is never used.
pub fn storage_key(extension: &str, now: OffsetDateTime) -> String {
    format!(
        "uploads/{:04}/{:02}/{}.{}",
        now.year(),
        u8::from(now.month()),
        Uuid::new_v4(),
        extension
    )
}

impl AcceptedImage {
    /// Writes the bytes under a fresh key and returns that key.
    pub async fn store(
        &self,
        storage: &dyn StorageClient,
        body: Bytes,
        now: OffsetDateTime,
    ) -> anyhow::Result<String> {
        let key = storage_key(&self.extension, now);
        storage
            .put_object(&key, body)
            .await
            .with_context(|| format!("put_object {}", key))?;
        Ok(key)
    }
}

/// Accepts either a bare key or the full `image_url` we handed out earlier.
pub fn reference_from_request<'a>(raw: &'a str, public_base_url: &str) -> &'a str {
    let prefix = format!("{}/api/image/", public_base_url.trim_end_matches('/'));
    raw.strip_prefix(prefix.as_str())
        .unwrap_or(raw)
        .trim_start_matches('/')
}

pub fn image_url(public_base_url: &str, key: &str) -> String {
    format!("{}/api/image/{}", public_base_url.trim_end_matches('/'), key)
}

fn format_limit(bytes: usize) -> String {
    const MIB: usize = 1024 * 1024;
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{}MB", bytes / MIB)
    } else {
        format!("{bytes} bytes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn file(name: &str, len: usize) -> IncomingFile {
        IncomingFile {
            filename: name.into(),
            body: Bytes::from(vec![0u8; len]),
            oversized: false,
        }
    }

    #[test]
    fn extensions_are_case_insensitive() {
        assert_eq!(allowed_extension("scan.PNG").as_deref(), Some("png"));
        assert_eq!(allowed_extension("scan.final.JpEg").as_deref(), Some("jpeg"));
        assert_eq!(allowed_extension("scan.gif"), None);
        assert_eq!(allowed_extension("png"), None);
        assert_eq!(allowed_extension(""), None);
    }

    #[test]
    fn accept_checks_type_then_size() {
        let max = 16 * 1024 * 1024;
        assert_eq!(
            accept(&file("a.jpg", 10), max),
            Ok(AcceptedImage { extension: "jpg".into() })
        );
        assert_eq!(
            accept(&file("a.bmp", 10), max),
            Err(IntakeError::UnsupportedType("a.bmp".into()))
        );

        let err = accept(&file("a.png", 11), 10).unwrap_err();
        assert!(matches!(err, IntakeError::TooLarge { .. }));

        let drained = IncomingFile { oversized: true, ..file("big.png", 0) };
        let err = accept(&drained, max).unwrap_err();
        assert_eq!(
            err.to_string(),
            "File \"big.png\" exceeds the maximum size limit of 16MB."
        );
    }

    #[test]
    fn keys_are_partitioned_by_year_and_month() {
        let key = storage_key("png", datetime!(2026-03-05 10:00 UTC));
        assert!(key.starts_with("uploads/2026/03/"), "{key}");
        assert!(key.ends_with(".png"));
        assert_ne!(key, storage_key("png", datetime!(2026-03-05 10:00 UTC)));
    }

    #[test]
    fn full_image_urls_are_reduced_to_keys() {
        let base = "http://localhost:5000";
        let key = "uploads/2026/10/a.png";
        assert_eq!(reference_from_request(&image_url(base, key), base), key);
        assert_eq!(reference_from_request(key, base), key);
    }
}
