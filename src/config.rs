use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub session_ttl_minutes: i64,
    pub verification_ttl_hours: i64,
    pub reset_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub mailjet_api_key: Option<String>,
    pub mailjet_api_secret: Option<String>,
    pub sender: String,
    pub sender_name: String,
}

impl MailConfig {
    pub fn is_configured(&self) -> bool {
        self.mailjet_api_key.is_some() && self.mailjet_api_secret.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub path: PathBuf,
    pub input_size: u32,
    /// `[negative, positive]`; the positive label is chosen when p > 0.5.
    pub class_labels: [String; 2],
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub storage_root: PathBuf,
    pub max_file_bytes: usize,
    pub max_files: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub mail: MailConfig,
    pub model: ModelConfig,
    pub upload: UploadConfig,
    pub frontend_url: String,
    pub public_base_url: String,
    pub cookie_secure: bool,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://cancerscan.db?mode=rwc".into());
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "cancerscan".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "cancerscan-users".into()),
            session_ttl_minutes: env_parse("SESSION_TTL_MINUTES", 60),
            verification_ttl_hours: env_parse("VERIFICATION_TTL_HOURS", 24),
            reset_ttl_minutes: env_parse("RESET_TTL_MINUTES", 60),
        };
        let mail = MailConfig {
            mailjet_api_key: std::env::var("MAILJET_API_KEY").ok(),
            mailjet_api_secret: std::env::var("MAILJET_API_SECRET").ok(),
            sender: std::env::var("MAIL_SENDER").unwrap_or_else(|_| "noreply@example.com".into()),
            sender_name: std::env::var("MAIL_SENDER_NAME")
                .unwrap_or_else(|_| "Cancer Classification System".into()),
        };
        let model = ModelConfig {
            path: std::env::var("MODEL_PATH")
                .unwrap_or_else(|_| "./best_model.onnx".into())
                .into(),
            input_size: env_parse("MODEL_INPUT_SIZE", 224),
            class_labels: parse_labels(
                &std::env::var("CLASS_LABELS").unwrap_or_else(|_| "Cancer,Normal".into()),
            )?,
        };
        let upload = UploadConfig {
            storage_root: std::env::var("STORAGE_ROOT")
                .unwrap_or_else(|_| "./protected".into())
                .into(),
            max_file_bytes: env_parse("MAX_UPLOAD_BYTES", 16 * 1024 * 1024),
            max_files: env_parse("MAX_FILES_PER_REQUEST", 5),
        };
        let cors_origins = std::env::var("CORS_ORIGINS")
            .map(|v| split_list(&v))
            .unwrap_or_default();

        Ok(Self {
            database_url,
            jwt,
            mail,
            model,
            upload,
            frontend_url: std::env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:5000".into()),
            cookie_secure: env_parse("COOKIE_SECURE", true),
            cors_origins,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_labels(raw: &str) -> anyhow::Result<[String; 2]> {
    let labels = split_list(raw);
    match <[String; 2]>::try_from(labels) {
        Ok(pair) => Ok(pair),
        Err(got) => anyhow::bail!("CLASS_LABELS needs exactly two labels, got {}", got.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_list_trims_and_drops_empty_entries() {
        assert_eq!(
            split_list(" https://a.example , ,https://b.example"),
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }

    #[test]
    fn labels_require_exactly_two_entries() {
        let pair = parse_labels("Cancer, Normal").unwrap();
        assert_eq!(pair, ["Cancer".to_string(), "Normal".to_string()]);
        assert!(parse_labels("Cancer").is_err());
        assert!(parse_labels("a,b,c").is_err());
    }
}
