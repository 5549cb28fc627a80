use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::auth::jwt::TokenService;
use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::db;
use crate::inference::{ImageClassifier, OnnxModel};
use crate::notifications::{LogMailer, MailjetMailer, Mailer, Notifier};
use crate::storage::{LocalStorage, StorageClient};

/// Composition root: every long-lived dependency is built here once and shared.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
    pub clock: Arc<dyn Clock>,
    pub tokens: TokenService,
    pub storage: Arc<dyn StorageClient>,
    pub classifier: Arc<ImageClassifier>,
    pub notifier: Notifier,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = db::connect(&config.database_url).await?;

        let storage =
            Arc::new(LocalStorage::new(&config.upload.storage_root).await?) as Arc<dyn StorageClient>;

        // model load failure aborts startup
        let model = OnnxModel::load(&config.model.path, config.model.input_size)?;
        let classifier = Arc::new(ImageClassifier::new(
            Arc::new(model),
            config.model.input_size,
            config.model.class_labels.clone(),
        ));

        let mailer: Arc<dyn Mailer> = if config.mail.is_configured() {
            info!("mailjet delivery enabled");
            Arc::new(MailjetMailer::from_config(&config.mail)?)
        } else {
            warn!("MAILJET_API_KEY/MAILJET_API_SECRET not set; emails will only be logged");
            Arc::new(LogMailer)
        };
        let notifier = Notifier::new(mailer, &config.frontend_url, config.jwt.reset_ttl_minutes);

        Ok(Self::from_parts(
            db,
            config,
            Arc::new(SystemClock),
            storage,
            classifier,
            notifier,
        ))
    }

    pub fn from_parts(
        db: SqlitePool,
        config: Arc<AppConfig>,
        clock: Arc<dyn Clock>,
        storage: Arc<dyn StorageClient>,
        classifier: Arc<ImageClassifier>,
        notifier: Notifier,
    ) -> Self {
        let tokens = TokenService::new(&config.jwt, clock.clone());
        Self {
            db,
            config,
            clock,
            tokens,
            storage,
            classifier,
            notifier,
        }
    }
}
