use std::sync::Arc;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::config::AppConfig;
use crate::storage::{Storage, StorageClient};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn StorageClient>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let storage = Arc::new(
            Storage::new(
                &config.storage.endpoint,
                &config.storage.bucket,
                &config.storage.access_key,
                &config.storage.secret_key,
                &config.storage.region,
            )
            .await?,
        ) as Arc<dyn StorageClient>;

        Ok(Self {
            db,
            config,
            storage,
        })
    }

    pub fn from_parts(db: PgPool, config: Arc<AppConfig>, storage: Arc<dyn StorageClient>) -> Self {
        Self {
            db,
            config,
            storage,
        }
    }
}
