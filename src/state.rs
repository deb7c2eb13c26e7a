use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use crate::config::{AppConfig, DbConfig};
use crate::store::{initialize_store_with, MemoryStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UserStore>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Connects to Postgres and ensures the schema. Fails if the store is unreachable.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let options = config.db.connect_options()?;
        let store = initialize_store_with(options, config.db.pool_settings())
            .await
            .context("initialize store")?;

        Ok(Self::from_parts(Arc::new(store), Arc::new(config)))
    }

    pub fn from_parts(store: Arc<dyn UserStore>, config: Arc<AppConfig>) -> Self {
        Self { store, config }
    }

    /// In-memory store and fixed config, for tests.
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            db: DbConfig {
                database_url: None,
                host: "localhost".into(),
                port: 5432,
                user: "postgres".into(),
                password: None,
                name: "postgres".into(),
                sslmode: "disable".into(),
                timezone: None,
                prefer_simple_protocol: false,
                max_connections: 1,
                acquire_timeout_secs: 1,
            },
            host: "127.0.0.1".into(),
            port: 0,
            request_timeout: Duration::from_secs(5),
        });

        Self::from_parts(Arc::new(MemoryStore::new()), config)
    }
}
