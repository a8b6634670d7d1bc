use std::sync::Arc;

use billburn_agent::{BurnPlanner, TransportError};
use billburn_core::config::{AppConfig, ConfigError, LoadOptions};
use billburn_db::{
    connect_from_config, migrations, BurnPlanRepository, DbPool, SqlBurnPlanRepository,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::api::AppState;
use crate::invoice::{InvoiceError, InvoiceRenderer};
use crate::storage::{self, BlobStore, StorageError};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: Option<DbPool>,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("agent transport setup failed: {0}")]
    Agent(#[from] TransportError),
    #[error("invoice renderer setup failed: {0}")]
    Invoice(#[from] InvoiceError),
    #[error("invoice storage setup failed: {0}")]
    Storage(#[from] StorageError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let (db_pool, store) = if config.database.enabled {
        let pool = connect_from_config(&config.database)
            .await
            .map_err(BootstrapError::DatabaseConnect)?;
        info!(
            event_name = "system.bootstrap.database_connected",
            correlation_id = "bootstrap",
            "database connection established"
        );

        migrations::run_pending(&pool).await.map_err(BootstrapError::Migration)?;
        info!(
            event_name = "system.bootstrap.migrations_applied",
            correlation_id = "bootstrap",
            "database migrations applied"
        );

        let store: Arc<dyn BurnPlanRepository> = Arc::new(SqlBurnPlanRepository::new(pool.clone()));
        (Some(pool), Some(store))
    } else {
        info!(
            event_name = "system.bootstrap.database_disabled",
            correlation_id = "bootstrap",
            "burn plan store disabled"
        );
        (None, None)
    };

    let planner = BurnPlanner::from_config(&config)?;
    if planner.is_none() {
        warn!(
            event_name = "system.bootstrap.agent_unconfigured",
            correlation_id = "bootstrap",
            "no agent runtime configured; burn plan requests will be rejected"
        );
    }

    let blob_store: Option<Arc<dyn BlobStore>> = storage::from_config(&config)?.map(Arc::from);
    let renderer = Arc::new(InvoiceRenderer::new()?);

    let state = AppState {
        planner,
        store,
        blob_store,
        renderer,
        invoice_expiration_secs: config.storage.expiration_secs,
    };

    Ok(Application { config, db_pool, state })
}
