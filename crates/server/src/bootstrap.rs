use std::sync::Arc;

use farmlink_agent::{AgentRuntime, DataGovPriceClient, ReasoningEngine, RemoteReasoningEngine};
use farmlink_core::config::{AppConfig, ConfigError};
use farmlink_core::{ApplicationError, CommunityService, MarketEngine};
use farmlink_db::{connect_with_settings, migrations, DbPool, SqlCommunityStore, SqlMarketStore};
use thiserror::Error;
use tracing::info;

use crate::api::AppContext;
use crate::integrations::community_adapters;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub context: AppContext,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("integration setup failed: {0}")]
    Integration(#[source] ApplicationError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let context = build_context(&config, &db_pool).map_err(BootstrapError::Integration)?;
    info!(
        event_name = "system.bootstrap.context_ready",
        correlation_id = "bootstrap",
        remote_agent = context.agent.has_remote_engine(),
        market_data_key = config.market_data.api_key.is_some(),
        translation = config.community.translation_url.is_some(),
        push = config.community.push_url.is_some(),
        "application context assembled"
    );

    Ok(Application { config, db_pool, context })
}

fn build_context(config: &AppConfig, db_pool: &DbPool) -> Result<AppContext, ApplicationError> {
    let market = MarketEngine::new(Arc::new(SqlMarketStore::new(db_pool.clone())));

    let (translator, notifier) = community_adapters(&config.community)?;
    let community = CommunityService::new(
        Arc::new(SqlCommunityStore::new(db_pool.clone())),
        translator,
        notifier,
        config.community.push_topic.clone(),
        config.community.history_limit,
    );

    let prices = Arc::new(DataGovPriceClient::from_config(&config.market_data)?);
    let remote = RemoteReasoningEngine::from_config(&config.agent)?
        .map(|engine| Arc::new(engine) as Arc<dyn ReasoningEngine>);
    let agent = Arc::new(AgentRuntime::new(market.clone(), prices, remote));

    Ok(AppContext { market, community, agent })
}
