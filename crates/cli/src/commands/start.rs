//! Startup preflight: everything `farmlink-server` needs before it binds.

use farmlink_core::config::AppConfig;
use farmlink_core::market::MarketStore;
use farmlink_db::{DbPool, SqlMarketStore};

use crate::commands::{with_migrated_pool, CommandResult};

pub fn run() -> CommandResult {
    let result = with_migrated_pool("start", |pool| async move {
        delivery_agent_count(pool).await.map_err(|error| ("schema_check", error, 6u8))
    });

    match result {
        Ok((config, agents)) => CommandResult::success("start", preflight_message(&config, agents)),
        Err(failure) => failure,
    }
}

async fn delivery_agent_count(pool: DbPool) -> Result<usize, String> {
    SqlMarketStore::new(pool)
        .list_delivery_agents()
        .await
        .map(|agents| agents.len())
        .map_err(|error| error.to_string())
}

fn preflight_message(config: &AppConfig, agents: usize) -> String {
    let mut notes = vec![format!(
        "preflight passed; server will listen on {}:{}",
        config.server.bind_address, config.server.port
    )];
    if agents == 0 {
        notes.push("no delivery agents registered (run `farmlink seed`)".to_string());
    } else {
        notes.push(format!("{agents} delivery agents registered"));
    }
    notes.push(match &config.agent.engine_url {
        Some(url) => format!("remote reasoning engine at {url}"),
        None => "local agent router (no remote reasoning engine)".to_string(),
    });
    if config.market_data.api_key.is_none() {
        notes.push("market price lookups disabled: market_data.api_key is unset".to_string());
    }
    notes.join("; ")
}

#[cfg(test)]
mod tests {
    use farmlink_core::config::AppConfig;

    use super::preflight_message;

    #[test]
    fn default_config_notes_local_router_and_missing_price_key() {
        let message = preflight_message(&AppConfig::default(), 0);

        assert!(message.starts_with("preflight passed; server will listen on 127.0.0.1:8080"));
        assert!(message.contains("run `farmlink seed`"));
        assert!(message.contains("local agent router"));
        assert!(message.contains("market_data.api_key is unset"));
    }

    #[test]
    fn configured_engine_is_reported() {
        let mut config = AppConfig::default();
        config.agent.engine_url = Some("https://engine.example/stream".to_string());

        let message = preflight_message(&config, 3);
        assert!(message.contains("3 delivery agents registered"));
        assert!(message.contains("remote reasoning engine at https://engine.example/stream"));
    }
}
