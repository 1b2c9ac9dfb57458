//! Demo dataset: a small delivery-agent registry and a handful of listings
//! visible from every location.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;

use farmlink_core::domain::delivery::{DeliveryAgent, DeliveryAgentCode, DeliveryAgentId};
use farmlink_core::domain::product::{Location, Product, ProductId};
use farmlink_core::domain::session::UserId;
use farmlink_core::market::{MarketStore, StoreError};

struct SeedAgent {
    id: &'static str,
    code: &'static str,
}

struct SeedListing {
    id: &'static str,
    name: &'static str,
    category: &'static str,
    price_paise: i64,
    quantity: u32,
    seller_id: &'static str,
    seller_name: &'static str,
}

const SEED_AGENTS: &[SeedAgent] = &[
    SeedAgent { id: "agent-doc-001", code: "DA-001" },
    SeedAgent { id: "agent-doc-002", code: "DA-002" },
    SeedAgent { id: "agent-doc-003", code: "DA-003" },
];

const SEED_LISTINGS: &[SeedListing] = &[
    SeedListing {
        id: "seed-prod-tomato",
        name: "Tomato",
        category: "vegetable",
        price_paise: 2800,
        quantity: 150,
        seller_id: "seed-seller-kaveri",
        seller_name: "Kaveri Farms",
    },
    SeedListing {
        id: "seed-prod-onion",
        name: "Onion",
        category: "vegetable",
        price_paise: 3450,
        quantity: 200,
        seller_id: "seed-seller-kaveri",
        seller_name: "Kaveri Farms",
    },
    SeedListing {
        id: "seed-prod-paddy",
        name: "Paddy",
        category: "grain",
        price_paise: 2250,
        quantity: 500,
        seller_id: "seed-seller-delta",
        seller_name: "Delta Growers Collective",
    },
    SeedListing {
        id: "seed-prod-banana",
        name: "Banana",
        category: "fruit",
        price_paise: 4000,
        quantity: 80,
        seller_id: "seed-seller-delta",
        seller_name: "Delta Growers Collective",
    },
];

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SeedResult {
    pub agents_inserted: usize,
    pub agents_skipped: usize,
    pub listings_inserted: usize,
    pub listings_skipped: usize,
}

/// Inserts the demo dataset. Records that already exist are skipped, so the
/// seed can be re-run safely.
pub async fn seed_demo(store: &dyn MarketStore) -> Result<SeedResult, StoreError> {
    let mut result = SeedResult::default();

    let existing_agents = store.list_delivery_agents().await?;
    for seed in SEED_AGENTS {
        if existing_agents.iter().any(|agent| agent.code.0 == seed.code) {
            result.agents_skipped += 1;
            continue;
        }
        store
            .insert_delivery_agent(&DeliveryAgent {
                id: DeliveryAgentId(seed.id.to_string()),
                code: DeliveryAgentCode(seed.code.to_string()),
                orders_assigned: Vec::new(),
            })
            .await?;
        result.agents_inserted += 1;
    }

    for seed in SEED_LISTINGS {
        let id = ProductId(seed.id.to_string());
        if store.find_product(&id).await?.is_some() {
            result.listings_skipped += 1;
            continue;
        }
        store
            .insert_product(&Product {
                id,
                name: seed.name.to_string(),
                category: seed.category.to_string(),
                price_per_kg: Decimal::new(seed.price_paise, 2),
                quantity_available: seed.quantity,
                seller_id: UserId(seed.seller_id.to_string()),
                seller_name: seed.seller_name.to_string(),
                location: Location::global(),
                rating: None,
                rating_count: 0,
                listed_at: Utc::now(),
            })
            .await?;
        result.listings_inserted += 1;
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use farmlink_core::domain::product::Location;
    use farmlink_core::market::MarketStore;

    use super::{seed_demo, SEED_AGENTS, SEED_LISTINGS};
    use crate::repositories::{InMemoryMarketStore, SqlMarketStore};
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn seed_is_idempotent() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        let store = SqlMarketStore::new(pool);

        let first = seed_demo(&store).await.expect("first seed");
        assert_eq!(first.agents_inserted, SEED_AGENTS.len());
        assert_eq!(first.listings_inserted, SEED_LISTINGS.len());

        let second = seed_demo(&store).await.expect("second seed");
        assert_eq!(second.agents_inserted, 0);
        assert_eq!(second.agents_skipped, SEED_AGENTS.len());
        assert_eq!(second.listings_skipped, SEED_LISTINGS.len());
    }

    #[tokio::test]
    async fn seeded_listings_are_global_and_agents_keep_order() {
        let store = InMemoryMarketStore::new();
        seed_demo(&store).await.expect("seed");

        let global = store.products_at(&Location::global()).await.expect("global");
        assert_eq!(global.len(), SEED_LISTINGS.len());

        let codes: Vec<String> = store
            .list_delivery_agents()
            .await
            .expect("agents")
            .into_iter()
            .map(|agent| agent.code.0)
            .collect();
        assert_eq!(codes, vec!["DA-001", "DA-002", "DA-003"]);
    }
}
