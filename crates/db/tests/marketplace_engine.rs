//! Marketplace engine behaviour, exercised against both store implementations.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};

use farmlink_core::domain::delivery::{DeliveryAgent, DeliveryAgentCode, DeliveryAgentId};
use farmlink_core::domain::order::{OrderId, OrderStatus};
use farmlink_core::domain::product::{Location, Product, ProductId};
use farmlink_core::domain::session::UserId;
use farmlink_core::errors::{ApplicationError, DomainError};
use farmlink_core::market::{
    BatchStatus, BrowseQuery, DeliveryUpdate, MarketEngine, MarketStore, PurchaseItem,
    RatingRequest, SellOutcome, SellRequest, SideEffectStatus,
};
use farmlink_db::{connect_with_settings, migrations, InMemoryMarketStore, SqlMarketStore};

macro_rules! on_both_stores {
    ($($name:ident),+ $(,)?) => {
        mod in_memory {
            $(
                #[tokio::test]
                async fn $name() {
                    super::$name(super::memory_engine()).await;
                }
            )+
        }

        mod sqlite {
            $(
                #[tokio::test]
                async fn $name() {
                    super::$name(super::sql_engine().await).await;
                }
            )+
        }
    };
}

on_both_stores!(
    concurrent_purchases_never_oversell,
    listing_query_is_stable_without_mutation,
    new_listing_is_hidden_from_its_seller_only,
    rating_closes_order_with_running_mean,
    new_order_goes_to_least_loaded_agent,
    overdraw_is_a_per_item_failure_without_writes,
    plural_and_singular_sales_merge_into_one_listing,
    purchase_credits_seller_and_tracks_buyer_order,
    delivery_update_releases_assignment,
    self_purchase_is_rejected,
    only_the_buyer_can_rate,
);

fn memory_engine() -> MarketEngine {
    MarketEngine::new(Arc::new(InMemoryMarketStore::new()))
}

async fn sql_engine() -> MarketEngine {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("run migrations");
    MarketEngine::new(Arc::new(SqlMarketStore::new(pool)))
}

fn user(id: &str) -> UserId {
    UserId(id.to_string())
}

fn villupuram() -> Location {
    Location::new("Tamil Nadu", "Villupuram")
}

fn state(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("object literal")
}

async fn start_session(engine: &MarketEngine, user_id: &str, name: &str) {
    engine
        .get_or_create_session(
            &user(user_id),
            &state(json!({ "state": "Tamil Nadu", "district": "Villupuram", "name": name })),
        )
        .await
        .expect("create session");
}

async fn list_product(engine: &MarketEngine, id: &str, seller: &str, quantity: u32) -> ProductId {
    let product = Product {
        id: ProductId(id.to_string()),
        name: "Onion".to_string(),
        category: "vegetable".to_string(),
        price_per_kg: Decimal::new(3000, 2),
        quantity_available: quantity,
        seller_id: user(seller),
        seller_name: "Murugan".to_string(),
        location: villupuram(),
        rating: None,
        rating_count: 0,
        listed_at: Utc::now(),
    };
    engine.store().insert_product(&product).await.expect("insert product");
    product.id
}

async fn register_agent(store: &Arc<dyn MarketStore>, code: &str, open_orders: usize) {
    store
        .insert_delivery_agent(&DeliveryAgent {
            id: DeliveryAgentId(format!("doc-{code}")),
            code: DeliveryAgentCode(code.to_string()),
            orders_assigned: (0..open_orders).map(|n| OrderId(format!("{code}-open-{n}"))).collect(),
        })
        .await
        .expect("register agent");
}

async fn available(engine: &MarketEngine, id: &ProductId) -> u32 {
    engine.store().find_product(id).await.expect("find").expect("product exists").quantity_available
}

async fn concurrent_purchases_never_oversell(engine: MarketEngine) {
    let product = list_product(&engine, "p-onion", "seller-1", 10).await;

    let mut handles = Vec::new();
    for n in 0..8 {
        let engine = engine.clone();
        let product = product.clone();
        handles.push(tokio::spawn(async move {
            engine.purchase(&user(&format!("buyer-{n}")), &product, 3).await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.expect("task") {
            Ok(_) => succeeded += 1,
            Err(ApplicationError::InsufficientInventory { .. }) => {}
            Err(other) => panic!("unexpected purchase error: {other}"),
        }
    }

    assert_eq!(succeeded, 3);
    assert_eq!(available(&engine, &product).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_purchases_on_a_shared_file_database_all_succeed() {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("market.db").display());
    let pool = connect_with_settings(&url, 5, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("run migrations");
    let engine = MarketEngine::new(Arc::new(SqlMarketStore::new(pool.clone())));
    register_agent(engine.store(), "DA-1", 0).await;
    let product = list_product(&engine, "p-onion", "seller-1", 100).await;

    let mut handles = Vec::new();
    for n in 0..16 {
        let engine = engine.clone();
        let product = product.clone();
        handles.push(tokio::spawn(async move {
            engine.purchase(&user(&format!("buyer-{n}")), &product, 1).await
        }));
    }

    for handle in handles {
        if let Err(error) = handle.await.expect("task") {
            panic!("purchase with ample stock failed: {error}");
        }
    }

    assert_eq!(available(&engine, &product).await, 84);
    let agents = engine.store().list_delivery_agents().await.expect("agents");
    assert_eq!(agents[0].orders_assigned.len(), 16);
    pool.close().await;
}

async fn listing_query_is_stable_without_mutation(engine: MarketEngine) {
    list_product(&engine, "p-1", "seller-1", 5).await;
    list_product(&engine, "p-2", "seller-2", 7).await;
    let query = BrowseQuery {
        requester: Some(user("buyer")),
        location: Some(villupuram()),
        ..BrowseQuery::default()
    };

    let first = engine.browse(query.clone()).await.expect("first browse");
    let second = engine.browse(query).await.expect("second browse");

    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
}

async fn new_listing_is_hidden_from_its_seller_only(engine: MarketEngine) {
    start_session(&engine, "seller-1", "Murugan").await;
    start_session(&engine, "buyer-1", "Selvi").await;

    let outcome = engine
        .sell(SellRequest {
            seller_id: user("seller-1"),
            seller_name: None,
            location: None,
            product_name: "Brinjals".to_string(),
            category: Some("Vegetable".to_string()),
            price_per_kg: Some(Decimal::new(40, 0)),
            quantity: 25,
        })
        .await
        .expect("sell");
    let product_id = outcome.product_id().clone();

    let own_view = engine
        .browse(BrowseQuery { requester: Some(user("seller-1")), ..BrowseQuery::default() })
        .await
        .expect("seller browse");
    assert!(own_view.iter().all(|product| product.id != product_id));

    let neighbour_view = engine
        .browse(BrowseQuery { requester: Some(user("buyer-1")), ..BrowseQuery::default() })
        .await
        .expect("buyer browse");
    let listed = neighbour_view.iter().find(|product| product.id == product_id).expect("visible");
    assert_eq!(listed.name, "Brinjal");
    assert_eq!(listed.category, "vegetable");
    assert_eq!(listed.seller_name, "Murugan");

    let seller_session = engine.session(&user("seller-1")).await.expect("session");
    assert_eq!(seller_session.listed_products.len(), 1);
    assert_eq!(seller_session.listed_products[0].product_id, product_id);
}

async fn rating_closes_order_with_running_mean(engine: MarketEngine) {
    start_session(&engine, "buyer-1", "Selvi").await;
    let product = Product {
        id: ProductId("p-rated".to_string()),
        name: "Mango".to_string(),
        category: "fruit".to_string(),
        price_per_kg: Decimal::new(90, 0),
        quantity_available: 20,
        seller_id: user("seller-1"),
        seller_name: "Murugan".to_string(),
        location: villupuram(),
        rating: Some(4.0),
        rating_count: 1,
        listed_at: Utc::now(),
    };
    engine.store().insert_product(&product).await.expect("insert");

    let receipt = engine.purchase(&user("buyer-1"), &product.id, 2).await.expect("purchase");
    let order_id = receipt.order.id.clone();

    let rated = engine
        .rate(RatingRequest {
            order_id: order_id.clone(),
            product_id: product.id.clone(),
            rating: 2,
            user_id: user("buyer-1"),
        })
        .await
        .expect("rate");

    assert_eq!(rated.rating, 3.0);
    assert_eq!(rated.rating_count, 2);
    assert_eq!(rated.session_sync, SideEffectStatus::Applied);

    let stored = engine.store().find_product(&product.id).await.expect("find").expect("exists");
    assert_eq!(stored.rating, Some(3.0));
    assert_eq!(stored.rating_count, 2);

    let orders = engine.orders_for_buyer(&user("buyer-1")).await.expect("orders");
    assert!(orders.iter().all(|order| order.id != order_id));
    let session = engine.session(&user("buyer-1")).await.expect("session");
    assert!(!session.order_ids.contains(&order_id));

    let again = engine
        .rate(RatingRequest {
            order_id,
            product_id: product.id,
            rating: 5,
            user_id: user("buyer-1"),
        })
        .await
        .expect_err("order already closed");
    assert!(matches!(again, ApplicationError::NotFound { .. }));
}

async fn new_order_goes_to_least_loaded_agent(engine: MarketEngine) {
    register_agent(engine.store(), "A", 2).await;
    register_agent(engine.store(), "B", 0).await;
    let product = list_product(&engine, "p-1", "seller-1", 10).await;

    let receipt = engine.purchase(&user("buyer-1"), &product, 1).await.expect("purchase");
    assert_eq!(receipt.order.agent_assigned, Some(DeliveryAgentCode("B".to_string())));

    let agents = engine.store().list_delivery_agents().await.expect("agents");
    let agent_b = agents.iter().find(|agent| agent.code.0 == "B").expect("agent B");
    assert_eq!(agent_b.orders_assigned, vec![receipt.order.id.clone()]);

    let dashboard =
        engine.orders_for_agent(&DeliveryAgentCode("B".to_string())).await.expect("dashboard");
    assert_eq!(dashboard.len(), 1);
    assert_eq!(dashboard[0].status, OrderStatus::Dispatched);
}

async fn overdraw_is_a_per_item_failure_without_writes(engine: MarketEngine) {
    let product = list_product(&engine, "p-small", "seller-1", 3).await;

    let batch = engine
        .purchase_many(
            &user("buyer-1"),
            &[PurchaseItem { product_id: product.clone(), quantity: 5 }],
        )
        .await
        .expect("batch");

    assert_eq!(batch.status(), BatchStatus::Failed);
    assert_eq!(batch.failed.len(), 1);
    assert_eq!(batch.failed[0].error.to_string(), "Insufficient quantity. Only 3 available.");
    assert!(engine.orders_for_buyer(&user("buyer-1")).await.expect("orders").is_empty());
    assert_eq!(available(&engine, &product).await, 3);
}

async fn plural_and_singular_sales_merge_into_one_listing(engine: MarketEngine) {
    start_session(&engine, "seller-1", "Murugan").await;
    let sell = |name: &str, quantity: i64| SellRequest {
        seller_id: user("seller-1"),
        seller_name: None,
        location: None,
        product_name: name.to_string(),
        category: Some("vegetable".to_string()),
        price_per_kg: Some(Decimal::new(25, 0)),
        quantity,
    };

    let first = engine.sell(sell("Tomatoes", 10)).await.expect("first sell");
    let second = engine.sell(sell("tomato", 5)).await.expect("second sell");

    assert!(matches!(first, SellOutcome::Listed { .. }));
    assert!(matches!(second, SellOutcome::Restocked { quantity_available: 15, .. }));
    assert_eq!(first.product_id(), second.product_id());

    let listings = engine.products_for_seller(&user("seller-1")).await.expect("listings");
    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0].name, "Tomato");
    assert_eq!(listings[0].quantity_available, 15);
}

async fn purchase_credits_seller_and_tracks_buyer_order(engine: MarketEngine) {
    start_session(&engine, "seller-1", "Murugan").await;
    start_session(&engine, "buyer-1", "Selvi").await;
    let product = list_product(&engine, "p-1", "seller-1", 10).await;

    let receipt = engine.purchase(&user("buyer-1"), &product, 4).await.expect("purchase");

    assert_eq!(receipt.total_price, Decimal::new(120, 0));
    assert_eq!(receipt.remaining_quantity, 6);
    assert_eq!(receipt.seller_revenue, SideEffectStatus::Applied);
    assert_eq!(receipt.buyer_session, SideEffectStatus::Applied);
    assert!(receipt.order.agent_assigned.is_none());

    let seller = engine.session(&user("seller-1")).await.expect("seller session");
    assert_eq!(seller.revenue, Decimal::new(120, 0));
    let buyer = engine.session(&user("buyer-1")).await.expect("buyer session");
    assert_eq!(buyer.order_ids, vec![receipt.order.id]);
}

async fn delivery_update_releases_assignment(engine: MarketEngine) {
    register_agent(engine.store(), "DA-7", 0).await;
    let product = list_product(&engine, "p-1", "seller-1", 10).await;
    let first = engine.purchase(&user("buyer-1"), &product, 1).await.expect("first");
    let second = engine.purchase(&user("buyer-1"), &product, 1).await.expect("second");

    let status = engine
        .update_delivery(DeliveryUpdate {
            agent_code: DeliveryAgentCode("DA-7".to_string()),
            order_id: first.order.id.clone(),
            status: "Delivered".to_string(),
        })
        .await
        .expect("update");
    assert_eq!(status, OrderStatus::Delivered);

    let agents = engine.store().list_delivery_agents().await.expect("agents");
    assert_eq!(agents[0].orders_assigned, vec![second.order.id.clone()]);
    assert_eq!(engine.order(&first.order.id).await.expect("order").status, OrderStatus::Delivered);

    // A different code reporting still releases the order from its assignee.
    register_agent(engine.store(), "DA-9", 5).await;
    engine
        .update_delivery(DeliveryUpdate {
            agent_code: DeliveryAgentCode("DA-9".to_string()),
            order_id: second.order.id.clone(),
            status: "out_for_delivery".to_string(),
        })
        .await
        .expect("update reported by another agent");
    let order = engine.order(&second.order.id).await.expect("order");
    assert_eq!(order.status, OrderStatus::Other("out_for_delivery".to_string()));
    let agents = engine.store().list_delivery_agents().await.expect("agents");
    let assigned = |code: &str| {
        agents.iter().find(|agent| agent.code.0 == code).expect("agent").orders_assigned.len()
    };
    assert_eq!(assigned("DA-7"), 0);
    assert_eq!(assigned("DA-9"), 5);

    // Unknown reporting code: the order still moves.
    engine
        .update_delivery(DeliveryUpdate {
            agent_code: DeliveryAgentCode("nobody".to_string()),
            order_id: second.order.id.clone(),
            status: "delivered".to_string(),
        })
        .await
        .expect("update with unknown agent");
    assert_eq!(engine.order(&second.order.id).await.expect("order").status, OrderStatus::Delivered);

    let missing = engine
        .update_delivery(DeliveryUpdate {
            agent_code: DeliveryAgentCode("DA-7".to_string()),
            order_id: OrderId("no-such-order".to_string()),
            status: "delivered".to_string(),
        })
        .await
        .expect_err("unknown order");
    assert!(matches!(missing, ApplicationError::NotFound { .. }));
}

async fn self_purchase_is_rejected(engine: MarketEngine) {
    let product = list_product(&engine, "p-1", "seller-1", 10).await;

    let error = engine.purchase(&user("seller-1"), &product, 1).await.expect_err("own product");

    assert_eq!(error, ApplicationError::Domain(DomainError::SelfPurchase));
    assert_eq!(available(&engine, &product).await, 10);
}

async fn only_the_buyer_can_rate(engine: MarketEngine) {
    let product = list_product(&engine, "p-1", "seller-1", 10).await;
    let receipt = engine.purchase(&user("buyer-1"), &product, 1).await.expect("purchase");

    let error = engine
        .rate(RatingRequest {
            order_id: receipt.order.id.clone(),
            product_id: product.clone(),
            rating: 4,
            user_id: user("someone-else"),
        })
        .await
        .expect_err("not the buyer");
    assert!(matches!(error, ApplicationError::Domain(DomainError::Validation(_))));

    let out_of_range = engine
        .rate(RatingRequest {
            order_id: receipt.order.id.clone(),
            product_id: product,
            rating: 6,
            user_id: user("buyer-1"),
        })
        .await
        .expect_err("rating out of range");
    assert_eq!(out_of_range, ApplicationError::Domain(DomainError::RatingOutOfRange(6)));
    assert!(engine.order(&receipt.order.id).await.is_ok());
}
