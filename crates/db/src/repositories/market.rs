use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use sqlx::sqlite::{Sqlite, SqliteRow};
use sqlx::Transaction;

use farmlink_core::domain::delivery::{DeliveryAgent, DeliveryAgentCode, DeliveryAgentId};
use farmlink_core::domain::order::{Order, OrderId, OrderStatus};
use farmlink_core::domain::product::{Location, Product, ProductId};
use farmlink_core::domain::session::{ListedProduct, Session, SessionId, UserId};
use farmlink_core::market::rating::fold_rating;
use farmlink_core::market::{InventoryReservation, MarketStore, RatingOutcome, StoreError};

use super::{backend, column, format_timestamp, parse_decimal, parse_timestamp, parse_u32};
use crate::DbPool;

const PRODUCT_COLUMNS: &str = "id, name, category, price_per_kg, quantity_available, seller_id,
    seller_name, state, district, rating, rating_count, listed_at";

const ORDER_COLUMNS: &str = "id, product_id, buyer_id, seller_id, product_name, quantity,
    order_time, status, agent_code";

const SESSION_COLUMNS: &str = "user_id, session_id, state, district, display_name, revenue,
    order_ids_json, listings_json, aux_json, created_at, updated_at";

pub struct SqlMarketStore {
    pool: DbPool,
}

impl SqlMarketStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn fetch_products(
        &self,
        filter: &str,
        binds: &[&str],
    ) -> Result<Vec<Product>, StoreError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM product WHERE {filter} ORDER BY listed_at ASC, id ASC"
        );
        let mut query = sqlx::query(&sql);
        for value in binds {
            query = query.bind(*value);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(backend)?;
        rows.iter().map(product_from_row).collect()
    }

    async fn fetch_orders(&self, filter: &str, value: &str) -> Result<Vec<Order>, StoreError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM purchase_order WHERE {filter}
             ORDER BY order_time DESC, id ASC"
        );
        let rows = sqlx::query(&sql).bind(value).fetch_all(&self.pool).await.map_err(backend)?;
        rows.iter().map(order_from_row).collect()
    }

    /// Takes the write lock up front so concurrent writers queue on
    /// `busy_timeout` instead of failing when a deferred read upgrades.
    async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>, StoreError> {
        self.pool.begin_with("BEGIN IMMEDIATE").await.map_err(backend)
    }

    /// Read-modify-write of one session inside a transaction.
    async fn mutate_session<F>(&self, user_id: &UserId, mutate: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut Session) + Send,
    {
        let mut tx = self.begin_write().await?;
        let sql = format!("SELECT {SESSION_COLUMNS} FROM user_session WHERE user_id = ?");
        let row = sqlx::query(&sql)
            .bind(&user_id.0)
            .fetch_optional(&mut *tx)
            .await
            .map_err(backend)?;
        let Some(row) = row else {
            return Ok(false);
        };

        let mut session = session_from_row(&row)?;
        mutate(&mut session);
        session.updated_at = Utc::now();
        write_session(&mut tx, &session).await?;
        tx.commit().await.map_err(backend)?;
        Ok(true)
    }
}

#[async_trait]
impl MarketStore for SqlMarketStore {
    async fn find_product(&self, id: &ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.fetch_products("id = ?", &[id.0.as_str()]).await?.into_iter().next())
    }

    async fn products_at(&self, location: &Location) -> Result<Vec<Product>, StoreError> {
        self.fetch_products(
            "state = ? AND district = ?",
            &[location.state.as_str(), location.district.as_str()],
        )
        .await
    }

    async fn products_by_seller(&self, seller_id: &UserId) -> Result<Vec<Product>, StoreError> {
        self.fetch_products("seller_id = ?", &[seller_id.0.as_str()]).await
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO product (
                id, name, category, price_per_kg, quantity_available, seller_id,
                seller_name, state, district, rating, rating_count, listed_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&product.id.0)
        .bind(&product.name)
        .bind(&product.category)
        .bind(product.price_per_kg.to_string())
        .bind(i64::from(product.quantity_available))
        .bind(&product.seller_id.0)
        .bind(&product.seller_name)
        .bind(&product.location.state)
        .bind(&product.location.district)
        .bind(product.rating)
        .bind(i64::from(product.rating_count))
        .bind(format_timestamp(&product.listed_at))
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn reserve_inventory(
        &self,
        id: &ProductId,
        quantity: u32,
    ) -> Result<InventoryReservation, StoreError> {
        let mut tx = self.begin_write().await?;
        let product = product_in_tx(&mut tx, id).await?;

        if product.quantity_available < quantity {
            return Err(StoreError::InsufficientInventory { available: product.quantity_available });
        }
        let remaining_quantity = product.quantity_available - quantity;

        // Compare-and-set on the quantity read above.
        let updated = sqlx::query(
            "UPDATE product SET quantity_available = ?
             WHERE id = ? AND quantity_available = ?",
        )
        .bind(i64::from(remaining_quantity))
        .bind(&id.0)
        .bind(i64::from(product.quantity_available))
        .execute(&mut *tx)
        .await
        .map_err(backend)?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "product {} changed while reserving inventory",
                id.0
            )));
        }

        tx.commit().await.map_err(backend)?;
        Ok(InventoryReservation { product, remaining_quantity })
    }

    async fn restock_product(
        &self,
        id: &ProductId,
        quantity: u32,
        price_per_kg: Option<Decimal>,
    ) -> Result<u32, StoreError> {
        let mut tx = self.begin_write().await?;
        let product = product_in_tx(&mut tx, id).await?;

        let new_quantity = product.quantity_available.checked_add(quantity).ok_or_else(|| {
            StoreError::Conflict(format!("quantity overflow restocking product {}", id.0))
        })?;
        let price = price_per_kg.unwrap_or(product.price_per_kg);

        sqlx::query("UPDATE product SET quantity_available = ?, price_per_kg = ? WHERE id = ?")
            .bind(i64::from(new_quantity))
            .bind(price.to_string())
            .bind(&id.0)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        tx.commit().await.map_err(backend)?;
        Ok(new_quantity)
    }

    async fn list_delivery_agents(&self) -> Result<Vec<DeliveryAgent>, StoreError> {
        let agent_rows =
            sqlx::query("SELECT id, agent_code FROM delivery_agent ORDER BY registered_seq ASC")
                .fetch_all(&self.pool)
                .await
                .map_err(backend)?;
        let assignment_rows = sqlx::query(
            "SELECT order_id, agent_id FROM delivery_assignment ORDER BY assigned_seq ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut assigned: HashMap<String, Vec<OrderId>> = HashMap::new();
        for row in &assignment_rows {
            let agent_id: String = column(row, "agent_id")?;
            assigned.entry(agent_id).or_default().push(OrderId(column(row, "order_id")?));
        }

        agent_rows
            .iter()
            .map(|row| {
                let id: String = column(row, "id")?;
                let orders_assigned = assigned.remove(&id).unwrap_or_default();
                Ok(DeliveryAgent {
                    id: DeliveryAgentId(id),
                    code: DeliveryAgentCode(column(row, "agent_code")?),
                    orders_assigned,
                })
            })
            .collect()
    }

    async fn insert_delivery_agent(&self, agent: &DeliveryAgent) -> Result<(), StoreError> {
        let mut tx = self.begin_write().await?;
        sqlx::query(
            "INSERT INTO delivery_agent (id, agent_code, registered_seq)
             VALUES (?, ?, (SELECT COALESCE(MAX(registered_seq), 0) + 1 FROM delivery_agent))",
        )
        .bind(&agent.id.0)
        .bind(&agent.code.0)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        for order_id in &agent.orders_assigned {
            insert_assignment(&mut tx, order_id, &agent.id).await?;
        }
        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    async fn create_order(
        &self,
        order: &Order,
        assignee: Option<&DeliveryAgentId>,
    ) -> Result<(), StoreError> {
        let mut tx = self.begin_write().await?;
        sqlx::query(
            "INSERT INTO purchase_order (
                id, product_id, buyer_id, seller_id, product_name, quantity,
                order_time, status, agent_code
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&order.id.0)
        .bind(&order.product_id.0)
        .bind(&order.buyer_id.0)
        .bind(&order.seller_id.0)
        .bind(&order.product_name)
        .bind(i64::from(order.quantity))
        .bind(format_timestamp(&order.order_time))
        .bind(order.status.as_str())
        .bind(order.agent_assigned.as_ref().map(|code| code.0.as_str()))
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        if let Some(agent_id) = assignee {
            insert_assignment(&mut tx, &order.id, agent_id).await?;
        }

        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    async fn find_order(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.fetch_orders("id = ?", &id.0).await?.into_iter().next())
    }

    async fn orders_for_buyer(&self, buyer_id: &UserId) -> Result<Vec<Order>, StoreError> {
        self.fetch_orders("buyer_id = ?", &buyer_id.0).await
    }

    async fn orders_for_agent(&self, code: &DeliveryAgentCode) -> Result<Vec<Order>, StoreError> {
        self.fetch_orders("agent_code = ?", &code.0).await
    }

    async fn update_order_status(
        &self,
        id: &OrderId,
        status: &OrderStatus,
        release_from: Option<&DeliveryAgentId>,
    ) -> Result<(), StoreError> {
        let mut tx = self.begin_write().await?;
        let updated = sqlx::query("UPDATE purchase_order SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(&id.0)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: "Order", id: id.0.clone() });
        }

        if let Some(agent_id) = release_from {
            sqlx::query("DELETE FROM delivery_assignment WHERE order_id = ? AND agent_id = ?")
                .bind(&id.0)
                .bind(&agent_id.0)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
        }

        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    async fn rate_and_close_order(
        &self,
        order_id: &OrderId,
        product_id: &ProductId,
        rating: u8,
    ) -> Result<RatingOutcome, StoreError> {
        let mut tx = self.begin_write().await?;
        let product = product_in_tx(&mut tx, product_id).await?;
        let (average, count) = fold_rating(product.rating, product.rating_count, rating);

        let updated = sqlx::query(
            "UPDATE product SET rating = ?, rating_count = ? WHERE id = ? AND rating_count = ?",
        )
        .bind(average)
        .bind(i64::from(count))
        .bind(&product_id.0)
        .bind(i64::from(product.rating_count))
        .execute(&mut *tx)
        .await
        .map_err(backend)?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "product {} was rated concurrently",
                product_id.0
            )));
        }

        let deleted = sqlx::query("DELETE FROM purchase_order WHERE id = ?")
            .bind(&order_id.0)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        if deleted.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: "Order", id: order_id.0.clone() });
        }

        tx.commit().await.map_err(backend)?;
        Ok(RatingOutcome { product_id: product_id.clone(), rating: average, rating_count: count })
    }

    async fn find_session(&self, user_id: &UserId) -> Result<Option<Session>, StoreError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM user_session WHERE user_id = ?");
        let row = sqlx::query(&sql)
            .bind(&user_id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.as_ref().map(session_from_row).transpose()
    }

    async fn create_session(&self, session: &Session) -> Result<Session, StoreError> {
        let mut tx = self.begin_write().await?;
        sqlx::query(
            "INSERT INTO user_session (
                user_id, session_id, state, district, display_name, revenue,
                order_ids_json, listings_json, aux_json, created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(user_id) DO NOTHING",
        )
        .bind(&session.user_id.0)
        .bind(&session.id.0)
        .bind(session.location.as_ref().map(|location| location.state.as_str()))
        .bind(session.location.as_ref().map(|location| location.district.as_str()))
        .bind(session.display_name.as_deref())
        .bind(session.revenue.to_string())
        .bind(encode_json(&order_id_strings(&session.order_ids))?)
        .bind(encode_json(&session.listed_products)?)
        .bind(encode_json(&session.aux)?)
        .bind(format_timestamp(&session.created_at))
        .bind(format_timestamp(&session.updated_at))
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        let sql = format!("SELECT {SESSION_COLUMNS} FROM user_session WHERE user_id = ?");
        let row = sqlx::query(&sql)
            .bind(&session.user_id.0)
            .fetch_one(&mut *tx)
            .await
            .map_err(backend)?;
        let stored = session_from_row(&row)?;

        tx.commit().await.map_err(backend)?;
        Ok(stored)
    }

    async fn credit_revenue(&self, user_id: &UserId, amount: Decimal) -> Result<bool, StoreError> {
        self.mutate_session(user_id, |session| session.revenue += amount).await
    }

    async fn push_session_order(
        &self,
        user_id: &UserId,
        order_id: &OrderId,
    ) -> Result<bool, StoreError> {
        let order_id = order_id.clone();
        self.mutate_session(user_id, move |session| session.order_ids.push(order_id)).await
    }

    async fn remove_session_order(
        &self,
        user_id: &UserId,
        order_id: &OrderId,
    ) -> Result<bool, StoreError> {
        self.mutate_session(user_id, |session| session.order_ids.retain(|id| id != order_id)).await
    }

    async fn push_session_listing(
        &self,
        user_id: &UserId,
        listing: &ListedProduct,
    ) -> Result<bool, StoreError> {
        let listing = listing.clone();
        self.mutate_session(user_id, move |session| session.listed_products.push(listing)).await
    }

    async fn merge_session_state(
        &self,
        user_id: &UserId,
        values: &Map<String, Value>,
    ) -> Result<bool, StoreError> {
        self.mutate_session(user_id, |session| session.merge_state(values)).await
    }
}

async fn product_in_tx(
    tx: &mut Transaction<'_, Sqlite>,
    id: &ProductId,
) -> Result<Product, StoreError> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM product WHERE id = ?");
    let row = sqlx::query(&sql).bind(&id.0).fetch_optional(&mut **tx).await.map_err(backend)?;
    match row {
        Some(row) => product_from_row(&row),
        None => Err(StoreError::NotFound { entity: "Product", id: id.0.clone() }),
    }
}

async fn insert_assignment(
    tx: &mut Transaction<'_, Sqlite>,
    order_id: &OrderId,
    agent_id: &DeliveryAgentId,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO delivery_assignment (order_id, agent_id, assigned_seq)
         VALUES (?, ?, (SELECT COALESCE(MAX(assigned_seq), 0) + 1 FROM delivery_assignment))",
    )
    .bind(&order_id.0)
    .bind(&agent_id.0)
    .execute(&mut **tx)
    .await
    .map_err(backend)?;
    Ok(())
}

async fn write_session(
    tx: &mut Transaction<'_, Sqlite>,
    session: &Session,
) -> Result<(), StoreError> {
    sqlx::query(
        "UPDATE user_session SET
            state = ?,
            district = ?,
            display_name = ?,
            revenue = ?,
            order_ids_json = ?,
            listings_json = ?,
            aux_json = ?,
            updated_at = ?
         WHERE user_id = ?",
    )
    .bind(session.location.as_ref().map(|location| location.state.as_str()))
    .bind(session.location.as_ref().map(|location| location.district.as_str()))
    .bind(session.display_name.as_deref())
    .bind(session.revenue.to_string())
    .bind(encode_json(&order_id_strings(&session.order_ids))?)
    .bind(encode_json(&session.listed_products)?)
    .bind(encode_json(&session.aux)?)
    .bind(format_timestamp(&session.updated_at))
    .bind(&session.user_id.0)
    .execute(&mut **tx)
    .await
    .map_err(backend)?;
    Ok(())
}

fn product_from_row(row: &SqliteRow) -> Result<Product, StoreError> {
    let price: String = column(row, "price_per_kg")?;
    let listed_at: String = column(row, "listed_at")?;

    Ok(Product {
        id: ProductId(column(row, "id")?),
        name: column(row, "name")?,
        category: column(row, "category")?,
        price_per_kg: parse_decimal("price_per_kg", &price)?,
        quantity_available: parse_u32("quantity_available", column(row, "quantity_available")?)?,
        seller_id: UserId(column(row, "seller_id")?),
        seller_name: column(row, "seller_name")?,
        location: Location::new(
            column::<String>(row, "state")?,
            column::<String>(row, "district")?,
        ),
        rating: column(row, "rating")?,
        rating_count: parse_u32("rating_count", column(row, "rating_count")?)?,
        listed_at: parse_timestamp("listed_at", &listed_at)?,
    })
}

fn order_from_row(row: &SqliteRow) -> Result<Order, StoreError> {
    let order_time: String = column(row, "order_time")?;
    let status: String = column(row, "status")?;

    Ok(Order {
        id: OrderId(column(row, "id")?),
        product_id: ProductId(column(row, "product_id")?),
        buyer_id: UserId(column(row, "buyer_id")?),
        seller_id: UserId(column(row, "seller_id")?),
        product_name: column(row, "product_name")?,
        quantity: parse_u32("quantity", column(row, "quantity")?)?,
        order_time: parse_timestamp("order_time", &order_time)?,
        status: OrderStatus::parse(&status),
        agent_assigned: column::<Option<String>>(row, "agent_code")?.map(DeliveryAgentCode),
    })
}

fn session_from_row(row: &SqliteRow) -> Result<Session, StoreError> {
    let state: Option<String> = column(row, "state")?;
    let district: Option<String> = column(row, "district")?;
    let revenue: String = column(row, "revenue")?;
    let order_ids: Vec<String> =
        decode_json("order_ids_json", &column::<String>(row, "order_ids_json")?)?;
    let created_at: String = column(row, "created_at")?;
    let updated_at: String = column(row, "updated_at")?;

    Ok(Session {
        id: SessionId(column(row, "session_id")?),
        user_id: UserId(column(row, "user_id")?),
        location: state.zip(district).map(|(state, district)| Location::new(state, district)),
        display_name: column(row, "display_name")?,
        revenue: parse_decimal("revenue", &revenue)?,
        order_ids: order_ids.into_iter().map(OrderId).collect(),
        listed_products: decode_json("listings_json", &column::<String>(row, "listings_json")?)?,
        aux: decode_json("aux_json", &column::<String>(row, "aux_json")?)?,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

fn order_id_strings(order_ids: &[OrderId]) -> Vec<&str> {
    order_ids.iter().map(|id| id.0.as_str()).collect()
}

fn encode_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value)
        .map_err(|error| StoreError::Corrupt(format!("could not encode session field: {error}")))
}

fn decode_json<T: serde::de::DeserializeOwned>(column: &str, raw: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw)
        .map_err(|error| StoreError::Corrupt(format!("invalid json in `{column}`: {error}")))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use serde_json::{json, Map};

    use farmlink_core::domain::product::{Location, Product, ProductId};
    use farmlink_core::domain::session::{ListedProduct, Session, UserId};
    use farmlink_core::market::{MarketStore, StoreError};

    use super::SqlMarketStore;
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    fn tomato(quantity: u32) -> Product {
        Product {
            id: ProductId("prod-tomato".to_string()),
            name: "Tomato".to_string(),
            category: "vegetable".to_string(),
            price_per_kg: Decimal::new(3250, 2),
            quantity_available: quantity,
            seller_id: UserId("seller-1".to_string()),
            seller_name: "Murugan".to_string(),
            location: Location::new("Tamil Nadu", "Villupuram"),
            rating: None,
            rating_count: 0,
            listed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn product_round_trip_keeps_decimal_price() {
        let store = SqlMarketStore::new(setup_pool().await);
        let product = tomato(12);
        store.insert_product(&product).await.expect("insert");

        let found = store.find_product(&product.id).await.expect("find").expect("present");
        assert_eq!(found.price_per_kg, Decimal::new(3250, 2));
        assert_eq!(found.location, product.location);
        assert_eq!(found.rating, None);
    }

    #[tokio::test]
    async fn reserve_rejects_overdraw_without_writing() {
        let store = SqlMarketStore::new(setup_pool().await);
        store.insert_product(&tomato(3)).await.expect("insert");

        let error = store
            .reserve_inventory(&ProductId("prod-tomato".to_string()), 5)
            .await
            .expect_err("overdraw");
        assert_eq!(error, StoreError::InsufficientInventory { available: 3 });

        let product = store
            .find_product(&ProductId("prod-tomato".to_string()))
            .await
            .expect("find")
            .expect("present");
        assert_eq!(product.quantity_available, 3);
    }

    #[tokio::test]
    async fn session_mutations_persist_json_columns() {
        let store = SqlMarketStore::new(setup_pool().await);
        let user = UserId("farmer-9".to_string());
        let initial = json!({ "state": "Kerala", "district": "Idukki", "acres": 2 });
        let session = Session::new(user.clone(), initial.as_object().expect("object"));
        store.create_session(&session).await.expect("create");

        let listing = ListedProduct {
            product_id: ProductId("p-1".to_string()),
            product_name: "Pepper".to_string(),
        };
        assert!(store.push_session_listing(&user, &listing).await.expect("push listing"));
        assert!(store.credit_revenue(&user, Decimal::new(505, 1)).await.expect("credit"));

        let stored = store.find_session(&user).await.expect("find").expect("present");
        assert_eq!(stored.listed_products, vec![listing]);
        assert_eq!(stored.revenue, Decimal::new(505, 1));
        assert_eq!(stored.aux.get("acres"), Some(&json!(2)));
        assert_eq!(stored.location, Some(Location::new("Kerala", "Idukki")));
    }

    #[tokio::test]
    async fn create_session_keeps_the_first_session() {
        let store = SqlMarketStore::new(setup_pool().await);
        let user = UserId("farmer-3".to_string());
        let first =
            store.create_session(&Session::new(user.clone(), &Map::new())).await.expect("first");
        let second =
            store.create_session(&Session::new(user.clone(), &Map::new())).await.expect("second");

        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn mutations_without_session_report_absence() {
        let store = SqlMarketStore::new(setup_pool().await);
        let applied = store
            .credit_revenue(&UserId("nobody".to_string()), Decimal::ONE)
            .await
            .expect("credit");
        assert!(!applied);
    }
}
