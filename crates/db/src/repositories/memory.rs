use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use farmlink_core::community::CommunityStore;
use farmlink_core::domain::community::CommunityMessage;
use farmlink_core::domain::delivery::{DeliveryAgent, DeliveryAgentCode, DeliveryAgentId};
use farmlink_core::domain::order::{Order, OrderId, OrderStatus};
use farmlink_core::domain::product::{Location, Product, ProductId};
use farmlink_core::domain::session::{ListedProduct, Session, UserId};
use farmlink_core::market::rating::apply_rating;
use farmlink_core::market::{InventoryReservation, MarketStore, RatingOutcome, StoreError};

/// Everything behind one lock, so each trait call is atomic with respect to
/// every other call.
#[derive(Default)]
struct MarketState {
    products: Vec<Product>,
    orders: HashMap<String, Order>,
    agents: Vec<DeliveryAgent>,
    sessions: HashMap<String, Session>,
}

impl MarketState {
    fn product_mut(&mut self, id: &ProductId) -> Result<&mut Product, StoreError> {
        self.products
            .iter_mut()
            .find(|product| &product.id == id)
            .ok_or_else(|| StoreError::NotFound { entity: "Product", id: id.0.clone() })
    }

    fn mutate_session(&mut self, user_id: &UserId, mutate: impl FnOnce(&mut Session)) -> bool {
        match self.sessions.get_mut(&user_id.0) {
            Some(session) => {
                mutate(session);
                session.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }
}

#[derive(Default)]
pub struct InMemoryMarketStore {
    state: RwLock<MarketState>,
}

impl InMemoryMarketStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MarketStore for InMemoryMarketStore {
    async fn find_product(&self, id: &ProductId) -> Result<Option<Product>, StoreError> {
        let state = self.state.read().await;
        Ok(state.products.iter().find(|product| &product.id == id).cloned())
    }

    async fn products_at(&self, location: &Location) -> Result<Vec<Product>, StoreError> {
        let state = self.state.read().await;
        Ok(state.products.iter().filter(|product| &product.location == location).cloned().collect())
    }

    async fn products_by_seller(&self, seller_id: &UserId) -> Result<Vec<Product>, StoreError> {
        let state = self.state.read().await;
        Ok(state.products.iter().filter(|product| product.is_owned_by(seller_id)).cloned().collect())
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.products.iter().any(|existing| existing.id == product.id) {
            return Err(StoreError::Conflict(format!("product {} already exists", product.id.0)));
        }
        state.products.push(product.clone());
        Ok(())
    }

    async fn reserve_inventory(
        &self,
        id: &ProductId,
        quantity: u32,
    ) -> Result<InventoryReservation, StoreError> {
        let mut state = self.state.write().await;
        let product = state.product_mut(id)?;
        if product.quantity_available < quantity {
            return Err(StoreError::InsufficientInventory { available: product.quantity_available });
        }

        let snapshot = product.clone();
        product.quantity_available -= quantity;
        Ok(InventoryReservation { product: snapshot, remaining_quantity: product.quantity_available })
    }

    async fn restock_product(
        &self,
        id: &ProductId,
        quantity: u32,
        price_per_kg: Option<Decimal>,
    ) -> Result<u32, StoreError> {
        let mut state = self.state.write().await;
        let product = state.product_mut(id)?;
        product.quantity_available =
            product.quantity_available.checked_add(quantity).ok_or_else(|| {
                StoreError::Conflict(format!("quantity overflow restocking product {}", id.0))
            })?;
        if let Some(price) = price_per_kg {
            product.price_per_kg = price;
        }
        Ok(product.quantity_available)
    }

    async fn list_delivery_agents(&self) -> Result<Vec<DeliveryAgent>, StoreError> {
        Ok(self.state.read().await.agents.clone())
    }

    async fn insert_delivery_agent(&self, agent: &DeliveryAgent) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.agents.iter().any(|existing| existing.id == agent.id || existing.code == agent.code)
        {
            return Err(StoreError::Conflict(format!(
                "delivery agent {} already exists",
                agent.code.0
            )));
        }
        state.agents.push(agent.clone());
        Ok(())
    }

    async fn create_order(
        &self,
        order: &Order,
        assignee: Option<&DeliveryAgentId>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.orders.contains_key(&order.id.0) {
            return Err(StoreError::Conflict(format!("order {} already exists", order.id.0)));
        }
        // Validate the whole batch before writing any of it.
        let agent_index = match assignee {
            Some(agent_id) => Some(
                state.agents.iter().position(|agent| &agent.id == agent_id).ok_or_else(|| {
                    StoreError::NotFound { entity: "Delivery agent", id: agent_id.0.clone() }
                })?,
            ),
            None => None,
        };

        state.orders.insert(order.id.0.clone(), order.clone());
        if let Some(index) = agent_index {
            state.agents[index].orders_assigned.push(order.id.clone());
        }
        Ok(())
    }

    async fn find_order(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.state.read().await.orders.get(&id.0).cloned())
    }

    async fn orders_for_buyer(&self, buyer_id: &UserId) -> Result<Vec<Order>, StoreError> {
        let state = self.state.read().await;
        Ok(sorted_newest_first(
            state.orders.values().filter(|order| &order.buyer_id == buyer_id).cloned().collect(),
        ))
    }

    async fn orders_for_agent(&self, code: &DeliveryAgentCode) -> Result<Vec<Order>, StoreError> {
        let state = self.state.read().await;
        Ok(sorted_newest_first(
            state
                .orders
                .values()
                .filter(|order| order.agent_assigned.as_ref() == Some(code))
                .cloned()
                .collect(),
        ))
    }

    async fn update_order_status(
        &self,
        id: &OrderId,
        status: &OrderStatus,
        release_from: Option<&DeliveryAgentId>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&id.0)
            .ok_or_else(|| StoreError::NotFound { entity: "Order", id: id.0.clone() })?;
        order.status = status.clone();

        if let Some(agent_id) = release_from {
            if let Some(agent) = state.agents.iter_mut().find(|agent| &agent.id == agent_id) {
                agent.orders_assigned.retain(|assigned| assigned != id);
            }
        }
        Ok(())
    }

    async fn rate_and_close_order(
        &self,
        order_id: &OrderId,
        product_id: &ProductId,
        rating: u8,
    ) -> Result<RatingOutcome, StoreError> {
        let mut state = self.state.write().await;
        if !state.orders.contains_key(&order_id.0) {
            return Err(StoreError::NotFound { entity: "Order", id: order_id.0.clone() });
        }

        let product = state.product_mut(product_id)?;
        apply_rating(product, rating);
        let outcome = RatingOutcome {
            product_id: product_id.clone(),
            rating: product.rating.unwrap_or(f64::from(rating)),
            rating_count: product.rating_count,
        };
        state.orders.remove(&order_id.0);
        Ok(outcome)
    }

    async fn find_session(&self, user_id: &UserId) -> Result<Option<Session>, StoreError> {
        Ok(self.state.read().await.sessions.get(&user_id.0).cloned())
    }

    async fn create_session(&self, session: &Session) -> Result<Session, StoreError> {
        let mut state = self.state.write().await;
        Ok(state.sessions.entry(session.user_id.0.clone()).or_insert_with(|| session.clone()).clone())
    }

    async fn credit_revenue(&self, user_id: &UserId, amount: Decimal) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        Ok(state.mutate_session(user_id, |session| session.revenue += amount))
    }

    async fn push_session_order(
        &self,
        user_id: &UserId,
        order_id: &OrderId,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        Ok(state.mutate_session(user_id, |session| session.order_ids.push(order_id.clone())))
    }

    async fn remove_session_order(
        &self,
        user_id: &UserId,
        order_id: &OrderId,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        Ok(state.mutate_session(user_id, |session| session.order_ids.retain(|id| id != order_id)))
    }

    async fn push_session_listing(
        &self,
        user_id: &UserId,
        listing: &ListedProduct,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        Ok(state.mutate_session(user_id, |session| session.listed_products.push(listing.clone())))
    }

    async fn merge_session_state(
        &self,
        user_id: &UserId,
        values: &Map<String, Value>,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        Ok(state.mutate_session(user_id, |session| session.merge_state(values)))
    }
}

fn sorted_newest_first(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by(|left, right| {
        right.order_time.cmp(&left.order_time).then_with(|| left.id.0.cmp(&right.id.0))
    });
    orders
}

#[derive(Default)]
pub struct InMemoryCommunityStore {
    messages: RwLock<VecDeque<CommunityMessage>>,
}

#[async_trait]
impl CommunityStore for InMemoryCommunityStore {
    async fn insert_message(&self, message: &CommunityMessage) -> Result<(), StoreError> {
        self.messages.write().await.push_back(message.clone());
        Ok(())
    }

    async fn recent_messages(&self, limit: u32) -> Result<Vec<CommunityMessage>, StoreError> {
        let messages = self.messages.read().await;
        let skip = messages.len().saturating_sub(limit as usize);
        Ok(messages.iter().skip(skip).cloned().collect())
    }
}
