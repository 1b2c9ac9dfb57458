//! Persistence contract for the marketplace engine.
//!
//! Methods documented as *transaction* read and conditionally write inside one
//! atomic unit and abort with an error on conflicting concurrent writes.
//! Methods documented as *batch* write several records together with no read
//! phase. Everything else is a plain single-record read or write.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::delivery::{DeliveryAgent, DeliveryAgentCode, DeliveryAgentId};
use crate::domain::order::{Order, OrderId, OrderStatus};
use crate::domain::product::{Location, Product, ProductId};
use crate::domain::session::{ListedProduct, Session, UserId};
use crate::errors::ApplicationError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{entity} with ID {id} not found.")]
    NotFound { entity: &'static str, id: String },
    #[error("Insufficient quantity. Only {available} available.")]
    InsufficientInventory { available: u32 },
    #[error("transaction conflict: {0}")]
    Conflict(String),
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[error("store backend failure: {0}")]
    Backend(String),
}

impl From<StoreError> for ApplicationError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            StoreError::InsufficientInventory { available } => {
                Self::InsufficientInventory { available }
            }
            other => Self::Persistence(other.to_string()),
        }
    }
}

/// Result of a successful inventory decrement.
#[derive(Clone, Debug, PartialEq)]
pub struct InventoryReservation {
    /// Product as read inside the transaction, before the decrement.
    pub product: Product,
    pub remaining_quantity: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RatingOutcome {
    pub product_id: ProductId,
    pub rating: f64,
    pub rating_count: u32,
}

#[async_trait]
pub trait MarketStore: Send + Sync {
    async fn find_product(&self, id: &ProductId) -> Result<Option<Product>, StoreError>;

    /// Products whose location equals `location` exactly, in listing order.
    async fn products_at(&self, location: &Location) -> Result<Vec<Product>, StoreError>;

    async fn products_by_seller(&self, seller_id: &UserId) -> Result<Vec<Product>, StoreError>;

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError>;

    /// Transaction: fails with `NotFound` or `InsufficientInventory`, otherwise
    /// decrements the available quantity by `quantity`.
    async fn reserve_inventory(
        &self,
        id: &ProductId,
        quantity: u32,
    ) -> Result<InventoryReservation, StoreError>;

    /// Transaction: adds `quantity` to the available quantity and overwrites the
    /// price when one is given. Returns the new quantity.
    async fn restock_product(
        &self,
        id: &ProductId,
        quantity: u32,
        price_per_kg: Option<Decimal>,
    ) -> Result<u32, StoreError>;

    /// Registered delivery agents in registry order.
    async fn list_delivery_agents(&self) -> Result<Vec<DeliveryAgent>, StoreError>;

    async fn insert_delivery_agent(&self, agent: &DeliveryAgent) -> Result<(), StoreError>;

    /// Batch: stores the order and appends its id to `assignee`'s list.
    async fn create_order(
        &self,
        order: &Order,
        assignee: Option<&DeliveryAgentId>,
    ) -> Result<(), StoreError>;

    async fn find_order(&self, id: &OrderId) -> Result<Option<Order>, StoreError>;

    async fn orders_for_buyer(&self, buyer_id: &UserId) -> Result<Vec<Order>, StoreError>;

    async fn orders_for_agent(&self, code: &DeliveryAgentCode) -> Result<Vec<Order>, StoreError>;

    /// Batch: sets the order status and removes the order from `release_from`'s
    /// assignment list.
    async fn update_order_status(
        &self,
        id: &OrderId,
        status: &OrderStatus,
        release_from: Option<&DeliveryAgentId>,
    ) -> Result<(), StoreError>;

    /// Transaction: folds `rating` into the product's running average and
    /// deletes the order. Fails with `NotFound` if either record is gone.
    async fn rate_and_close_order(
        &self,
        order_id: &OrderId,
        product_id: &ProductId,
        rating: u8,
    ) -> Result<RatingOutcome, StoreError>;

    async fn find_session(&self, user_id: &UserId) -> Result<Option<Session>, StoreError>;

    /// Stores `session` unless the user already has one; returns whichever
    /// session is stored afterwards.
    async fn create_session(&self, session: &Session) -> Result<Session, StoreError>;

    // Session mutations below return `Ok(false)` when the user has no session.

    /// Transaction: adds `amount` to the session revenue.
    async fn credit_revenue(&self, user_id: &UserId, amount: Decimal)
        -> Result<bool, StoreError>;

    async fn push_session_order(
        &self,
        user_id: &UserId,
        order_id: &OrderId,
    ) -> Result<bool, StoreError>;

    async fn remove_session_order(
        &self,
        user_id: &UserId,
        order_id: &OrderId,
    ) -> Result<bool, StoreError>;

    async fn push_session_listing(
        &self,
        user_id: &UserId,
        listing: &ListedProduct,
    ) -> Result<bool, StoreError>;

    /// Merges flat state values into the session (same rules as
    /// `Session::merge_state`).
    async fn merge_session_state(
        &self,
        user_id: &UserId,
        values: &Map<String, Value>,
    ) -> Result<bool, StoreError>;
}
