//! Marketplace transaction and delivery-assignment engine.
//!
//! `MarketEngine` is the single owner of purchase, listing, delivery and rating
//! semantics. Both the HTTP handlers and the conversational tools call it, so
//! no transaction logic lives in either surface.
//!
//! Every operation commits its primary write first. Follow-up bookkeeping
//! (seller revenue, session order lists, session listings) runs afterwards,
//! at most once, and is reported through [`SideEffectStatus`] instead of
//! failing the operation.

pub mod assignment;
pub mod inventory;
pub mod lifecycle;
pub mod listing;
pub mod rating;
pub mod store;
pub mod views;

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::domain::order::{Order, OrderId};
use crate::domain::session::{Session, UserId};
use crate::errors::ApplicationError;

pub use inventory::{BatchStatus, PurchaseBatch, PurchaseFailure, PurchaseItem, PurchaseReceipt};
pub use lifecycle::{DeliveryUpdate, RatingReceipt, RatingRequest};
pub use listing::{BrowseQuery, SellOutcome, SellRequest};
pub use store::{InventoryReservation, MarketStore, RatingOutcome, StoreError};
pub use views::{order_views, product_views, OrderView, ProductView};

/// Outcome of a best-effort follow-up write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum SideEffectStatus {
    Applied,
    Skipped(String),
    Failed(String),
}

impl SideEffectStatus {
    /// Converts a session-mutation result into a status, logging anything that
    /// did not apply. `Ok(false)` means the user has no session.
    pub(crate) fn settle(
        event_name: &'static str,
        user_id: &UserId,
        result: Result<bool, StoreError>,
    ) -> Self {
        match result {
            Ok(true) => Self::Applied,
            Ok(false) => {
                warn!(event_name, user_id = %user_id.0, "side effect skipped: no session for user");
                Self::Skipped(format!("no session for user {}", user_id.0))
            }
            Err(error) => {
                warn!(event_name, user_id = %user_id.0, error = %error, "side effect failed");
                Self::Failed(error.to_string())
            }
        }
    }
}

#[derive(Clone)]
pub struct MarketEngine {
    store: Arc<dyn MarketStore>,
}

impl MarketEngine {
    pub fn new(store: Arc<dyn MarketStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn MarketStore> {
        &self.store
    }

    /// Returns the user's session, creating it from `initial_state` on first
    /// contact. An existing session is returned unchanged.
    pub async fn get_or_create_session(
        &self,
        user_id: &UserId,
        initial_state: &Map<String, Value>,
    ) -> Result<Session, ApplicationError> {
        require_user(user_id)?;

        if let Some(session) = self.store.find_session(user_id).await? {
            return Ok(session);
        }

        let created = self.store.create_session(&Session::new(user_id.clone(), initial_state)).await?;
        info!(
            event_name = "market.session.created",
            user_id = %user_id.0,
            session_id = %created.id.0,
            "session created"
        );
        Ok(created)
    }

    pub async fn session(&self, user_id: &UserId) -> Result<Session, ApplicationError> {
        self.store
            .find_session(user_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Session", user_id.0.clone()))
    }

    /// Merges flat state values (for example the last uploaded image URL) into
    /// an existing session.
    pub async fn record_session_state(
        &self,
        user_id: &UserId,
        values: &Map<String, Value>,
    ) -> Result<(), ApplicationError> {
        if values.is_empty() {
            return Ok(());
        }
        if self.store.merge_session_state(user_id, values).await? {
            Ok(())
        } else {
            Err(ApplicationError::not_found("Session", user_id.0.clone()))
        }
    }

    /// Buyer's orders, newest first.
    pub async fn orders_for_buyer(&self, buyer_id: &UserId) -> Result<Vec<Order>, ApplicationError> {
        require_user(buyer_id)?;
        let mut orders = self.store.orders_for_buyer(buyer_id).await?;
        orders.sort_by(|left, right| right.order_time.cmp(&left.order_time));
        Ok(orders)
    }

    pub async fn order(&self, order_id: &OrderId) -> Result<Order, ApplicationError> {
        self.store
            .find_order(order_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Order", order_id.0.clone()))
    }
}

pub(crate) fn require_user(user_id: &UserId) -> Result<(), ApplicationError> {
    if user_id.0.trim().is_empty() {
        return Err(ApplicationError::validation("user_id is required."));
    }
    Ok(())
}
