use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::assignment::least_loaded;
use super::{require_user, MarketEngine, SideEffectStatus};
use crate::domain::delivery::DeliveryAgent;
use crate::domain::order::{Order, OrderId, OrderStatus};
use crate::domain::product::ProductId;
use crate::domain::session::UserId;
use crate::errors::{ApplicationError, DomainError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseItem {
    pub product_id: ProductId,
    pub quantity: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PurchaseReceipt {
    pub order: Order,
    pub remaining_quantity: u32,
    pub total_price: Decimal,
    pub seller_revenue: SideEffectStatus,
    pub buyer_session: SideEffectStatus,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PurchaseFailure {
    pub product_id: ProductId,
    pub error: ApplicationError,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Success,
    PartialSuccess,
    Failed,
}

impl BatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::PartialSuccess => "partial_success",
            Self::Failed => "failed",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PurchaseBatch {
    pub successful: Vec<PurchaseReceipt>,
    pub failed: Vec<PurchaseFailure>,
}

impl PurchaseBatch {
    pub fn status(&self) -> BatchStatus {
        match (self.successful.is_empty(), self.failed.is_empty()) {
            (_, true) => BatchStatus::Success,
            (false, false) => BatchStatus::PartialSuccess,
            (true, false) => BatchStatus::Failed,
        }
    }
}

pub(crate) fn validate_quantity(quantity: i64) -> Result<u32, DomainError> {
    if quantity <= 0 {
        return Err(DomainError::Validation("Quantity must be a positive integer.".to_string()));
    }
    u32::try_from(quantity)
        .map_err(|_| DomainError::Validation(format!("Quantity {quantity} is too large.")))
}

impl MarketEngine {
    /// Buys `quantity` units of one product.
    ///
    /// The inventory decrement is the only step that can fail the purchase
    /// after validation. Agent selection, seller revenue and the buyer's
    /// session order list are best-effort.
    pub async fn purchase(
        &self,
        buyer_id: &UserId,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<PurchaseReceipt, ApplicationError> {
        require_user(buyer_id)?;
        let quantity = validate_quantity(quantity)?;

        let product = self
            .store
            .find_product(product_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Product", product_id.0.clone()))?;
        // Checked outside the inventory transaction; a concurrent ownership
        // change is not detected.
        if product.is_owned_by(buyer_id) {
            return Err(DomainError::SelfPurchase.into());
        }

        let reservation = self.store.reserve_inventory(product_id, quantity).await?;
        let snapshot = reservation.product;

        let agent = self.select_delivery_agent().await;
        let order = Order {
            id: OrderId(Uuid::new_v4().to_string()),
            product_id: snapshot.id.clone(),
            buyer_id: buyer_id.clone(),
            seller_id: snapshot.seller_id.clone(),
            product_name: snapshot.name.clone(),
            quantity,
            order_time: Utc::now(),
            status: OrderStatus::Dispatched,
            agent_assigned: agent.as_ref().map(|agent| agent.code.clone()),
        };
        // Inventory is already decremented here; a failed order write is not
        // compensated.
        self.store.create_order(&order, agent.as_ref().map(|agent| &agent.id)).await?;

        info!(
            event_name = "market.purchase.completed",
            order_id = %order.id.0,
            product_id = %order.product_id.0,
            buyer_id = %buyer_id.0,
            quantity,
            agent_code = order.agent_assigned.as_ref().map(|code| code.0.as_str()).unwrap_or("none"),
            "order created"
        );

        let total_price = snapshot.price_per_kg * Decimal::from(quantity);
        let seller_revenue = SideEffectStatus::settle(
            "market.purchase.seller_revenue",
            &snapshot.seller_id,
            self.store.credit_revenue(&snapshot.seller_id, total_price).await,
        );
        let buyer_session = SideEffectStatus::settle(
            "market.purchase.buyer_session",
            buyer_id,
            self.store.push_session_order(buyer_id, &order.id).await,
        );

        Ok(PurchaseReceipt {
            order,
            remaining_quantity: reservation.remaining_quantity,
            total_price,
            seller_revenue,
            buyer_session,
        })
    }

    /// Purchases each item independently; one item failing never affects the
    /// others.
    pub async fn purchase_many(
        &self,
        buyer_id: &UserId,
        items: &[PurchaseItem],
    ) -> Result<PurchaseBatch, ApplicationError> {
        require_user(buyer_id)?;
        if items.is_empty() {
            return Err(ApplicationError::validation("product_list must not be empty."));
        }

        let mut batch = PurchaseBatch { successful: Vec::new(), failed: Vec::new() };
        for item in items {
            match self.purchase(buyer_id, &item.product_id, item.quantity).await {
                Ok(receipt) => batch.successful.push(receipt),
                Err(error) => {
                    info!(
                        event_name = "market.purchase.item_failed",
                        product_id = %item.product_id.0,
                        buyer_id = %buyer_id.0,
                        error = %error,
                        "purchase item failed"
                    );
                    batch.failed.push(PurchaseFailure { product_id: item.product_id.clone(), error });
                }
            }
        }

        Ok(batch)
    }

    async fn select_delivery_agent(&self) -> Option<DeliveryAgent> {
        match self.store.list_delivery_agents().await {
            Ok(agents) => {
                let selected = least_loaded(&agents).cloned();
                if selected.is_none() {
                    warn!(
                        event_name = "market.assignment.no_agents",
                        "no delivery agents registered; order left unassigned"
                    );
                }
                selected
            }
            Err(error) => {
                warn!(
                    event_name = "market.assignment.failed",
                    error = %error,
                    "delivery agent lookup failed; order left unassigned"
                );
                None
            }
        }
    }
}
