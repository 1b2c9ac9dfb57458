use serde::Serialize;
use tracing::info;

use super::rating::validate_rating;
use super::store::RatingOutcome;
use super::{MarketEngine, SideEffectStatus};
use crate::domain::delivery::DeliveryAgentCode;
use crate::domain::order::{Order, OrderId, OrderStatus};
use crate::domain::product::ProductId;
use crate::domain::session::UserId;
use crate::errors::ApplicationError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryUpdate {
    pub agent_code: DeliveryAgentCode,
    pub order_id: OrderId,
    pub status: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RatingRequest {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub rating: i64,
    pub user_id: UserId,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RatingReceipt {
    pub product_id: ProductId,
    pub rating: f64,
    pub rating_count: u32,
    pub session_sync: SideEffectStatus,
}

impl MarketEngine {
    pub async fn orders_for_agent(
        &self,
        agent_code: &DeliveryAgentCode,
    ) -> Result<Vec<Order>, ApplicationError> {
        if agent_code.0.trim().is_empty() {
            return Err(ApplicationError::validation("agent_id is required."));
        }
        Ok(self.store.orders_for_agent(agent_code).await?)
    }

    /// Records a delivery status and releases the order from the assignment
    /// list of the agent it was assigned to, whichever code reported it.
    /// An unknown reporting code still updates the order.
    pub async fn update_delivery(
        &self,
        update: DeliveryUpdate,
    ) -> Result<OrderStatus, ApplicationError> {
        if update.agent_code.0.trim().is_empty()
            || update.order_id.0.trim().is_empty()
            || update.status.trim().is_empty()
        {
            return Err(ApplicationError::validation(
                "agent_id, order_id and status are required.",
            ));
        }

        let order = self.order(&update.order_id).await?;
        let agent = match &order.agent_assigned {
            Some(assigned) => self
                .store
                .list_delivery_agents()
                .await?
                .into_iter()
                .find(|agent| &agent.code == assigned),
            None => None,
        };
        let status = OrderStatus::parse(&update.status);

        self.store
            .update_order_status(&order.id, &status, agent.as_ref().map(|agent| &agent.id))
            .await?;

        info!(
            event_name = "market.delivery.updated",
            order_id = %order.id.0,
            reported_by = %update.agent_code.0,
            status = status.as_str(),
            released_from = agent.as_ref().map(|agent| agent.code.0.as_str()).unwrap_or("none"),
            "delivery status updated"
        );
        Ok(status)
    }

    /// Folds the buyer's rating into the product and closes the order.
    pub async fn rate(&self, request: RatingRequest) -> Result<RatingReceipt, ApplicationError> {
        let rating = validate_rating(request.rating)?;
        let order = self.order(&request.order_id).await?;
        if order.product_id != request.product_id {
            return Err(ApplicationError::validation(format!(
                "Order {} is not for product {}.",
                order.id.0, request.product_id.0
            )));
        }
        if order.buyer_id != request.user_id {
            return Err(ApplicationError::validation("Only the buyer can rate this order."));
        }

        let RatingOutcome { product_id, rating: average, rating_count } =
            self.store.rate_and_close_order(&order.id, &request.product_id, rating).await?;

        info!(
            event_name = "market.order.rated",
            order_id = %order.id.0,
            product_id = %product_id.0,
            rating,
            rating_count,
            "order rated and closed"
        );

        let session_sync = SideEffectStatus::settle(
            "market.rating.session_sync",
            &request.user_id,
            self.store.remove_session_order(&request.user_id, &order.id).await,
        );

        Ok(RatingReceipt { product_id, rating: average, rating_count, session_sync })
    }
}
