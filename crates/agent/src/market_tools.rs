//! Marketplace tools for the market sub-agent. Every tool delegates to
//! [`MarketEngine`]; none of them touch the store directly.

use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use farmlink_core::domain::order::OrderId;
use farmlink_core::domain::product::{Location, ProductId};
use farmlink_core::market::{product_views, BrowseQuery, MarketEngine, OrderView, SellRequest};
use farmlink_core::naming::listing_name;

use crate::market_price::{latest_record, MarketPriceSource, PriceQuery};
use crate::tools::{optional_str, Tool, ToolContext, ToolRegistry};

/// Records requested per market price lookup.
pub const MARKET_PRICE_LIMIT: u32 = 50;

pub struct ListProductsTool {
    engine: MarketEngine,
}

pub struct PurchaseProductTool {
    engine: MarketEngine,
}

pub struct SellProductTool {
    engine: MarketEngine,
}

pub struct ListOrderIdsTool {
    engine: MarketEngine,
}

pub struct OrderDetailsTool {
    engine: MarketEngine,
}

pub struct MarketPriceTool {
    prices: Arc<dyn MarketPriceSource>,
}

pub fn register_market_tools(
    registry: &mut ToolRegistry,
    engine: &MarketEngine,
    prices: Arc<dyn MarketPriceSource>,
) {
    registry.register(ListProductsTool { engine: engine.clone() });
    registry.register(PurchaseProductTool { engine: engine.clone() });
    registry.register(SellProductTool { engine: engine.clone() });
    registry.register(ListOrderIdsTool { engine: engine.clone() });
    registry.register(OrderDetailsTool { engine: engine.clone() });
    registry.register(MarketPriceTool { prices });
}

fn requested_location(input: &Value) -> Option<Location> {
    match (optional_str(input, "state"), optional_str(input, "district")) {
        (Some(state), Some(district)) => Some(Location::new(state, district)),
        _ => None,
    }
}

fn decimal_input(input: &Value, key: &str) -> Result<Option<Decimal>> {
    match input.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => number
            .to_string()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("Invalid input. '{key}' must be a number.")),
        Some(Value::String(raw)) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("Invalid input. '{key}' must be a number.")),
        Some(_) => bail!("Invalid input. '{key}' must be a number."),
    }
}

fn positive_quantity(input: &Value, key: &str) -> Result<i64> {
    match input.get(key).and_then(Value::as_i64) {
        Some(quantity) if quantity > 0 => Ok(quantity),
        _ => bail!("Invalid input. Please provide a positive integer for quantity."),
    }
}

#[async_trait]
impl Tool for ListProductsTool {
    fn name(&self) -> &'static str {
        "list_products_for_sale"
    }

    async fn execute(&self, context: &ToolContext, input: Value) -> Result<Value> {
        let query = BrowseQuery {
            requester: Some(context.user_id.clone()),
            location: requested_location(&input),
            category: optional_str(&input, "product_type").map(str::to_string),
            name: optional_str(&input, "product_name").map(str::to_string),
        };
        let products = self.engine.browse(query).await?;

        if products.is_empty() {
            return Ok(json!({ "message": "No products found for the specified criteria in your area or nationwide." }));
        }
        Ok(json!({ "products": product_views(&products) }))
    }
}

#[async_trait]
impl Tool for PurchaseProductTool {
    fn name(&self) -> &'static str {
        "purchase_product"
    }

    /// Buys by `product_id`, or by `product_name` when exactly one seller
    /// offers it. Several sellers produce a list of choices instead.
    async fn execute(&self, context: &ToolContext, input: Value) -> Result<Value> {
        let quantity = positive_quantity(&input, "quantity")?;

        let product_id = match (optional_str(&input, "product_id"), optional_str(&input, "product_name")) {
            (Some(product_id), _) => ProductId(product_id.to_string()),
            (None, Some(product_name)) => {
                let mut candidates = self
                    .engine
                    .browse(BrowseQuery {
                        requester: Some(context.user_id.clone()),
                        name: Some(product_name.to_string()),
                        ..BrowseQuery::default()
                    })
                    .await?;

                match candidates.len() {
                    0 => bail!("Sorry, no '{product_name}' is currently available for sale in your area."),
                    1 => candidates.remove(0).id,
                    _ => {
                        return Ok(json!({
                            "message": format!(
                                "There are multiple sellers for '{}'. Please choose one by its product_id.",
                                listing_name(product_name)
                            ),
                            "choices": product_views(&candidates),
                        }))
                    }
                }
            }
            (None, None) => {
                bail!("You must provide either a product_id or a product_name to purchase.")
            }
        };

        let receipt = self.engine.purchase(&context.user_id, &product_id, quantity).await?;
        Ok(json!({
            "message": format!(
                "Successfully purchased {} units of {}. Your order has been placed. Your order ID is {}.",
                receipt.order.quantity, receipt.order.product_name, receipt.order.id.0
            ),
            "order_id": receipt.order.id.0,
            "product_id": product_id.0,
            "remaining_quantity": receipt.remaining_quantity,
        }))
    }
}

#[async_trait]
impl Tool for SellProductTool {
    fn name(&self) -> &'static str {
        "sell_product"
    }

    async fn execute(&self, context: &ToolContext, input: Value) -> Result<Value> {
        let product_name = optional_str(&input, "product_name")
            .ok_or_else(|| anyhow!("product_name is required."))?
            .to_string();
        let quantity = positive_quantity(&input, "quantity_available")?;

        let outcome = self
            .engine
            .sell(SellRequest {
                seller_id: context.user_id.clone(),
                seller_name: None,
                location: None,
                product_name,
                category: optional_str(&input, "product_type").map(str::to_string),
                price_per_kg: decimal_input(&input, "price_per_kg")?,
                quantity,
            })
            .await?;

        Ok(json!({ "message": outcome.message(), "product_id": outcome.product_id().0 }))
    }
}

#[async_trait]
impl Tool for ListOrderIdsTool {
    fn name(&self) -> &'static str {
        "list_order_ids"
    }

    async fn execute(&self, context: &ToolContext, _input: Value) -> Result<Value> {
        let session = self.engine.session(&context.user_id).await?;
        if session.order_ids.is_empty() {
            return Ok(json!({ "message": "You have not placed any orders yet." }));
        }
        let ids: Vec<&str> = session.order_ids.iter().map(|id| id.0.as_str()).collect();
        Ok(json!({ "order_ids": ids }))
    }
}

#[async_trait]
impl Tool for OrderDetailsTool {
    fn name(&self) -> &'static str {
        "get_order_details"
    }

    async fn execute(&self, _context: &ToolContext, input: Value) -> Result<Value> {
        let order_id =
            optional_str(&input, "order_id").ok_or_else(|| anyhow!("An order ID must be provided."))?;
        let order = self.engine.order(&OrderId(order_id.to_string())).await?;
        Ok(json!({ "order_details": OrderView::from(&order) }))
    }
}

#[async_trait]
impl Tool for MarketPriceTool {
    fn name(&self) -> &'static str {
        "get_latest_market_price"
    }

    /// Latest mandi price for a commodity at the caller's session location.
    /// Missing data and upstream failures are reported in the payload.
    async fn execute(&self, context: &ToolContext, input: Value) -> Result<Value> {
        let commodity =
            optional_str(&input, "commodity").ok_or_else(|| anyhow!("A commodity must be provided."))?;
        let Some(location) = context.session.location.as_ref() else {
            return Ok(json!({
                "error": "State or District not found in session state. Please provide your location first."
            }));
        };

        let query = PriceQuery::new(
            location.state.clone(),
            location.district.clone(),
            commodity,
            MARKET_PRICE_LIMIT,
        );
        let records = match self.prices.fetch(&query).await {
            Ok(records) => records,
            Err(error) => {
                return Ok(json!({ "error": format!("Failed to fetch market price data. {error}") }))
            }
        };

        let [(_, state), (_, district), (_, commodity)] = query.filters();
        match latest_record(&records) {
            Some(record) => Ok(json!({
                "latest_record": record,
                "price_per_kg": record.modal_price_per_kg().map(|price| price.to_string()),
            })),
            None => Ok(json!({
                "message": format!("No price data found for {commodity} in {district}, {state}.")
            })),
        }
    }
}
