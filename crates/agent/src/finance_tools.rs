use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use farmlink_core::market::MarketEngine;

use crate::market_price::{latest_record, MarketPriceSource, PriceQuery, PriceRecord};
use crate::tools::{Tool, ToolContext, ToolRegistry};

pub const CROPS_TO_EVALUATE: &[&str] =
    &["Tomato", "Onion", "Potato", "Paddy", "Wheat", "Cotton", "Sugarcane", "Maize"];
pub const RECOMMENDED_CROPS: usize = 3;
const PLAN_PRICE_LIMIT: u32 = 10;
const PLAN_DISCLAIMER: &str = "This advice is based on recent market prices and does not account for cultivation costs, soil type, or water availability. Please consider these factors.";

pub struct SessionRevenueTool {
    engine: MarketEngine,
}

pub struct ProfitabilityPlanTool {
    engine: MarketEngine,
    prices: Arc<dyn MarketPriceSource>,
}

pub fn register_finance_tools(
    registry: &mut ToolRegistry,
    engine: &MarketEngine,
    prices: Arc<dyn MarketPriceSource>,
) {
    registry.register(SessionRevenueTool { engine: engine.clone() });
    registry.register(ProfitabilityPlanTool { engine: engine.clone(), prices });
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CropPrice {
    pub crop: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price_per_kg: Decimal,
}

/// Highest-priced crops first; equal prices keep evaluation order.
pub fn rank_crops(mut prices: Vec<CropPrice>, top: usize) -> Vec<CropPrice> {
    prices.sort_by(|left, right| right.price_per_kg.cmp(&left.price_per_kg));
    prices.truncate(top);
    prices
}

fn latest_priced(records: &[PriceRecord]) -> Option<Decimal> {
    let priced: Vec<PriceRecord> =
        records.iter().filter(|record| record.modal_price.is_some()).cloned().collect();
    latest_record(&priced).and_then(PriceRecord::modal_price_per_kg)
}

fn revenue_value(revenue: Decimal) -> Value {
    revenue.to_f64().map(Value::from).unwrap_or_else(|| Value::from(0))
}

#[async_trait]
impl Tool for SessionRevenueTool {
    fn name(&self) -> &'static str {
        "get_session_revenue"
    }

    async fn execute(&self, context: &ToolContext, _input: Value) -> Result<Value> {
        let session = self.engine.session(&context.user_id).await?;
        Ok(json!({ "total_revenue": revenue_value(session.revenue) }))
    }
}

#[async_trait]
impl Tool for ProfitabilityPlanTool {
    fn name(&self) -> &'static str {
        "get_crop_profitability_plan"
    }

    /// Ranks a fixed crop list by the latest local mandi price. Crops whose
    /// lookup fails are skipped.
    async fn execute(&self, context: &ToolContext, _input: Value) -> Result<Value> {
        let session = self.engine.session(&context.user_id).await?;
        let acres = session.aux.get("acres").filter(|value| match value {
            Value::Number(number) => number.as_f64().is_some_and(|acres| acres > 0.0),
            Value::String(raw) => !raw.trim().is_empty(),
            _ => false,
        });
        let (Some(acres), Some(location)) = (acres.cloned(), session.location.clone()) else {
            return Ok(json!({
                "error": "Farm size (acres), state, and district must be set in the session to generate a financial plan."
            }));
        };

        let mut crop_prices = Vec::new();
        for crop in CROPS_TO_EVALUATE {
            let query = PriceQuery::new(
                location.state.clone(),
                location.district.clone(),
                *crop,
                PLAN_PRICE_LIMIT,
            );
            match self.prices.fetch(&query).await {
                Ok(records) => {
                    if let Some(price_per_kg) = latest_priced(&records) {
                        crop_prices.push(CropPrice { crop: crop.to_string(), price_per_kg });
                    }
                }
                Err(error) => warn!(
                    event_name = "finance.plan.price_failed",
                    crop,
                    error = %error,
                    "skipping crop without price data"
                ),
            }
        }

        if crop_prices.is_empty() {
            return Ok(json!({
                "error": "Could not retrieve enough market data for your location to create a reliable plan."
            }));
        }

        let ranked = rank_crops(crop_prices, RECOMMENDED_CROPS);
        info!(
            event_name = "finance.plan.created",
            user_id = %context.user_id.0,
            crops = ranked.len(),
            "profitability plan created"
        );

        let recommendations: Vec<String> = ranked
            .iter()
            .map(|entry| {
                format!(
                    "Based on current market prices in your area, focusing on {} (market price approx. ₹{:.2}/kg) could be highly profitable.",
                    entry.crop, entry.price_per_kg
                )
            })
            .collect();

        Ok(json!({
            "profitability_plan": {
                "farm_size_acres": acres,
                "location": format!("{}, {}", location.district, location.state),
                "total_revenue_so_far": revenue_value(session.revenue),
                "crop_prices": ranked,
                "recommendations": recommendations,
                "disclaimer": PLAN_DISCLAIMER,
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use serde_json::{json, Map, Value};

    use farmlink_core::domain::session::UserId;
    use farmlink_core::errors::ApplicationError;
    use farmlink_core::market::MarketEngine;
    use farmlink_db::InMemoryMarketStore;

    use super::{rank_crops, register_finance_tools, CropPrice};
    use crate::market_price::{MarketPriceSource, PriceQuery, PriceRecord};
    use crate::tools::{ToolContext, ToolRegistry};

    /// Quintal prices per commodity; commodities not listed fail upstream.
    struct FixedPrices(Vec<(&'static str, &'static str)>);

    #[async_trait]
    impl MarketPriceSource for FixedPrices {
        async fn fetch(&self, query: &PriceQuery) -> Result<Vec<PriceRecord>, ApplicationError> {
            let commodity = query.filters()[2].1.clone();
            let Some((_, modal)) = self.0.iter().find(|(name, _)| *name == commodity) else {
                return Err(ApplicationError::Upstream("no data".to_string()));
            };
            Ok(vec![
                PriceRecord {
                    arrival_date: Some("01/01/2026".to_string()),
                    modal_price: Some(json!("100")),
                    ..PriceRecord::default()
                },
                PriceRecord {
                    arrival_date: Some("02/03/2026".to_string()),
                    modal_price: Some(json!(modal)),
                    ..PriceRecord::default()
                },
            ])
        }
    }

    fn state(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object literal")
    }

    async fn setup(initial: Value, prices: FixedPrices) -> (ToolRegistry, ToolContext) {
        let engine = MarketEngine::new(Arc::new(InMemoryMarketStore::new()));
        let session = engine
            .get_or_create_session(&UserId("farmer-1".to_string()), &state(initial))
            .await
            .expect("session");
        let mut registry = ToolRegistry::default();
        register_finance_tools(&mut registry, &engine, Arc::new(prices));
        (registry, ToolContext::new(session))
    }

    #[test]
    fn ranking_keeps_top_prices_in_descending_order() {
        let ranked = rank_crops(
            vec![
                CropPrice { crop: "Onion".to_string(), price_per_kg: Decimal::new(20, 0) },
                CropPrice { crop: "Cotton".to_string(), price_per_kg: Decimal::new(70, 0) },
                CropPrice { crop: "Paddy".to_string(), price_per_kg: Decimal::new(22, 0) },
                CropPrice { crop: "Maize".to_string(), price_per_kg: Decimal::new(20, 0) },
            ],
            3,
        );

        let crops: Vec<&str> = ranked.iter().map(|entry| entry.crop.as_str()).collect();
        assert_eq!(crops, vec!["Cotton", "Paddy", "Onion"]);
    }

    #[tokio::test]
    async fn plan_recommends_top_three_latest_prices() {
        let (registry, context) = setup(
            json!({ "state": "tamil nadu", "district": "villupuram", "acres": 4, "revenue": 250.0 }),
            FixedPrices(vec![
                ("Tomato", "1800"),
                ("Onion", "2600"),
                ("Cotton", "7100"),
                ("Maize", "2200"),
            ]),
        )
        .await;

        let output = registry.invoke("get_crop_profitability_plan", &context, Value::Null).await;
        let plan = &output["profitability_plan"];

        assert_eq!(plan["farm_size_acres"], json!(4));
        assert_eq!(plan["location"], json!("villupuram, tamil nadu"));
        assert_eq!(plan["total_revenue_so_far"], json!(250.0));
        assert_eq!(
            plan["crop_prices"],
            json!([
                { "crop": "Cotton", "price_per_kg": 71.0 },
                { "crop": "Onion", "price_per_kg": 26.0 },
                { "crop": "Maize", "price_per_kg": 22.0 }
            ])
        );
        assert_eq!(plan["recommendations"].as_array().map(Vec::len), Some(3));
        assert!(plan["disclaimer"].as_str().is_some_and(|text| text.contains("cultivation costs")));
    }

    #[tokio::test]
    async fn plan_requires_farm_size_and_location() {
        let (registry, context) =
            setup(json!({ "state": "Punjab", "district": "Ludhiana" }), FixedPrices(Vec::new())).await;

        let output = registry.invoke("get_crop_profitability_plan", &context, Value::Null).await;

        assert_eq!(
            output["error"],
            json!("Farm size (acres), state, and district must be set in the session to generate a financial plan.")
        );
    }

    #[tokio::test]
    async fn plan_without_any_prices_is_an_error_payload() {
        let (registry, context) = setup(
            json!({ "state": "Punjab", "district": "Ludhiana", "acres": 2 }),
            FixedPrices(Vec::new()),
        )
        .await;

        let output = registry.invoke("get_crop_profitability_plan", &context, Value::Null).await;

        assert_eq!(
            output["error"],
            json!("Could not retrieve enough market data for your location to create a reliable plan.")
        );
    }

    #[tokio::test]
    async fn revenue_reads_the_live_session() {
        let (registry, context) =
            setup(json!({ "revenue": 1250.5 }), FixedPrices(Vec::new())).await;

        let output = registry.invoke("get_session_revenue", &context, Value::Null).await;

        assert_eq!(output, json!({ "total_revenue": 1250.5 }));
    }
}
