use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;

use farmlink_core::domain::session::{SessionId, UserId};
use farmlink_core::errors::ApplicationError;
use farmlink_core::market::MarketEngine;

use crate::finance_tools::register_finance_tools;
use crate::market_price::MarketPriceSource;
use crate::market_tools::register_market_tools;
use crate::remote::{ReasoningEngine, RemoteQuery};
use crate::router::{finance_call, market_call, route, SubAgent, ToolCall};
use crate::tools::{ToolContext, ToolRegistry};

const GREETING: &str = "Hello! I can help you buy and sell produce, check mandi prices, track your orders and earnings, and plan your next crop. What would you like to do?";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentRequest {
    pub user_id: UserId,
    pub session_id: SessionId,
    pub message: Option<String>,
    pub audio_url: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AgentReply {
    pub response: String,
    pub sub_agent: Option<SubAgent>,
    pub tool: Option<&'static str>,
    pub output: Option<Value>,
}

impl AgentReply {
    fn text(response: impl Into<String>, sub_agent: Option<SubAgent>) -> Self {
        Self { response: response.into(), sub_agent, tool: None, output: None }
    }
}

/// Answers conversational queries. A configured remote reasoning engine
/// handles every query; without one, the keyword router and the local tools
/// answer market and finance questions.
pub struct AgentRuntime {
    engine: MarketEngine,
    tools: ToolRegistry,
    remote: Option<Arc<dyn ReasoningEngine>>,
}

impl AgentRuntime {
    pub fn new(
        engine: MarketEngine,
        prices: Arc<dyn MarketPriceSource>,
        remote: Option<Arc<dyn ReasoningEngine>>,
    ) -> Self {
        let mut tools = ToolRegistry::default();
        register_market_tools(&mut tools, &engine, prices.clone());
        register_finance_tools(&mut tools, &engine, prices);
        Self { engine, tools, remote }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn has_remote_engine(&self) -> bool {
        self.remote.is_some()
    }

    pub async fn handle(&self, request: AgentRequest) -> Result<AgentReply, ApplicationError> {
        if request.user_id.0.trim().is_empty() || request.session_id.0.trim().is_empty() {
            return Err(ApplicationError::validation("user_id and session_id are required."));
        }
        let message = non_blank(request.message.as_deref());
        let audio_url = non_blank(request.audio_url.as_deref());
        let image_url = non_blank(request.image_url.as_deref());
        if message.is_none() && audio_url.is_none() && image_url.is_none() {
            return Err(ApplicationError::validation(
                "One of message, audio_url or image_url is required.",
            ));
        }

        let session = self.engine.session(&request.user_id).await?;
        if session.id != request.session_id {
            return Err(ApplicationError::not_found("Session", request.session_id.0.clone()));
        }

        let mut media = Map::new();
        if let Some(url) = image_url {
            media.insert("image_url".to_string(), Value::String(url.to_string()));
        }
        if let Some(url) = audio_url {
            media.insert("audio_url".to_string(), Value::String(url.to_string()));
        }
        self.engine.record_session_state(&request.user_id, &media).await?;

        if let Some(remote) = &self.remote {
            let response = remote
                .stream_query(&RemoteQuery {
                    user_id: request.user_id.0.clone(),
                    session_id: request.session_id.0.clone(),
                    message: message.unwrap_or_default().to_string(),
                    audio_url: audio_url.map(str::to_string),
                    image_url: image_url.map(str::to_string),
                })
                .await?;
            return Ok(AgentReply::text(response, None));
        }

        let sub_agent = route(message, image_url);
        let call = match (sub_agent, message) {
            (Some(SubAgent::Market), Some(text)) => market_call(text),
            (Some(SubAgent::Finance), Some(text)) => finance_call(text),
            (Some(other), _) => {
                return Ok(AgentReply::text(
                    format!(
                        "The {} needs the hosted reasoning engine, which is not configured.",
                        other.as_str()
                    ),
                    Some(other),
                ))
            }
            (None, Some(_)) => return Ok(AgentReply::text(GREETING, None)),
            (None, None) => {
                return Ok(AgentReply::text(
                    "Voice messages need the hosted reasoning engine, which is not configured.",
                    None,
                ))
            }
        };

        let ToolCall { tool, input } = call;
        let output = self.tools.invoke(tool, &ToolContext::new(session), input).await;
        info!(
            event_name = "agent.query.completed",
            user_id = %request.user_id.0,
            sub_agent = sub_agent.map(SubAgent::as_str).unwrap_or("none"),
            tool,
            "agent query answered locally"
        );

        Ok(AgentReply {
            response: render(&output),
            sub_agent,
            tool: Some(tool),
            output: Some(output),
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Turns a tool payload into the reply text shown to the user.
pub fn render(output: &Value) -> String {
    if let Some(error) = output.get("error").and_then(Value::as_str) {
        return error.to_string();
    }

    let mut lines = Vec::new();
    if let Some(message) = output.get("message").and_then(Value::as_str) {
        lines.push(message.to_string());
    }
    for key in ["products", "choices"] {
        for product in output.get(key).and_then(Value::as_array).into_iter().flatten() {
            lines.push(format!(
                "{} from {}: ₹{}/kg, {} kg available (product_id {})",
                product["product_name"].as_str().unwrap_or("?"),
                product["seller_name"].as_str().unwrap_or("?"),
                product["price_per_kg"],
                product["quantity_available"],
                product["product_id"].as_str().unwrap_or("?"),
            ));
        }
    }
    if let Some(ids) = output.get("order_ids").and_then(Value::as_array) {
        let ids: Vec<&str> = ids.iter().filter_map(Value::as_str).collect();
        lines.push(format!("Your orders: {}", ids.join(", ")));
    }
    if let Some(order) = output.get("order_details") {
        lines.push(format!(
            "Order {} for {} x {} is {}.",
            order["order_id"].as_str().unwrap_or("?"),
            order["quantity"],
            order["product_name"].as_str().unwrap_or("?"),
            order["status"].as_str().unwrap_or("unknown"),
        ));
    }
    if let Some(record) = output.get("latest_record") {
        lines.push(format!(
            "Based on the latest data from {} on {}, the most common price for {} is ₹{} per quintal (about ₹{}/kg).",
            record["Market"].as_str().unwrap_or("the local mandi"),
            record["Arrival_Date"].as_str().unwrap_or("an unknown date"),
            record["Commodity"].as_str().unwrap_or("this commodity"),
            scalar(&record["Modal_Price"]),
            output["price_per_kg"].as_str().unwrap_or("?"),
        ));
    }
    if let Some(revenue) = output.get("total_revenue") {
        lines.push(format!("Your total revenue from sales on the app so far is ₹{revenue}."));
    }
    if let Some(plan) = output.get("profitability_plan") {
        lines.push(format!(
            "Plan for your {}-acre farm in {} (revenue so far ₹{}):",
            scalar(&plan["farm_size_acres"]),
            plan["location"].as_str().unwrap_or("your area"),
            plan["total_revenue_so_far"],
        ));
        for recommendation in plan["recommendations"].as_array().into_iter().flatten() {
            if let Some(text) = recommendation.as_str() {
                lines.push(format!("- {text}"));
            }
        }
        if let Some(disclaimer) = plan["disclaimer"].as_str() {
            lines.push(disclaimer.to_string());
        }
    }

    if lines.is_empty() {
        output.to_string()
    } else {
        lines.join("\n")
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
