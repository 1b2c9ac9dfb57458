//! Deterministic manager routing: picks the sub-agent that owns a request
//! and, for the market and finance agents, the tool call that answers it.

use serde::Serialize;
use serde_json::{json, Value};

use farmlink_core::naming::singularize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubAgent {
    Market,
    Finance,
    Weather,
    PlantDisease,
    Schemes,
}

impl SubAgent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Market => "market_agent",
            Self::Finance => "finance_agent",
            Self::Weather => "weather_agent",
            Self::PlantDisease => "plant_disease_agent",
            Self::Schemes => "scheme_agent",
        }
    }
}

const PLANT_DISEASE_KEYWORDS: &[&str] =
    &["disease", "leaf", "leaves", "pest", "fungus", "blight", "spots", "wilt", "infection"];
const FINANCE_KEYWORDS: &[&str] = &[
    "revenue", "earn", "earned", "earning", "income", "profit", "profitable", "finance",
    "financial", "plan",
];
const SCHEME_KEYWORDS: &[&str] =
    &["scheme", "schemes", "subsidy", "subsidies", "government", "yojana", "loan", "insurance"];
const WEATHER_KEYWORDS: &[&str] =
    &["weather", "rain", "rainfall", "forecast", "temperature", "humidity", "monsoon"];
const MARKET_KEYWORDS: &[&str] = &[
    "buy", "purchase", "sell", "price", "prices", "market", "mandi", "order", "orders", "product",
    "products", "available", "listing",
];

/// Words that never name a commodity when pulling one out of a sentence.
const FILLER_WORDS: &[&str] = &[
    "a", "an", "the", "of", "for", "my", "me", "i", "want", "to", "some", "kg", "kgs", "kilo",
    "kilos", "is", "what", "whats", "show", "list", "please", "at", "per", "in", "rs", "rupees",
    "and", "how", "much", "today", "current", "latest", "sell", "buy", "purchase", "price",
    "prices", "market", "mandi", "can", "you", "units", "quintal", "available", "rate", "are",
    "do", "does", "did", "there", "any", "have", "has", "which", "sale", "get",
];

/// Image uploads always go to plant-disease analysis. Otherwise the first
/// keyword family that matches wins; `None` means no sub-agent applies.
pub fn route(message: Option<&str>, image_url: Option<&str>) -> Option<SubAgent> {
    if image_url.is_some_and(|url| !url.trim().is_empty()) {
        return Some(SubAgent::PlantDisease);
    }

    let words = words(message.unwrap_or_default());
    let mentions = |keywords: &[&str]| words.iter().any(|word| keywords.contains(&word.as_str()));

    if mentions(PLANT_DISEASE_KEYWORDS) {
        Some(SubAgent::PlantDisease)
    } else if mentions(FINANCE_KEYWORDS) {
        Some(SubAgent::Finance)
    } else if mentions(SCHEME_KEYWORDS) {
        Some(SubAgent::Schemes)
    } else if mentions(WEATHER_KEYWORDS) {
        Some(SubAgent::Weather)
    } else if mentions(MARKET_KEYWORDS) {
        Some(SubAgent::Market)
    } else {
        None
    }
}

/// A tool call derived from free text.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolCall {
    pub tool: &'static str,
    pub input: Value,
}

impl ToolCall {
    fn new(tool: &'static str, input: Value) -> Self {
        Self { tool, input }
    }
}

pub fn market_call(message: &str) -> ToolCall {
    let words = words(message);
    let has = |word: &str| words.iter().any(|candidate| candidate == word);
    let quantity = words.iter().find_map(|word| word.parse::<i64>().ok());
    let commodity = commodity(&words);

    if let Some(order_id) = words.iter().find(|word| word.len() >= 16 && word.contains('-')) {
        return ToolCall::new("get_order_details", json!({ "order_id": order_id }));
    }
    if has("order") || has("orders") {
        return ToolCall::new("list_order_ids", json!({}));
    }
    if has("buy") || has("purchase") {
        return ToolCall::new(
            "purchase_product",
            json!({ "product_name": commodity, "quantity": quantity.unwrap_or(1) }),
        );
    }
    if has("sell") {
        return ToolCall::new(
            "sell_product",
            json!({ "product_name": commodity, "quantity_available": quantity }),
        );
    }
    if (has("price") || has("prices") || has("rate")) && commodity.is_some() {
        return ToolCall::new("get_latest_market_price", json!({ "commodity": commodity }));
    }
    ToolCall::new("list_products_for_sale", json!({ "product_name": commodity }))
}

pub fn finance_call(message: &str) -> ToolCall {
    let words = words(message);
    let about_revenue =
        words.iter().any(|word| matches!(word.as_str(), "revenue" | "earn" | "earning" | "earned" | "income"));
    if about_revenue && !words.iter().any(|word| word == "plan") {
        ToolCall::new("get_session_revenue", json!({}))
    } else {
        ToolCall::new("get_crop_profitability_plan", json!({}))
    }
}

fn words(text: &str) -> Vec<String> {
    text.split(|ch: char| !(ch.is_alphanumeric() || ch == '-'))
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn commodity(words: &[String]) -> Option<String> {
    words
        .iter()
        .filter(|word| word.chars().all(char::is_alphabetic))
        .filter(|word| !FILLER_WORDS.contains(&word.as_str()))
        .filter(|word| !MARKET_KEYWORDS.contains(&word.as_str()))
        .last()
        .map(|word| singularize(word))
}
