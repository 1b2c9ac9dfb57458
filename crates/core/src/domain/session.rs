use chrono::{DateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::order::OrderId;
use crate::domain::product::{Location, ProductId};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedProduct {
    pub product_id: ProductId,
    pub product_name: String,
}

// Keys of the flat session state that map onto typed fields. Everything else
// is auxiliary conversational state and is carried through untouched.
const KEY_USER_ID: &str = "user_id";
const KEY_STATE: &str = "state";
const KEY_DISTRICT: &str = "district";
const KEY_NAME: &str = "name";
const KEY_REVENUE: &str = "revenue";
const KEY_ORDER_IDS: &str = "order_ids";
const KEY_LISTINGS: &str = "product_listed_in_market";

/// Per-user conversational and business state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub location: Option<Location>,
    pub display_name: Option<String>,
    pub revenue: Decimal,
    pub order_ids: Vec<OrderId>,
    pub listed_products: Vec<ListedProduct>,
    pub aux: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Builds a fresh session from the flat initial state a client sends on
    /// first contact. Unknown keys land in `aux`.
    pub fn new(user_id: UserId, initial_state: &Map<String, Value>) -> Self {
        let now = Utc::now();
        let mut session = Self {
            id: SessionId(Uuid::new_v4().to_string()),
            user_id,
            location: None,
            display_name: None,
            revenue: Decimal::ZERO,
            order_ids: Vec::new(),
            listed_products: Vec::new(),
            aux: Map::new(),
            created_at: now,
            updated_at: now,
        };
        session.merge_state(initial_state);
        session
    }

    pub fn merge_state(&mut self, state: &Map<String, Value>) {
        let mut region = self.location.as_ref().map(|location| location.state.clone());
        let mut district = self.location.as_ref().map(|location| location.district.clone());

        for (key, value) in state {
            match key.as_str() {
                KEY_USER_ID => {}
                KEY_STATE => region = non_empty_str(value).or(region),
                KEY_DISTRICT => district = non_empty_str(value).or(district),
                KEY_NAME => {
                    if let Some(name) = non_empty_str(value) {
                        self.display_name = Some(name);
                    }
                }
                KEY_REVENUE => {
                    if let Some(revenue) = value.as_f64().and_then(Decimal::from_f64) {
                        self.revenue = revenue.max(Decimal::ZERO);
                    }
                }
                KEY_ORDER_IDS => {
                    if let Ok(ids) = serde_json::from_value::<Vec<String>>(value.clone()) {
                        self.order_ids = ids.into_iter().map(OrderId).collect();
                    }
                }
                KEY_LISTINGS => {
                    if let Ok(listings) =
                        serde_json::from_value::<Vec<ListedProduct>>(value.clone())
                    {
                        self.listed_products = listings;
                    }
                }
                _ => {
                    self.aux.insert(key.clone(), value.clone());
                }
            }
        }

        if let (Some(state), Some(district)) = (region, district) {
            self.location = Some(Location::new(state, district));
        }
    }

    /// Flat JSON view of the session, the shape clients and agent tools read.
    pub fn state_snapshot(&self) -> Map<String, Value> {
        let mut state = self.aux.clone();
        state.insert(KEY_USER_ID.to_string(), Value::String(self.user_id.0.clone()));
        if let Some(location) = &self.location {
            state.insert(KEY_STATE.to_string(), Value::String(location.state.clone()));
            state.insert(KEY_DISTRICT.to_string(), Value::String(location.district.clone()));
        }
        if let Some(name) = &self.display_name {
            state.insert(KEY_NAME.to_string(), Value::String(name.clone()));
        }
        state.insert(
            KEY_REVENUE.to_string(),
            self.revenue.to_f64().map(Value::from).unwrap_or(Value::from(0)),
        );
        state.insert(
            KEY_ORDER_IDS.to_string(),
            Value::Array(self.order_ids.iter().map(|id| Value::String(id.0.clone())).collect()),
        );
        state.insert(
            KEY_LISTINGS.to_string(),
            serde_json::to_value(&self.listed_products).unwrap_or(Value::Array(Vec::new())),
        );
        state
    }

    pub fn aux_str(&self, key: &str) -> Option<&str> {
        self.aux.get(key).and_then(Value::as_str)
    }
}

fn non_empty_str(value: &Value) -> Option<String> {
    value.as_str().map(str::trim).filter(|value| !value.is_empty()).map(str::to_string)
}
