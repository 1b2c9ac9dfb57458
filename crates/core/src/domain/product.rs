use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::session::UserId;

/// Location value that marks a listing as visible everywhere.
pub const GLOBAL_LOCATION: &str = "any";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub state: String,
    pub district: String,
}

impl Location {
    pub fn new(state: impl Into<String>, district: impl Into<String>) -> Self {
        Self { state: state.into(), district: district.into() }
    }

    pub fn global() -> Self {
        Self::new(GLOBAL_LOCATION, GLOBAL_LOCATION)
    }

    pub fn is_global(&self) -> bool {
        self.state == GLOBAL_LOCATION && self.district == GLOBAL_LOCATION
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    pub price_per_kg: Decimal,
    pub quantity_available: u32,
    pub seller_id: UserId,
    pub seller_name: String,
    pub location: Location,
    pub rating: Option<f64>,
    pub rating_count: u32,
    pub listed_at: DateTime<Utc>,
}

impl Product {
    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        &self.seller_id == user_id
    }

    pub fn in_stock(&self) -> bool {
        self.quantity_available > 0
    }
}
