//! Mandi price lookups against the data.gov.in commodity price resource.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use farmlink_core::config::MarketDataConfig;
use farmlink_core::errors::ApplicationError;
use farmlink_core::naming::{singularize, title_case};

const ARRIVAL_DATE_FORMAT: &str = "%d/%m/%Y";
const KG_PER_QUINTAL: i64 = 100;

/// One row of the price resource. Prices are per quintal and arrive either as
/// strings or numbers depending on the dataset revision.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    #[serde(rename = "State", default)]
    pub state: Option<String>,
    #[serde(rename = "District", default)]
    pub district: Option<String>,
    #[serde(rename = "Market", default)]
    pub market: Option<String>,
    #[serde(rename = "Commodity", default)]
    pub commodity: Option<String>,
    #[serde(rename = "Variety", default)]
    pub variety: Option<String>,
    #[serde(rename = "Arrival_Date", default)]
    pub arrival_date: Option<String>,
    #[serde(rename = "Min_Price", default)]
    pub min_price: Option<Value>,
    #[serde(rename = "Max_Price", default)]
    pub max_price: Option<Value>,
    #[serde(rename = "Modal_Price", default)]
    pub modal_price: Option<Value>,
}

impl PriceRecord {
    pub fn arrival(&self) -> Option<NaiveDate> {
        let raw = self.arrival_date.as_deref()?.trim();
        NaiveDate::parse_from_str(raw, ARRIVAL_DATE_FORMAT).ok()
    }

    pub fn modal_price_per_quintal(&self) -> Option<Decimal> {
        self.modal_price.as_ref().and_then(decimal_from_value)
    }

    pub fn modal_price_per_kg(&self) -> Option<Decimal> {
        self.modal_price_per_quintal()
            .map(|price| (price / Decimal::from(KG_PER_QUINTAL)).normalize())
    }
}

fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(raw) => raw.trim().parse().ok(),
        Value::Number(number) => number.to_string().parse().ok(),
        _ => None,
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriceQuery {
    pub state: String,
    pub district: String,
    pub commodity: String,
    pub limit: u32,
}

impl PriceQuery {
    pub fn new(
        state: impl Into<String>,
        district: impl Into<String>,
        commodity: impl Into<String>,
        limit: u32,
    ) -> Self {
        Self { state: state.into(), district: district.into(), commodity: commodity.into(), limit }
    }

    /// Filter values as the resource expects them: title-cased, with the
    /// commodity singularized.
    pub fn filters(&self) -> [(&'static str, String); 3] {
        [
            ("filters[State]", title_case(self.state.trim())),
            ("filters[District]", title_case(self.district.trim())),
            ("filters[Commodity]", title_case(&singularize(self.commodity.trim()))),
        ]
    }
}

#[async_trait]
pub trait MarketPriceSource: Send + Sync {
    async fn fetch(&self, query: &PriceQuery) -> Result<Vec<PriceRecord>, ApplicationError>;
}

/// Picks the record with the latest parseable arrival date. Records without a
/// date, or with one that does not parse, are ignored. The first of several
/// records sharing the latest date wins.
pub fn latest_record(records: &[PriceRecord]) -> Option<&PriceRecord> {
    let mut latest: Option<(NaiveDate, &PriceRecord)> = None;
    for record in records {
        let Some(arrival) = record.arrival() else {
            continue;
        };
        match latest {
            Some((best, _)) if arrival <= best => {}
            _ => latest = Some((arrival, record)),
        }
    }
    latest.map(|(_, record)| record)
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    #[serde(default)]
    records: Vec<PriceRecord>,
}

pub struct DataGovPriceClient {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl DataGovPriceClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, ApplicationError> {
        let client = Client::builder().timeout(timeout).build().map_err(|error| {
            ApplicationError::Configuration(format!("market data http client: {error}"))
        })?;
        Ok(Self { client, base_url: base_url.into(), api_key })
    }

    pub fn from_config(config: &MarketDataConfig) -> Result<Self, ApplicationError> {
        Self::new(
            config.base_url.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait]
impl MarketPriceSource for DataGovPriceClient {
    async fn fetch(&self, query: &PriceQuery) -> Result<Vec<PriceRecord>, ApplicationError> {
        let Some(api_key) = &self.api_key else {
            return Err(ApplicationError::Upstream(
                "market data API key is not configured".to_string(),
            ));
        };

        let limit = query.limit.to_string();
        let mut params: Vec<(&str, String)> = vec![
            ("api-key", api_key.expose_secret().to_string()),
            ("format", "json".to_string()),
            ("limit", limit),
        ];
        params.extend(query.filters());

        let response =
            self.client.get(&self.base_url).query(&params).send().await.map_err(|error| {
                warn!(
                    event_name = "market_price.request.failed",
                    commodity = %query.commodity,
                    error = %error,
                    "market price request failed"
                );
                ApplicationError::Upstream(format!("market price request failed: {error}"))
            })?;

        if !response.status().is_success() {
            return Err(ApplicationError::Upstream(format!(
                "market price service returned {}",
                response.status()
            )));
        }

        let body: PriceResponse = response.json().await.map_err(|error| {
            ApplicationError::Upstream(format!("failed to decode market price response: {error}"))
        })?;

        info!(
            event_name = "market_price.fetched",
            commodity = %query.commodity,
            records = body.records.len(),
            "market price records fetched"
        );
        Ok(body.records)
    }
}
