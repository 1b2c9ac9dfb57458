use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{Sqlite, SqliteRow};
use sqlx::Row;

use farmlink_core::market::StoreError;

pub mod community;
pub mod market;
pub mod memory;

pub use community::SqlCommunityStore;
pub use market::SqlMarketStore;
pub use memory::{InMemoryCommunityStore, InMemoryMarketStore};

/// Maps driver failures onto the store boundary. Lock contention surfaces as a
/// conflict so callers can tell an aborted transaction from a broken backend.
pub(crate) fn backend(error: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(database_error) = &error {
        let message = database_error.message().to_ascii_lowercase();
        if message.contains("locked") || message.contains("busy") {
            return StoreError::Conflict(database_error.message().to_string());
        }
    }
    StoreError::Backend(error.to_string())
}

pub(crate) fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name).map_err(|error| StoreError::Corrupt(format!("column `{name}`: {error}")))
}

pub(crate) fn parse_u32(column: &str, value: i64) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| {
        StoreError::Corrupt(format!(
            "invalid value for `{column}` (expected non-negative u32): {value}"
        ))
    })
}

pub(crate) fn parse_decimal(column: &str, value: &str) -> Result<Decimal, StoreError> {
    value
        .parse::<Decimal>()
        .map_err(|error| StoreError::Corrupt(format!("invalid decimal in `{column}`: `{value}` ({error})")))
}

pub(crate) fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| StoreError::Corrupt(format!("invalid timestamp in `{column}`: `{value}` ({error})")),
    )
}

/// Fixed-width RFC 3339 so that text ordering matches time ordering.
pub(crate) fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{format_timestamp, parse_decimal, parse_timestamp, parse_u32};

    #[test]
    fn timestamps_round_trip_and_sort_lexically() {
        let earlier = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().expect("valid time");
        let later = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).single().expect("valid time");

        assert!(format_timestamp(&earlier) < format_timestamp(&later));
        assert_eq!(parse_timestamp("t", &format_timestamp(&earlier)).expect("parse"), earlier);
    }

    #[test]
    fn negative_counts_and_bad_decimals_are_corrupt() {
        assert!(parse_u32("quantity_available", -1).is_err());
        assert!(parse_decimal("price_per_kg", "twelve").is_err());
        assert_eq!(parse_decimal("price_per_kg", "12.50").expect("decimal").to_string(), "12.50");
    }
}
