use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use farmlink_db::DbPool;
use serde::Serialize;
use tracing::warn;

const READY: &str = "ready";
const DEGRADED: &str = "degraded";

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

impl HealthCheck {
    fn ready(detail: impl Into<String>) -> Self {
        Self { status: READY, detail: detail.into() }
    }

    fn degraded(detail: impl Into<String>) -> Self {
        Self { status: DEGRADED, detail: detail.into() }
    }

    fn is_ready(&self) -> bool {
        self.status == READY
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: HealthCheck,
    /// Informational: without delivery agents orders are created unassigned.
    pub delivery: HealthCheck,
    pub listings: i64,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let (delivery, listings) = if database.is_ready() {
        marketplace_check(&state.db_pool).await
    } else {
        (HealthCheck::degraded("skipped: database unavailable"), 0)
    };
    let ready = database.is_ready();

    let payload = HealthResponse {
        status: if ready { READY } else { DEGRADED },
        database,
        delivery,
        listings,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck::ready("database query succeeded"),
        Err(error) => {
            warn!(event_name = "system.health.database_degraded", error = %error, "health probe failed");
            HealthCheck::degraded(format!("database query failed: {error}"))
        }
    }
}

async fn marketplace_check(pool: &DbPool) -> (HealthCheck, i64) {
    let counts = sqlx::query_as::<_, (i64, i64)>(
        "SELECT (SELECT COUNT(*) FROM delivery_agent), (SELECT COUNT(*) FROM product)",
    )
    .fetch_one(pool)
    .await;

    match counts {
        Ok((0, listings)) => (HealthCheck::degraded("no delivery agents registered"), listings),
        Ok((agents, listings)) => {
            (HealthCheck::ready(format!("{agents} delivery agents registered")), listings)
        }
        Err(error) => {
            warn!(event_name = "system.health.schema_degraded", error = %error, "marketplace probe failed");
            (HealthCheck::degraded(format!("marketplace schema unavailable: {error}")), 0)
        }
    }
}
