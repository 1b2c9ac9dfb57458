use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::{connect_with_settings, migrations::MIGRATOR};

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &[
        "product",
        "purchase_order",
        "delivery_agent",
        "delivery_assignment",
        "user_session",
        "community_message",
        "idx_product_location",
        "idx_product_seller_id",
        "idx_purchase_order_buyer_id",
        "idx_purchase_order_agent_code",
        "idx_delivery_assignment_agent_id",
        "idx_community_message_seq",
    ];

    async fn table_count(pool: &sqlx::SqlitePool, name: &str) -> i64 {
        sqlx::query(
            "SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(name)
        .fetch_one(pool)
        .await
        .expect("check table")
        .get::<i64, _>("count")
    }

    #[tokio::test]
    async fn migrations_create_marketplace_tables() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for table in [
            "product",
            "purchase_order",
            "delivery_agent",
            "delivery_assignment",
            "user_session",
            "community_message",
        ] {
            assert_eq!(table_count(&pool, table).await, 1, "missing table `{table}`");
        }
    }

    #[tokio::test]
    async fn order_can_sit_on_only_one_agent_list() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for (id, code, seq) in [("a1", "DA-1", 1), ("a2", "DA-2", 2)] {
            sqlx::query("INSERT INTO delivery_agent (id, agent_code, registered_seq) VALUES (?, ?, ?)")
                .bind(id)
                .bind(code)
                .bind(seq)
                .execute(&pool)
                .await
                .expect("insert agent");
        }
        sqlx::query(
            "INSERT INTO delivery_assignment (order_id, agent_id, assigned_seq) VALUES ('o1', 'a1', 1)",
        )
        .execute(&pool)
        .await
        .expect("first assignment");

        let duplicate = sqlx::query(
            "INSERT INTO delivery_assignment (order_id, agent_id, assigned_seq) VALUES ('o1', 'a2', 2)",
        )
        .execute(&pool)
        .await;
        assert!(duplicate.is_err(), "second assignment of the same order must fail");
    }

    #[tokio::test]
    async fn quantity_cannot_go_negative() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let result = sqlx::query(
            "INSERT INTO product (
                id, name, category, price_per_kg, quantity_available, seller_id, seller_name,
                state, district, rating, rating_count, listed_at
             ) VALUES ('p1', 'Tomato', 'vegetable', '20', -1, 's1', 'S', 'any', 'any', NULL, 0,
                '2026-03-01T00:00:00.000000Z')",
        )
        .execute(&pool)
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn migrations_up_down_up_preserves_schema_signature() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let initial_signature = managed_schema_signature(&pool).await;
        assert_eq!(
            initial_signature.len(),
            MANAGED_SCHEMA_OBJECTS.len(),
            "initial migration pass should create all managed schema objects",
        );

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        let after_down_signature = managed_schema_signature(&pool).await;
        assert!(
            after_down_signature.is_empty(),
            "managed schema objects should be removed after full undo",
        );

        run_pending(&pool).await.expect("re-run migrations");

        let after_second_up_signature = managed_schema_signature(&pool).await;
        assert_eq!(
            after_second_up_signature, initial_signature,
            "up/down/up should preserve migration-managed schema signature",
        );
    }

    async fn managed_schema_signature(pool: &sqlx::SqlitePool) -> Vec<(String, String, String)> {
        let mut signature: Vec<(String, String, String)> = sqlx::query(
            "SELECT type, name, IFNULL(sql, '') AS sql
             FROM sqlite_master
             WHERE type IN ('table', 'index')",
        )
        .fetch_all(pool)
        .await
        .expect("load schema objects")
        .into_iter()
        .filter_map(|row| {
            let name = row.get::<String, _>("name");
            if MANAGED_SCHEMA_OBJECTS.contains(&name.as_str()) {
                Some((row.get::<String, _>("type"), name, row.get::<String, _>("sql")))
            } else {
                None
            }
        })
        .collect();
        signature.sort();
        signature
    }
}
