//! Schema guard: DDL safety and idempotent creation.

#![allow(clippy::unwrap_used)]

use stockbot_integration_tests::fresh_database;
use stockbot_server::db::schema::{
    ADDITIVE_MIGRATIONS, CREATE_STATEMENTS, is_additive, is_create_only,
};
use stockbot_server::db::{SchemaError, SchemaGuard};

#[test]
fn test_bundled_statements_pass_the_guard() {
    assert!(CREATE_STATEMENTS.iter().all(|s| is_create_only(s)));
    assert!(
        ADDITIVE_MIGRATIONS
            .iter()
            .all(|m| is_additive(&m.statement()))
    );
}

#[test]
fn test_guard_refuses_destructive_statements() {
    let refused = [
        "DROP TABLE items",
        "TRUNCATE items",
        "DELETE FROM users",
        "ALTER TABLE items DROP COLUMN item_price",
        "ALTER TABLE items RENAME COLUMN item_name TO name",
        "ALTER TABLE items ALTER COLUMN item_amount TYPE BIGINT",
        "ALTER TABLE items ADD COLUMN note TEXT",
        "ALTER TABLE items ADD COLUMN IF NOT EXISTS a TEXT; DROP TABLE users",
        "CREATE TABLE items (id INT)",
    ];
    for sql in refused {
        assert!(!is_additive(sql), "{sql}");
        assert!(!is_create_only(sql), "{sql}");
    }
}

#[test]
fn test_additive_migration_ids_are_unique() {
    let mut ids: Vec<_> = ADDITIVE_MIGRATIONS.iter().map(|m| m.id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), ADDITIVE_MIGRATIONS.len());
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (STOCKBOT_TEST_DATABASE_URL)"]
async fn test_ensure_is_idempotent_and_seeds_roles() {
    let pool = fresh_database().await;
    let guard = SchemaGuard::new(&pool);
    guard.ensure().await.unwrap();
    guard.ensure().await.unwrap();

    let roles: Vec<String> = sqlx::query_scalar("SELECT name FROM roles ORDER BY name")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(roles, vec!["admin", "user"]);

    // Fresh tables already carry every additive column.
    assert!(guard.pending().await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (STOCKBOT_TEST_DATABASE_URL)"]
async fn test_missing_column_is_pending_until_applied() {
    let pool = fresh_database().await;
    sqlx::query("ALTER TABLE items DROP COLUMN created_by_user_id")
        .execute(&pool)
        .await
        .unwrap();

    let guard = SchemaGuard::new(&pool);
    let pending = guard.pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, "0001_items_created_by_user_id");

    guard.apply_additive(pending[0].id).await.unwrap();
    assert!(guard.pending().await.unwrap().is_empty());
    assert!(matches!(
        guard.apply_additive("0001_items_created_by_user_id").await,
        Err(SchemaError::AlreadyApplied(_))
    ));
    assert!(matches!(
        guard.apply_additive("9999_nope").await,
        Err(SchemaError::UnknownMigration(_))
    ));
}
