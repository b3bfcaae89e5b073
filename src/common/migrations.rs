// src/common/migrations.rs
//! Database migration and schema management

use sqlx::SqlitePool;
use tracing::info;

/// Run all database migrations
///
/// Tables are created if they don't exist; existing rows are never touched.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    create_account_tables(pool).await?;
    create_indexes(pool).await?;

    info!("✅ Database migration completed successfully!");
    Ok(())
}

/// Allow-listed accounts
///
/// Rows are provisioned out-of-band; the login flow only updates them.
async fn create_account_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            provider_id TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL,
            avatar_url TEXT,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
            last_login_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_indexes(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_accounts_provider_id ON accounts(provider_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Adds a provider identity to the allow-list
///
/// Returns the new account id, or `None` if the identity is already present.
/// This is the only place accounts are created; the login flow never does.
#[allow(dead_code)]
pub async fn provision_account(
    pool: &SqlitePool,
    provider_id: &str,
    display_name: &str,
) -> Result<Option<i64>, sqlx::Error> {
    let inserted: Option<(i64,)> = sqlx::query_as(
        r#"
        INSERT INTO accounts (provider_id, display_name)
        VALUES (?, ?)
        ON CONFLICT(provider_id) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(provider_id)
    .bind(display_name)
    .fetch_optional(pool)
    .await?;

    if let Some((id,)) = inserted {
        info!(account_id = id, provider_id = %provider_id, "Provisioned account");
    }

    Ok(inserted.map(|(id,)| id))
}
