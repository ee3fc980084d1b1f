//! Identity store schema

use sqlx::SqlitePool;
use std::env;
use tracing::{info, warn};

/// Create the identity tables and indexes if they are missing.
///
/// `RESET_DB=true` drops them first.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let should_reset_db = env::var("RESET_DB").unwrap_or_else(|_| "false".to_string()) == "true";

    if should_reset_db {
        warn!("⚠️  RESET_DB=true - Dropping identity tables and recreating schema...");
        drop_all_tables(pool).await?;
    }

    create_tables(pool).await?;
    info!("✅ Identity schema ready");
    Ok(())
}

pub async fn create_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS identities (
            id TEXT PRIMARY KEY,
            provider TEXT NOT NULL CHECK (provider IN ('kakao', 'naver', 'local')),
            external_id TEXT NOT NULL,
            nickname TEXT NOT NULL,
            email TEXT,
            photo_url TEXT,
            last_authenticated_at TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (provider, external_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // one credential per local identity; email unique across local accounts
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS local_credentials (
            identity_id TEXT PRIMARY KEY REFERENCES identities(id),
            email TEXT NOT NULL UNIQUE,
            password_digest TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_identities_email ON identities(email)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn drop_all_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for table in ["local_credentials", "identities"] {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
            .execute(pool)
            .await?;
    }
    Ok(())
}
