//! Blacklist Repository - PostgreSQL operations for contact blacklist entries

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use tracing::{debug, info};
use uuid::Uuid;

use crate::blacklist::BlacklistEntry;
use crate::database::BlacklistStore;
use crate::error::CatalogResult;

const COLUMNS: &str = "id, contact, reason, activated_at, expires_at, active, released_at";

#[derive(Clone)]
pub struct BlacklistRepository {
    pool: PgPool,
}

impl BlacklistRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<(), String> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS catalog.blacklist (
                id UUID PRIMARY KEY,
                contact VARCHAR(32) NOT NULL UNIQUE,
                reason TEXT NOT NULL,
                activated_at TIMESTAMP WITH TIME ZONE NOT NULL,
                expires_at TIMESTAMP WITH TIME ZONE NOT NULL,
                active BOOLEAN NOT NULL DEFAULT TRUE,
                released_at TIMESTAMP WITH TIME ZONE
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to create blacklist table: {}", e))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_blacklist_active_expiry \
             ON catalog.blacklist(expires_at) WHERE active",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to create blacklist index: {}", e))?;

        info!("Blacklist table ready");
        Ok(())
    }
}

fn row_to_entry(row: &PgRow) -> CatalogResult<BlacklistEntry> {
    Ok(BlacklistEntry {
        id: row.try_get("id")?,
        contact: row.try_get("contact")?,
        reason: row.try_get("reason")?,
        activated_at: row.try_get("activated_at")?,
        expires_at: row.try_get("expires_at")?,
        active: row.try_get("active")?,
        released_at: row.try_get("released_at")?,
    })
}

#[async_trait]
impl BlacklistStore for BlacklistRepository {
    async fn upsert(&self, entry: &BlacklistEntry) -> CatalogResult<BlacklistEntry> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO catalog.blacklist
                (id, contact, reason, activated_at, expires_at, active, released_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (contact) DO UPDATE SET
                reason = EXCLUDED.reason,
                activated_at = EXCLUDED.activated_at,
                expires_at = EXCLUDED.expires_at,
                active = EXCLUDED.active,
                released_at = EXCLUDED.released_at
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(entry.id)
        .bind(&entry.contact)
        .bind(&entry.reason)
        .bind(entry.activated_at)
        .bind(entry.expires_at)
        .bind(entry.active)
        .bind(entry.released_at)
        .fetch_one(&self.pool)
        .await?;

        let stored = row_to_entry(&row)?;
        debug!(entry_id = %stored.id, expires_at = %stored.expires_at, "Blacklist entry stored");
        Ok(stored)
    }

    async fn find_blocking(
        &self,
        contact: &str,
        now: DateTime<Utc>,
    ) -> CatalogResult<Option<BlacklistEntry>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM catalog.blacklist \
             WHERE contact = $1 AND active AND expires_at > $2",
            COLUMNS
        ))
        .bind(contact)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_entry).transpose()
    }

    async fn release(&self, id: Uuid, now: DateTime<Utc>) -> CatalogResult<Option<BlacklistEntry>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE catalog.blacklist
            SET active = FALSE, released_at = $2
            WHERE id = $1
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_entry).transpose()
    }

    async fn list_active(&self, now: DateTime<Utc>) -> CatalogResult<Vec<BlacklistEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM catalog.blacklist \
             WHERE active AND expires_at > $1 \
             ORDER BY activated_at DESC",
            COLUMNS
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_entry).collect()
    }

    async fn deactivate_expired(&self, now: DateTime<Utc>) -> CatalogResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE catalog.blacklist
            SET active = FALSE
            WHERE active AND expires_at <= $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
