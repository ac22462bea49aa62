//! Client Repository - PostgreSQL operations for client accounts and their
//! embedded trust state using sqlx
//!
//! Trust mutations are single `UPDATE` statements with increment-style
//! assignments, never read-then-store from application memory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Executor, Postgres, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::clients::{
    BlockCommand, BlockKind, ClientAccount, ClientTrustState, RejectionOutcome, TrustThresholds,
};
use crate::database::ClientStore;
use crate::error::{CatalogError, CatalogResult};

const COLUMNS: &str = "id, name, contact, registered_at, consecutive_errors, total_approved, \
                       total_rejected, blocked, block_reason, block_kind, block_until, blocked_at";

#[derive(Clone)]
pub struct ClientRepository {
    pool: PgPool,
}

impl ClientRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<(), String> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS catalog.clients (
                id UUID PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                contact VARCHAR(32) NOT NULL UNIQUE,
                registered_at TIMESTAMP WITH TIME ZONE NOT NULL,
                consecutive_errors INTEGER NOT NULL DEFAULT 0,
                total_approved BIGINT NOT NULL DEFAULT 0,
                total_rejected BIGINT NOT NULL DEFAULT 0,
                blocked BOOLEAN NOT NULL DEFAULT FALSE,
                block_reason TEXT,
                block_kind VARCHAR(16) NOT NULL DEFAULT 'none',
                block_until TIMESTAMP WITH TIME ZONE,
                blocked_at TIMESTAMP WITH TIME ZONE
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to create clients table: {}", e))?;

        info!("Clients table ready");
        Ok(())
    }
}

fn row_to_account(row: &PgRow) -> CatalogResult<ClientAccount> {
    let kind: String = row.try_get("block_kind")?;
    let until: Option<DateTime<Utc>> = row.try_get("block_until")?;
    let block_kind = BlockKind::from_parts(&kind, until).ok_or_else(|| {
        CatalogError::Unavailable(format!("corrupt block kind '{}' in clients table", kind))
    })?;

    let consecutive_errors: i32 = row.try_get("consecutive_errors")?;
    let total_approved: i64 = row.try_get("total_approved")?;
    let total_rejected: i64 = row.try_get("total_rejected")?;

    Ok(ClientAccount {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        contact: row.try_get("contact")?,
        registered_at: row.try_get("registered_at")?,
        trust: ClientTrustState {
            consecutive_errors: consecutive_errors.max(0) as u32,
            total_approved: total_approved.max(0) as u64,
            total_rejected: total_rejected.max(0) as u64,
            blocked: row.try_get("blocked")?,
            block_reason: row.try_get("block_reason")?,
            block_kind,
            blocked_at: row.try_get("blocked_at")?,
        },
    })
}

pub(crate) async fn record_approval<'e, E>(
    executor: E,
    id: Uuid,
) -> CatalogResult<Option<ClientTrustState>>
where
    E: Executor<'e, Database = Postgres>,
{
    let row = sqlx::query(&format!(
        r#"
        UPDATE catalog.clients
        SET total_approved = total_approved + 1, consecutive_errors = 0
        WHERE id = $1
        RETURNING {}
        "#,
        COLUMNS
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(row.as_ref().map(row_to_account).transpose()?.map(|a| a.trust))
}

pub(crate) async fn record_rejection<'e, E>(
    executor: E,
    id: Uuid,
    reason: &str,
    thresholds: &TrustThresholds,
    now: DateTime<Utc>,
) -> CatalogResult<Option<(ClientTrustState, RejectionOutcome)>>
where
    E: Executor<'e, Database = Postgres>,
{
    // prev locks the row and captures whether it was effectively blocked
    // before this rejection; a lapsed temporary block does not count.
    let row = sqlx::query(&format!(
        r#"
        WITH prev AS (
            SELECT id,
                   COALESCE(blocked AND (block_kind <> 'temporary' OR block_until > $4), FALSE) AS was_blocked
            FROM catalog.clients
            WHERE id = $1
            FOR UPDATE
        )
        UPDATE catalog.clients c
        SET total_rejected = c.total_rejected + 1,
            consecutive_errors = c.consecutive_errors + 1,
            blocked = CASE WHEN NOT prev.was_blocked AND c.consecutive_errors + 1 >= $2
                           THEN TRUE ELSE c.blocked END,
            block_kind = CASE WHEN NOT prev.was_blocked AND c.consecutive_errors + 1 >= $2
                              THEN 'automatic' ELSE c.block_kind END,
            block_until = CASE WHEN NOT prev.was_blocked AND c.consecutive_errors + 1 >= $2
                               THEN NULL ELSE c.block_until END,
            block_reason = CASE WHEN NOT prev.was_blocked AND c.consecutive_errors + 1 >= $2
                                THEN format('automatically blocked after %s consecutive rejections (last: %s)',
                                            c.consecutive_errors + 1, $3::TEXT)
                                ELSE c.block_reason END,
            blocked_at = CASE WHEN NOT prev.was_blocked AND c.consecutive_errors + 1 >= $2
                              THEN $4 ELSE c.blocked_at END
        FROM prev
        WHERE c.id = prev.id
        RETURNING {}, (NOT prev.was_blocked AND c.consecutive_errors >= $2) AS auto_blocked
        "#,
        COLUMNS
            .split(", ")
            .map(|col| format!("c.{}", col.trim()))
            .collect::<Vec<_>>()
            .join(", ")
    ))
    .bind(id)
    .bind(thresholds.auto_block_threshold as i32)
    .bind(reason)
    .bind(now)
    .fetch_optional(executor)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let account = row_to_account(&row)?;
    let auto_blocked: bool = row.try_get("auto_blocked")?;
    let outcome = RejectionOutcome {
        consecutive_errors: account.trust.consecutive_errors,
        auto_blocked,
    };
    Ok(Some((account.trust, outcome)))
}

#[async_trait]
impl ClientStore for ClientRepository {
    async fn insert(&self, account: &ClientAccount) -> CatalogResult<()> {
        let t = &account.trust;
        sqlx::query(
            r#"
            INSERT INTO catalog.clients
                (id, name, contact, registered_at, consecutive_errors, total_approved,
                 total_rejected, blocked, block_reason, block_kind, block_until, blocked_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(account.id)
        .bind(&account.name)
        .bind(&account.contact)
        .bind(account.registered_at)
        .bind(t.consecutive_errors as i32)
        .bind(t.total_approved as i64)
        .bind(t.total_rejected as i64)
        .bind(t.blocked)
        .bind(&t.block_reason)
        .bind(t.block_kind.as_str())
        .bind(t.block_kind.until())
        .bind(t.blocked_at)
        .execute(&self.pool)
        .await?;

        debug!(client_id = %account.id, "Client inserted");
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CatalogResult<Option<ClientAccount>> {
        let row = sqlx::query(&format!("SELECT {} FROM catalog.clients WHERE id = $1", COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_account).transpose()
    }

    async fn find_by_contact(&self, contact: &str) -> CatalogResult<Option<ClientAccount>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM catalog.clients WHERE contact = $1",
            COLUMNS
        ))
        .bind(contact)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_account).transpose()
    }

    async fn delete(&self, id: Uuid) -> CatalogResult<Option<ClientAccount>> {
        let row = sqlx::query(&format!(
            "DELETE FROM catalog.clients WHERE id = $1 RETURNING {}",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_account).transpose()
    }

    async fn record_approval(&self, id: Uuid) -> CatalogResult<Option<ClientTrustState>> {
        record_approval(&self.pool, id).await
    }

    async fn record_rejection(
        &self,
        id: Uuid,
        reason: &str,
        thresholds: &TrustThresholds,
        now: DateTime<Utc>,
    ) -> CatalogResult<Option<(ClientTrustState, RejectionOutcome)>> {
        record_rejection(&self.pool, id, reason, thresholds, now).await
    }

    async fn apply_block(
        &self,
        id: Uuid,
        command: &BlockCommand,
        now: DateTime<Utc>,
    ) -> CatalogResult<Option<ClientTrustState>> {
        // Derive the target block fields from the same transition the
        // in-memory store applies
        let mut target = ClientTrustState::default();
        target.apply(command, now);
        let reset_streak = matches!(command, BlockCommand::Unblock);

        let row = sqlx::query(&format!(
            r#"
            UPDATE catalog.clients
            SET blocked = $2,
                block_kind = $3,
                block_until = $4,
                block_reason = $5,
                blocked_at = $6,
                consecutive_errors = CASE WHEN $7 THEN 0 ELSE consecutive_errors END
            WHERE id = $1
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(id)
        .bind(target.blocked)
        .bind(target.block_kind.as_str())
        .bind(target.block_kind.until())
        .bind(&target.block_reason)
        .bind(target.blocked_at)
        .bind(reset_streak)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_account).transpose()?.map(|a| a.trust))
    }
}
