//! Contribution Repository - PostgreSQL operations for contributions using sqlx

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Executor, Postgres, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::ContributionStore;
use crate::error::{CatalogError, CatalogResult};
use crate::moderation::{
    Contribution, ContributionFilter, ContributionStatus, Decision, DecisionOutcome,
};

const COLUMNS: &str = "id, client_id, product_id, market_id, price, note, status, \
                       rejection_reason, submitted_at, decided_at, decided_by";

#[derive(Clone)]
pub struct ContributionRepository {
    pool: PgPool,
}

impl ContributionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<(), String> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS catalog.contributions (
                id UUID PRIMARY KEY,
                client_id UUID NOT NULL,
                product_id UUID NOT NULL,
                market_id UUID NOT NULL,
                price DOUBLE PRECISION NOT NULL CHECK (price > 0),
                note TEXT,
                status VARCHAR(16) NOT NULL DEFAULT 'pending',
                rejection_reason TEXT,
                submitted_at TIMESTAMP WITH TIME ZONE NOT NULL,
                decided_at TIMESTAMP WITH TIME ZONE,
                decided_by UUID
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to create contributions table: {}", e))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_contributions_status \
             ON catalog.contributions(status, submitted_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to create contributions index: {}", e))?;

        info!("Contributions table ready");
        Ok(())
    }
}

fn row_to_contribution(row: &PgRow) -> CatalogResult<Contribution> {
    let status: String = row.try_get("status")?;
    Ok(Contribution {
        id: row.try_get("id")?,
        client_id: row.try_get("client_id")?,
        product_id: row.try_get("product_id")?,
        market_id: row.try_get("market_id")?,
        price: row.try_get("price")?,
        note: row.try_get("note")?,
        status: status.parse()?,
        rejection_reason: row.try_get("rejection_reason")?,
        submitted_at: row.try_get("submitted_at")?,
        decided_at: row.try_get("decided_at")?,
        decided_by: row.try_get("decided_by")?,
    })
}

/// Conditional `pending -> decided` write. `None` when the row is absent or
/// already decided.
pub(crate) async fn decide_pending<'e, E>(
    executor: E,
    id: Uuid,
    decision: &Decision,
) -> CatalogResult<Option<Contribution>>
where
    E: Executor<'e, Database = Postgres>,
{
    let updated = sqlx::query(&format!(
        r#"
        UPDATE catalog.contributions
        SET status = $2, rejection_reason = $3, decided_at = $4, decided_by = $5
        WHERE id = $1 AND status = 'pending'
        RETURNING {}
        "#,
        COLUMNS
    ))
    .bind(id)
    .bind(decision.verdict.status().as_str())
    .bind(decision.verdict.reason())
    .bind(decision.decided_at)
    .bind(decision.moderator)
    .fetch_optional(executor)
    .await?;

    updated.as_ref().map(row_to_contribution).transpose()
}

/// Explain why `decide_pending` matched nothing
pub(crate) async fn undecided_outcome<'e, E, T>(
    executor: E,
    id: Uuid,
) -> CatalogResult<DecisionOutcome<T>>
where
    E: Executor<'e, Database = Postgres>,
{
    let current: Option<String> =
        sqlx::query_scalar("SELECT status FROM catalog.contributions WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;

    let Some(status) = current else {
        return Ok(DecisionOutcome::Missing);
    };
    let status: ContributionStatus = status.parse()?;
    if status == ContributionStatus::Pending {
        // Only reachable if a row is reset by hand between statements
        return Err(CatalogError::Unavailable(format!(
            "contribution {} changed during decision",
            id
        )));
    }
    Ok(DecisionOutcome::AlreadyDecided(status))
}

#[async_trait]
impl ContributionStore for ContributionRepository {
    async fn insert(&self, c: &Contribution) -> CatalogResult<()> {
        sqlx::query(
            r#"
            INSERT INTO catalog.contributions
                (id, client_id, product_id, market_id, price, note, status,
                 rejection_reason, submitted_at, decided_at, decided_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(c.id)
        .bind(c.client_id)
        .bind(c.product_id)
        .bind(c.market_id)
        .bind(c.price)
        .bind(&c.note)
        .bind(c.status.as_str())
        .bind(&c.rejection_reason)
        .bind(c.submitted_at)
        .bind(c.decided_at)
        .bind(c.decided_by)
        .execute(&self.pool)
        .await?;

        debug!(contribution_id = %c.id, "Contribution inserted");
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CatalogResult<Option<Contribution>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM catalog.contributions WHERE id = $1",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_contribution).transpose()
    }

    async fn list(&self, filter: ContributionFilter) -> CatalogResult<Vec<Contribution>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM catalog.contributions \
             WHERE ($1::VARCHAR IS NULL OR status = $1) \
             ORDER BY submitted_at DESC LIMIT $2",
            COLUMNS
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_contribution).collect()
    }
}
