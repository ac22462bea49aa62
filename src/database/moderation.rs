//! Moderation Repository - decisions and their side effects in one
//! PostgreSQL transaction using sqlx

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::clients::TrustThresholds;
use crate::database::{clients, contributions, prices, ModerationStore};
use crate::error::CatalogResult;
use crate::moderation::{AppliedDecision, Decision, DecisionOutcome, Verdict};
use crate::pricing::PriceEntry;

#[derive(Clone)]
pub struct ModerationRepository {
    pool: PgPool,
}

impl ModerationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ModerationStore for ModerationRepository {
    async fn apply_decision(
        &self,
        id: Uuid,
        decision: &Decision,
        thresholds: &TrustThresholds,
    ) -> CatalogResult<DecisionOutcome<AppliedDecision>> {
        // Dropping the transaction on an early return rolls everything back
        let mut tx = self.pool.begin().await?;

        let Some(contribution) = contributions::decide_pending(&mut *tx, id, decision).await?
        else {
            let outcome = contributions::undecided_outcome(&mut *tx, id).await?;
            tx.rollback().await?;
            return Ok(outcome);
        };

        let applied = match &decision.verdict {
            Verdict::Approve => {
                let entry = PriceEntry::from_contribution(&contribution, decision.decided_at);
                prices::upsert_price(&mut *tx, &entry).await?;
                let trust = clients::record_approval(&mut *tx, contribution.client_id).await?;
                AppliedDecision {
                    contribution,
                    trust,
                    auto_blocked: false,
                }
            }
            Verdict::Reject { reason } => {
                let updated = clients::record_rejection(
                    &mut *tx,
                    contribution.client_id,
                    reason,
                    thresholds,
                    decision.decided_at,
                )
                .await?;
                let auto_blocked = updated.as_ref().map_or(false, |(_, o)| o.auto_blocked);
                AppliedDecision {
                    contribution,
                    trust: updated.map(|(trust, _)| trust),
                    auto_blocked,
                }
            }
        };

        tx.commit().await?;
        debug!(contribution_id = %id, "Decision committed");
        Ok(DecisionOutcome::Decided(applied))
    }
}
