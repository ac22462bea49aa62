//! Moderation Engine - approve/reject decisions and their side effects

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clients::{ClientTrustState, TrustThresholds};
use crate::clock::Clock;
use crate::database::ModerationStore;
use crate::error::{CatalogError, CatalogResult};
use crate::moderation::{AppliedDecision, Contribution, Decision, DecisionOutcome, Verdict};
use crate::notify::{NotificationDispatcher, NotificationEvent};

/// What a successful decision changed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionReport {
    pub contribution: Contribution,
    /// Contributor trust after the decision; `None` if the account is gone
    pub client_trust: Option<ClientTrustState>,
    pub auto_blocked: bool,
}

impl From<AppliedDecision> for DecisionReport {
    fn from(applied: AppliedDecision) -> Self {
        Self {
            contribution: applied.contribution,
            client_trust: applied.trust,
            auto_blocked: applied.auto_blocked,
        }
    }
}

#[derive(Clone)]
pub struct ModerationEngine {
    store: Arc<dyn ModerationStore>,
    thresholds: TrustThresholds,
    clock: Arc<dyn Clock>,
    notifier: NotificationDispatcher,
}

impl ModerationEngine {
    pub fn new(
        store: Arc<dyn ModerationStore>,
        thresholds: TrustThresholds,
        clock: Arc<dyn Clock>,
        notifier: NotificationDispatcher,
    ) -> Self {
        Self {
            store,
            thresholds,
            clock,
            notifier,
        }
    }

    pub fn thresholds(&self) -> &TrustThresholds {
        &self.thresholds
    }

    /// Move `contribution_id` out of `pending` together with its effects.
    /// Exactly one caller wins. A failed write leaves it pending.
    async fn decide(
        &self,
        contribution_id: Uuid,
        verdict: Verdict,
        moderator: Uuid,
    ) -> CatalogResult<DecisionReport> {
        let decision = Decision {
            verdict,
            moderator,
            decided_at: self.clock.now(),
        };

        let outcome = self
            .store
            .apply_decision(contribution_id, &decision, &self.thresholds)
            .await?;

        match outcome {
            DecisionOutcome::Decided(applied) => {
                if applied.trust.is_none() {
                    warn!(
                        contribution_id = %contribution_id,
                        client_id = %applied.contribution.client_id,
                        "Contributor account no longer exists, trust update skipped"
                    );
                }
                Ok(applied.into())
            }
            DecisionOutcome::AlreadyDecided(status) => {
                info!(
                    contribution_id = %contribution_id,
                    status = %status,
                    "Decision on already decided contribution ignored"
                );
                Err(CatalogError::AlreadyDecided {
                    id: contribution_id,
                    status,
                })
            }
            DecisionOutcome::Missing => {
                Err(CatalogError::not_found("contribution", contribution_id))
            }
        }
    }

    pub async fn approve(
        &self,
        contribution_id: Uuid,
        moderator: Uuid,
    ) -> CatalogResult<DecisionReport> {
        let report = self
            .decide(contribution_id, Verdict::Approve, moderator)
            .await?;
        let contribution = &report.contribution;

        info!(
            contribution_id = %contribution.id,
            client_id = %contribution.client_id,
            moderator = %moderator,
            price = contribution.price,
            "Contribution approved"
        );

        self.notifier.dispatch(NotificationEvent::ContributionApproved {
            contribution_id: contribution.id,
            client_id: contribution.client_id,
            moderator,
        });

        Ok(report)
    }

    pub async fn reject(
        &self,
        contribution_id: Uuid,
        moderator: Uuid,
        reason: &str,
    ) -> CatalogResult<DecisionReport> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(CatalogError::invalid("rejection reason is required"));
        }

        let report = self
            .decide(
                contribution_id,
                Verdict::Reject {
                    reason: reason.to_string(),
                },
                moderator,
            )
            .await?;
        let contribution = &report.contribution;

        info!(
            contribution_id = %contribution.id,
            client_id = %contribution.client_id,
            moderator = %moderator,
            reason = %reason,
            "Contribution rejected"
        );

        self.notifier.dispatch(NotificationEvent::ContributionRejected {
            contribution_id: contribution.id,
            client_id: contribution.client_id,
            moderator,
            reason: reason.to_string(),
        });

        if let (true, Some(trust)) = (report.auto_blocked, &report.client_trust) {
            warn!(
                client_id = %contribution.client_id,
                consecutive_errors = trust.consecutive_errors,
                threshold = self.thresholds.auto_block_threshold,
                "Client automatically blocked"
            );
            self.notifier.dispatch(NotificationEvent::ClientAutoBlocked {
                client_id: contribution.client_id,
                consecutive_errors: trust.consecutive_errors,
                reason: trust.block_reason.clone().unwrap_or_default(),
            });
        }

        Ok(report)
    }
}
