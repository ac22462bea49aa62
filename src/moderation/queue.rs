//! Contribution Queue - intake and listing of client price reports

use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::database::{ClientStore, ContributionStore};
use crate::error::{CatalogError, CatalogResult};
use crate::moderation::{Contribution, ContributionDraft, ContributionFilter};
use crate::notify::{NotificationDispatcher, NotificationEvent};

#[derive(Clone)]
pub struct ContributionQueue {
    contributions: Arc<dyn ContributionStore>,
    clients: Arc<dyn ClientStore>,
    clock: Arc<dyn Clock>,
    notifier: NotificationDispatcher,
    max_list_limit: usize,
}

impl ContributionQueue {
    pub fn new(
        contributions: Arc<dyn ContributionStore>,
        clients: Arc<dyn ClientStore>,
        clock: Arc<dyn Clock>,
        notifier: NotificationDispatcher,
        max_list_limit: usize,
    ) -> Self {
        Self {
            contributions,
            clients,
            clock,
            notifier,
            max_list_limit: max_list_limit.max(1),
        }
    }

    pub async fn submit(
        &self,
        client_id: Uuid,
        draft: ContributionDraft,
    ) -> CatalogResult<Contribution> {
        let client = self
            .clients
            .get(client_id)
            .await?
            .ok_or_else(|| CatalogError::not_found("client", client_id))?;

        let now = self.clock.now();
        if client.trust.is_blocked_at(now) {
            warn!(
                client_id = %client_id,
                block_kind = client.trust.block_kind.as_str(),
                "Blocked client attempted a submission"
            );
            return Err(CatalogError::forbidden("client is blocked"));
        }

        let contribution = draft.into_contribution(client_id, now)?;
        self.contributions.insert(&contribution).await?;

        info!(
            contribution_id = %contribution.id,
            client_id = %client_id,
            product_id = %contribution.product_id,
            market_id = %contribution.market_id,
            price = contribution.price,
            "Contribution submitted"
        );

        self.notifier.dispatch(NotificationEvent::ContributionSubmitted {
            contribution_id: contribution.id,
            client_id,
            product_id: contribution.product_id,
            market_id: contribution.market_id,
            price: contribution.price,
        });

        Ok(contribution)
    }

    /// Newest first; `limit` is clamped to `[1, max_list_limit]`
    pub async fn list(&self, filter: ContributionFilter) -> CatalogResult<Vec<Contribution>> {
        let filter = ContributionFilter {
            limit: filter.limit.clamp(1, self.max_list_limit),
            ..filter
        };
        let items = self.contributions.list(filter).await?;
        debug!(
            status = ?filter.status,
            limit = filter.limit,
            returned = items.len(),
            "Listed contributions"
        );
        Ok(items)
    }

    pub async fn get(&self, contribution_id: Uuid) -> CatalogResult<Contribution> {
        self.contributions
            .get(contribution_id)
            .await?
            .ok_or_else(|| CatalogError::not_found("contribution", contribution_id))
    }
}
