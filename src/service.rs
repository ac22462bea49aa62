//! Catalog Service - the operation surface exposed to transports
//!
//! Wires the components over a shared set of stores and a clock, and checks
//! the caller's role before delegating.

use std::sync::Arc;
use uuid::Uuid;

use crate::auth::Principal;
use crate::blacklist::{BlacklistEntry, BlacklistRegistry, ExpirySweeper};
use crate::clients::{ClientAccount, ClientManager, ClientTrustState, TrustThresholds};
use crate::clock::{Clock, SystemClock};
use crate::config::ModerationConfig;
use crate::database::Repositories;
use crate::error::{CatalogError, CatalogResult};
use crate::moderation::{
    Contribution, ContributionDraft, ContributionFilter, ContributionQueue, DecisionReport,
    ModerationEngine,
};
use crate::notify::NotificationDispatcher;
use crate::pricing::{PriceEntry, PriceTable};

/// Administrative block request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockRequest {
    Temporary { days: u32, reason: String },
    Permanent { reason: String },
}

#[derive(Clone)]
pub struct CatalogService {
    queue: ContributionQueue,
    engine: ModerationEngine,
    clients: ClientManager,
    blacklist: BlacklistRegistry,
    sweeper: ExpirySweeper,
    prices: PriceTable,
}

impl CatalogService {
    pub fn new(
        repos: Repositories,
        moderation: &ModerationConfig,
        clock: Arc<dyn Clock>,
        notifier: NotificationDispatcher,
    ) -> Self {
        let prices = PriceTable::new(repos.prices.clone());
        let blacklist = BlacklistRegistry::new(
            repos.blacklist.clone(),
            clock.clone(),
            moderation.blacklist_months,
        );
        let sweeper = ExpirySweeper::new(repos.blacklist.clone(), clock.clone());
        let queue = ContributionQueue::new(
            repos.contributions.clone(),
            repos.clients.clone(),
            clock.clone(),
            notifier.clone(),
            moderation.max_list_limit,
        );
        let engine = ModerationEngine::new(
            repos.moderation.clone(),
            moderation.to_thresholds(),
            clock.clone(),
            notifier.clone(),
        );
        let clients = ClientManager::new(repos.clients, blacklist.clone(), clock, notifier);

        Self {
            queue,
            engine,
            clients,
            blacklist,
            sweeper,
            prices,
        }
    }

    /// In-memory stores, wall clock, log-only notifications
    pub fn in_memory() -> Self {
        Self::new(
            Repositories::in_memory(),
            &ModerationConfig::default(),
            Arc::new(SystemClock),
            NotificationDispatcher::tracing(),
        )
    }

    pub fn thresholds(&self) -> &TrustThresholds {
        self.engine.thresholds()
    }

    pub fn sweeper(&self) -> &ExpirySweeper {
        &self.sweeper
    }

    // Contributions

    pub async fn submit_contribution(
        &self,
        principal: &Principal,
        draft: ContributionDraft,
    ) -> CatalogResult<Contribution> {
        let client_id = principal.require_client()?;
        self.queue.submit(client_id, draft).await
    }

    pub async fn list_pending_contributions(
        &self,
        principal: &Principal,
        filter: ContributionFilter,
    ) -> CatalogResult<Vec<Contribution>> {
        principal.require_admin()?;
        self.queue.list(filter).await
    }

    pub async fn get_contribution(
        &self,
        principal: &Principal,
        contribution_id: Uuid,
    ) -> CatalogResult<Contribution> {
        principal.require_admin()?;
        self.queue.get(contribution_id).await
    }

    pub async fn approve_contribution(
        &self,
        principal: &Principal,
        contribution_id: Uuid,
    ) -> CatalogResult<DecisionReport> {
        let moderator = principal.require_admin()?;
        self.engine.approve(contribution_id, moderator).await
    }

    pub async fn reject_contribution(
        &self,
        principal: &Principal,
        contribution_id: Uuid,
        reason: &str,
    ) -> CatalogResult<DecisionReport> {
        let moderator = principal.require_admin()?;
        self.engine.reject(contribution_id, moderator, reason).await
    }

    // Clients

    /// Public: no principal yet
    pub async fn register_client(&self, name: &str, contact: &str) -> CatalogResult<ClientAccount> {
        self.clients.register(name, contact).await
    }

    /// Administrators see any account, clients only their own
    pub async fn get_client(
        &self,
        principal: &Principal,
        client_id: Uuid,
    ) -> CatalogResult<ClientAccount> {
        if principal.require_admin().is_err() && principal.id != client_id {
            return Err(CatalogError::forbidden("clients may only read their own account"));
        }
        self.clients.get_client(client_id).await
    }

    pub async fn block_client(
        &self,
        principal: &Principal,
        client_id: Uuid,
        request: BlockRequest,
    ) -> CatalogResult<ClientTrustState> {
        principal.require_admin()?;
        match request {
            BlockRequest::Temporary { days, reason } => {
                self.clients.block_temporary(client_id, days, &reason).await
            }
            BlockRequest::Permanent { reason } => {
                self.clients.block_permanent(client_id, &reason).await
            }
        }
    }

    pub async fn unblock_client(
        &self,
        principal: &Principal,
        client_id: Uuid,
    ) -> CatalogResult<ClientTrustState> {
        principal.require_admin()?;
        self.clients.unblock(client_id).await
    }

    pub async fn terminate_client(
        &self,
        principal: &Principal,
        client_id: Uuid,
        reason: &str,
    ) -> CatalogResult<BlacklistEntry> {
        principal.require_admin()?;
        self.clients.terminate(client_id, reason).await
    }

    // Blacklist

    pub async fn is_contact_blacklisted(
        &self,
        principal: &Principal,
        contact: &str,
    ) -> CatalogResult<bool> {
        principal.require_admin()?;
        self.blacklist.is_blocked(contact).await
    }

    pub async fn release_blacklist_entry(
        &self,
        principal: &Principal,
        entry_id: Uuid,
    ) -> CatalogResult<BlacklistEntry> {
        principal.require_admin()?;
        self.blacklist.release(entry_id).await
    }

    pub async fn list_blacklist(&self, principal: &Principal) -> CatalogResult<Vec<BlacklistEntry>> {
        principal.require_admin()?;
        self.blacklist.list_active().await
    }

    pub async fn run_expiry_sweep(&self, principal: &Principal) -> CatalogResult<u64> {
        principal.require_admin()?;
        self.sweeper.run_once().await
    }

    // Prices

    pub async fn get_price(&self, product_id: Uuid, market_id: Uuid) -> CatalogResult<PriceEntry> {
        self.prices
            .get(product_id, market_id)
            .await?
            .ok_or_else(|| {
                CatalogError::not_found("price entry", format!("{}/{}", product_id, market_id))
            })
    }
}
