//! Persistence layer
//!
//! Each entity is reached through an async store trait. Two backends ship:
//! PostgreSQL repositories (sqlx) and an in-memory fallback used when
//! Postgres is disabled and throughout the tests.
//!
//! Stores own the atomicity guarantees the core relies on:
//! - `ModerationStore::apply_decision` moves a contribution out of `pending`
//!   with a write guarded by `status = pending`, and stores the price and
//!   trust effects in the same unit. Nothing is kept if any step fails.
//! - `ClientStore` trust mutations are increment-style updates applied in
//!   one step per client.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::blacklist::BlacklistEntry;
use crate::clients::{BlockCommand, ClientAccount, ClientTrustState, RejectionOutcome, TrustThresholds};
use crate::error::CatalogResult;
use crate::moderation::{AppliedDecision, Contribution, ContributionFilter, Decision, DecisionOutcome};
use crate::pricing::PriceEntry;

pub mod blacklist;
pub mod clients;
pub mod contributions;
pub mod memory;
pub mod moderation;
pub mod pool;
pub mod prices;

pub use blacklist::BlacklistRepository;
pub use clients::ClientRepository;
pub use contributions::ContributionRepository;
pub use moderation::ModerationRepository;
pub use pool::DatabasePool;
pub use prices::PriceRepository;

#[async_trait]
pub trait ContributionStore: Send + Sync {
    async fn insert(&self, contribution: &Contribution) -> CatalogResult<()>;

    async fn get(&self, id: Uuid) -> CatalogResult<Option<Contribution>>;

    /// Newest first
    async fn list(&self, filter: ContributionFilter) -> CatalogResult<Vec<Contribution>>;
}

#[async_trait]
pub trait ModerationStore: Send + Sync {
    /// Decide a pending contribution and store its effects: the price
    /// overwrite on approval and the contributor's trust update. Either all
    /// of it is kept or the contribution is still pending afterwards.
    async fn apply_decision(
        &self,
        id: Uuid,
        decision: &Decision,
        thresholds: &TrustThresholds,
    ) -> CatalogResult<DecisionOutcome<AppliedDecision>>;
}

#[async_trait]
pub trait PriceStore: Send + Sync {
    async fn upsert(&self, entry: &PriceEntry) -> CatalogResult<()>;

    async fn get(&self, product_id: Uuid, market_id: Uuid) -> CatalogResult<Option<PriceEntry>>;
}

#[async_trait]
pub trait ClientStore: Send + Sync {
    /// Fails with `Conflict` when the contact is already taken
    async fn insert(&self, account: &ClientAccount) -> CatalogResult<()>;

    async fn get(&self, id: Uuid) -> CatalogResult<Option<ClientAccount>>;

    async fn find_by_contact(&self, contact: &str) -> CatalogResult<Option<ClientAccount>>;

    /// Remove the record, returning it
    async fn delete(&self, id: Uuid) -> CatalogResult<Option<ClientAccount>>;

    async fn record_approval(&self, id: Uuid) -> CatalogResult<Option<ClientTrustState>>;

    async fn record_rejection(
        &self,
        id: Uuid,
        reason: &str,
        thresholds: &TrustThresholds,
        now: DateTime<Utc>,
    ) -> CatalogResult<Option<(ClientTrustState, RejectionOutcome)>>;

    async fn apply_block(
        &self,
        id: Uuid,
        command: &BlockCommand,
        now: DateTime<Utc>,
    ) -> CatalogResult<Option<ClientTrustState>>;
}

#[async_trait]
pub trait BlacklistStore: Send + Sync {
    /// Create or overwrite the entry keyed by `entry.contact`
    async fn upsert(&self, entry: &BlacklistEntry) -> CatalogResult<BlacklistEntry>;

    /// Active entry for `contact` whose window is still open at `now`
    async fn find_blocking(
        &self,
        contact: &str,
        now: DateTime<Utc>,
    ) -> CatalogResult<Option<BlacklistEntry>>;

    async fn release(&self, id: Uuid, now: DateTime<Utc>) -> CatalogResult<Option<BlacklistEntry>>;

    async fn list_active(&self, now: DateTime<Utc>) -> CatalogResult<Vec<BlacklistEntry>>;

    /// Deactivate every active entry with `expires_at <= now`
    async fn deactivate_expired(&self, now: DateTime<Utc>) -> CatalogResult<u64>;
}

/// Store handles shared by every component
#[derive(Clone)]
pub struct Repositories {
    pub contributions: Arc<dyn ContributionStore>,
    pub moderation: Arc<dyn ModerationStore>,
    pub prices: Arc<dyn PriceStore>,
    pub clients: Arc<dyn ClientStore>,
    pub blacklist: Arc<dyn BlacklistStore>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        let contributions = Arc::new(memory::MemoryContributionStore::new());
        let prices = Arc::new(memory::MemoryPriceStore::new());
        let clients = Arc::new(memory::MemoryClientStore::new());
        let moderation = memory::MemoryModerationStore::new(
            contributions.clone(),
            prices.clone(),
            clients.clone(),
        );
        Self {
            contributions,
            moderation: Arc::new(moderation),
            prices,
            clients,
            blacklist: Arc::new(memory::MemoryBlacklistStore::new()),
        }
    }

    pub fn postgres(db: &DatabasePool) -> Self {
        Self {
            contributions: Arc::new(db.contributions().clone()),
            moderation: Arc::new(db.moderation().clone()),
            prices: Arc::new(db.prices().clone()),
            clients: Arc::new(db.clients().clone()),
            blacklist: Arc::new(db.blacklist().clone()),
        }
    }
}
