//! In-memory store fallback
//!
//! Used when PostgreSQL is disabled and by the test suites. Per-entity
//! atomicity comes from the `DashMap` shard lock held across each
//! read-modify-write, so unrelated entities never contend on a global lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::blacklist::BlacklistEntry;
use crate::clients::{BlockCommand, ClientAccount, ClientTrustState, RejectionOutcome, TrustThresholds};
use crate::database::{BlacklistStore, ClientStore, ContributionStore, ModerationStore, PriceStore};
use crate::error::{CatalogError, CatalogResult};
use crate::moderation::{
    AppliedDecision, Contribution, ContributionFilter, ContributionStatus, Decision,
    DecisionOutcome, Verdict,
};
use crate::pricing::PriceEntry;

#[derive(Debug, Default)]
pub struct MemoryContributionStore {
    contributions: DashMap<Uuid, Contribution>,
}

impl MemoryContributionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare-and-set `pending -> decided`
    pub fn decide(&self, id: Uuid, decision: &Decision) -> DecisionOutcome {
        // get_mut holds the shard write lock for the whole compare-and-set
        let Some(mut contribution) = self.contributions.get_mut(&id) else {
            return DecisionOutcome::Missing;
        };

        if contribution.status != ContributionStatus::Pending {
            return DecisionOutcome::AlreadyDecided(contribution.status);
        }

        contribution.status = decision.verdict.status();
        contribution.rejection_reason = decision.verdict.reason().map(str::to_string);
        contribution.decided_at = Some(decision.decided_at);
        contribution.decided_by = Some(decision.moderator);

        DecisionOutcome::Decided(contribution.clone())
    }

    /// Undo `decision` if it is still the one recorded on `id`
    pub fn reopen(&self, id: Uuid, decision: &Decision) -> bool {
        let Some(mut contribution) = self.contributions.get_mut(&id) else {
            return false;
        };

        let ours = contribution.status == decision.verdict.status()
            && contribution.decided_at == Some(decision.decided_at)
            && contribution.decided_by == Some(decision.moderator);
        if !ours {
            return false;
        }

        contribution.status = ContributionStatus::Pending;
        contribution.rejection_reason = None;
        contribution.decided_at = None;
        contribution.decided_by = None;
        true
    }
}

#[async_trait]
impl ContributionStore for MemoryContributionStore {
    async fn insert(&self, contribution: &Contribution) -> CatalogResult<()> {
        match self.contributions.entry(contribution.id) {
            Entry::Occupied(_) => Err(CatalogError::conflict(format!(
                "contribution {} already exists",
                contribution.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(contribution.clone());
                Ok(())
            }
        }
    }

    async fn get(&self, id: Uuid) -> CatalogResult<Option<Contribution>> {
        Ok(self.contributions.get(&id).map(|c| c.clone()))
    }

    async fn list(&self, filter: ContributionFilter) -> CatalogResult<Vec<Contribution>> {
        let mut items: Vec<Contribution> = self
            .contributions
            .iter()
            .filter(|c| filter.status.map_or(true, |s| c.status == s))
            .map(|c| c.clone())
            .collect();

        items.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        items.truncate(filter.limit);
        Ok(items)
    }
}

#[derive(Debug, Default)]
pub struct MemoryPriceStore {
    entries: DashMap<(Uuid, Uuid), PriceEntry>,
}

impl MemoryPriceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PriceStore for MemoryPriceStore {
    async fn upsert(&self, entry: &PriceEntry) -> CatalogResult<()> {
        self.entries
            .insert((entry.product_id, entry.market_id), entry.clone());
        Ok(())
    }

    async fn get(&self, product_id: Uuid, market_id: Uuid) -> CatalogResult<Option<PriceEntry>> {
        Ok(self.entries.get(&(product_id, market_id)).map(|e| e.clone()))
    }
}

#[derive(Debug, Default)]
pub struct MemoryClientStore {
    clients: DashMap<Uuid, ClientAccount>,
    /// contact -> client id
    contacts: DashMap<String, Uuid>,
}

impl MemoryClientStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClientStore for MemoryClientStore {
    async fn insert(&self, account: &ClientAccount) -> CatalogResult<()> {
        match self.contacts.entry(account.contact.clone()) {
            Entry::Occupied(_) => Err(CatalogError::conflict(
                "an account already exists for this contact",
            )),
            Entry::Vacant(slot) => {
                self.clients.insert(account.id, account.clone());
                slot.insert(account.id);
                Ok(())
            }
        }
    }

    async fn get(&self, id: Uuid) -> CatalogResult<Option<ClientAccount>> {
        Ok(self.clients.get(&id).map(|c| c.clone()))
    }

    async fn find_by_contact(&self, contact: &str) -> CatalogResult<Option<ClientAccount>> {
        let Some(id) = self.contacts.get(contact).map(|id| *id) else {
            return Ok(None);
        };
        self.get(id).await
    }

    async fn delete(&self, id: Uuid) -> CatalogResult<Option<ClientAccount>> {
        let removed = self.clients.remove(&id).map(|(_, account)| account);
        if let Some(ref account) = removed {
            self.contacts.remove_if(&account.contact, |_, owner| *owner == id);
            debug!(client_id = %id, "Client record removed");
        }
        Ok(removed)
    }

    async fn record_approval(&self, id: Uuid) -> CatalogResult<Option<ClientTrustState>> {
        Ok(self.clients.get_mut(&id).map(|mut account| {
            account.trust.record_approval();
            account.trust.clone()
        }))
    }

    async fn record_rejection(
        &self,
        id: Uuid,
        reason: &str,
        thresholds: &TrustThresholds,
        now: DateTime<Utc>,
    ) -> CatalogResult<Option<(ClientTrustState, RejectionOutcome)>> {
        Ok(self.clients.get_mut(&id).map(|mut account| {
            let outcome = account.trust.record_rejection(reason, thresholds, now);
            (account.trust.clone(), outcome)
        }))
    }

    async fn apply_block(
        &self,
        id: Uuid,
        command: &BlockCommand,
        now: DateTime<Utc>,
    ) -> CatalogResult<Option<ClientTrustState>> {
        Ok(self.clients.get_mut(&id).map(|mut account| {
            account.trust.apply(command, now);
            account.trust.clone()
        }))
    }
}

/// Applies decisions over the in-memory stores. The contribution is
/// decided first and reopened if the price write fails. Client trust
/// updates on `MemoryClientStore` cannot fail.
pub struct MemoryModerationStore {
    contributions: Arc<MemoryContributionStore>,
    prices: Arc<dyn PriceStore>,
    clients: Arc<MemoryClientStore>,
}

impl MemoryModerationStore {
    pub fn new(
        contributions: Arc<MemoryContributionStore>,
        prices: Arc<dyn PriceStore>,
        clients: Arc<MemoryClientStore>,
    ) -> Self {
        Self {
            contributions,
            prices,
            clients,
        }
    }
}

#[async_trait]
impl ModerationStore for MemoryModerationStore {
    async fn apply_decision(
        &self,
        id: Uuid,
        decision: &Decision,
        thresholds: &TrustThresholds,
    ) -> CatalogResult<DecisionOutcome<AppliedDecision>> {
        let contribution = match self.contributions.decide(id, decision) {
            DecisionOutcome::Decided(contribution) => contribution,
            DecisionOutcome::AlreadyDecided(status) => {
                return Ok(DecisionOutcome::AlreadyDecided(status))
            }
            DecisionOutcome::Missing => return Ok(DecisionOutcome::Missing),
        };

        let applied = match &decision.verdict {
            Verdict::Approve => {
                let entry = PriceEntry::from_contribution(&contribution, decision.decided_at);
                if let Err(e) = self.prices.upsert(&entry).await {
                    self.contributions.reopen(id, decision);
                    warn!(
                        contribution_id = %id,
                        error = %e,
                        "Price write failed, contribution reopened"
                    );
                    return Err(e);
                }
                let trust = self.clients.record_approval(contribution.client_id).await?;
                AppliedDecision {
                    contribution,
                    trust,
                    auto_blocked: false,
                }
            }
            Verdict::Reject { reason } => {
                let updated = self
                    .clients
                    .record_rejection(contribution.client_id, reason, thresholds, decision.decided_at)
                    .await?;
                let auto_blocked = updated.as_ref().map_or(false, |(_, o)| o.auto_blocked);
                AppliedDecision {
                    contribution,
                    trust: updated.map(|(trust, _)| trust),
                    auto_blocked,
                }
            }
        };

        Ok(DecisionOutcome::Decided(applied))
    }
}

#[derive(Debug, Default)]
pub struct MemoryBlacklistStore {
    /// contact -> entry
    entries: DashMap<String, BlacklistEntry>,
}

impl MemoryBlacklistStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlacklistStore for MemoryBlacklistStore {
    async fn upsert(&self, entry: &BlacklistEntry) -> CatalogResult<BlacklistEntry> {
        let stored = match self.entries.entry(entry.contact.clone()) {
            Entry::Occupied(mut existing) => {
                // Overwrite in place, keeping the original id
                let id = existing.get().id;
                let replaced = BlacklistEntry {
                    id,
                    ..entry.clone()
                };
                existing.insert(replaced.clone());
                replaced
            }
            Entry::Vacant(slot) => {
                slot.insert(entry.clone());
                entry.clone()
            }
        };
        Ok(stored)
    }

    async fn find_blocking(
        &self,
        contact: &str,
        now: DateTime<Utc>,
    ) -> CatalogResult<Option<BlacklistEntry>> {
        Ok(self
            .entries
            .get(contact)
            .filter(|e| e.blocks_at(now))
            .map(|e| e.clone()))
    }

    async fn release(&self, id: Uuid, now: DateTime<Utc>) -> CatalogResult<Option<BlacklistEntry>> {
        for mut entry in self.entries.iter_mut() {
            if entry.id == id {
                entry.active = false;
                entry.released_at = Some(now);
                return Ok(Some(entry.clone()));
            }
        }
        Ok(None)
    }

    async fn list_active(&self, now: DateTime<Utc>) -> CatalogResult<Vec<BlacklistEntry>> {
        let mut active: Vec<BlacklistEntry> = self
            .entries
            .iter()
            .filter(|e| e.blocks_at(now))
            .map(|e| e.clone())
            .collect();
        active.sort_by(|a, b| b.activated_at.cmp(&a.activated_at));
        Ok(active)
    }

    async fn deactivate_expired(&self, now: DateTime<Utc>) -> CatalogResult<u64> {
        let mut count = 0;
        for mut entry in self.entries.iter_mut() {
            if entry.active && entry.is_expired_at(now) {
                entry.active = false;
                count += 1;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn pending(submitted_at: DateTime<Utc>) -> Contribution {
        Contribution {
            id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            market_id: Uuid::new_v4(),
            price: 3.5,
            note: None,
            status: ContributionStatus::Pending,
            rejection_reason: None,
            submitted_at,
            decided_at: None,
            decided_by: None,
        }
    }

    fn approve() -> Decision {
        Decision {
            verdict: Verdict::Approve,
            moderator: Uuid::new_v4(),
            decided_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_decide_is_compare_and_set() {
        let store = MemoryContributionStore::new();
        let c = pending(Utc::now());
        store.insert(&c).await.unwrap();

        assert!(matches!(
            store.decide(c.id, &approve()),
            DecisionOutcome::Decided(_)
        ));
        assert_eq!(
            store.decide(c.id, &approve()),
            DecisionOutcome::AlreadyDecided(ContributionStatus::Approved)
        );
        assert_eq!(store.decide(Uuid::new_v4(), &approve()), DecisionOutcome::Missing);
    }

    #[tokio::test]
    async fn test_reopen_only_undoes_matching_decision() {
        let store = MemoryContributionStore::new();
        let c = pending(Utc::now());
        store.insert(&c).await.unwrap();

        let decision = approve();
        store.decide(c.id, &decision);
        assert!(!store.reopen(c.id, &approve()));
        assert!(store.reopen(c.id, &decision));

        let reopened = store.get(c.id).await.unwrap().unwrap();
        assert_eq!(reopened, c);
        assert!(!store.reopen(c.id, &decision));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_decisions_single_winner() {
        let store = Arc::new(MemoryContributionStore::new());
        let c = pending(Utc::now());
        store.insert(&c).await.unwrap();
        let id = c.id;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.decide(id, &approve()) }));
        }

        let mut winners = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), DecisionOutcome::Decided(_)) {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_list_newest_first_with_limit() {
        let store = MemoryContributionStore::new();
        let now = Utc::now();
        let old = pending(now - Duration::hours(2));
        let mid = pending(now - Duration::hours(1));
        let new = pending(now);
        for c in [&old, &new, &mid] {
            store.insert(c).await.unwrap();
        }

        let listed = store
            .list(ContributionFilter {
                status: Some(ContributionStatus::Pending),
                limit: 2,
            })
            .await
            .unwrap();
        assert_eq!(listed.iter().map(|c| c.id).collect::<Vec<_>>(), vec![new.id, mid.id]);
    }

    #[tokio::test]
    async fn test_client_contact_is_unique() {
        let store = MemoryClientStore::new();
        let a = ClientAccount::new("Ana".into(), "75999990000".into(), Utc::now());
        let b = ClientAccount::new("Bia".into(), "75999990000".into(), Utc::now());
        store.insert(&a).await.unwrap();
        assert!(matches!(store.insert(&b).await, Err(CatalogError::Conflict(_))));

        store.delete(a.id).await.unwrap();
        store.insert(&b).await.unwrap();
        assert_eq!(
            store.find_by_contact("75999990000").await.unwrap().unwrap().id,
            b.id
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_rejections_do_not_lose_updates() {
        let store = Arc::new(MemoryClientStore::new());
        let account = ClientAccount::new("Caio".into(), "1".into(), Utc::now());
        store.insert(&account).await.unwrap();
        let id = account.id;

        let mut handles = Vec::new();
        for i in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .record_rejection(id, &format!("r{}", i), &TrustThresholds::default(), Utc::now())
                    .await
                    .unwrap()
                    .unwrap()
                    .1
            }));
        }

        let mut auto_blocks = 0;
        for handle in handles {
            if handle.await.unwrap().auto_blocked {
                auto_blocks += 1;
            }
        }

        let trust = store.get(id).await.unwrap().unwrap().trust;
        assert_eq!(trust.consecutive_errors, 10);
        assert_eq!(trust.total_rejected, 10);
        assert_eq!(auto_blocks, 1);
    }

    #[tokio::test]
    async fn test_blacklist_upsert_keeps_id() {
        let store = MemoryBlacklistStore::new();
        let now = Utc::now();
        let first = store
            .upsert(&BlacklistEntry::new("123".into(), "a".into(), now, 2))
            .await
            .unwrap();
        let second = store
            .upsert(&BlacklistEntry::new("123".into(), "b".into(), now + Duration::days(1), 2))
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.reason, "b");
    }

    #[tokio::test]
    async fn test_deactivate_expired_is_idempotent() {
        let store = MemoryBlacklistStore::new();
        let now = Utc::now();
        store
            .upsert(&BlacklistEntry::new("1".into(), "a".into(), now - Duration::days(90), 2))
            .await
            .unwrap();
        store
            .upsert(&BlacklistEntry::new("2".into(), "b".into(), now, 2))
            .await
            .unwrap();

        assert_eq!(store.deactivate_expired(now).await.unwrap(), 1);
        assert_eq!(store.deactivate_expired(now).await.unwrap(), 0);
        assert_eq!(store.list_active(now).await.unwrap().len(), 1);
    }
}
