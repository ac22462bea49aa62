//! Client Manager - registration and the administrative blocking path

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::blacklist::{require_contact, BlacklistEntry, BlacklistRegistry};
use crate::clients::{BlockCommand, ClientAccount, ClientTrustState, MAX_BLOCK_DAYS};
use crate::clock::Clock;
use crate::database::ClientStore;
use crate::error::{CatalogError, CatalogResult};
use crate::notify::{NotificationDispatcher, NotificationEvent};

#[derive(Clone)]
pub struct ClientManager {
    clients: Arc<dyn ClientStore>,
    blacklist: BlacklistRegistry,
    clock: Arc<dyn Clock>,
    notifier: NotificationDispatcher,
}

fn required_reason(reason: &str) -> CatalogResult<&str> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(CatalogError::invalid("reason is required"));
    }
    Ok(reason)
}

impl ClientManager {
    pub fn new(
        clients: Arc<dyn ClientStore>,
        blacklist: BlacklistRegistry,
        clock: Arc<dyn Clock>,
        notifier: NotificationDispatcher,
    ) -> Self {
        Self {
            clients,
            blacklist,
            clock,
            notifier,
        }
    }

    /// Open an account. Refused while the contact is blacklisted or held by
    /// another account.
    pub async fn register(&self, name: &str, contact: &str) -> CatalogResult<ClientAccount> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CatalogError::invalid("name is required"));
        }
        let contact = require_contact(contact)?;

        if self.blacklist.is_blocked(&contact).await? {
            warn!("Registration refused for blacklisted contact");
            return Err(CatalogError::conflict(
                "registration refused: contact is blacklisted",
            ));
        }

        let account = ClientAccount::new(name.to_string(), contact, self.clock.now());
        self.clients.insert(&account).await?;

        info!(client_id = %account.id, "Client registered");
        Ok(account)
    }

    pub async fn get_client(&self, client_id: Uuid) -> CatalogResult<ClientAccount> {
        self.clients
            .get(client_id)
            .await?
            .ok_or_else(|| CatalogError::not_found("client", client_id))
    }

    /// Re-applying refreshes the expiry to `now + days`
    pub async fn block_temporary(
        &self,
        client_id: Uuid,
        days: u32,
        reason: &str,
    ) -> CatalogResult<ClientTrustState> {
        if days == 0 {
            return Err(CatalogError::invalid("block duration must be at least one day"));
        }
        if days > MAX_BLOCK_DAYS {
            return Err(CatalogError::invalid(format!(
                "block duration must not exceed {} days",
                MAX_BLOCK_DAYS
            )));
        }
        let reason = required_reason(reason)?;

        self.apply(
            client_id,
            BlockCommand::Temporary {
                days,
                reason: reason.to_string(),
            },
        )
        .await
    }

    pub async fn block_permanent(
        &self,
        client_id: Uuid,
        reason: &str,
    ) -> CatalogResult<ClientTrustState> {
        let reason = required_reason(reason)?;
        self.apply(
            client_id,
            BlockCommand::Permanent {
                reason: reason.to_string(),
            },
        )
        .await
    }

    /// Clears the block and the error streak. The blacklist is untouched.
    pub async fn unblock(&self, client_id: Uuid) -> CatalogResult<ClientTrustState> {
        self.apply(client_id, BlockCommand::Unblock).await
    }

    async fn apply(&self, client_id: Uuid, command: BlockCommand) -> CatalogResult<ClientTrustState> {
        let trust = self
            .clients
            .apply_block(client_id, &command, self.clock.now())
            .await?
            .ok_or_else(|| CatalogError::not_found("client", client_id))?;

        let event = match &command {
            BlockCommand::Unblock => NotificationEvent::ClientUnblocked { client_id },
            BlockCommand::Temporary { reason, .. } | BlockCommand::Permanent { reason } => {
                NotificationEvent::ClientBlocked {
                    client_id,
                    kind: trust.block_kind.as_str(),
                    reason: reason.clone(),
                }
            }
        };

        info!(
            client_id = %client_id,
            block_kind = trust.block_kind.as_str(),
            "Client block state changed"
        );
        self.notifier.dispatch(event);
        Ok(trust)
    }

    /// Blacklist the contact, then delete the account. The contact is never
    /// free between the two steps.
    pub async fn terminate(&self, client_id: Uuid, reason: &str) -> CatalogResult<BlacklistEntry> {
        let reason = required_reason(reason)?;

        let account = self.get_client(client_id).await?;
        let entry = self
            .blacklist
            .blacklist_contact(&account.contact, reason)
            .await?;

        if self.clients.delete(client_id).await?.is_none() {
            warn!(client_id = %client_id, "Client vanished during termination");
        }

        info!(
            client_id = %client_id,
            entry_id = %entry.id,
            "Client terminated"
        );
        self.notifier.dispatch(NotificationEvent::ClientTerminated {
            client_id,
            blacklist_entry_id: entry.id,
        });
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::BlockKind;
    use crate::clock::ManualClock;
    use crate::clients::{RejectionOutcome, TrustThresholds};
    use crate::database::memory::{MemoryBlacklistStore, MemoryClientStore};
    use crate::database::BlacklistStore;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Records whether the contact was already blacklisted when `delete` ran
    struct DeleteOrderStore {
        inner: MemoryClientStore,
        blacklist: Arc<MemoryBlacklistStore>,
        clock: Arc<ManualClock>,
        blacklisted_before_delete: AtomicBool,
    }

    #[async_trait]
    impl ClientStore for DeleteOrderStore {
        async fn insert(&self, account: &ClientAccount) -> CatalogResult<()> {
            self.inner.insert(account).await
        }

        async fn get(&self, id: Uuid) -> CatalogResult<Option<ClientAccount>> {
            self.inner.get(id).await
        }

        async fn find_by_contact(&self, contact: &str) -> CatalogResult<Option<ClientAccount>> {
            self.inner.find_by_contact(contact).await
        }

        async fn delete(&self, id: Uuid) -> CatalogResult<Option<ClientAccount>> {
            if let Some(account) = self.inner.get(id).await? {
                let entry = self
                    .blacklist
                    .find_blocking(&account.contact, self.clock.now())
                    .await?;
                self.blacklisted_before_delete
                    .store(entry.is_some(), Ordering::SeqCst);
            }
            self.inner.delete(id).await
        }

        async fn record_approval(&self, id: Uuid) -> CatalogResult<Option<ClientTrustState>> {
            self.inner.record_approval(id).await
        }

        async fn record_rejection(
            &self,
            id: Uuid,
            reason: &str,
            thresholds: &TrustThresholds,
            now: DateTime<Utc>,
        ) -> CatalogResult<Option<(ClientTrustState, RejectionOutcome)>> {
            self.inner.record_rejection(id, reason, thresholds, now).await
        }

        async fn apply_block(
            &self,
            id: Uuid,
            command: &BlockCommand,
            now: DateTime<Utc>,
        ) -> CatalogResult<Option<ClientTrustState>> {
            self.inner.apply_block(id, command, now).await
        }
    }

    fn manager() -> (ClientManager, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        ));
        let blacklist =
            BlacklistRegistry::new(Arc::new(MemoryBlacklistStore::new()), clock.clone(), 2);
        let manager = ClientManager::new(
            Arc::new(MemoryClientStore::new()),
            blacklist,
            clock.clone(),
            NotificationDispatcher::tracing(),
        );
        (manager, clock)
    }

    #[tokio::test]
    async fn test_register_normalizes_contact() {
        let (manager, _) = manager();
        let account = manager.register(" Ana ", "(75) 99999-0000").await.unwrap();
        assert_eq!(account.name, "Ana");
        assert_eq!(account.contact, "75999990000");

        let err = manager.register("Bia", "75 99999 0000").await.unwrap_err();
        assert!(matches!(err, CatalogError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let (manager, _) = manager();
        assert!(matches!(
            manager.register("  ", "123").await,
            Err(CatalogError::InvalidInput(_))
        ));
        assert!(matches!(
            manager.register("Ana", "none").await,
            Err(CatalogError::InvalidInput(_))
        ));
        assert!(matches!(
            manager.register("Ana", &"9".repeat(40)).await,
            Err(CatalogError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_temporary_block_refreshes_expiry() {
        let (manager, clock) = manager();
        let account = manager.register("Ana", "123").await.unwrap();

        let first = manager.block_temporary(account.id, 7, "spam").await.unwrap();
        clock.advance(Duration::days(2));
        let second = manager.block_temporary(account.id, 7, "spam").await.unwrap();

        assert_eq!(
            second.block_kind.until().unwrap() - first.block_kind.until().unwrap(),
            Duration::days(2)
        );
        assert!(matches!(
            manager.block_temporary(account.id, 0, "spam").await,
            Err(CatalogError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_block_duration_is_bounded() {
        let (manager, clock) = manager();
        let account = manager.register("Ana", "123").await.unwrap();

        assert!(matches!(
            manager.block_temporary(account.id, u32::MAX, "spam").await,
            Err(CatalogError::InvalidInput(_))
        ));
        assert!(matches!(
            manager.block_temporary(account.id, MAX_BLOCK_DAYS + 1, "spam").await,
            Err(CatalogError::InvalidInput(_))
        ));

        let trust = manager
            .block_temporary(account.id, MAX_BLOCK_DAYS, "spam")
            .await
            .unwrap();
        assert_eq!(
            trust.block_kind.until(),
            Some(clock.now() + Duration::days(i64::from(MAX_BLOCK_DAYS)))
        );
    }

    #[tokio::test]
    async fn test_permanent_block_and_unblock() {
        let (manager, clock) = manager();
        let account = manager.register("Ana", "123").await.unwrap();

        let trust = manager.block_permanent(account.id, "fraud").await.unwrap();
        assert_eq!(trust.block_kind, BlockKind::Permanent);
        assert!(trust.is_blocked_at(clock.now() + Duration::days(3650)));

        let trust = manager.unblock(account.id).await.unwrap();
        assert!(!trust.blocked);
        assert_eq!(trust.block_kind, BlockKind::None);
        assert_eq!(trust.block_reason, None);
    }

    #[tokio::test]
    async fn test_unknown_client() {
        let (manager, _) = manager();
        let id = Uuid::new_v4();
        assert!(matches!(manager.get_client(id).await, Err(CatalogError::NotFound { .. })));
        assert!(matches!(manager.unblock(id).await, Err(CatalogError::NotFound { .. })));
        assert!(matches!(
            manager.terminate(id, "fraud").await,
            Err(CatalogError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_terminate_blacklists_contact_for_two_months() {
        let (manager, clock) = manager();
        let account = manager.register("Ana", "(75) 98888-7777").await.unwrap();

        let entry = manager.terminate(account.id, "fraud").await.unwrap();
        assert_eq!(entry.contact, "75988887777");
        assert!(matches!(
            manager.get_client(account.id).await,
            Err(CatalogError::NotFound { .. })
        ));

        let err = manager.register("Ana", "(75) 98888-7777").await.unwrap_err();
        assert!(matches!(err, CatalogError::Conflict(_)));

        clock.advance(Duration::days(61));
        let again = manager.register("Ana", "(75) 98888-7777").await.unwrap();
        assert_ne!(again.id, account.id);
    }

    #[tokio::test]
    async fn test_terminate_blacklists_before_deleting() {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        ));
        let blacklist_store = Arc::new(MemoryBlacklistStore::new());
        let clients = Arc::new(DeleteOrderStore {
            inner: MemoryClientStore::new(),
            blacklist: blacklist_store.clone(),
            clock: clock.clone(),
            blacklisted_before_delete: AtomicBool::new(false),
        });
        let manager = ClientManager::new(
            clients.clone(),
            BlacklistRegistry::new(blacklist_store, clock.clone(), 2),
            clock,
            NotificationDispatcher::tracing(),
        );

        let account = manager.register("Ana", "123").await.unwrap();
        let entry: BlacklistEntry = manager.terminate(account.id, "fraud").await.unwrap();

        assert_eq!(entry.contact, "123");
        assert!(clients.blacklisted_before_delete.load(Ordering::SeqCst));
        assert!(clients.get(account.id).await.unwrap().is_none());
    }
}
