use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::blacklist::{require_contact, BlacklistEntry};
use crate::clock::Clock;
use crate::database::BlacklistStore;
use crate::error::{CatalogError, CatalogResult};

/// Lookup and administration of blacklist entries
#[derive(Clone)]
pub struct BlacklistRegistry {
    store: Arc<dyn BlacklistStore>,
    clock: Arc<dyn Clock>,
    /// Calendar months a new entry stays active
    months: u32,
}

impl BlacklistRegistry {
    pub fn new(store: Arc<dyn BlacklistStore>, clock: Arc<dyn Clock>, months: u32) -> Self {
        Self {
            store,
            clock,
            months,
        }
    }

    /// Whether registration under `contact` is currently refused.
    /// Expiry is compared against the clock, so this never waits on the sweeper.
    pub async fn is_blocked(&self, contact: &str) -> CatalogResult<bool> {
        let contact = require_contact(contact)?;
        let blocking = self
            .store
            .find_blocking(&contact, self.clock.now())
            .await?;
        Ok(blocking.is_some())
    }

    /// Create or overwrite the entry for an already normalized contact
    pub async fn blacklist_contact(
        &self,
        contact: &str,
        reason: &str,
    ) -> CatalogResult<BlacklistEntry> {
        let entry = BlacklistEntry::new(
            contact.to_string(),
            reason.to_string(),
            self.clock.now(),
            self.months,
        );
        let stored = self.store.upsert(&entry).await?;

        info!(
            entry_id = %stored.id,
            expires_at = %stored.expires_at,
            "Contact blacklisted"
        );
        Ok(stored)
    }

    /// Administrator override
    pub async fn release(&self, entry_id: Uuid) -> CatalogResult<BlacklistEntry> {
        let released = self
            .store
            .release(entry_id, self.clock.now())
            .await?
            .ok_or_else(|| CatalogError::not_found("blacklist entry", entry_id))?;

        info!(entry_id = %entry_id, "Blacklist entry released");
        Ok(released)
    }

    pub async fn list_active(&self) -> CatalogResult<Vec<BlacklistEntry>> {
        let entries = self.store.list_active(self.clock.now()).await?;
        debug!(count = entries.len(), "Listed active blacklist entries");
        Ok(entries)
    }
}
