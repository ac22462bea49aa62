//! Blacklist entry

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Time-bounded refusal of re-registration under a contact identifier.
/// Outlives the client record that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub id: Uuid,
    /// Digits-only contact identifier, unique across entries
    pub contact: String,
    pub reason: String,
    pub activated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub active: bool,
    pub released_at: Option<DateTime<Utc>>,
}

impl BlacklistEntry {
    /// New active entry expiring `months` calendar months after `now`
    pub fn new(contact: String, reason: String, now: DateTime<Utc>, months: u32) -> Self {
        let expires_at = now
            .checked_add_months(Months::new(months))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            id: Uuid::new_v4(),
            contact,
            reason,
            activated_at: now,
            expires_at,
            active: true,
            released_at: None,
        }
    }

    /// Whether this entry refuses registration at `now`
    pub fn blocks_at(&self, now: DateTime<Utc>) -> bool {
        self.active && now < self.expires_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
