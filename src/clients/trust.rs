//! Client Trust State and Thresholds
//!
//! Every approval resets the error streak; every rejection extends it.
//! A streak reaching the configured threshold blocks the client
//! automatically unless an administrator already blocked them.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Longest administrative temporary block, in days
pub const MAX_BLOCK_DAYS: u32 = 3650;

/// Business-configurable trust parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustThresholds {
    /// Consecutive rejections that trigger an automatic block
    pub auto_block_threshold: u32,
}

impl Default for TrustThresholds {
    fn default() -> Self {
        Self {
            auto_block_threshold: 3,
        }
    }
}

/// Why (and until when) a client is blocked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockKind {
    None,
    /// Administrator block that lapses at `until`
    Temporary { until: DateTime<Utc> },
    /// Administrator block without expiry (account kept, login disabled)
    Permanent,
    /// Raised by the error streak reaching the threshold
    Automatic,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::None => "none",
            BlockKind::Temporary { .. } => "temporary",
            BlockKind::Permanent => "permanent",
            BlockKind::Automatic => "automatic",
        }
    }

    pub fn until(&self) -> Option<DateTime<Utc>> {
        match self {
            BlockKind::Temporary { until } => Some(*until),
            _ => None,
        }
    }

    /// Rebuild from the persisted `(kind, until)` pair
    pub fn from_parts(kind: &str, until: Option<DateTime<Utc>>) -> Option<Self> {
        match (kind, until) {
            ("none", _) => Some(BlockKind::None),
            ("temporary", Some(until)) => Some(BlockKind::Temporary { until }),
            ("permanent", _) => Some(BlockKind::Permanent),
            ("automatic", _) => Some(BlockKind::Automatic),
            _ => None,
        }
    }
}

/// Outcome of applying a rejection to a trust state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RejectionOutcome {
    pub consecutive_errors: u32,
    /// True only for the rejection that raised the automatic block
    pub auto_blocked: bool,
}

/// Administrative change to a client's block state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockCommand {
    Temporary { days: u32, reason: String },
    Permanent { reason: String },
    Unblock,
}

/// Per-client trust bookkeeping, embedded in the client record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientTrustState {
    pub consecutive_errors: u32,
    pub total_approved: u64,
    pub total_rejected: u64,
    pub blocked: bool,
    pub block_reason: Option<String>,
    pub block_kind: BlockKind,
    pub blocked_at: Option<DateTime<Utc>>,
}

impl Default for ClientTrustState {
    fn default() -> Self {
        Self {
            consecutive_errors: 0,
            total_approved: 0,
            total_rejected: 0,
            blocked: false,
            block_reason: None,
            block_kind: BlockKind::None,
            blocked_at: None,
        }
    }
}

impl ClientTrustState {
    /// Blocked as of `now`; temporary blocks lapse lazily
    pub fn is_blocked_at(&self, now: DateTime<Utc>) -> bool {
        if !self.blocked {
            return false;
        }
        match self.block_kind {
            BlockKind::Temporary { until } => now < until,
            _ => true,
        }
    }

    pub fn record_approval(&mut self) {
        self.total_approved += 1;
        self.consecutive_errors = 0;
    }

    pub fn record_rejection(
        &mut self,
        reason: &str,
        thresholds: &TrustThresholds,
        now: DateTime<Utc>,
    ) -> RejectionOutcome {
        self.total_rejected += 1;
        self.consecutive_errors += 1;

        // A lapsed temporary block does not count as already blocked
        let auto_blocked = !self.is_blocked_at(now)
            && self.consecutive_errors >= thresholds.auto_block_threshold;
        if auto_blocked {
            self.blocked = true;
            self.block_kind = BlockKind::Automatic;
            self.block_reason = Some(auto_block_reason(self.consecutive_errors, reason));
            self.blocked_at = Some(now);
        }

        RejectionOutcome {
            consecutive_errors: self.consecutive_errors,
            auto_blocked,
        }
    }

    /// Re-applying refreshes the expiry. The expiry saturates at the
    /// largest representable instant.
    pub fn block_temporary(&mut self, days: u32, reason: &str, now: DateTime<Utc>) {
        let until = Duration::try_days(i64::from(days))
            .and_then(|span| now.checked_add_signed(span))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.blocked = true;
        self.block_kind = BlockKind::Temporary { until };
        self.block_reason = Some(reason.to_string());
        self.blocked_at = Some(now);
    }

    pub fn block_permanent(&mut self, reason: &str, now: DateTime<Utc>) {
        self.blocked = true;
        self.block_kind = BlockKind::Permanent;
        self.block_reason = Some(reason.to_string());
        self.blocked_at = Some(now);
    }

    pub fn unblock(&mut self) {
        self.blocked = false;
        self.block_kind = BlockKind::None;
        self.block_reason = None;
        self.blocked_at = None;
        self.consecutive_errors = 0;
    }

    pub fn apply(&mut self, command: &BlockCommand, now: DateTime<Utc>) {
        match command {
            BlockCommand::Temporary { days, reason } => self.block_temporary(*days, reason, now),
            BlockCommand::Permanent { reason } => self.block_permanent(reason, now),
            BlockCommand::Unblock => self.unblock(),
        }
    }
}

pub fn auto_block_reason(consecutive_errors: u32, last_reason: &str) -> String {
    format!(
        "automatically blocked after {} consecutive rejections (last: {})",
        consecutive_errors, last_reason
    )
}
