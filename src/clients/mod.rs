//! Client accounts and trust lifecycle
//!
//! ## Block kinds
//!
//! - `temporary`: set by an administrator, lapses at `until`
//! - `permanent`: set by an administrator, account kept but inert
//! - `automatic`: raised when the rejection streak reaches the threshold
//!
//! Termination is not a block: the record is deleted and the contact is
//! blacklisted instead.

mod account;
mod manager;
mod trust;

pub use account::ClientAccount;
pub use manager::ClientManager;
pub use trust::{
    auto_block_reason, BlockCommand, BlockKind, ClientTrustState, RejectionOutcome,
    TrustThresholds, MAX_BLOCK_DAYS,
};
