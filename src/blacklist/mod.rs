//! Contact Blacklist
//!
//! Terminated clients leave a time-bounded entry keyed by their normalized
//! contact identifier. Registration consults the registry synchronously; the
//! sweeper only tidies the `active` flag and is never needed for correctness.
//!
//! ```text
//! terminate ──► BlacklistRegistry::blacklist_contact ──► BlacklistStore
//!                        ▲                                    │
//! register ── is_blocked ┘                 ExpirySweeper ─────┘
//! ```

mod contact;
mod entry;
mod registry;
mod sweeper;

pub use contact::{normalize_contact, require_contact, MAX_CONTACT_DIGITS};
pub use entry::BlacklistEntry;
pub use registry::BlacklistRegistry;
pub use sweeper::ExpirySweeper;
