//! Contribution Moderation
//!
//! ## Flow
//!
//! ```text
//! client ──submit──► ContributionQueue ──► ContributionStore (pending)
//!                                               │
//! admin ──approve/reject──► ModerationEngine ──► ModerationStore
//!                               │                 ├─ conditional write
//!                               │                 ├─ price upsert (approve only)
//!                               │                 └─ trust update
//!                               └──► NotificationDispatcher
//! ```
//!
//! A contribution leaves `pending` exactly once. Every later decision on it
//! reports `AlreadyDecided` and has no side effects. The store applies the
//! status change, price and trust writes as one unit: if any of them fails
//! the contribution stays `pending` and the decision can be retried.

mod contribution;
mod engine;
mod queue;

pub use contribution::{
    parse_reference, AppliedDecision, Contribution, ContributionDraft, ContributionFilter, ContributionStatus,
    Decision, DecisionOutcome, Verdict,
};
pub use engine::{DecisionReport, ModerationEngine};
pub use queue::ContributionQueue;
