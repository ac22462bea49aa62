//! Price Catalog
//!
//! Contribution moderation and client trust lifecycle for a crowdsourced
//! price catalog. Clients report prices, administrators approve or reject
//! them, and each client's trust state and contact blacklist follow from
//! those decisions.
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── lib.rs         - Crate root with re-exports
//! ├── main.rs        - Server entrypoint
//! ├── config.rs      - Configuration management
//! ├── error.rs       - CatalogError and its kinds
//! ├── auth.rs        - Principal and roles
//! ├── clock.rs       - System and manual clocks
//! ├── notify.rs      - Fire-and-forget notifications
//! ├── service.rs     - Role-checked operation surface
//! ├── moderation/    - Contribution queue & moderation engine
//! ├── pricing/       - Authoritative price table
//! ├── clients/       - Accounts, trust state, administrative blocking
//! ├── blacklist/     - Contact blacklist & expiry sweeper
//! ├── database/      - Store traits, PostgreSQL and in-memory backends
//! └── api/           - HTTP API endpoints and security middleware
//! ```

pub mod api;
pub mod auth;
pub mod blacklist;
pub mod clients;
pub mod clock;
pub mod config;
pub mod database;
pub mod error;
pub mod moderation;
pub mod notify;
pub mod pricing;
pub mod service;

// Re-export main types for convenience
pub use auth::{Principal, Role};
pub use blacklist::{normalize_contact, BlacklistEntry, BlacklistRegistry, ExpirySweeper};
pub use clients::{
    BlockCommand, BlockKind, ClientAccount, ClientManager, ClientTrustState, RejectionOutcome,
    TrustThresholds,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CatalogConfig;
pub use database::{DatabasePool, Repositories};
pub use error::{CatalogError, CatalogResult, ErrorKind};
pub use moderation::{
    Contribution, ContributionDraft, ContributionFilter, ContributionQueue, ContributionStatus,
    DecisionReport, ModerationEngine,
};
pub use notify::{
    MemoryNotifier, NotificationDispatcher, NotificationEvent, Notifier, TracingNotifier,
    WebhookNotifier,
};
pub use pricing::{PriceEntry, PriceSource, PriceTable};
pub use service::{BlockRequest, CatalogService};

// Re-export API types
pub use api::{create_api_router, ApiState, SecurityMiddlewareConfig, SecurityState};
