//! Authoritative price table
//!
//! One live entry per (product, market). Every write is an upsert and the
//! last write wins, whatever its source.

mod table;

pub use table::{PriceEntry, PriceSource, PriceTable};
