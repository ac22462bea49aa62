use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::database::PriceStore;
use crate::error::{CatalogError, CatalogResult};
use crate::moderation::Contribution;

/// Who produced the current price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    Admin,
    Client,
    Market,
}

impl PriceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceSource::Admin => "admin",
            PriceSource::Client => "client",
            PriceSource::Market => "market",
        }
    }
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriceSource {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(PriceSource::Admin),
            "client" => Ok(PriceSource::Client),
            "market" => Ok(PriceSource::Market),
            other => Err(CatalogError::invalid(format!("unknown price source '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub product_id: Uuid,
    pub market_id: Uuid,
    pub price: f64,
    pub source: PriceSource,
    pub author: Uuid,
    pub updated_at: DateTime<Utc>,
}

impl PriceEntry {
    /// Entry written when `contribution` is approved. Client contributions
    /// overwrite whatever source held the slot before.
    pub fn from_contribution(contribution: &Contribution, updated_at: DateTime<Utc>) -> Self {
        Self {
            product_id: contribution.product_id,
            market_id: contribution.market_id,
            price: contribution.price,
            source: PriceSource::Client,
            author: contribution.client_id,
            updated_at,
        }
    }
}

/// Read view over the price store. Writes only happen as part of an
/// approval.
#[derive(Clone)]
pub struct PriceTable {
    store: Arc<dyn PriceStore>,
}

impl PriceTable {
    pub fn new(store: Arc<dyn PriceStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, product_id: Uuid, market_id: Uuid) -> CatalogResult<Option<PriceEntry>> {
        let entry = self.store.get(product_id, market_id).await?;
        if entry.is_none() {
            debug!(product_id = %product_id, market_id = %market_id, "No price recorded");
        }
        Ok(entry)
    }
}
