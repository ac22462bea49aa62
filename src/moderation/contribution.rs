//! Contribution model and submission validation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::clients::ClientTrustState;
use crate::error::{CatalogError, CatalogResult};

/// Moderation status. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionStatus {
    Pending,
    Approved,
    Rejected,
}

impl ContributionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContributionStatus::Pending => "pending",
            ContributionStatus::Approved => "approved",
            ContributionStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ContributionStatus::Pending)
    }
}

impl fmt::Display for ContributionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContributionStatus {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ContributionStatus::Pending),
            "approved" => Ok(ContributionStatus::Approved),
            "rejected" => Ok(ContributionStatus::Rejected),
            other => Err(CatalogError::invalid(format!(
                "unknown contribution status '{}'",
                other
            ))),
        }
    }
}

/// A client-submitted price observation. Never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub id: Uuid,
    pub client_id: Uuid,
    pub product_id: Uuid,
    pub market_id: Uuid,
    pub price: f64,
    pub note: Option<String>,
    pub status: ContributionStatus,
    pub rejection_reason: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<Uuid>,
}

/// Raw submission as received from a client
#[derive(Debug, Clone, Deserialize)]
pub struct ContributionDraft {
    pub product_id: String,
    pub market_id: String,
    pub price: f64,
    #[serde(default)]
    pub note: Option<String>,
}

impl ContributionDraft {
    pub fn new(product_id: impl Into<String>, market_id: impl Into<String>, price: f64) -> Self {
        Self {
            product_id: product_id.into(),
            market_id: market_id.into(),
            price,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Validate and build a pending contribution for `client_id`
    pub fn into_contribution(
        self,
        client_id: Uuid,
        now: DateTime<Utc>,
    ) -> CatalogResult<Contribution> {
        let product_id = parse_reference("product_id", &self.product_id)?;
        let market_id = parse_reference("market_id", &self.market_id)?;

        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(CatalogError::invalid("price must be a positive number"));
        }

        let note = self
            .note
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        Ok(Contribution {
            id: Uuid::new_v4(),
            client_id,
            product_id,
            market_id,
            price: self.price,
            note,
            status: ContributionStatus::Pending,
            rejection_reason: None,
            submitted_at: now,
            decided_at: None,
            decided_by: None,
        })
    }
}

pub fn parse_reference(field: &str, raw: &str) -> CatalogResult<Uuid> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CatalogError::invalid(format!("{} is required", field)));
    }
    Uuid::parse_str(trimmed)
        .map_err(|_| CatalogError::invalid(format!("{} is not a valid reference", field)))
}

/// Terminal decision applied by a moderator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Approve,
    Reject { reason: String },
}

impl Verdict {
    pub fn status(&self) -> ContributionStatus {
        match self {
            Verdict::Approve => ContributionStatus::Approved,
            Verdict::Reject { .. } => ContributionStatus::Rejected,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Verdict::Approve => None,
            Verdict::Reject { reason } => Some(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub verdict: Verdict,
    pub moderator: Uuid,
    pub decided_at: DateTime<Utc>,
}

/// Result of the conditional `pending -> decided` write
#[derive(Debug, Clone, PartialEq)]
pub enum DecisionOutcome<T = Contribution> {
    Decided(T),
    AlreadyDecided(ContributionStatus),
    Missing,
}

/// A decision together with the side effects stored alongside it
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedDecision {
    pub contribution: Contribution,
    /// Contributor trust after the decision; `None` if the account is gone
    pub trust: Option<ClientTrustState>,
    pub auto_blocked: bool,
}

/// Listing filter. `status: None` lists every status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContributionFilter {
    pub status: Option<ContributionStatus>,
    pub limit: usize,
}

impl Default for ContributionFilter {
    fn default() -> Self {
        Self {
            status: Some(ContributionStatus::Pending),
            limit: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(price: f64) -> ContributionDraft {
        ContributionDraft::new(Uuid::new_v4().to_string(), Uuid::new_v4().to_string(), price)
    }

    #[test]
    fn test_valid_draft() {
        let client = Uuid::new_v4();
        let c = draft(4.99)
            .with_note("  promo  ")
            .into_contribution(client, Utc::now())
            .unwrap();
        assert_eq!(c.status, ContributionStatus::Pending);
        assert_eq!(c.client_id, client);
        assert_eq!(c.note.as_deref(), Some("promo"));
    }

    #[test]
    fn test_non_positive_price_rejected() {
        for price in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = draft(price)
                .into_contribution(Uuid::new_v4(), Utc::now())
                .unwrap_err();
            assert!(matches!(err, CatalogError::InvalidInput(_)));
        }
    }

    #[test]
    fn test_malformed_reference_rejected() {
        let d = ContributionDraft::new("not-an-id", Uuid::new_v4().to_string(), 1.0);
        let err = d.into_contribution(Uuid::new_v4(), Utc::now()).unwrap_err();
        assert_eq!(
            err,
            CatalogError::invalid("product_id is not a valid reference")
        );

        let d = ContributionDraft::new(Uuid::new_v4().to_string(), "  ", 1.0);
        let err = d.into_contribution(Uuid::new_v4(), Utc::now()).unwrap_err();
        assert_eq!(err, CatalogError::invalid("market_id is required"));
    }

    #[test]
    fn test_status_round_trip_strings() {
        assert_eq!("approved".parse::<ContributionStatus>().unwrap(), ContributionStatus::Approved);
        assert!("done".parse::<ContributionStatus>().is_err());
        assert!(ContributionStatus::Rejected.is_terminal());
        assert!(!ContributionStatus::Pending.is_terminal());
    }
}
