use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::IdentityKey;

/// One price sighting. Immutable once created; the persistence collaborator
/// keeps an append-only history of these per identity key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceObservation {
    pub identity: IdentityKey,
    pub price: Decimal,
    pub observed_at: DateTime<Utc>,
}

impl PriceObservation {
    pub fn new(identity: IdentityKey, price: Decimal, observed_at: DateTime<Utc>) -> Self {
        Self {
            identity,
            price,
            observed_at,
        }
    }
}
