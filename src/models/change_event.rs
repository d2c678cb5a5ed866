use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::IdentityKey;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    New,
    PriceDrop,
    PriceRise,
    Unchanged,
    BackInStock,
    OutOfStock,
}

/// Classified transition between two consecutive observations of the same
/// identity key. Created exclusively by the change detector and never mutated
/// afterwards; downstream notifiers consume and discard these.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeEvent {
    pub identity: IdentityKey,
    pub kind: ChangeKind,
    pub previous_price: Option<Decimal>,
    pub new_price: Decimal,
    /// Relative price delta `|new - previous| / previous`. `None` when there
    /// is no previous price or the previous price was zero.
    pub magnitude: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    /// Anything other than a no-op comparison is worth surfacing.
    pub fn is_notable(&self) -> bool {
        self.kind != ChangeKind::Unchanged
    }
}
