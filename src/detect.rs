use chrono::Utc;
use rust_decimal::Decimal;

use crate::config::DetectorConfig;
use crate::models::{Availability, ChangeEvent, ChangeKind, Product};

/// Classifies each scraped product against its last known state. Pure
/// comparison, no storage access.
pub struct ChangeDetector {
    noise_threshold: Decimal,
}

impl ChangeDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            noise_threshold: config.noise_threshold,
        }
    }

    pub fn with_threshold(noise_threshold: Decimal) -> Self {
        Self { noise_threshold }
    }

    /// Availability transitions outrank price movement; a price move at or
    /// below the noise threshold (in currency units) is reported as
    /// unchanged.
    pub fn classify(&self, current: &Product, previous: Option<&Product>) -> ChangeEvent {
        let timestamp = Utc::now();

        let previous = match previous {
            Some(previous) => previous,
            None => {
                return ChangeEvent {
                    identity: current.identity.clone(),
                    kind: ChangeKind::New,
                    previous_price: None,
                    new_price: current.price,
                    magnitude: None,
                    timestamp,
                };
            }
        };

        let delta = (current.price - previous.price).abs();
        // The threshold compares the absolute delta; magnitude stays relative.
        let magnitude = if previous.price.is_zero() {
            None
        } else {
            Some(delta / previous.price)
        };

        let kind = match (previous.availability, current.availability) {
            (Availability::OutOfStock, Availability::InStock) => ChangeKind::BackInStock,
            (Availability::InStock | Availability::Unknown, Availability::OutOfStock) => {
                ChangeKind::OutOfStock
            }
            _ if delta > self.noise_threshold => {
                if current.price < previous.price {
                    ChangeKind::PriceDrop
                } else {
                    ChangeKind::PriceRise
                }
            }
            _ => ChangeKind::Unchanged,
        };

        ChangeEvent {
            identity: current.identity.clone(),
            kind,
            previous_price: Some(previous.price),
            new_price: current.price,
            magnitude,
            timestamp,
        }
    }
}
