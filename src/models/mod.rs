use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod change_event;
pub mod observation;
pub mod product;
pub mod run_result;

// Re-exports for convenience
pub use change_event::*;
pub use observation::*;
pub use product::*;
pub use run_result::*;

use rust_decimal::Decimal;

/// Stock state of a listing as reported by the source site.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    InStock,
    OutOfStock,
    Unknown,
}

/// Search constraints applied to a run. Price bounds and the result cap are
/// enforced post-normalization; site-specific flags are validated by the
/// adapter when the search URL is built.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchFilters {
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub max_results: Option<usize>,
    #[serde(default)]
    pub buy_it_now_only: bool,
}

impl SearchFilters {
    /// Bounds that contradict each other are a caller mistake, not a scrape
    /// outcome, so they fail before any request is issued.
    pub fn validate(&self) -> Result<(), crate::utils::error::ConfigError> {
        use crate::utils::error::ConfigError;

        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err(ConfigError::InvalidFilter(format!(
                    "min_price {} exceeds max_price {}",
                    min, max
                )));
            }
        }
        if let Some(min) = self.min_price {
            if min.is_sign_negative() {
                return Err(ConfigError::InvalidFilter(format!("negative min_price {}", min)));
            }
        }
        if let Some(max) = self.max_price {
            if max.is_sign_negative() {
                return Err(ConfigError::InvalidFilter(format!("negative max_price {}", max)));
            }
        }
        if self.max_results == Some(0) {
            return Err(ConfigError::InvalidFilter("max_results must be at least 1".into()));
        }
        Ok(())
    }
}

/// Run ids in the 32-char simple UUID format.
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}
