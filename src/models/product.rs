use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::Availability;

/// Stable identifier grouping all observations of the same real-world listing
/// across runs. Built from the site key plus the site-native product id, or a
/// content hash when the site exposes no id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct IdentityKey(String);

impl IdentityKey {
    pub fn native(site: &str, product_id: &str) -> Self {
        IdentityKey(format!("{}:{}", site, product_id))
    }

    /// Fallback identity for listings without a native id. Stable for
    /// repeated identical text, but colliding titles from the same seller
    /// would merge histories; callers that can extract a native id should.
    pub fn derived(site: &str, title: &str, seller: Option<&str>) -> Self {
        let normalized = title.trim().to_lowercase();
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        hasher.update(b"|");
        hasher.update(site.as_bytes());
        hasher.update(b"|");
        hasher.update(seller.unwrap_or("").trim().to_lowercase().as_bytes());
        let digest = hasher.finalize();
        let short: String = digest[..16].iter().map(|b| format!("{:02x}", b)).collect();
        IdentityKey(format!("{}:sha:{}", site, short))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical, validated representation of a listing, independent of the
/// source site's markup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub identity: IdentityKey,
    pub title: String,
    pub price: Decimal,
    /// ISO 4217 code.
    pub currency: String,
    pub availability: Availability,
    pub url: String,
    pub image_url: Option<String>,
    pub rating: Option<f32>,
    pub review_count: Option<u32>,
    pub collected_at: DateTime<Utc>,
    pub site: String,
}
