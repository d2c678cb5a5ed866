use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ChangeEvent, Product, SearchFilters};

/// Outcome of one orchestrated search run. Constructed once by the
/// orchestrator and immutable after return; the failure counters let callers
/// alert on degraded runs without inspecting logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeRunResult {
    pub run_id: String,
    pub site: String,
    pub search_term: String,
    pub filters: SearchFilters,
    pub products: Vec<Product>,
    pub events: Vec<ChangeEvent>,
    pub fetch_attempts: u32,
    pub fetch_failures: u32,
    pub parse_failures: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Set when the run completed but produced no trustworthy results: the
    /// initial fetch exhausted its retries, a non-empty page yielded zero
    /// nodes (suspected layout change), or storage failed mid-run.
    pub degraded: bool,
}

impl ScrapeRunResult {
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}
