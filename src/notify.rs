use async_trait::async_trait;
use tracing::{info, warn};

use crate::models::ScrapeRunResult;

/// Delivery seam for run outcomes. Implementations must not fail the run;
/// delivery problems are their own to log.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, result: &ScrapeRunResult);
}

/// Writes a run summary to the log. The default sink when no external
/// channel is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, result: &ScrapeRunResult) {
        let notable = result.events.iter().filter(|e| e.is_notable()).count();
        if result.degraded {
            warn!(
                run_id = %result.run_id,
                site = %result.site,
                term = %result.search_term,
                products = result.products.len(),
                fetch_failures = result.fetch_failures,
                parse_failures = result.parse_failures,
                "run completed degraded"
            );
        } else {
            info!(
                run_id = %result.run_id,
                site = %result.site,
                term = %result.search_term,
                products = result.products.len(),
                notable_events = notable,
                duration_ms = result.duration_ms(),
                "run completed"
            );
        }

        for event in result.events.iter().filter(|e| e.is_notable()) {
            info!(
                identity = %event.identity,
                kind = ?event.kind,
                previous_price = ?event.previous_price,
                new_price = %event.new_price,
                "change detected"
            );
        }
    }
}
