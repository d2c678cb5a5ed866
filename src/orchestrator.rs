use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::detect::ChangeDetector;
use crate::fetch::FetchClient;
use crate::models::{generate_id, ChangeEvent, PriceObservation, Product, ScrapeRunResult, SearchFilters};
use crate::normalize::Normalizer;
use crate::notify::Notifier;
use crate::sites::AdapterRegistry;
use crate::store::ProductStore;
use crate::utils::error::{ScrapeError, StorageError};

/// Cooperative cancellation for a running scrape. Cloneable across tasks;
/// the orchestrator checks it between pages.
#[derive(Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives one search term through fetch, parse, normalize and change
/// detection, and assembles the run result. A run never aborts after the
/// first page succeeds; downstream failures degrade the result instead.
pub struct ScrapeOrchestrator {
    registry: AdapterRegistry,
    fetch: FetchClient,
    normalizer: Normalizer,
    detector: ChangeDetector,
    store: Arc<dyn ProductStore>,
    notifier: Option<Arc<dyn Notifier>>,
    max_results: usize,
    max_pages: u32,
    cancel: CancelHandle,
}

impl ScrapeOrchestrator {
    pub fn new(
        config: &AppConfig,
        registry: AdapterRegistry,
        fetch: FetchClient,
        store: Arc<dyn ProductStore>,
    ) -> Self {
        Self {
            registry,
            fetch,
            normalizer: Normalizer::new(),
            detector: ChangeDetector::new(&config.detector),
            store,
            notifier: None,
            max_results: config.scraper.max_results,
            max_pages: config.scraper.max_pages.max(1),
            cancel: CancelHandle::new(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Runs one search. Errors are returned only for misconfiguration
    /// (unknown site, invalid filters); operational failures mid-run produce
    /// a degraded result instead.
    pub async fn run(
        &self,
        site_key: &str,
        term: &str,
        filters: &SearchFilters,
    ) -> Result<ScrapeRunResult, ScrapeError> {
        let adapter = self.registry.get(site_key)?;
        filters.validate()?;

        let run_id = generate_id();
        let started_at = Utc::now();
        let site = adapter.site_key().to_string();
        let max_results = filters.max_results.unwrap_or(self.max_results);

        info!(run_id = %run_id, site = %site, term, "starting scrape run");

        let mut products: Vec<Product> = Vec::new();
        let mut fetch_attempts = 0u32;
        let mut fetch_failures = 0u32;
        let mut parse_failures = 0u32;
        let mut degraded = false;

        'pages: for page in 1..=self.max_pages {
            if self.cancel.is_cancelled() {
                info!(run_id = %run_id, page, "run cancelled, stopping pagination");
                break;
            }

            let url = adapter.build_search_url(term, filters, page)?;
            let body = match self.fetch.fetch(&url, adapter.site_key()).await {
                Ok(response) => {
                    fetch_attempts += response.attempts;
                    response.body
                }
                Err(err) => {
                    fetch_attempts += err.attempts;
                    fetch_failures += 1;
                    if page == 1 {
                        warn!(run_id = %run_id, %err, "initial page fetch failed, run degraded");
                        degraded = true;
                    } else {
                        warn!(run_id = %run_id, %err, page, "page fetch failed, stopping pagination");
                    }
                    break;
                }
            };

            let nodes = adapter.extract_listing_nodes(&body);
            if nodes.is_empty() {
                if page == 1 && !adapter.is_zero_results_page(&body) {
                    warn!(
                        run_id = %run_id,
                        site = %site,
                        "page yielded no listings and is not a zero-results page, suspected layout change"
                    );
                    degraded = true;
                } else {
                    debug!(run_id = %run_id, page, "no more listings");
                }
                break;
            }

            for node in &nodes {
                let raw = match adapter.parse_node(node, adapter.base_url()) {
                    Ok(raw) => raw,
                    Err(err) => {
                        parse_failures += 1;
                        debug!(run_id = %run_id, %err, "skipping unparseable listing");
                        continue;
                    }
                };
                match self
                    .normalizer
                    .normalize(&raw, adapter.site_key(), adapter.vocabulary(), Utc::now())
                {
                    // Only products inside the price bounds count toward the
                    // result cap.
                    Ok(product) if Self::within_price_bounds(&product, filters) => {
                        products.push(product)
                    }
                    Ok(product) => {
                        debug!(run_id = %run_id, price = %product.price, "listing outside price bounds");
                    }
                    Err(err) => {
                        parse_failures += 1;
                        debug!(run_id = %run_id, %err, "skipping unnormalizable listing");
                    }
                }
                if products.len() >= max_results {
                    debug!(run_id = %run_id, max_results, "result cap reached");
                    break 'pages;
                }
            }
        }

        let (events, storage_ok) = self.detect_changes(&products).await;
        if !storage_ok {
            degraded = true;
        }

        let result = ScrapeRunResult {
            run_id,
            site,
            search_term: term.to_string(),
            filters: filters.clone(),
            products,
            events,
            fetch_attempts,
            fetch_failures,
            parse_failures,
            started_at,
            finished_at: Utc::now(),
            degraded,
        };

        if let Some(notifier) = &self.notifier {
            notifier.deliver(&result).await;
        }
        Ok(result)
    }

    /// Price bounds apply to normalized prices, not the site's own filter
    /// params, so sites with lossy query filters still honor them exactly.
    fn within_price_bounds(product: &Product, filters: &SearchFilters) -> bool {
        if let Some(min) = filters.min_price {
            if product.price < min {
                return false;
            }
        }
        if let Some(max) = filters.max_price {
            if product.price > max {
                return false;
            }
        }
        true
    }

    /// Classifies every product against its stored state and records the new
    /// state. A storage failure stops detection and flags the run; products
    /// already collected are kept.
    async fn detect_changes(&self, products: &[Product]) -> (Vec<ChangeEvent>, bool) {
        let mut events = Vec::with_capacity(products.len());
        for product in products {
            let previous = match self.store.get_last_known(&product.identity).await {
                Ok(previous) => previous,
                Err(err) => {
                    warn!(%err, identity = %product.identity, "storage read failed, run degraded");
                    return (events, false);
                }
            };
            let event = self.detector.classify(product, previous.as_ref());
            events.push(event);

            let observation = PriceObservation::new(
                product.identity.clone(),
                product.price,
                product.collected_at,
            );
            if let Err(err) = self.record_state(observation, product).await {
                warn!(%err, identity = %product.identity, "storage write failed, run degraded");
                return (events, false);
            }
        }
        (events, true)
    }

    async fn record_state(
        &self,
        observation: PriceObservation,
        product: &Product,
    ) -> Result<(), StorageError> {
        self.store.put_observation(observation).await?;
        self.store.put_last_known(product).await
    }
}
