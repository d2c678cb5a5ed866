//! End-to-end runs against a mocked marketplace: wiremock serves the result
//! pages, a stub adapter parses them, and assertions land on the run result.

use std::sync::Arc;

use chrono::Utc;
use regex::Regex;
use rust_decimal::Decimal;
use scraper::{Html, Selector};
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pricewatch::config::{decimal, AppConfig};
use pricewatch::fetch::FetchClient;
use pricewatch::models::{
    Availability, ChangeKind, IdentityKey, Product, ScrapeRunResult, SearchFilters,
};
use pricewatch::orchestrator::ScrapeOrchestrator;
use pricewatch::rate::RateGovernor;
use pricewatch::robots::AllowAll;
use pricewatch::sites::{
    AdapterRegistry, ListingNode, RawListing, SiteAdapter, SiteVocabulary,
};
use pricewatch::store::{MemoryStore, ProductStore};
use pricewatch::utils::error::{ConfigError, ParseError};

const ZERO_RESULTS_MARKER: &str = "zero-results";

struct TestMarket {
    base: Url,
    vocabulary: SiteVocabulary,
    node_selector: Selector,
    title_selector: Selector,
    price_selector: Selector,
    stock_selector: Selector,
    link_selector: Selector,
    id_re: Regex,
}

impl TestMarket {
    fn new(base: Url) -> Self {
        Self {
            base,
            vocabulary: SiteVocabulary::new(
                "USD",
                &[
                    ("in stock", Availability::InStock),
                    ("sold out", Availability::OutOfStock),
                ],
            ),
            node_selector: Selector::parse(".listing").unwrap(),
            title_selector: Selector::parse(".title").unwrap(),
            price_selector: Selector::parse(".price").unwrap(),
            stock_selector: Selector::parse(".stock").unwrap(),
            link_selector: Selector::parse("a").unwrap(),
            id_re: Regex::new(r"/p/(\d+)").unwrap(),
        }
    }

    fn text_of(fragment: &Html, selector: &Selector) -> Option<String> {
        fragment
            .select(selector)
            .next()
            .map(|el| el.text().collect::<Vec<_>>().join(" ").trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

impl SiteAdapter for TestMarket {
    fn site_key(&self) -> &'static str {
        "testmarket"
    }

    fn base_url(&self) -> &Url {
        &self.base
    }

    fn vocabulary(&self) -> &SiteVocabulary {
        &self.vocabulary
    }

    fn build_search_url(
        &self,
        term: &str,
        filters: &SearchFilters,
        page: u32,
    ) -> Result<Url, ConfigError> {
        filters.validate()?;
        let mut url = self
            .base
            .join("/search")
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("q", term)
            .append_pair("page", &page.to_string());
        Ok(url)
    }

    fn extract_listing_nodes(&self, body: &str) -> Vec<ListingNode> {
        Html::parse_document(body)
            .select(&self.node_selector)
            .map(|el| ListingNode::new(el.html()))
            .collect()
    }

    fn is_zero_results_page(&self, body: &str) -> bool {
        body.contains(ZERO_RESULTS_MARKER)
    }

    fn parse_node(&self, node: &ListingNode, base_url: &Url) -> Result<RawListing, ParseError> {
        let fragment = node.fragment();
        let title = Self::text_of(&fragment, &self.title_selector)
            .ok_or(ParseError::MissingField("title"))?;
        let price_text = Self::text_of(&fragment, &self.price_selector)
            .ok_or(ParseError::MissingField("price"))?;
        let href = fragment
            .select(&self.link_selector)
            .next()
            .and_then(|el| el.value().attr("href"))
            .ok_or(ParseError::MissingField("url"))?;
        let url = base_url
            .join(href)
            .map_err(|_| ParseError::Url(href.to_string()))?
            .to_string();
        let native_id = self.id_re.captures(&url).map(|c| c[1].to_string());

        Ok(RawListing {
            native_id,
            title,
            price_text,
            availability_text: Self::text_of(&fragment, &self.stock_selector),
            url,
            ..Default::default()
        })
    }
}

fn listing_html(id: u32, title: &str, price: Option<&str>, stock: &str) -> String {
    let price_span = price
        .map(|p| format!(r#"<span class="price">{}</span>"#, p))
        .unwrap_or_default();
    format!(
        r#"<div class="listing"><a href="/p/{id}"><span class="title">{title}</span></a>{price_span}<span class="stock">{stock}</span></div>"#
    )
}

fn results_page(listings: &[String]) -> String {
    format!("<html><body><ol>{}</ol></body></html>", listings.join("\n"))
}

fn empty_tail_page() -> String {
    format!(
        r#"<html><body><p class="{}">no more results</p></body></html>"#,
        ZERO_RESULTS_MARKER
    )
}

fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.scraper.min_interval_ms = 0;
    config.scraper.jitter_max_ms = 0;
    config.scraper.max_retries = 1;
    config.scraper.retry_base_delay_ms = 1;
    config.scraper.retry_max_delay_ms = 5;
    config.scraper.request_timeout_secs = 5;
    config.scraper.max_pages = 3;
    config
}

struct Harness {
    server: MockServer,
    orchestrator: ScrapeOrchestrator,
    store: Arc<MemoryStore>,
}

async fn harness_with(config: AppConfig) -> Harness {
    let server = MockServer::start().await;
    let base = Url::parse(&server.uri()).unwrap();

    let mut registry = AdapterRegistry::new();
    registry.register(Arc::new(TestMarket::new(base)));

    let governor = Arc::new(RateGovernor::new(&config.scraper));
    let fetch = FetchClient::new(&config.scraper, governor, Arc::new(AllowAll)).unwrap();
    let store = Arc::new(MemoryStore::new());
    let orchestrator = ScrapeOrchestrator::new(&config, registry, fetch, store.clone());

    Harness {
        server,
        orchestrator,
        store,
    }
}

async fn harness() -> Harness {
    harness_with(test_config()).await
}

async fn mount_page(server: &MockServer, page: u32, body: String) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("page", page.to_string().as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn run(harness: &Harness, filters: &SearchFilters) -> ScrapeRunResult {
    harness
        .orchestrator
        .run("testmarket", "gadget", filters)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_unparseable_listing_is_skipped_not_fatal() {
    let h = harness().await;
    let listings: Vec<String> = (1..=10)
        .map(|i| {
            let price = if i == 4 { None } else { Some("$10.00") };
            listing_html(i, &format!("Gadget {}", i), price, "in stock")
        })
        .collect();
    mount_page(&h.server, 1, results_page(&listings)).await;
    mount_page(&h.server, 2, empty_tail_page()).await;

    let result = run(&h, &SearchFilters::default()).await;

    assert_eq!(result.products.len(), 9);
    assert_eq!(result.parse_failures, 1);
    assert_eq!(result.fetch_failures, 0);
    assert!(!result.degraded);
    assert!(result.products.iter().all(|p| p.site == "testmarket"));
    // Every product is a first sighting.
    assert!(result.events.iter().all(|e| e.kind == ChangeKind::New));
}

#[tokio::test]
async fn test_price_drop_detected_across_runs() {
    let h = harness().await;
    let previous = Product {
        identity: IdentityKey::native("testmarket", "1"),
        title: "Gadget 1".into(),
        price: decimal("100.00"),
        currency: "USD".into(),
        availability: Availability::InStock,
        url: "https://example.com/p/1".into(),
        image_url: None,
        rating: None,
        review_count: None,
        collected_at: Utc::now(),
        site: "testmarket".into(),
    };
    h.store.put_last_known(&previous).await.unwrap();

    let listings = vec![listing_html(1, "Gadget 1", Some("$85.00"), "in stock")];
    mount_page(&h.server, 1, results_page(&listings)).await;
    mount_page(&h.server, 2, empty_tail_page()).await;

    let result = run(&h, &SearchFilters::default()).await;

    assert_eq!(result.events.len(), 1);
    let event = &result.events[0];
    assert_eq!(event.kind, ChangeKind::PriceDrop);
    assert_eq!(event.previous_price, Some(decimal("100.00")));
    assert_eq!(event.new_price, decimal("85.00"));
    assert_eq!(event.magnitude, Some(decimal("0.15")));

    // The stored state now reflects the new price.
    let stored = h
        .store
        .get_last_known(&IdentityKey::native("testmarket", "1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.price, decimal("85.00"));
}

#[tokio::test]
async fn test_price_filters_apply_to_normalized_prices() {
    let h = harness().await;
    let prices = ["$300.00", "$600.00", "$1000.00", "$1500.00", "$2000.00"];
    let listings: Vec<String> = prices
        .iter()
        .enumerate()
        .map(|(i, p)| listing_html(i as u32 + 1, &format!("Gadget {}", i + 1), Some(p), "in stock"))
        .collect();
    mount_page(&h.server, 1, results_page(&listings)).await;
    mount_page(&h.server, 2, empty_tail_page()).await;

    let filters = SearchFilters {
        min_price: Some(decimal("500")),
        max_price: Some(decimal("1500")),
        ..Default::default()
    };
    let result = run(&h, &filters).await;

    let kept: Vec<Decimal> = result.products.iter().map(|p| p.price).collect();
    assert_eq!(kept, vec![decimal("600"), decimal("1000"), decimal("1500")]);
    assert!(!result.degraded);
}

#[tokio::test]
async fn test_result_cap_counts_only_products_within_bounds() {
    let h = harness().await;
    // Cheap listings interleaved with ones the bounds keep.
    let listings: Vec<String> = (1..=10)
        .map(|i| {
            let price = if i % 2 == 0 { "$1000.00" } else { "$1.00" };
            listing_html(i, &format!("Gadget {}", i), Some(price), "in stock")
        })
        .collect();
    mount_page(&h.server, 1, results_page(&listings)).await;

    let filters = SearchFilters {
        min_price: Some(decimal("500")),
        max_results: Some(3),
        ..Default::default()
    };
    let result = run(&h, &filters).await;

    assert_eq!(result.products.len(), 3);
    assert!(result.products.iter().all(|p| p.price >= decimal("500")));
}

#[tokio::test]
async fn test_max_results_caps_collection() {
    let h = harness().await;
    let listings: Vec<String> = (1..=10)
        .map(|i| listing_html(i, &format!("Gadget {}", i), Some("$10.00"), "in stock"))
        .collect();
    mount_page(&h.server, 1, results_page(&listings)).await;

    let filters = SearchFilters {
        max_results: Some(3),
        ..Default::default()
    };
    let result = run(&h, &filters).await;
    assert_eq!(result.products.len(), 3);
}

#[tokio::test]
async fn test_initial_fetch_failure_degrades_run() {
    let h = harness().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&h.server)
        .await;

    let result = run(&h, &SearchFilters::default()).await;

    assert!(result.degraded);
    assert!(result.products.is_empty());
    assert_eq!(result.fetch_failures, 1);
    // max_retries = 1 in the test config: one retry after the first attempt.
    assert_eq!(result.fetch_attempts, 2);
}

#[tokio::test]
async fn test_empty_first_page_without_marker_degrades_run() {
    let h = harness().await;
    mount_page(&h.server, 1, "<html><body><p>redesigned page</p></body></html>".into()).await;

    let result = run(&h, &SearchFilters::default()).await;
    assert!(result.degraded);
    assert!(result.products.is_empty());
}

#[tokio::test]
async fn test_genuine_zero_results_is_not_degraded() {
    let h = harness().await;
    mount_page(&h.server, 1, empty_tail_page()).await;

    let result = run(&h, &SearchFilters::default()).await;
    assert!(!result.degraded);
    assert!(result.products.is_empty());
    assert!(result.events.is_empty());
}

#[tokio::test]
async fn test_mid_run_fetch_failure_keeps_first_page() {
    let h = harness().await;
    let listings = vec![listing_html(1, "Gadget 1", Some("$10.00"), "in stock")];
    mount_page(&h.server, 1, results_page(&listings)).await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&h.server)
        .await;

    let result = run(&h, &SearchFilters::default()).await;

    assert_eq!(result.products.len(), 1);
    assert_eq!(result.fetch_failures, 1);
    assert!(!result.degraded);
}

#[tokio::test]
async fn test_unknown_site_is_an_error() {
    let h = harness().await;
    let err = h
        .orchestrator
        .run("nosuchsite", "gadget", &SearchFilters::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("nosuchsite"));
}

#[tokio::test]
async fn test_cancellation_stops_pagination() {
    let h = harness().await;
    let listings = vec![listing_html(1, "Gadget 1", Some("$10.00"), "in stock")];
    mount_page(&h.server, 1, results_page(&listings)).await;
    mount_page(&h.server, 2, empty_tail_page()).await;

    h.orchestrator.cancel_handle().cancel();
    let result = run(&h, &SearchFilters::default()).await;

    assert!(result.products.is_empty());
    assert_eq!(result.fetch_attempts, 0);
}

#[tokio::test]
async fn test_out_of_stock_transition_detected() {
    let h = harness().await;
    let listings = vec![listing_html(1, "Gadget 1", Some("$10.00"), "sold out")];
    mount_page(&h.server, 1, results_page(&listings)).await;
    mount_page(&h.server, 2, empty_tail_page()).await;

    // First run records the in-stock state.
    let in_stock = Product {
        identity: IdentityKey::native("testmarket", "1"),
        title: "Gadget 1".into(),
        price: decimal("10.00"),
        currency: "USD".into(),
        availability: Availability::InStock,
        url: "https://example.com/p/1".into(),
        image_url: None,
        rating: None,
        review_count: None,
        collected_at: Utc::now(),
        site: "testmarket".into(),
    };
    h.store.put_last_known(&in_stock).await.unwrap();

    let result = run(&h, &SearchFilters::default()).await;
    assert_eq!(result.events.len(), 1);
    assert_eq!(result.events[0].kind, ChangeKind::OutOfStock);
}
