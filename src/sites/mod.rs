use scraper::{Html, Selector};
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

use crate::models::{Availability, SearchFilters};
use crate::utils::error::{ConfigError, ParseError};
use crate::utils::text::clean_text;

pub mod ebay;
pub mod mercadolivre;

pub use ebay::EbayAdapter;
pub use mercadolivre::MercadoLivreAdapter;

/// One candidate product block, carried as its outer HTML so it stays opaque
/// to everything between extraction and parsing.
#[derive(Debug, Clone)]
pub struct ListingNode {
    html: String,
}

impl ListingNode {
    pub fn new(html: String) -> Self {
        Self { html }
    }

    pub fn fragment(&self) -> Html {
        Html::parse_fragment(&self.html)
    }

    pub fn html(&self) -> &str {
        &self.html
    }
}

/// Field mapping extracted from one listing node, before normalization.
/// Required fields are already enforced by the adapter; everything optional
/// stays `None` when the site didn't render it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawListing {
    pub native_id: Option<String>,
    pub title: String,
    pub price_text: String,
    pub availability_text: Option<String>,
    pub url: String,
    pub image_url: Option<String>,
    pub rating_text: Option<String>,
    pub review_count_text: Option<String>,
    pub seller: Option<String>,
}

/// Per-site wording for stock state plus the currency assumed when the price
/// text carries no explicit symbol.
#[derive(Debug, Clone)]
pub struct SiteVocabulary {
    pub default_currency: String,
    availability: Vec<(String, Availability)>,
}

impl SiteVocabulary {
    pub fn new(default_currency: &str, availability: &[(&str, Availability)]) -> Self {
        Self {
            default_currency: default_currency.to_string(),
            availability: availability
                .iter()
                .map(|(text, level)| (text.to_lowercase(), *level))
                .collect(),
        }
    }

    /// Unrecognized wording maps to `Unknown`, never to an error.
    pub fn classify(&self, text: Option<&str>) -> Availability {
        let Some(text) = text else {
            return Availability::Unknown;
        };
        let lowered = text.to_lowercase();
        for (phrase, level) in &self.availability {
            if lowered.contains(phrase) {
                return *level;
            }
        }
        Availability::Unknown
    }
}

/// Site-specific scraping capability: URL construction, node location and
/// per-node field extraction. Implementations are looked up through the
/// registry, which is the only seam needed to support a new site.
pub trait SiteAdapter: Send + Sync {
    fn site_key(&self) -> &'static str;
    fn base_url(&self) -> &Url;
    fn vocabulary(&self) -> &SiteVocabulary;

    /// Deterministic search URL for one result page. Filters the site cannot
    /// express fail with `ConfigError` instead of being silently dropped.
    fn build_search_url(
        &self,
        term: &str,
        filters: &SearchFilters,
        page: u32,
    ) -> Result<Url, ConfigError>;

    /// Locates candidate product blocks. An empty vec is the normal outcome
    /// for a page that states it has no results.
    fn extract_listing_nodes(&self, body: &str) -> Vec<ListingNode>;

    /// Whether the page structurally declares "no results". Distinguishes a
    /// genuine empty search from a layout change that broke extraction.
    fn is_zero_results_page(&self, body: &str) -> bool;

    fn parse_node(&self, node: &ListingNode, base_url: &Url) -> Result<RawListing, ParseError>;
}

/// Adapters registered by site key at process start. Unknown keys fail with
/// `ConfigError::UnknownSite`.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn SiteAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_sites() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MercadoLivreAdapter::new()));
        registry.register(Arc::new(EbayAdapter::new()));
        registry.register_alias("ml", "mercadolivre");
        registry.register_alias("mercado_livre", "mercadolivre");
        registry
    }

    pub fn register(&mut self, adapter: Arc<dyn SiteAdapter>) {
        self.adapters.insert(adapter.site_key().to_string(), adapter);
    }

    pub fn register_alias(&mut self, alias: &str, site_key: &str) {
        if let Some(adapter) = self.adapters.get(site_key).cloned() {
            self.adapters.insert(alias.to_string(), adapter);
        }
    }

    pub fn get(&self, site_key: &str) -> Result<Arc<dyn SiteAdapter>, ConfigError> {
        let normalized = site_key.trim().to_lowercase();
        self.adapters
            .get(&normalized)
            .cloned()
            .ok_or(ConfigError::UnknownSite(site_key.to_string()))
    }

    pub fn site_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.adapters.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

/// First non-empty text match among the given selectors, cleaned.
pub(crate) fn first_text(fragment: &Html, selectors: &[&Selector]) -> Option<String> {
    for selector in selectors {
        if let Some(element) = fragment.select(selector).next() {
            let text = clean_text(&element.text().collect::<Vec<_>>().join(" "));
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// First present attribute among `attrs` on the first element matching any
/// selector. Sites lazy-load images behind data-src variants.
pub(crate) fn first_attr(
    fragment: &Html,
    selectors: &[&Selector],
    attrs: &[&str],
) -> Option<String> {
    for selector in selectors {
        for element in fragment.select(selector) {
            for attr in attrs {
                if let Some(value) = element.value().attr(attr) {
                    let value = value.trim();
                    if !value.is_empty() {
                        return Some(value.to_string());
                    }
                }
            }
        }
    }
    None
}

/// Resolves possibly-relative hrefs against the site base.
pub(crate) fn absolutize(href: &str, base: &Url) -> Option<String> {
    base.join(href).ok().map(|u| u.to_string())
}
