use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::models::{Availability, SearchFilters};
use crate::sites::{absolutize, first_attr, first_text, ListingNode, RawListing, SiteAdapter, SiteVocabulary};
use crate::utils::error::{ConfigError, ParseError};

const SITE_KEY: &str = "ebay";

/// eBay search results (`/sch/i.html`). Auction listings may carry a price
/// range; the result grid pads itself with "Shop on eBay" placeholder cards.
pub struct EbayAdapter {
    base_url: Url,
    search_url: Url,
    vocabulary: SiteVocabulary,
    node_selectors: Vec<Selector>,
    zero_results_selectors: Vec<Selector>,
    title_selectors: Vec<Selector>,
    url_selectors: Vec<Selector>,
    price_selectors: Vec<Selector>,
    availability_selectors: Vec<Selector>,
    seller_selector: Selector,
    rating_selectors: Vec<Selector>,
    reviews_selector: Selector,
    image_selectors: Vec<Selector>,
    native_id_re: Regex,
}

impl EbayAdapter {
    pub fn new() -> Self {
        let parse_all = |sources: &[&str]| -> Vec<Selector> {
            sources.iter().map(|s| Selector::parse(s).unwrap()).collect()
        };

        Self {
            base_url: Url::parse("https://www.ebay.com").unwrap(),
            search_url: Url::parse("https://www.ebay.com/sch/i.html").unwrap(),
            vocabulary: SiteVocabulary::new(
                "USD",
                &[
                    ("in stock", Availability::InStock),
                    ("available", Availability::InStock),
                    ("last one", Availability::InStock),
                    ("out of stock", Availability::OutOfStock),
                    ("sold out", Availability::OutOfStock),
                    ("currently unavailable", Availability::OutOfStock),
                ],
            ),
            node_selectors: parse_all(&[".s-item", ".sresult"]),
            zero_results_selectors: parse_all(&[".srp-save-null-search", ".srp-null"]),
            title_selectors: parse_all(&[".s-item__title", ".lvtitle"]),
            url_selectors: parse_all(&["a.s-item__link", ".lvtitle a"]),
            price_selectors: parse_all(&[".s-item__price", ".lvprice"]),
            availability_selectors: parse_all(&[".s-item__stock", ".s-item__quantityAvailable"]),
            seller_selector: Selector::parse(".s-item__seller-info-text").unwrap(),
            rating_selectors: parse_all(&[".x-star-rating .clipped", ".s-item__reviews .clipped"]),
            reviews_selector: Selector::parse(".s-item__reviews-count span").unwrap(),
            image_selectors: parse_all(&[".s-item__image-wrapper img", "img.s-item__image-img"]),
            native_id_re: Regex::new(r"/itm/(?:[^/]+/)?(\d+)").unwrap(),
        }
    }

    fn selectors<'a>(list: &'a [Selector]) -> Vec<&'a Selector> {
        list.iter().collect()
    }

    /// Result grids pad themselves with promo cards that look like listings.
    fn is_placeholder(&self, fragment: &Html) -> bool {
        match first_text(fragment, &Self::selectors(&self.title_selectors)) {
            Some(title) => title.eq_ignore_ascii_case("shop on ebay"),
            None => false,
        }
    }
}

impl Default for EbayAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteAdapter for EbayAdapter {
    fn site_key(&self) -> &'static str {
        SITE_KEY
    }

    fn base_url(&self) -> &Url {
        &self.base_url
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

        let mut url = self.search_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("_nkw", term.trim());
            if let Some(min) = filters.min_price {
                pairs.append_pair("_udlo", &min.to_string());
            }
            if let Some(max) = filters.max_price {
                pairs.append_pair("_udhi", &max.to_string());
            }
            if filters.buy_it_now_only {
                pairs.append_pair("LH_BIN", "1");
            }
            if page > 1 {
                pairs.append_pair("_pgn", &page.to_string());
            }
        }
        Ok(url)
    }

    fn extract_listing_nodes(&self, body: &str) -> Vec<ListingNode> {
        let document = Html::parse_document(body);
        for selector in &self.node_selectors {
            let nodes: Vec<ListingNode> = document
                .select(selector)
                .map(|el| ListingNode::new(el.html()))
                .filter(|node| !self.is_placeholder(&node.fragment()))
                .collect();
            if !nodes.is_empty() {
                return nodes;
            }
        }
        Vec::new()
    }

    fn is_zero_results_page(&self, body: &str) -> bool {
        let document = Html::parse_document(body);
        self.zero_results_selectors
            .iter()
            .any(|selector| document.select(selector).next().is_some())
            || body.contains("0 results found")
    }

    fn parse_node(&self, node: &ListingNode, base_url: &Url) -> Result<RawListing, ParseError> {
        let fragment = node.fragment();

        let mut title = first_text(&fragment, &Self::selectors(&self.title_selectors))
            .ok_or(ParseError::MissingField("title"))?;
        // Fresh auction titles are prefixed with a "New Listing" badge.
        if let Some(stripped) = title.strip_prefix("New Listing") {
            title = stripped.trim().to_string();
        }

        let price_text = first_text(&fragment, &Self::selectors(&self.price_selectors))
            .ok_or(ParseError::MissingField("price"))?;
        // Auction ranges read "$10.00 to $25.00"; track the low bound.
        let price_text = match price_text.split_once(" to ") {
            Some((low, _)) => low.trim().to_string(),
            None => price_text,
        };

        let href = first_attr(&fragment, &Self::selectors(&self.url_selectors), &["href"])
            .ok_or(ParseError::MissingField("url"))?;
        let url = absolutize(&href, base_url).ok_or(ParseError::Url(href.clone()))?;

        let native_id = self.native_id_re.captures(&url).map(|caps| caps[1].to_string());

        Ok(RawListing {
            native_id,
            title,
            price_text,
            availability_text: first_text(&fragment, &Self::selectors(&self.availability_selectors)),
            url,
            image_url: first_attr(
                &fragment,
                &Self::selectors(&self.image_selectors),
                &["src", "data-src", "data-lazy-src", "data-original"],
            ),
            rating_text: first_text(&fragment, &Self::selectors(&self.rating_selectors)),
            review_count_text: first_text(&fragment, &[&self.reviews_selector]),
            seller: first_text(&fragment, &[&self.seller_selector]),
        })
    }
}
