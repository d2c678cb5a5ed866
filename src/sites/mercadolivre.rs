use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::models::{Availability, SearchFilters};
use crate::sites::{absolutize, first_attr, first_text, ListingNode, RawListing, SiteAdapter, SiteVocabulary};
use crate::utils::error::{ConfigError, ParseError};

const SITE_KEY: &str = "mercadolivre";

/// Mercado Livre (Brazil) search results. Prices are pt-BR formatted BRL and
/// listings expose a native `MLB-…` id in their URLs.
pub struct MercadoLivreAdapter {
    base_url: Url,
    search_url: Url,
    vocabulary: SiteVocabulary,
    node_selectors: Vec<Selector>,
    zero_results_selector: Selector,
    title_selectors: Vec<Selector>,
    url_selectors: Vec<Selector>,
    price_selectors: Vec<Selector>,
    availability_selectors: Vec<Selector>,
    seller_selectors: Vec<Selector>,
    rating_selector: Selector,
    reviews_selector: Selector,
    image_selectors: Vec<Selector>,
    native_id_re: Regex,
}

impl MercadoLivreAdapter {
    pub fn new() -> Self {
        let parse_all = |sources: &[&str]| -> Vec<Selector> {
            sources.iter().map(|s| Selector::parse(s).unwrap()).collect()
        };

        Self {
            base_url: Url::parse("https://www.mercadolivre.com.br").unwrap(),
            search_url: Url::parse("https://lista.mercadolivre.com.br").unwrap(),
            vocabulary: SiteVocabulary::new(
                "BRL",
                &[
                    ("em estoque", Availability::InStock),
                    ("disponível", Availability::InStock),
                    ("último disponível", Availability::InStock),
                    ("esgotado", Availability::OutOfStock),
                    ("sem estoque", Availability::OutOfStock),
                    ("indisponível", Availability::OutOfStock),
                ],
            ),
            // Selector lists cover the site's layout generations; first hit wins.
            node_selectors: parse_all(&[".ui-search-result", ".results-item", ".item"]),
            zero_results_selector: Selector::parse(".ui-search-rescue").unwrap(),
            title_selectors: parse_all(&[".ui-search-item__title", ".item__title", "h2 a"]),
            url_selectors: parse_all(&[
                ".ui-search-item__group__element a",
                ".ui-search-link",
                r#"a[href*="/MLB"]"#,
            ]),
            price_selectors: parse_all(&[
                ".price-tag-amount",
                ".ui-search-price__second-line .andes-money-amount",
                ".item__price",
            ]),
            availability_selectors: parse_all(&[".ui-search-item__stock", ".item__availability"]),
            seller_selectors: parse_all(&[
                ".ui-search-item__group__element--seller",
                ".item__seller",
            ]),
            rating_selector: Selector::parse(".ui-search-reviews__rating-number").unwrap(),
            reviews_selector: Selector::parse(".ui-search-reviews__amount").unwrap(),
            image_selectors: parse_all(&[".ui-search-result-image__element img", ".item__image img"]),
            native_id_re: Regex::new(r"MLB-?(\d+)").unwrap(),
        }
    }

    fn selectors<'a>(list: &'a [Selector]) -> Vec<&'a Selector> {
        list.iter().collect()
    }
}

impl Default for MercadoLivreAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteAdapter for MercadoLivreAdapter {
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
        if filters.buy_it_now_only {
            return Err(ConfigError::UnsupportedFilter {
                site: SITE_KEY.to_string(),
                filter: "buy_it_now_only",
            });
        }

        let slug: String = term
            .trim()
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-");
        let mut url = self
            .search_url
            .join(&slug)
            .map_err(|e| ConfigError::InvalidFilter(format!("search term {:?}: {}", term, e)))?;

        {
            let mut pairs = url.query_pairs_mut();
            if let Some(min) = filters.min_price {
                pairs.append_pair("precio_desde", &min.trunc().to_string());
            }
            if let Some(max) = filters.max_price {
                pairs.append_pair("precio_hasta", &max.trunc().to_string());
            }
            if page > 1 {
                pairs.append_pair("page", &page.to_string());
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
                .collect();
            if !nodes.is_empty() {
                return nodes;
            }
        }
        Vec::new()
    }

    fn is_zero_results_page(&self, body: &str) -> bool {
        let document = Html::parse_document(body);
        document.select(&self.zero_results_selector).next().is_some()
            || body.contains("Não há anúncios que coincidam com sua busca")
    }

    fn parse_node(&self, node: &ListingNode, base_url: &Url) -> Result<RawListing, ParseError> {
        let fragment = node.fragment();

        let title = first_text(&fragment, &Self::selectors(&self.title_selectors))
            .ok_or(ParseError::MissingField("title"))?;
        let price_text = first_text(&fragment, &Self::selectors(&self.price_selectors))
            .ok_or(ParseError::MissingField("price"))?;
        let href = first_attr(&fragment, &Self::selectors(&self.url_selectors), &["href"])
            .ok_or(ParseError::MissingField("url"))?;
        let url = absolutize(&href, base_url).ok_or(ParseError::Url(href.clone()))?;

        let native_id = self
            .native_id_re
            .captures(&url)
            .map(|caps| format!("MLB{}", &caps[1]));

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
            rating_text: first_text(&fragment, &[&self.rating_selector]),
            review_count_text: first_text(&fragment, &[&self.reviews_selector]),
            seller: first_text(&fragment, &Self::selectors(&self.seller_selectors)),
        })
    }
}
