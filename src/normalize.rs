use std::str::FromStr;

use chrono::{DateTime, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use url::Url;

use crate::models::{IdentityKey, Product};
use crate::sites::{RawListing, SiteVocabulary};
use crate::utils::error::ParseError;
use crate::utils::text::clean_text;

/// Currency symbols checked longest-first so "R$" wins over "$".
const CURRENCY_SYMBOLS: &[(&str, &str)] = &[
    ("R$", "BRL"),
    ("US$", "USD"),
    ("£", "GBP"),
    ("€", "EUR"),
    ("¥", "JPY"),
    ("$", "USD"),
];

const CURRENCY_CODES: &[&str] = &["BRL", "USD", "EUR", "GBP", "JPY"];

/// Converts site-specific raw listings into canonical [`Product`] records:
/// locale-aware price parsing, availability vocabulary mapping and a stable
/// identity key.
pub struct Normalizer {
    number_re: Regex,
    rating_re: Regex,
    digits_re: Regex,
}

impl Normalizer {
    pub fn new() -> Self {
        Self {
            number_re: Regex::new(r"(-?)\s*([0-9][0-9.,]*)").unwrap(),
            rating_re: Regex::new(r"([0-9]+(?:[.,][0-9]+)?)").unwrap(),
            digits_re: Regex::new(r"[0-9]+").unwrap(),
        }
    }

    pub fn normalize(
        &self,
        raw: &RawListing,
        site: &str,
        vocabulary: &SiteVocabulary,
        collected_at: DateTime<Utc>,
    ) -> Result<Product, ParseError> {
        let title = clean_text(&raw.title);
        if title.is_empty() {
            return Err(ParseError::EmptyTitle);
        }

        let (price, currency) =
            self.parse_price(&raw.price_text, &vocabulary.default_currency)?;

        let url = Url::parse(&raw.url).map_err(|_| ParseError::Url(raw.url.clone()))?;

        let identity = match &raw.native_id {
            Some(id) => IdentityKey::native(site, id),
            None => IdentityKey::derived(site, &title, raw.seller.as_deref()),
        };

        Ok(Product {
            identity,
            title,
            price,
            currency,
            availability: vocabulary.classify(raw.availability_text.as_deref()),
            url: url.to_string(),
            image_url: raw.image_url.as_deref().map(|s| s.trim().to_string()),
            rating: raw.rating_text.as_deref().and_then(|t| self.parse_rating(t)),
            review_count: raw
                .review_count_text
                .as_deref()
                .and_then(|t| self.parse_review_count(t)),
            collected_at,
            site: site.to_string(),
        })
    }

    /// Parses a displayed price into a [`Decimal`] plus ISO currency code.
    ///
    /// Separator rules: when both `.` and `,` appear, the rightmost one is the
    /// decimal separator. A lone separator followed by exactly three digits is
    /// a thousands separator ("4.299" is 4299, not 4.299).
    pub fn parse_price(
        &self,
        text: &str,
        default_currency: &str,
    ) -> Result<(Decimal, String), ParseError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ParseError::MissingField("price"));
        }

        let currency = self.detect_currency(text, default_currency);

        let caps = self
            .number_re
            .captures(text)
            .ok_or_else(|| ParseError::Price(text.to_string()))?;
        let negative = !caps[1].is_empty();
        let digits = Self::canonicalize_separators(&caps[2]);

        let value =
            Decimal::from_str(&digits).map_err(|_| ParseError::Price(text.to_string()))?;
        if negative {
            return Err(ParseError::NegativePrice(-value));
        }
        Ok((value, currency))
    }

    fn detect_currency(&self, text: &str, default_currency: &str) -> String {
        for (symbol, code) in CURRENCY_SYMBOLS {
            if text.contains(symbol) {
                return (*code).to_string();
            }
        }
        for code in CURRENCY_CODES {
            if text.contains(code) {
                return (*code).to_string();
            }
        }
        default_currency.to_string()
    }

    /// Rewrites a locale-formatted number into `1234.56` form.
    fn canonicalize_separators(token: &str) -> String {
        let last_dot = token.rfind('.');
        let last_comma = token.rfind(',');

        match (last_dot, last_comma) {
            (Some(dot), Some(comma)) => {
                let (decimal_sep, thousands_sep) = if dot > comma { ('.', ',') } else { (',', '.') };
                token
                    .replace(thousands_sep, "")
                    .replace(decimal_sep, ".")
            }
            (Some(pos), None) | (None, Some(pos)) => {
                let trailing = token.len() - pos - 1;
                let single = token.matches(['.', ',']).count() == 1;
                if single && trailing > 0 && trailing <= 2 {
                    token.replace(',', ".")
                } else {
                    // Grouped thousands, possibly repeated ("1.234.567").
                    token.replace(['.', ','], "")
                }
            }
            (None, None) => token.to_string(),
        }
    }

    /// First number in the text, scaled to a 0..=5 range. Ten-point scores
    /// are halved.
    fn parse_rating(&self, text: &str) -> Option<f32> {
        let caps = self.rating_re.captures(text)?;
        let mut value: f32 = caps[1].replace(',', ".").parse().ok()?;
        if value > 5.0 && value <= 10.0 {
            value /= 2.0;
        }
        if !(0.0..=5.0).contains(&value) {
            return None;
        }
        Some(value)
    }

    /// Digits only, with thousands grouping collapsed ("(1.532)" is 1532).
    fn parse_review_count(&self, text: &str) -> Option<u32> {
        let joined: String = self
            .digits_re
            .find_iter(text)
            .map(|m| m.as_str())
            .collect();
        if joined.is_empty() {
            return None;
        }
        joined.parse().ok()
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}
