use config::{Config, ConfigError as SourceError, Environment, File};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::str::FromStr;

use crate::models::SearchFilters;
use crate::utils::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub scraper: ScraperConfig,
    pub detector: DetectorConfig,
    pub jobs: Vec<JobConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Baseline spacing between requests to the same site, in milliseconds.
    /// Negative values are tolerated and clamped to zero at use.
    pub min_interval_ms: i64,
    pub jitter_max_ms: u64,
    /// Per-site overrides of `min_interval_ms`, keyed by site key.
    pub site_intervals_ms: HashMap<String, i64>,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub max_results: usize,
    pub max_pages: u32,
    pub user_agents: Vec<String>,
    pub respect_robots: bool,
    pub robots_ttl_secs: u64,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 2000,
            jitter_max_ms: 500,
            site_intervals_ms: HashMap::new(),
            max_retries: 3,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 10_000,
            request_timeout_secs: 30,
            max_results: 50,
            max_pages: 10,
            user_agents: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".into(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15".into(),
                "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0".into(),
            ],
            respect_robots: true,
            robots_ttl_secs: 86_400,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Price deltas at or below this many currency units are treated as noise.
    pub noise_threshold: Decimal,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            noise_threshold: Decimal::new(1, 2), // 0.01
        }
    }
}

/// A recurring search this process is expected to run. Only the description
/// lives here; wiring it to a cron loop is the scheduler collaborator's job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub site: String,
    pub term: String,
    #[serde(default)]
    pub min_price: Option<Decimal>,
    #[serde(default)]
    pub max_price: Option<Decimal>,
    #[serde(default)]
    pub max_results: Option<usize>,
}

impl JobConfig {
    pub fn filters(&self) -> SearchFilters {
        SearchFilters {
            min_price: self.min_price,
            max_price: self.max_price,
            max_results: self.max_results,
            buy_it_now_only: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("PRICEWATCH").separator("__"))
            .build()
            .map_err(source_error)?;

        let config: AppConfig = s.try_deserialize().map_err(source_error)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scraper.max_pages == 0 {
            return Err(ConfigError::Invalid("scraper.max_pages must be greater than 0".into()));
        }
        if self.scraper.max_results == 0 {
            return Err(ConfigError::Invalid("scraper.max_results must be greater than 0".into()));
        }
        if self.scraper.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "scraper.request_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.scraper.user_agents.is_empty() {
            return Err(ConfigError::Invalid("scraper.user_agents must not be empty".into()));
        }
        if self.scraper.retry_base_delay_ms > self.scraper.retry_max_delay_ms {
            return Err(ConfigError::Invalid(
                "scraper.retry_base_delay_ms cannot exceed retry_max_delay_ms".into(),
            ));
        }
        if self.detector.noise_threshold < Decimal::ZERO {
            return Err(ConfigError::Invalid(
                "detector.noise_threshold must not be negative".into(),
            ));
        }
        for job in &self.jobs {
            if job.site.trim().is_empty() || job.term.trim().is_empty() {
                return Err(ConfigError::Invalid("jobs entries need both site and term".into()));
            }
        }
        Ok(())
    }
}

/// Convenience for tests and examples.
pub fn decimal(text: &str) -> Decimal {
    Decimal::from_str(text).expect("literal decimal")
}

fn source_error(err: SourceError) -> ConfigError {
    ConfigError::Invalid(err.to_string())
}
