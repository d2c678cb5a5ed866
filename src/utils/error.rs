use rust_decimal::Decimal;
use thiserror::Error;

/// Fatal to the specific call. Surfaced to the caller immediately, never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown site: {0}")]
    UnknownSite(String),

    #[error("filter '{filter}' is not supported by {site}")]
    UnsupportedFilter { site: String, filter: &'static str },

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Network,
    Timeout,
    Http4xx,
    Http5xx,
    RateLimited,
    RobotsDenied,
}

impl FetchErrorKind {
    /// Transport failures, timeouts, 5xx and 429 are retried with backoff.
    /// Other client errors are not: retrying a 404 wastes the request budget.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchErrorKind::Network
                | FetchErrorKind::Timeout
                | FetchErrorKind::Http5xx
                | FetchErrorKind::RateLimited
        )
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("fetch failed for {url}: {kind:?} (status {status:?}, {attempts} attempt(s))")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub url: String,
    pub status: Option<u16>,
    pub attempts: u32,
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// Always node-scoped: a bad listing block is counted and skipped, never
/// aborting the run it belongs to.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("unparsable price text: {0:?}")]
    Price(String),

    #[error("negative price: {0}")]
    NegativePrice(Decimal),

    #[error("empty title")]
    EmptyTitle,

    #[error("invalid url: {0:?}")]
    Url(String),
}

impl ParseError {
    /// The field name reported in counters and logs.
    pub fn field(&self) -> &'static str {
        match self {
            ParseError::MissingField(field) => field,
            ParseError::Price(_) | ParseError::NegativePrice(_) => "price",
            ParseError::EmptyTitle => "title",
            ParseError::Url(_) => "url",
        }
    }
}

/// Propagated from the persistence collaborator. Aborts the current run
/// (marked degraded) without corrupting results already returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("storage operation failed: {0}")]
    Operation(String),
}

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
