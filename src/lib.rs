pub mod config;
pub mod detect;
pub mod fetch;
pub mod models;
pub mod normalize;
pub mod notify;
pub mod orchestrator;
pub mod rate;
pub mod robots;
pub mod schedule;
pub mod sites;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use orchestrator::ScrapeOrchestrator;
pub use utils::error::ScrapeError;

pub type Result<T> = std::result::Result<T, ScrapeError>;
