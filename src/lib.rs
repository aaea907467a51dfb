pub mod config;
pub mod config_store;
pub mod history_store;
pub mod models;
pub mod plugins;
pub mod price_extractor;
pub mod scheduler;
pub mod scraper;
pub mod utils;
pub mod web;

// Re-export commonly used types
pub use config::AppConfig;
pub use config_store::ConfigStore;
pub use history_store::HistoryStore;
pub use plugins::NotifierSet;
pub use price_extractor::{PriceExtractor, PriceResult, PriceSource};
pub use scheduler::MonitorEngine;
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
