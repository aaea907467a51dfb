pub mod extractor;
pub mod notifier;

pub use extractor::{ExtractionStrategy, PriceCandidate, StrategyError};
pub use notifier::{NotificationSink, PriceAlert};
