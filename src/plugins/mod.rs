pub mod extractors;
pub mod manager;
pub mod notifiers;
pub mod traits;

pub use manager::NotifierSet;
pub use traits::{ExtractionStrategy, NotificationSink, PriceAlert};
