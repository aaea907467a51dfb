// Price extraction strategies, tried in the order `default_strategies` lists them
pub mod price_text;
pub mod selector;
pub mod structured_data;
pub mod text_pattern;

pub use price_text::{PriceParser, WebsiteContext};
pub use selector::CssSelectorStrategy;
pub use structured_data::StructuredDataStrategy;
pub use text_pattern::TextPatternStrategy;

use crate::config::ScraperConfig;
use crate::plugins::traits::ExtractionStrategy;

pub fn default_strategies(config: &ScraperConfig) -> Vec<Box<dyn ExtractionStrategy>> {
    vec![
        Box::new(StructuredDataStrategy::new(&config.default_currency)),
        Box::new(CssSelectorStrategy::new(&config.price_selectors, &config.default_currency)),
        Box::new(TextPatternStrategy::new(&config.default_currency)),
    ]
}
