use rust_decimal::Decimal;
use scraper::Html;
use thiserror::Error;

use crate::models::ExtractionMethod;
use crate::scraper::RenderedPage;

/// A price a strategy found on the page, before the plausibility check.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceCandidate {
    pub price: Decimal,
    pub currency: String,
}

impl PriceCandidate {
    pub fn new(price: Decimal, currency: impl Into<String>) -> Self {
        Self {
            price,
            currency: currency.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{strategy} failed: {reason}")]
pub struct StrategyError {
    pub strategy: String,
    pub reason: String,
}

impl StrategyError {
    pub fn new(strategy: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            reason: reason.into(),
        }
    }
}

/// One self-contained way of reading a price off a rendered page.
///
/// Strategies return every candidate they find in document order; the
/// extractor takes the first plausible one. An empty list means "nothing
/// here" and is not an error.
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &str;
    fn method(&self) -> ExtractionMethod;

    fn extract(&self, page: &RenderedPage, document: &Html) -> Result<Vec<PriceCandidate>, StrategyError>;
}
