use scraper::{Html, Selector};

use super::price_text::{PriceParser, WebsiteContext};
use crate::models::ExtractionMethod;
use crate::plugins::traits::{ExtractionStrategy, PriceCandidate, StrategyError};
use crate::scraper::RenderedPage;

/// Tries a configured list of CSS selectors, most specific first.
pub struct CssSelectorStrategy {
    selectors: Vec<(String, Selector)>,
    parser: PriceParser,
}

impl CssSelectorStrategy {
    /// Selectors that do not parse are logged and left out rather than
    /// failing every extraction.
    pub fn new(selectors: &[String], default_currency: &str) -> Self {
        let selectors = selectors
            .iter()
            .filter_map(|css| match Selector::parse(css) {
                Ok(selector) => Some((css.clone(), selector)),
                Err(e) => {
                    tracing::warn!("Ignoring invalid price selector {:?}: {}", css, e);
                    None
                }
            })
            .collect();

        Self {
            selectors,
            parser: PriceParser::new(default_currency),
        }
    }

    pub fn selector_count(&self) -> usize {
        self.selectors.len()
    }
}

impl ExtractionStrategy for CssSelectorStrategy {
    fn name(&self) -> &str {
        "css selectors"
    }

    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::CssSelector
    }

    fn extract(&self, page: &RenderedPage, document: &Html) -> Result<Vec<PriceCandidate>, StrategyError> {
        let context = WebsiteContext::from_page(page);
        let mut candidates = Vec::new();

        for (css, selector) in &self.selectors {
            for element in document.select(selector) {
                let text = element.text().collect::<Vec<_>>().join(" ");
                let text = match text.trim() {
                    "" => element.value().attr("content").unwrap_or_default().to_string(),
                    trimmed => trimmed.to_string(),
                };

                if let Some((price, currency)) = self.parser.parse(&text, Some(&context)) {
                    tracing::debug!("Selector {} matched {:?}", css, text);
                    candidates.push(PriceCandidate::new(price, currency));
                }
            }
        }

        Ok(candidates)
    }
}
