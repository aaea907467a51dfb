use regex::Regex;
use scraper::{Html, Node};

use super::price_text::{PriceParser, WebsiteContext, AMOUNT_TOKEN};
use crate::models::ExtractionMethod;
use crate::plugins::traits::{ExtractionStrategy, PriceCandidate, StrategyError};
use crate::scraper::RenderedPage;

const HIDDEN_ELEMENTS: [&str; 5] = ["script", "style", "noscript", "template", "head"];

/// Last resort: scan the visible text for a currency-marked amount
/// ("$19.99", "19,99 EUR") or a labelled one ("Price: 19.99").
pub struct TextPatternStrategy {
    pattern: Regex,
    parser: PriceParser,
}

impl TextPatternStrategy {
    pub fn new(default_currency: &str) -> Self {
        // Whole tokens, so "19,99 EUR" is never matched as "99 EUR"
        let amount = AMOUNT_TOKEN;
        let pattern = format!(
            r"(?i)(?:(?:US\$|A\$|C\$|[\$£€¥₹])\s?(?:{amount})|(?:{amount})\s?(?:(?:USD|EUR|GBP|AUD|CAD)\b|[€£])|price:?\s*(?:{amount}))"
        );

        Self {
            pattern: Regex::new(&pattern).expect("text price pattern is valid"),
            parser: PriceParser::new(default_currency),
        }
    }
}

/// Text nodes that are not inside script/style-like elements, joined by
/// single spaces.
pub fn visible_text(document: &Html) -> String {
    let mut parts = Vec::new();

    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| HIDDEN_ELEMENTS.contains(&el.name()))
        });
        if hidden {
            continue;
        }

        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed);
        }
    }

    parts.join(" ")
}

impl ExtractionStrategy for TextPatternStrategy {
    fn name(&self) -> &str {
        "text pattern"
    }

    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::TextPattern
    }

    fn extract(&self, page: &RenderedPage, document: &Html) -> Result<Vec<PriceCandidate>, StrategyError> {
        let context = WebsiteContext::from_page(page);
        let text = visible_text(document);

        let candidates = self
            .pattern
            .find_iter(&text)
            .filter_map(|m| self.parser.parse(m.as_str(), Some(&context)))
            .map(|(price, currency)| PriceCandidate::new(price, currency))
            .collect();

        Ok(candidates)
    }
}
