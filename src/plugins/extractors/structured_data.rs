use rust_decimal::Decimal;
use scraper::{Html, Selector};
use serde_json::Value;
use std::str::FromStr;

use super::price_text::{PriceParser, WebsiteContext};
use crate::models::ExtractionMethod;
use crate::plugins::traits::{ExtractionStrategy, PriceCandidate, StrategyError};
use crate::scraper::RenderedPage;

const JSON_LD: &str = r#"script[type="application/ld+json"]"#;
const ITEMPROP_PRICE: &str = r#"[itemprop="price"]"#;
const ITEMPROP_CURRENCY: &str = r#"[itemprop="priceCurrency"]"#;
const META_AMOUNTS: [(&str, &str); 2] = [
    (r#"meta[property="product:price:amount"]"#, r#"meta[property="product:price:currency"]"#),
    (r#"meta[property="og:price:amount"]"#, r#"meta[property="og:price:currency"]"#),
];

/// Reads prices sellers publish for machines: JSON-LD `offers`, schema.org
/// microdata and Open Graph product meta tags, in that order.
pub struct StructuredDataStrategy {
    parser: PriceParser,
}

impl StructuredDataStrategy {
    pub fn new(default_currency: &str) -> Self {
        Self {
            parser: PriceParser::new(default_currency),
        }
    }

    fn selector(&self, css: &str) -> Result<Selector, StrategyError> {
        Selector::parse(css).map_err(|e| StrategyError::new(self.name(), format!("bad selector {}: {}", css, e)))
    }

    fn from_json_ld(&self, document: &Html, context: &WebsiteContext) -> Result<Vec<PriceCandidate>, StrategyError> {
        let mut candidates = Vec::new();

        for script in document.select(&self.selector(JSON_LD)?) {
            let raw = script.text().collect::<String>();
            let value: Value = match serde_json::from_str(raw.trim()) {
                Ok(value) => value,
                Err(e) => {
                    tracing::debug!("Ignoring unparsable JSON-LD block: {}", e);
                    continue;
                }
            };
            self.collect_offers(&value, context, &mut candidates);
        }

        Ok(candidates)
    }

    fn collect_offers(&self, value: &Value, context: &WebsiteContext, out: &mut Vec<PriceCandidate>) {
        match value {
            Value::Array(items) => {
                for item in items {
                    self.collect_offers(item, context, out);
                }
            }
            Value::Object(map) => {
                if let Some(offers) = map.get("offers") {
                    self.collect_prices(offers, context, out);
                }
                for key in ["@graph", "mainEntity", "itemListElement", "item"] {
                    if let Some(nested) = map.get(key) {
                        self.collect_offers(nested, context, out);
                    }
                }
            }
            _ => {}
        }
    }

    fn collect_prices(&self, offers: &Value, context: &WebsiteContext, out: &mut Vec<PriceCandidate>) {
        match offers {
            Value::Array(items) => {
                for item in items {
                    self.collect_prices(item, context, out);
                }
            }
            Value::Object(offer) => {
                let amount = ["price", "lowPrice"]
                    .iter()
                    .filter_map(|key| offer.get(*key))
                    .find_map(|v| self.amount_of(v));

                if let Some(price) = amount {
                    let currency = offer
                        .get("priceCurrency")
                        .and_then(Value::as_str)
                        .and_then(|code| self.parser.normalize_code(code))
                        .unwrap_or_else(|| self.parser.currency_for("", Some(context)));
                    out.push(PriceCandidate::new(price, currency));
                }

                // AggregateOffer nests the individual offers
                if let Some(nested) = offer.get("offers") {
                    self.collect_prices(nested, context, out);
                }
            }
            _ => {}
        }
    }

    fn amount_of(&self, value: &Value) -> Option<Decimal> {
        match value {
            Value::String(s) => self.parser.parse_amount(s),
            Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
            _ => None,
        }
    }

    fn from_microdata(&self, document: &Html, context: &WebsiteContext) -> Result<Vec<PriceCandidate>, StrategyError> {
        let currency = document
            .select(&self.selector(ITEMPROP_CURRENCY)?)
            .next()
            .and_then(|el| el.value().attr("content").map(str::to_string).or_else(|| Some(el.text().collect())))
            .and_then(|code| self.parser.normalize_code(&code));

        let mut candidates = Vec::new();
        for element in document.select(&self.selector(ITEMPROP_PRICE)?) {
            let text = match element.value().attr("content") {
                Some(content) => content.to_string(),
                None => element.text().collect::<String>(),
            };
            if let Some(price) = self.parser.parse_amount(&text) {
                let currency = currency
                    .clone()
                    .unwrap_or_else(|| self.parser.currency_for(&text, Some(context)));
                candidates.push(PriceCandidate::new(price, currency));
            }
        }

        Ok(candidates)
    }

    fn from_meta(&self, document: &Html, context: &WebsiteContext) -> Result<Vec<PriceCandidate>, StrategyError> {
        let mut candidates = Vec::new();

        for (amount_css, currency_css) in META_AMOUNTS {
            let Some(amount) = document
                .select(&self.selector(amount_css)?)
                .next()
                .and_then(|el| el.value().attr("content"))
                .and_then(|content| self.parser.parse_amount(content))
            else {
                continue;
            };

            let currency = document
                .select(&self.selector(currency_css)?)
                .next()
                .and_then(|el| el.value().attr("content"))
                .and_then(|code| self.parser.normalize_code(code))
                .unwrap_or_else(|| self.parser.currency_for("", Some(context)));

            candidates.push(PriceCandidate::new(amount, currency));
        }

        Ok(candidates)
    }
}

impl ExtractionStrategy for StructuredDataStrategy {
    fn name(&self) -> &str {
        "structured data"
    }

    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::StructuredData
    }

    fn extract(&self, page: &RenderedPage, document: &Html) -> Result<Vec<PriceCandidate>, StrategyError> {
        let context = WebsiteContext::from_page(page);

        let mut candidates = self.from_json_ld(document, &context)?;
        candidates.extend(self.from_microdata(document, &context)?);
        candidates.extend(self.from_meta(document, &context)?);
        Ok(candidates)
    }
}
