use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use scraper::Html;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};

use crate::config::ScraperConfig;
use crate::models::ExtractionMethod;
use crate::plugins::extractors::default_strategies;
use crate::plugins::traits::ExtractionStrategy;
use crate::scraper::{ChromeRenderer, PageRenderer, RenderedPage};
use crate::utils::error::ExtractionError;

const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceResult {
    pub price: Decimal,
    pub currency: String,
    pub method: ExtractionMethod,
}

/// Anything that can produce the current price of a product page.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn extract(&self, url: &str) -> Result<PriceResult, ExtractionError>;
}

/// Renders a page once (retrying transient failures) and runs the strategy
/// chain against it. The first plausible candidate wins.
pub struct PriceExtractor {
    renderer: Arc<dyn PageRenderer>,
    strategies: Vec<Box<dyn ExtractionStrategy>>,
    config: ScraperConfig,
    max_price: Decimal,
}

impl PriceExtractor {
    pub fn new(
        renderer: Arc<dyn PageRenderer>,
        strategies: Vec<Box<dyn ExtractionStrategy>>,
        config: ScraperConfig,
    ) -> Self {
        let max_price = Decimal::from_f64(config.max_plausible_price).unwrap_or(Decimal::MAX);
        Self {
            renderer,
            strategies,
            config,
            max_price,
        }
    }

    /// Headless Chrome plus the standard strategy chain.
    pub fn with_chrome(config: ScraperConfig) -> Self {
        let renderer = Arc::new(ChromeRenderer::new(config.clone()));
        let strategies = default_strategies(&config);
        Self::new(renderer, strategies, config)
    }

    pub fn is_plausible(&self, price: Decimal) -> bool {
        price > Decimal::ZERO && price < self.max_price
    }

    fn backoff(&self) -> impl Iterator<Item = Duration> + use<> {
        // from_millis(2).factor(b / 2) yields b, 2b, 4b, ...
        ExponentialBackoff::from_millis(2)
            .factor(self.config.retry_base_delay_ms / 2)
            .max_delay(MAX_RETRY_DELAY)
            .map(jitter)
            .take(self.config.max_retries)
    }

    async fn render_with_retry(&self, url: &str) -> Result<RenderedPage, ExtractionError> {
        RetryIf::spawn(
            self.backoff(),
            || self.renderer.render(url),
            |e: &ExtractionError| {
                let retry = e.is_transient();
                if retry {
                    tracing::warn!("Render of {} failed ({}), retrying", url, e);
                }
                retry
            },
        )
        .await
    }

    fn run_strategies(&self, page: &RenderedPage) -> Result<PriceResult, ExtractionError> {
        let document = Html::parse_document(&page.html);
        let mut implausible: Option<(Decimal, ExtractionMethod)> = None;

        for strategy in &self.strategies {
            let candidates = match strategy.extract(page, &document) {
                Ok(candidates) => candidates,
                Err(e) => {
                    tracing::debug!("Strategy {} errored on {}: {}", strategy.name(), page.final_url, e);
                    continue;
                }
            };

            for candidate in candidates {
                if self.is_plausible(candidate.price) {
                    tracing::debug!(
                        "Strategy {} found {} {} on {}",
                        strategy.name(),
                        candidate.price,
                        candidate.currency,
                        page.final_url
                    );
                    return Ok(PriceResult {
                        price: candidate.price,
                        currency: candidate.currency,
                        method: strategy.method(),
                    });
                }

                tracing::debug!("Strategy {} found implausible price {}", strategy.name(), candidate.price);
                implausible.get_or_insert((candidate.price, strategy.method()));
            }
        }

        Err(match implausible {
            Some((price, method)) => ExtractionError::Implausible {
                price: price.to_string(),
                method: method.to_string(),
            },
            None => ExtractionError::NoStrategyMatched,
        })
    }
}

#[async_trait]
impl PriceSource for PriceExtractor {
    async fn extract(&self, url: &str) -> Result<PriceResult, ExtractionError> {
        let rendered = self.render_with_retry(url).await;

        // Be polite to the site whatever the outcome
        if self.config.request_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.request_delay_ms)).await;
        }

        self.run_strategies(&rendered?)
    }
}
