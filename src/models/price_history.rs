use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::ExtractionMethod;

/// One recorded price check for a product. Failed checks are recorded too,
/// with `error` set and no price.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceObservation {
    pub product_name: String,
    pub url: String,
    pub observed_price: Option<Decimal>,
    pub currency: Option<String>,
    pub observed_at: DateTime<Utc>,
    pub extraction_method: Option<ExtractionMethod>,
    pub error: Option<String>,
}

impl PriceObservation {
    pub fn success(
        product_name: impl Into<String>,
        url: impl Into<String>,
        price: Decimal,
        currency: impl Into<String>,
        method: ExtractionMethod,
    ) -> Self {
        Self {
            product_name: product_name.into(),
            url: url.into(),
            observed_price: Some(price),
            currency: Some(currency.into()),
            observed_at: Utc::now(),
            extraction_method: Some(method),
            error: None,
        }
    }

    pub fn failure(
        product_name: impl Into<String>,
        url: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            product_name: product_name.into(),
            url: url.into(),
            observed_price: None,
            currency: None,
            observed_at: Utc::now(),
            extraction_method: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.observed_price.is_some()
    }
}
