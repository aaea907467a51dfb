use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::utils::error::NotificationError;

/// A product whose price has just dropped to or below its target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceAlert {
    pub product_id: String,
    pub product_name: String,
    pub observed_price: Decimal,
    pub target_price: Decimal,
    pub currency: String,
    pub url: String,
}

impl PriceAlert {
    /// How far under target the observed price is; never negative.
    pub fn savings(&self) -> Decimal {
        (self.target_price - self.observed_price).max(Decimal::ZERO)
    }

    pub fn subject(&self) -> String {
        format!("Price Alert: {}", self.product_name)
    }

    pub fn format_amount(&self, amount: Decimal) -> String {
        format!("{} {}", amount.round_dp(2), self.currency)
    }
}

/// Delivery channel for price alerts (email, Discord, ...).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn notify(&self, alert: &PriceAlert) -> Result<(), NotificationError>;
}
