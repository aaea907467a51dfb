use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::ExtractionMethod;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct MonitorConfig {
    #[validate(range(min = 1, max = 1440, message = "Check interval must be between 1 and 1440 minutes"))]
    pub check_interval_minutes: u32,
    #[serde(default)]
    pub notification_settings: NotificationSettings,
}

impl MonitorConfig {
    pub fn new(check_interval_minutes: u32) -> Self {
        Self {
            check_interval_minutes,
            notification_settings: NotificationSettings::default(),
        }
    }

    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::from(self.check_interval_minutes) * 60)
    }
}

/// Whether alerts go out at all. Transport-specific fields (recipient,
/// server overrides, ...) are carried through untouched so the document
/// round-trips whatever the dashboard stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NotificationSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(flatten)]
    pub transport: serde_json::Map<String, serde_json::Value>,
}

/// Outcome of checking one product in one cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckResult {
    pub product_id: String,
    pub name: String,
    pub current_price: Option<Decimal>,
    pub currency: Option<String>,
    pub target_price: Decimal,
    pub price_met: bool,
    pub extraction_method: Option<ExtractionMethod>,
    pub notified: bool,
    pub error: Option<String>,
}

impl CheckResult {
    pub fn failed(
        product_id: impl Into<String>,
        name: impl Into<String>,
        target_price: Decimal,
        error: impl Into<String>,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            name: name.into(),
            current_price: None,
            currency: None,
            target_price,
            price_met: false,
            extraction_method: None,
            notified: false,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitorStatus {
    pub is_running: bool,
    pub cycle_in_flight: bool,
    pub total_products: usize,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub check_interval_minutes: u32,
}
