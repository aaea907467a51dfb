use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

use crate::config::DiscordConfig;
use crate::plugins::traits::{NotificationSink, PriceAlert};
use crate::utils::error::NotificationError;

const NOTIFIER: &str = "discord";
const EMBED_COLOR: u32 = 0x00ff00; // Green for price drops

pub struct DiscordNotifier {
    client: Client,
    webhook_url: String,
    username: String,
}

impl DiscordNotifier {
    pub fn from_config(config: &DiscordConfig) -> Result<Self, NotificationError> {
        let not_configured = |reason: String| NotificationError::NotConfigured {
            notifier: NOTIFIER.to_string(),
            reason,
        };

        let webhook_url = config
            .webhook_url
            .as_deref()
            .ok_or_else(|| not_configured("missing webhook_url".to_string()))?;

        let parsed = url::Url::parse(webhook_url).map_err(|e| not_configured(format!("invalid webhook_url: {}", e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(not_configured(format!("unsupported webhook scheme {}", parsed.scheme())));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| not_configured(e.to_string()))?;

        Ok(Self {
            client,
            webhook_url: webhook_url.to_string(),
            username: config.username.clone(),
        })
    }

    fn create_embed(&self, alert: &PriceAlert) -> serde_json::Value {
        json!({
            "title": alert.subject(),
            "url": alert.url,
            "color": EMBED_COLOR,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "fields": [
                {
                    "name": "Current Price",
                    "value": alert.format_amount(alert.observed_price),
                    "inline": true
                },
                {
                    "name": "Target Price",
                    "value": alert.format_amount(alert.target_price),
                    "inline": true
                },
                {
                    "name": "You Save",
                    "value": alert.format_amount(alert.savings()),
                    "inline": true
                },
                {
                    "name": "Product",
                    "value": format!("[{}]({})", alert.product_name, alert.url),
                    "inline": false
                }
            ],
            "footer": { "text": self.username }
        })
    }

    fn create_webhook_payload(&self, alert: &PriceAlert) -> serde_json::Value {
        json!({
            "username": self.username,
            "embeds": [self.create_embed(alert)]
        })
    }
}

#[async_trait]
impl NotificationSink for DiscordNotifier {
    fn name(&self) -> &'static str {
        NOTIFIER
    }

    async fn notify(&self, alert: &PriceAlert) -> Result<(), NotificationError> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&self.create_webhook_payload(alert))
            .send()
            .await
            .map_err(|e| NotificationError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::Transport(format!("Discord webhook returned {}: {}", status, body)));
        }

        tracing::info!("Posted price alert for {} to Discord", alert.product_name);
        Ok(())
    }
}
