use async_trait::async_trait;

use super::notifiers::{DiscordNotifier, EmailNotifier};
use super::traits::{NotificationSink, PriceAlert};
use crate::config::NotificationsConfig;
use crate::utils::error::NotificationError;

pub type NotificationSinkBox = Box<dyn NotificationSink>;

/// Fans an alert out to every configured channel. Delivery counts as
/// successful when at least one channel accepted the alert.
#[derive(Default)]
pub struct NotifierSet {
    sinks: Vec<NotificationSinkBox>,
}

impl NotifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every channel whose configuration is complete. Channels that
    /// are not configured are skipped with a log line.
    pub fn from_config(config: &NotificationsConfig) -> Self {
        let mut set = Self::new();

        match EmailNotifier::from_config(&config.smtp) {
            Ok(notifier) => set.register(Box::new(notifier)),
            Err(e) => tracing::info!("Email notifications disabled: {}", e),
        }

        if config.discord.webhook_url.is_some() {
            match DiscordNotifier::from_config(&config.discord) {
                Ok(notifier) => set.register(Box::new(notifier)),
                Err(e) => tracing::warn!("Discord notifications disabled: {}", e),
            }
        }

        set
    }

    pub fn register(&mut self, sink: NotificationSinkBox) {
        tracing::debug!("Registered {} notifier", sink.name());
        self.sinks.push(sink);
    }

    pub fn names(&self) -> Vec<String> {
        self.sinks.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl NotificationSink for NotifierSet {
    fn name(&self) -> &'static str {
        "all"
    }

    async fn notify(&self, alert: &PriceAlert) -> Result<(), NotificationError> {
        if self.sinks.is_empty() {
            return Err(NotificationError::NotConfigured {
                notifier: self.name().to_string(),
                reason: "no notification channels are configured".to_string(),
            });
        }

        let mut failures = Vec::new();
        for sink in &self.sinks {
            if let Err(e) = sink.notify(alert).await {
                tracing::warn!("Notifier {} failed for {}: {}", sink.name(), alert.product_name, e);
                failures.push(format!("{}: {}", sink.name(), e));
            }
        }

        if failures.len() == self.sinks.len() {
            return Err(NotificationError::Transport(failures.join("; ")));
        }
        Ok(())
    }
}
