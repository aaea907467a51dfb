use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart, SinglePart, header};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;
use crate::plugins::traits::{NotificationSink, PriceAlert};
use crate::utils::error::NotificationError;

const NOTIFIER: &str = "email";

pub struct EmailNotifier {
    from: Mailbox,
    to: Mailbox,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailNotifier {
    pub fn from_config(config: &SmtpConfig) -> Result<Self, NotificationError> {
        let not_configured = |reason: &str| NotificationError::NotConfigured {
            notifier: NOTIFIER.to_string(),
            reason: reason.to_string(),
        };

        let from_address = config.from_address.as_deref().ok_or_else(|| not_configured("missing from_address"))?;
        let to_address = config.to_address.as_deref().ok_or_else(|| not_configured("missing to_address"))?;

        let from = format!("{} <{}>", config.from_name, from_address)
            .parse::<Mailbox>()
            .map_err(|e| not_configured(&format!("invalid from_address: {}", e)))?;
        let to = to_address
            .parse::<Mailbox>()
            .map_err(|e| not_configured(&format!("invalid to_address: {}", e)))?;

        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| not_configured(&format!("invalid SMTP host: {}", e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };

        let builder = match (&config.username, &config.password) {
            (Some(username), Some(password)) => builder.credentials(Credentials::new(username.clone(), password.clone())),
            _ => builder,
        };

        Ok(Self {
            from,
            to,
            mailer: builder.port(config.port).build(),
        })
    }

    pub fn build_message(&self, alert: &PriceAlert) -> Result<Message, NotificationError> {
        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(alert.subject())
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_PLAIN)
                            .body(format_text_body(alert)),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_HTML)
                            .body(format_html_body(alert)),
                    ),
            )
            .map_err(|e| NotificationError::Message(e.to_string()))
    }
}

fn format_text_body(alert: &PriceAlert) -> String {
    let mut text = String::new();

    text.push_str("Good news! A product you're tracking has reached your target price.\n\n");
    text.push_str(&format!("Product: {}\n", alert.product_name));
    text.push_str(&format!("Current Price: {}\n", alert.format_amount(alert.observed_price)));
    text.push_str(&format!("Target Price: {}\n", alert.format_amount(alert.target_price)));
    text.push_str(&format!("You Save: {}\n\n", alert.format_amount(alert.savings())));
    text.push_str(&format!("View Product: {}\n", alert.url));

    text
}

fn format_html_body(alert: &PriceAlert) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <style>
        body {{ font-family: Arial, sans-serif; margin: 20px; }}
        .header {{ background: #f0f0f0; padding: 15px; border-radius: 5px; }}
        .product {{ font-size: 18px; font-weight: bold; }}
        .change {{ margin: 15px 0; padding: 10px; background: #e8f5e8; border-left: 4px solid #4CAF50; }}
        .button {{ display: inline-block; padding: 8px 15px; background: #007cba; color: white; text-decoration: none; border-radius: 3px; }}
    </style>
</head>
<body>
    <div class="header">
        <div class="product">{name}</div>
    </div>
    <div class="change">
        <strong>Current Price:</strong> {current}<br>
        <strong>Target Price:</strong> {target}<br>
        <strong>You Save:</strong> {savings}
    </div>
    <a href="{url}" class="button">View Product</a>
</body>
</html>
"#,
        name = escape_html(&alert.product_name),
        current = alert.format_amount(alert.observed_price),
        target = alert.format_amount(alert.target_price),
        savings = alert.format_amount(alert.savings()),
        url = escape_html(&alert.url),
    )
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[async_trait]
impl NotificationSink for EmailNotifier {
    fn name(&self) -> &'static str {
        NOTIFIER
    }

    async fn notify(&self, alert: &PriceAlert) -> Result<(), NotificationError> {
        let message = self.build_message(alert)?;

        self.mailer
            .send(message)
            .await
            .map_err(|e| NotificationError::Transport(e.to_string()))?;

        tracing::info!("Sent price alert email for {} to {}", alert.product_name, self.to);
        Ok(())
    }
}
