use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub scraper: ScraperConfig,
    pub monitor: MonitorDefaults,
    pub notifications: NotificationsConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Start the monitoring loop as soon as the server is up.
    #[serde(default)]
    pub autostart: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub config_file: String,
    pub history_file: String,
    /// Oldest observations beyond this many per product are dropped.
    pub history_limit: Option<usize>,
}

impl StorageConfig {
    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join(&self.config_file)
    }

    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join(&self.history_file)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// Page load timeout for a single render.
    pub request_timeout_secs: u64,
    /// Upper bound on everything done for one product, retries included.
    pub product_timeout_secs: u64,
    /// Pause after each page render before handing control back.
    pub request_delay_ms: u64,
    pub max_retries: usize,
    pub retry_base_delay_ms: u64,
    pub max_plausible_price: f64,
    pub user_agent: String,
    pub chrome_path: Option<String>,
    #[serde(default)]
    pub price_selectors: Vec<String>,
    pub default_currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorDefaults {
    pub check_interval_minutes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    pub smtp: SmtpConfig,
    pub discord: DiscordConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: Option<String>,
    pub from_name: String,
    pub to_address: Option<String>,
    pub use_tls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub webhook_url: Option<String>,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub directory: PathBuf,
    pub file_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

pub const MIN_CHECK_INTERVAL_MINUTES: u32 = 1;
pub const MAX_CHECK_INTERVAL_MINUTES: u32 = 1440;

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default"))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix "PRICEWATCH_"
            .add_source(Environment::with_prefix("PRICEWATCH").separator("__"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        if config.scraper.chrome_path.is_none() {
            config.scraper.chrome_path = env::var("CHROME_PATH").ok();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message("Server port must be greater than 0".into()));
        }

        if self.storage.config_file.trim().is_empty() || self.storage.history_file.trim().is_empty() {
            return Err(ConfigError::Message("Storage file names must not be empty".into()));
        }

        if self.storage.history_limit == Some(0) {
            return Err(ConfigError::Message("Storage history_limit must be greater than 0".into()));
        }

        if self.scraper.request_timeout_secs == 0 || self.scraper.product_timeout_secs == 0 {
            return Err(ConfigError::Message("Scraper timeouts must be greater than 0".into()));
        }

        if self.scraper.product_timeout_secs < self.scraper.request_timeout_secs {
            return Err(ConfigError::Message(
                "Scraper product_timeout_secs cannot be shorter than request_timeout_secs".into(),
            ));
        }

        if self.scraper.max_plausible_price <= 0.0 {
            return Err(ConfigError::Message("Scraper max_plausible_price must be positive".into()));
        }

        if !(MIN_CHECK_INTERVAL_MINUTES..=MAX_CHECK_INTERVAL_MINUTES)
            .contains(&self.monitor.check_interval_minutes)
        {
            return Err(ConfigError::Message(format!(
                "Monitor check_interval_minutes must be between {} and {}",
                MIN_CHECK_INTERVAL_MINUTES, MAX_CHECK_INTERVAL_MINUTES
            )));
        }

        if self.notifications.smtp.port == 0 {
            return Err(ConfigError::Message("SMTP port must be greater than 0".into()));
        }

        if let Some(webhook) = &self.notifications.discord.webhook_url {
            if url::Url::parse(webhook).is_err() {
                return Err(ConfigError::Message("Invalid Discord webhook URL".into()));
            }
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(ConfigError::Message("Metrics port must be greater than 0".into()));
        }

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
                autostart: false,
            },
            storage: StorageConfig {
                data_dir: PathBuf::from("data"),
                config_file: "config.json".to_string(),
                history_file: "price_history.json".to_string(),
                history_limit: None,
            },
            scraper: ScraperConfig::default(),
            monitor: MonitorDefaults {
                check_interval_minutes: 300,
            },
            notifications: NotificationsConfig {
                smtp: SmtpConfig {
                    host: "smtp.gmail.com".to_string(),
                    port: 587,
                    username: None,
                    password: None,
                    from_address: None,
                    from_name: "Price Watch".to_string(),
                    to_address: None,
                    use_tls: true,
                },
                discord: DiscordConfig {
                    webhook_url: None,
                    username: "Price Watch".to_string(),
                },
            },
            logging: LoggingConfig {
                directory: PathBuf::from("data/logs"),
                file_prefix: "price-watch.log".to_string(),
            },
            metrics: MetricsConfig {
                enabled: false,
                port: 9001,
            },
        }
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            product_timeout_secs: 120,
            request_delay_ms: 5000,
            max_retries: 2,
            retry_base_delay_ms: 2000,
            max_plausible_price: 100_000.0,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36".to_string(),
            chrome_path: None,
            price_selectors: [
                ".a-price .a-offscreen",
                "#priceblock_ourprice",
                "#priceblock_dealprice",
                "[data-testid='price']",
                "[itemprop='price']",
                ".price",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            default_currency: "USD".to_string(),
        }
    }
}
