use thiserror::Error;

/// Failure to obtain a price for a single product. Recorded against that
/// product and never fatal to a cycle.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Page returned HTTP status {status}")]
    HttpStatus { status: u16 },

    #[error("Request was blocked by the site: {0}")]
    Blocked(String),

    #[error("No extraction strategy found a price")]
    NoStrategyMatched,

    #[error("Implausible price {price} from {method}")]
    Implausible { price: String, method: String },
}

impl ExtractionError {
    /// Transient failures are worth another attempt after a backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, ExtractionError::Network(_) | ExtractionError::Timeout { .. })
            || matches!(self, ExtractionError::HttpStatus { status } if *status >= 500 || *status == 429)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NotificationError {
    #[error("Notifier {notifier} is not configured: {reason}")]
    NotConfigured { notifier: String, reason: String },

    #[error("Failed to build message: {0}")]
    Message(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("A price check cycle is already in progress")]
    EngineBusy,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(format!("{}", err))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
