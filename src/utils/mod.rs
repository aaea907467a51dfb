pub mod error;
pub mod persist;

pub use error::{AppError, ExtractionError, NotificationError};
