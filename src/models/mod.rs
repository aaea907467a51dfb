use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod monitor;
pub mod price_history;
pub mod product;

// Re-exports for convenience
pub use monitor::*;
pub use price_history::*;
pub use product::*;

/// Which extraction strategy produced a price.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    StructuredData,
    CssSelector,
    TextPattern,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::StructuredData => "structured_data",
            ExtractionMethod::CssSelector => "css_selector",
            ExtractionMethod::TextPattern => "text_pattern",
        }
    }
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Stable product identifiers, 32 lowercase hex chars
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}
