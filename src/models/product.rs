use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::models::generate_id;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct Product {
    /// Documents written before ids existed get one assigned on load.
    #[serde(default = "generate_id")]
    pub id: String,
    #[validate(length(min = 1, message = "Product name is required"))]
    pub name: String,
    #[validate(url(message = "Product URL is invalid"))]
    pub url: String,
    #[validate(custom(function = "validate_target_price"))]
    pub target_price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewProduct {
    #[validate(length(min = 1, message = "Product name is required"))]
    pub name: String,
    #[validate(url(message = "Product URL is invalid"))]
    pub url: String,
    #[validate(custom(function = "validate_target_price"))]
    pub target_price: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateProduct {
    #[validate(length(min = 1, message = "Product name is required"))]
    pub name: Option<String>,
    #[validate(url(message = "Product URL is invalid"))]
    pub url: Option<String>,
    #[validate(custom(function = "validate_target_price"))]
    pub target_price: Option<Decimal>,
}

/// How a caller addresses a product: by stable id or by its current
/// position in the configured list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductKey {
    Id(String),
    Index(usize),
}

impl std::fmt::Display for ProductKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProductKey::Id(id) => write!(f, "product {}", id),
            ProductKey::Index(index) => write!(f, "product at index {}", index),
        }
    }
}

fn validate_target_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() && !price.is_zero() {
        let mut err = ValidationError::new("negative_target_price");
        err.message = Some("Target price cannot be negative".into());
        return Err(err);
    }
    Ok(())
}

impl Product {
    pub fn new(new_product: NewProduct) -> Self {
        Self {
            id: generate_id(),
            name: new_product.name,
            url: new_product.url,
            target_price: new_product.target_price,
        }
    }

    pub fn update(&mut self, update: UpdateProduct) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(url) = update.url {
            self.url = url;
        }
        if let Some(target_price) = update.target_price {
            self.target_price = target_price;
        }
    }

    pub fn is_target_met(&self, price: Decimal) -> bool {
        price <= self.target_price
    }
}
