use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use validator::Validate;

use crate::models::{generate_id, MonitorConfig, NewProduct, NotificationSettings, Product, ProductKey, UpdateProduct};
use crate::utils::error::{AppError, Result};
use crate::utils::persist::{read_json, write_json_atomic};

/// On-disk shape of the products/settings document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    products: Vec<serde_json::Value>,
    check_interval_minutes: u32,
    #[serde(default, alias = "email_notifications")]
    notification_settings: NotificationSettings,
}

#[derive(Debug, Clone)]
struct ConfigState {
    products: Vec<Product>,
    monitor: MonitorConfig,
}

impl ConfigState {
    fn position(&self, key: &ProductKey) -> Result<usize> {
        let position = match key {
            ProductKey::Id(id) => self.products.iter().position(|p| &p.id == id),
            ProductKey::Index(index) => (*index < self.products.len()).then_some(*index),
        };
        position.ok_or_else(|| AppError::NotFound { resource: key.to_string() })
    }

    fn to_document(&self) -> Result<ConfigDocument> {
        let products = self
            .products
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(ConfigDocument {
            products,
            check_interval_minutes: self.monitor.check_interval_minutes,
            notification_settings: self.monitor.notification_settings.clone(),
        })
    }
}

/// Persisted product list and monitoring settings. Every mutation is
/// written through to disk before it becomes visible to readers.
pub struct ConfigStore {
    path: PathBuf,
    state: RwLock<ConfigState>,
}

impl ConfigStore {
    /// Load the document at `path`, creating it with `defaults` when absent.
    pub async fn open(path: impl AsRef<Path>, defaults: MonitorConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let state = match read_json::<ConfigDocument>(&path).await? {
            Some(document) => Self::from_document(document, &defaults),
            None => {
                tracing::info!("No configuration at {}, creating default", path.display());
                let state = ConfigState { products: Vec::new(), monitor: defaults };
                write_json_atomic(&path, &state.to_document()?).await?;
                state
            }
        };

        tracing::info!(
            "Loaded {} products, checking every {} minutes",
            state.products.len(),
            state.monitor.check_interval_minutes
        );

        Ok(Self { path, state: RwLock::new(state) })
    }

    fn from_document(document: ConfigDocument, defaults: &MonitorConfig) -> ConfigState {
        let mut seen_ids = HashSet::new();
        let mut products = Vec::with_capacity(document.products.len());

        for (index, raw) in document.products.into_iter().enumerate() {
            let mut product: Product = match serde_json::from_value(raw) {
                Ok(product) => product,
                Err(e) => {
                    tracing::warn!("Skipping malformed product entry {}: {}", index, e);
                    continue;
                }
            };

            if let Err(e) = product.validate() {
                tracing::warn!("Skipping invalid product entry {} ({}): {}", index, product.name, e);
                continue;
            }

            if !seen_ids.insert(product.id.clone()) {
                product.id = generate_id();
                seen_ids.insert(product.id.clone());
                tracing::warn!("Duplicate product id at entry {}, assigned {}", index, product.id);
            }

            products.push(product);
        }

        let mut monitor = MonitorConfig {
            check_interval_minutes: document.check_interval_minutes,
            notification_settings: document.notification_settings,
        };
        if monitor.validate().is_err() {
            tracing::warn!(
                "Stored check interval {} is out of range, using {}",
                monitor.check_interval_minutes,
                defaults.check_interval_minutes
            );
            monitor.check_interval_minutes = defaults.check_interval_minutes;
        }

        ConfigState { products, monitor }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get_products(&self) -> Vec<Product> {
        self.state.read().await.products.clone()
    }

    pub async fn product_count(&self) -> usize {
        self.state.read().await.products.len()
    }

    pub async fn get_product(&self, key: &ProductKey) -> Result<Product> {
        let state = self.state.read().await;
        let index = state.position(key)?;
        Ok(state.products[index].clone())
    }

    pub async fn get_monitor_config(&self) -> MonitorConfig {
        self.state.read().await.monitor.clone()
    }

    pub async fn update_monitor_config(&self, monitor: MonitorConfig) -> Result<MonitorConfig> {
        monitor.validate()?;
        self.mutate(|state| {
            state.monitor = monitor.clone();
            Ok(monitor)
        })
        .await
    }

    pub async fn add_product(&self, new_product: NewProduct) -> Result<Product> {
        new_product.validate()?;
        let product = Product::new(new_product);

        let added = self
            .mutate(|state| {
                state.products.push(product.clone());
                Ok(product)
            })
            .await?;

        tracing::info!("Added product {} ({})", added.name, added.id);
        Ok(added)
    }

    pub async fn update_product(&self, key: &ProductKey, update: UpdateProduct) -> Result<Product> {
        update.validate()?;

        self.mutate(|state| {
            let index = state.position(key)?;
            let product = &mut state.products[index];
            product.update(update);
            Ok(product.clone())
        })
        .await
    }

    pub async fn delete_product(&self, key: &ProductKey) -> Result<Product> {
        let removed = self
            .mutate(|state| {
                let index = state.position(key)?;
                Ok(state.products.remove(index))
            })
            .await?;

        tracing::info!("Deleted product {} ({})", removed.name, removed.id);
        Ok(removed)
    }

    /// Apply `f` to a copy of the state, persist it, then publish it. A
    /// failed write leaves the in-memory state untouched.
    async fn mutate<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut ConfigState) -> Result<T>,
    {
        let mut state = self.state.write().await;
        let mut next = state.clone();
        let out = f(&mut next)?;

        write_json_atomic(&self.path, &next.to_document()?).await.map_err(|e| {
            tracing::error!("Failed to save configuration to {}: {}", self.path.display(), e);
            e
        })?;

        *state = next;
        Ok(out)
    }
}
