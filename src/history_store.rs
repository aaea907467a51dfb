use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::models::PriceObservation;
use crate::utils::error::{AppError, Result};
use crate::utils::persist::{read_json, write_json_atomic};

pub type History = BTreeMap<String, Vec<PriceObservation>>;

/// Append-only price history keyed by product name. The whole document is
/// rewritten on every append.
pub struct HistoryStore {
    path: PathBuf,
    limit: Option<usize>,
    entries: Mutex<History>,
}

impl HistoryStore {
    pub async fn open(path: impl AsRef<Path>, limit: Option<usize>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = match read_json::<History>(&path).await {
            Ok(Some(mut entries)) => {
                for series in entries.values_mut() {
                    series.sort_by_key(|obs| obs.observed_at);
                }
                entries
            }
            Ok(None) => History::new(),
            Err(AppError::Serialization(e)) => {
                let mut aside = path.as_os_str().to_owned();
                aside.push(".corrupt");
                tracing::warn!(
                    "Price history at {} is unreadable ({}), moving it to {:?} and starting fresh",
                    path.display(),
                    e,
                    aside
                );
                tokio::fs::rename(&path, &aside).await?;
                History::new()
            }
            Err(e) => return Err(e),
        };

        tracing::debug!("Loaded price history for {} products", entries.len());

        Ok(Self {
            path,
            limit,
            entries: Mutex::new(entries),
        })
    }

    /// Record an observation and persist before returning. Observations are
    /// placed by `observed_at`, so a clock step backwards cannot break the
    /// ordering of a series.
    pub async fn append(&self, product_name: &str, observation: PriceObservation) -> Result<()> {
        let mut entries = self.entries.lock().await;

        let series = entries.entry(product_name.to_string()).or_default();
        let at = series.partition_point(|existing| existing.observed_at <= observation.observed_at);
        series.insert(at, observation);

        let mut trimmed = match self.limit {
            Some(limit) if series.len() > limit => {
                let excess = series.len() - limit;
                series.drain(..excess).collect::<Vec<_>>()
            }
            _ => Vec::new(),
        };

        if let Err(e) = write_json_atomic(&self.path, &*entries).await {
            tracing::error!("Failed to save price history to {}: {}", self.path.display(), e);
            // Undo so memory matches what is on disk.
            if let Some(series) = entries.get_mut(product_name) {
                if at < trimmed.len() {
                    trimmed.remove(at);
                } else {
                    series.remove(at - trimmed.len());
                }
                series.splice(0..0, trimmed);
                if series.is_empty() {
                    entries.remove(product_name);
                }
            }
            return Err(e);
        }

        Ok(())
    }

    pub async fn read(&self, product_name: &str) -> Vec<PriceObservation> {
        self.entries
            .lock()
            .await
            .get(product_name)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn read_all(&self) -> History {
        self.entries.lock().await.clone()
    }

    /// Most recent observation that carried a price.
    pub async fn latest_successful(&self, product_name: &str) -> Option<PriceObservation> {
        self.entries
            .lock()
            .await
            .get(product_name)
            .and_then(|series| series.iter().rev().find(|obs| obs.is_success()).cloned())
    }
}
