// Integration tests for Price Watch
// These tests drive the engine and the HTTP API against real stores in a
// temporary directory, with scripted prices in place of a browser.

pub mod api_tests;
pub mod product_lifecycle_tests;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;
use tower::ServiceExt;

use price_watch::models::{ExtractionMethod, MonitorConfig, NewProduct, Product};
use price_watch::plugins::{NotificationSink, PriceAlert};
use price_watch::utils::error::{ExtractionError, NotificationError};
use price_watch::web::{AppState, create_router};
use price_watch::{ConfigStore, HistoryStore, MonitorEngine, PriceResult, PriceSource};

/// Price source that replays scripted outcomes per URL. Once a URL's script
/// runs out it keeps answering with the last outcome.
#[derive(Default)]
pub struct ScriptedSource {
    scripts: Mutex<HashMap<String, VecDeque<Result<PriceResult, ExtractionError>>>>,
    calls: AtomicUsize,
    gate: Option<Arc<Notify>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every extraction waits for a permit on `gate` before answering.
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn push(&self, url: &str, outcome: Result<PriceResult, ExtractionError>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(outcome);
    }

    pub fn push_price(&self, url: &str, price: &str) {
        self.push(url, Ok(usd(price)));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceSource for ScriptedSource {
    async fn extract(&self, url: &str) -> Result<PriceResult, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let mut scripts = self.scripts.lock().unwrap();
        let Some(script) = scripts.get_mut(url) else {
            return Err(ExtractionError::NoStrategyMatched);
        };
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap_or(Err(ExtractionError::NoStrategyMatched))
        }
    }
}

/// Sink that keeps every alert it accepted. The first `failures` calls fail
/// with a transport error.
#[derive(Default)]
pub struct RecordingSink {
    alerts: Mutex<Vec<PriceAlert>>,
    attempts: AtomicUsize,
    failures: usize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(failures: usize) -> Self {
        Self {
            failures,
            ..Self::default()
        }
    }

    pub fn alerts(&self) -> Vec<PriceAlert> {
        self.alerts.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn notify(&self, alert: &PriceAlert) -> Result<(), NotificationError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err(NotificationError::Transport("connection refused".to_string()));
        }
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

pub fn usd(price: &str) -> PriceResult {
    PriceResult {
        price: price.parse().unwrap(),
        currency: "USD".to_string(),
        method: ExtractionMethod::StructuredData,
    }
}

pub fn product_url(name: &str) -> String {
    format!("https://shop.example.com/p/{}", name.to_lowercase())
}

/// Everything one test needs, rooted in its own temporary directory.
pub struct TestApp {
    pub dir: TempDir,
    pub config_store: Arc<ConfigStore>,
    pub history: Arc<HistoryStore>,
    pub engine: Arc<MonitorEngine>,
    pub source: Arc<ScriptedSource>,
    pub sink: Arc<RecordingSink>,
}

impl TestApp {
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_parts(ScriptedSource::new(), RecordingSink::new(), None).await
    }

    pub async fn with_parts(
        source: ScriptedSource,
        sink: RecordingSink,
        history_limit: Option<usize>,
    ) -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let config_store = Arc::new(ConfigStore::open(dir.path().join("config.json"), MonitorConfig::new(300)).await?);
        let history = Arc::new(HistoryStore::open(dir.path().join("price_history.json"), history_limit).await?);

        let source = Arc::new(source);
        let sink = Arc::new(sink);
        let engine = build_engine(&config_store, &history, &source, &sink);

        Ok(Self {
            dir,
            config_store,
            history,
            engine,
            source,
            sink,
        })
    }

    /// A fresh engine over the same stores, as after a process restart.
    pub fn restart_engine(&self) -> Arc<MonitorEngine> {
        build_engine(&self.config_store, &self.history, &self.source, &self.sink)
    }

    pub fn router(&self) -> Router {
        create_router(AppState {
            engine: Arc::clone(&self.engine),
            config_store: Arc::clone(&self.config_store),
            history: Arc::clone(&self.history),
        })
    }

    pub async fn add_product(&self, name: &str, target: &str) -> anyhow::Result<Product> {
        Ok(self
            .config_store
            .add_product(NewProduct {
                name: name.to_string(),
                url: product_url(name),
                target_price: target.parse::<Decimal>()?,
            })
            .await?)
    }

    pub async fn enable_notifications(&self) -> anyhow::Result<()> {
        let mut monitor = self.config_store.get_monitor_config().await;
        monitor.notification_settings.enabled = true;
        self.config_store.update_monitor_config(monitor).await?;
        Ok(())
    }
}

fn build_engine(
    config_store: &Arc<ConfigStore>,
    history: &Arc<HistoryStore>,
    source: &Arc<ScriptedSource>,
    sink: &Arc<RecordingSink>,
) -> Arc<MonitorEngine> {
    let source: Arc<dyn PriceSource> = source.clone();
    let sink: Arc<dyn NotificationSink> = sink.clone();
    Arc::new(MonitorEngine::new(
        Arc::clone(config_store),
        Arc::clone(history),
        source,
        sink,
        Duration::from_secs(5),
    ))
}

/// Send one request through the router and decode the JSON body.
pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> anyhow::Result<(StatusCode, Value)> {
    let mut request = Request::builder().method(method).uri(uri);

    let body = match body {
        Some(json) => {
            request = request.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(request.body(body)?).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };

    Ok((status, json))
}

/// Helper to wait for async operations
pub async fn wait_for_condition<F>(mut condition: F, timeout_seconds: u64) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    let timeout = Duration::from_secs(timeout_seconds);

    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    false
}
