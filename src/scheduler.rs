use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use validator::Validate;

use crate::config_store::ConfigStore;
use crate::history_store::HistoryStore;
use crate::models::{CheckResult, MonitorConfig, MonitorStatus, PriceObservation, Product};
use crate::plugins::traits::{NotificationSink, PriceAlert};
use crate::price_extractor::{PriceResult, PriceSource};
use crate::utils::error::{AppError, ExtractionError, NotificationError, Result};

/// A failed dispatch is retried once, then given up on.
const NOTIFY_ATTEMPTS: usize = 2;

#[derive(Debug, Default)]
struct EngineState {
    is_running: bool,
    // Bumped by every start; a loop only clears `is_running` for its own run
    generation: u64,
    last_cycle_at: Option<DateTime<Utc>>,
    last_results: Vec<CheckResult>,
}

struct LoopHandle {
    generation: u64,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

struct EngineInner {
    config_store: Arc<ConfigStore>,
    history: Arc<HistoryStore>,
    source: Arc<dyn PriceSource>,
    sink: Arc<dyn NotificationSink>,
    product_timeout: Duration,
    state: Mutex<EngineState>,
    // Last known "target met" per product id
    met_state: tokio::sync::Mutex<HashMap<String, bool>>,
    cycle_lock: tokio::sync::Mutex<()>,
}

/// Owns the monitoring lifecycle: a background loop that runs a check cycle
/// every `check_interval_minutes`, plus on-demand cycles. At most one cycle
/// runs at a time whoever triggered it.
pub struct MonitorEngine {
    inner: Arc<EngineInner>,
    handle: tokio::sync::Mutex<Option<LoopHandle>>,
}

impl MonitorEngine {
    pub fn new(
        config_store: Arc<ConfigStore>,
        history: Arc<HistoryStore>,
        source: Arc<dyn PriceSource>,
        sink: Arc<dyn NotificationSink>,
        product_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                config_store,
                history,
                source,
                sink,
                product_timeout,
                state: Mutex::new(EngineState::default()),
                met_state: tokio::sync::Mutex::new(HashMap::new()),
                cycle_lock: tokio::sync::Mutex::new(()),
            }),
            handle: tokio::sync::Mutex::new(None),
        }
    }

    /// Start the background loop. Returns false when it was already running.
    pub async fn start(&self) -> bool {
        let mut handle = self.handle.lock().await;
        if handle.as_ref().is_some_and(|h| !h.task.is_finished()) {
            tracing::debug!("Monitoring already running");
            return false;
        }

        let (cancel, cancel_rx) = watch::channel(false);
        let generation = {
            let mut state = self.inner.state();
            state.generation += 1;
            state.is_running = true;
            state.generation
        };

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move { inner.run_loop(generation, cancel_rx).await });
        *handle = Some(LoopHandle {
            generation,
            cancel,
            task,
        });

        tracing::info!("Monitoring started");
        true
    }

    /// Stop the background loop, waiting for the product being checked to
    /// finish. Returns false when it was not running.
    ///
    /// The handle stays locked until the loop has exited, so a `start` racing
    /// with this call waits and then launches a fresh loop.
    pub async fn stop(&self) -> bool {
        let mut slot = self.handle.lock().await;
        let Some(handle) = slot.take() else {
            return false;
        };

        let _ = handle.cancel.send(true);
        if let Err(e) = handle.task.await {
            if e.is_panic() {
                tracing::error!("Monitoring loop had already failed: {}", e);
            }
        }
        {
            let mut state = self.inner.state();
            if state.generation == handle.generation {
                state.is_running = false;
            }
        }
        drop(slot);

        tracing::info!("Monitoring stopped");
        true
    }

    /// Run one cycle now. Fails with [`AppError::EngineBusy`] instead of
    /// waiting when a cycle is already in flight.
    ///
    /// The cycle runs on its own task: dropping the returned future (a client
    /// hanging up) does not abandon a product halfway through.
    pub async fn run_cycle_now(&self) -> Result<Vec<CheckResult>> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.run_cycle(None).await })
            .await
            .map_err(|e| AppError::Internal(format!("Check cycle task failed: {}", e)))?
    }

    pub fn is_running(&self) -> bool {
        self.inner.state().is_running
    }

    pub fn cycle_in_flight(&self) -> bool {
        self.inner.cycle_lock.try_lock().is_err()
    }

    pub fn last_results(&self) -> Vec<CheckResult> {
        self.inner.state().last_results.clone()
    }

    pub async fn status(&self) -> MonitorStatus {
        let monitor = self.inner.config_store.get_monitor_config().await;
        let total_products = self.inner.config_store.product_count().await;
        let cycle_in_flight = self.cycle_in_flight();

        let state = self.inner.state();
        MonitorStatus {
            is_running: state.is_running,
            cycle_in_flight,
            total_products,
            last_cycle_at: state.last_cycle_at,
            check_interval_minutes: monitor.check_interval_minutes,
        }
    }
}

/// Marks the engine stopped however the loop ends, including a panic, unless
/// a newer loop has been started since.
struct RunningGuard<'a> {
    inner: &'a EngineInner,
    generation: u64,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            tracing::error!("Monitoring loop panicked, engine is now stopped");
        }
        let mut state = self.inner.state();
        if state.generation == self.generation {
            state.is_running = false;
        }
    }
}

fn is_cancelled(cancel: &watch::Receiver<bool>) -> bool {
    // A dropped sender means the engine itself is gone
    *cancel.borrow() || cancel.has_changed().is_err()
}

impl EngineInner {
    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn run_loop(self: Arc<Self>, generation: u64, mut cancel: watch::Receiver<bool>) {
        let _guard = RunningGuard {
            inner: &*self,
            generation,
        };

        loop {
            if is_cancelled(&cancel) {
                break;
            }

            match self.run_cycle(Some(&cancel)).await {
                Ok(results) => tracing::debug!("Scheduled cycle checked {} products", results.len()),
                Err(AppError::EngineBusy) => tracing::debug!("Skipping scheduled cycle, one is already in flight"),
                Err(e) => tracing::error!("Scheduled cycle failed: {}", e),
            }

            // Re-read so interval changes apply from the next wait
            let interval = self.config_store.get_monitor_config().await.interval();
            tracing::debug!("Next cycle in {:?}", interval);

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = cancel.changed() => {}
            }
        }
    }

    async fn run_cycle(&self, cancel: Option<&watch::Receiver<bool>>) -> Result<Vec<CheckResult>> {
        let _cycle = self.cycle_lock.try_lock().map_err(|_| AppError::EngineBusy)?;
        let started = Instant::now();
        counter!("price_watch_cycles_total").increment(1);

        // Snapshot; edits made during the cycle apply to the next one
        let products = self.config_store.get_products().await;
        let monitor = self.config_store.get_monitor_config().await;

        // Deleted products; a re-added one is seeded from history again
        self.met_state
            .lock()
            .await
            .retain(|id, _| products.iter().any(|p| &p.id == id));
        tracing::info!("Starting price check cycle for {} products", products.len());

        let mut results = Vec::with_capacity(products.len());
        for product in &products {
            if cancel.is_some_and(is_cancelled) {
                tracing::info!("Cycle cancelled after {} of {} products", results.len(), products.len());
                break;
            }
            results.push(self.check_product(product, &monitor).await);
        }

        let met = results.iter().filter(|r| r.price_met).count();
        let failed = results.iter().filter(|r| r.error.is_some()).count();
        tracing::info!(
            "Cycle finished in {:.1}s: {} checked, {} at target, {} failed",
            started.elapsed().as_secs_f64(),
            results.len(),
            met,
            failed
        );

        {
            let mut state = self.state();
            state.last_cycle_at = Some(Utc::now());
            state.last_results = results.clone();
        }
        histogram!("price_watch_cycle_duration_seconds").record(started.elapsed().as_secs_f64());

        Ok(results)
    }

    async fn check_product(&self, product: &Product, monitor: &MonitorConfig) -> CheckResult {
        if let Err(e) = product.validate() {
            tracing::warn!(product = %product.name, "Skipping invalid product: {}", e);
            counter!("price_watch_checks_total", "outcome" => "invalid").increment(1);
            return CheckResult::failed(&product.id, &product.name, product.target_price, format!("Invalid product: {}", e));
        }

        tracing::debug!(product = %product.name, "Checking {}", product.url);
        let outcome = match tokio::time::timeout(self.product_timeout, self.source.extract(&product.url)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ExtractionError::Timeout {
                seconds: self.product_timeout.as_secs(),
            }),
        };

        match outcome {
            Ok(found) => self.record_price(product, found, monitor).await,
            Err(e) => {
                tracing::warn!(product = %product.name, "Price check failed: {}", e);
                counter!("price_watch_checks_total", "outcome" => "error").increment(1);

                let observation = PriceObservation::failure(&product.name, &product.url, e.to_string());
                self.append_history(&product.name, observation).await;
                CheckResult::failed(&product.id, &product.name, product.target_price, e.to_string())
            }
        }
    }

    async fn record_price(&self, product: &Product, found: PriceResult, monitor: &MonitorConfig) -> CheckResult {
        // Read before appending, or the seed would be this very observation
        let previously_met = self.previous_met_state(product).await;

        let observation =
            PriceObservation::success(&product.name, &product.url, found.price, &found.currency, found.method);
        self.append_history(&product.name, observation).await;
        counter!("price_watch_checks_total", "outcome" => "success").increment(1);

        let price_met = product.is_target_met(found.price);
        self.met_state.lock().await.insert(product.id.clone(), price_met);

        tracing::info!(
            product = %product.name,
            "Price {} {} (target {}){}",
            found.price,
            found.currency,
            product.target_price,
            if price_met { ", target met" } else { "" }
        );

        let mut notified = false;
        if price_met && previously_met != Some(true) {
            if monitor.notification_settings.enabled {
                let alert = PriceAlert {
                    product_id: product.id.clone(),
                    product_name: product.name.clone(),
                    observed_price: found.price,
                    target_price: product.target_price,
                    currency: found.currency.clone(),
                    url: product.url.clone(),
                };
                notified = self.dispatch(&alert).await;
            } else {
                tracing::info!(product = %product.name, "Target met but notifications are disabled");
            }
        }

        CheckResult {
            product_id: product.id.clone(),
            name: product.name.clone(),
            current_price: Some(found.price),
            currency: Some(found.currency),
            target_price: product.target_price,
            price_met,
            extraction_method: Some(found.method),
            notified,
            error: None,
        }
    }

    async fn previous_met_state(&self, product: &Product) -> Option<bool> {
        if let Some(met) = self.met_state.lock().await.get(&product.id) {
            return Some(*met);
        }

        // First sighting since start-up
        self.history
            .latest_successful(&product.name)
            .await
            .and_then(|obs| obs.observed_price)
            .map(|price| product.is_target_met(price))
    }

    async fn append_history(&self, product_name: &str, observation: PriceObservation) {
        if let Err(e) = self.history.append(product_name, observation).await {
            tracing::error!(product = %product_name, "Failed to record price history: {}", e);
        }
    }

    async fn dispatch(&self, alert: &PriceAlert) -> bool {
        for attempt in 1..=NOTIFY_ATTEMPTS {
            match self.sink.notify(alert).await {
                Ok(()) => {
                    counter!("price_watch_notifications_total", "outcome" => "sent").increment(1);
                    tracing::info!(product = %alert.product_name, "Price alert sent");
                    return true;
                }
                Err(e @ NotificationError::NotConfigured { .. }) => {
                    tracing::warn!(product = %alert.product_name, "Price alert not sent: {}", e);
                    break;
                }
                Err(e) => {
                    tracing::warn!(
                        product = %alert.product_name,
                        "Price alert attempt {}/{} failed: {}",
                        attempt,
                        NOTIFY_ATTEMPTS,
                        e
                    );
                }
            }
        }

        counter!("price_watch_notifications_total", "outcome" => "failed").increment(1);
        false
    }
}
