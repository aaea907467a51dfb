use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::ScraperConfig;
use crate::utils::error::ExtractionError;

/// A page after JavaScript has run, as the extraction strategies see it.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub requested_url: String,
    pub final_url: String, // After redirects
    pub html: String,
    pub lang: Option<String>,
}

impl RenderedPage {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            requested_url: url.clone(),
            final_url: url,
            html: html.into(),
            lang: None,
        }
    }
}

/// Browser-automation capability used by the price extractor.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &str) -> Result<RenderedPage, ExtractionError>;
}

/// Renders pages in a shared headless Chrome instance. The browser is
/// launched on first use and relaunched if it has gone away between cycles.
pub struct ChromeRenderer {
    slot: Arc<BrowserSlot>,
}

struct BrowserSlot {
    config: ScraperConfig,
    browser: Mutex<Option<Arc<Browser>>>,
}

impl ChromeRenderer {
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            slot: Arc::new(BrowserSlot {
                config,
                browser: Mutex::new(None),
            }),
        }
    }
}

impl BrowserSlot {
    fn launch(&self) -> Result<Browser, ExtractionError> {
        let mut launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false) // Often needed in containerized environments
            .idle_browser_timeout(Duration::from_secs(self.config.product_timeout_secs.max(60) * 10))
            .args(vec![
                std::ffi::OsStr::new("--no-sandbox"),
                std::ffi::OsStr::new("--disable-dev-shm-usage"),
                std::ffi::OsStr::new("--disable-gpu"),
                std::ffi::OsStr::new("--disable-extensions"),
                std::ffi::OsStr::new("--disable-blink-features=AutomationControlled"),
            ])
            .build()
            .map_err(|e| ExtractionError::Network(format!("Failed to create launch options: {}", e)))?;

        if let Some(chrome_path) = &self.config.chrome_path {
            launch_options.path = Some(std::path::PathBuf::from(chrome_path));
        }

        tracing::info!("Launching headless browser");
        Browser::new(launch_options)
            .map_err(|e| ExtractionError::Network(format!("Failed to launch browser: {}", e)))
    }

    fn browser(&self, relaunch: bool) -> Result<Arc<Browser>, ExtractionError> {
        let mut slot = self
            .browser
            .lock()
            .map_err(|_| ExtractionError::Network("Browser slot poisoned".to_string()))?;

        if relaunch {
            *slot = None;
        }

        if let Some(browser) = slot.as_ref() {
            return Ok(Arc::clone(browser));
        }

        let browser = Arc::new(self.launch()?);
        *slot = Some(Arc::clone(&browser));
        Ok(browser)
    }

    fn open_tab(&self) -> Result<Arc<Tab>, ExtractionError> {
        match self.browser(false)?.new_tab() {
            Ok(tab) => Ok(tab),
            Err(e) => {
                tracing::warn!("Browser unavailable ({}), relaunching", e);
                self.browser(true)?
                    .new_tab()
                    .map_err(|e| ExtractionError::Network(format!("Failed to create tab: {}", e)))
            }
        }
    }
}

#[async_trait]
impl PageRenderer for ChromeRenderer {
    async fn render(&self, url: &str) -> Result<RenderedPage, ExtractionError> {
        let slot = Arc::clone(&self.slot);
        let url = url.to_string();

        // headless_chrome talks to the browser synchronously
        tokio::task::spawn_blocking(move || {
            let tab = slot.open_tab()?;
            let timeout = Duration::from_secs(slot.config.request_timeout_secs);
            let result = render_in_tab(&tab, &url, &slot.config.user_agent, timeout);
            // Close tab to free resources
            let _ = tab.close(true);
            result
        })
        .await
        .map_err(|e| ExtractionError::Network(format!("Render task failed: {}", e)))?
    }
}

fn render_in_tab(
    tab: &Tab,
    url: &str,
    user_agent: &str,
    timeout: Duration,
) -> Result<RenderedPage, ExtractionError> {
    let start_time = std::time::Instant::now();
    let seconds = timeout.as_secs();

    tab.set_default_timeout(timeout);
    tab.set_user_agent(user_agent, Some("en-US,en;q=0.9"), None)
        .map_err(|e| classify_browser_error(&e.to_string(), seconds))?;

    tab.navigate_to(url)
        .map_err(|e| classify_browser_error(&e.to_string(), seconds))?;
    tab.wait_until_navigated()
        .map_err(|e| classify_browser_error(&e.to_string(), seconds))?;

    if let Some(status) = evaluate_u16(
        tab,
        "(performance.getEntriesByType('navigation')[0] || {}).responseStatus || 0",
    ) {
        if status >= 400 {
            return Err(ExtractionError::HttpStatus { status });
        }
    }

    let html = tab
        .get_content()
        .map_err(|e| classify_browser_error(&e.to_string(), seconds))?;

    // Get final URL after redirects
    let final_url = {
        let current = tab.get_url();
        if current.is_empty() { url.to_string() } else { current }
    };

    let lang = tab
        .evaluate("document.documentElement.lang", false)
        .ok()
        .and_then(|remote| remote.value)
        .and_then(|value| value.as_str().map(str::to_string))
        .filter(|lang| !lang.is_empty());

    tracing::debug!(
        "Rendered {} in {}ms ({} bytes)",
        final_url,
        start_time.elapsed().as_millis(),
        html.len()
    );

    Ok(RenderedPage {
        requested_url: url.to_string(),
        final_url,
        html,
        lang,
    })
}

fn evaluate_u16(tab: &Tab, expression: &str) -> Option<u16> {
    tab.evaluate(expression, false)
        .ok()
        .and_then(|remote| remote.value)
        .and_then(|value| value.as_u64())
        .and_then(|n| u16::try_from(n).ok())
        .filter(|n| *n > 0)
}

/// Map a browser error message onto the extraction taxonomy. Aborted
/// navigations and detached frames are what a retail site's bot protection
/// looks like from the browser side.
pub fn classify_browser_error(message: &str, timeout_secs: u64) -> ExtractionError {
    let lower = message.to_lowercase();
    if lower.contains("net::err_aborted") || lower.contains("frame was detached") {
        ExtractionError::Blocked(message.to_string())
    } else if lower.contains("timeout") || lower.contains("timed out") {
        ExtractionError::Timeout { seconds: timeout_secs }
    } else {
        ExtractionError::Network(message.to_string())
    }
}
