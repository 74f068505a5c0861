use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetUserAgentOverrideParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::browser::stealth::{stealth_init_params, UserAgentGenerator};
use crate::config::Config;
use crate::error::{CrawlError, Result};

const LAUNCH_ATTEMPTS: u32 = 3;
const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Turns a URL into fully rendered HTML.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &str, wait_for: Option<&str>) -> Result<String>;
}

/// Headless Chromium used for listing pages that build their content with
/// JavaScript.
pub struct BrowserRenderer {
    browser: Mutex<Browser>,
    handler_task: JoinHandle<()>,
    user_agents: UserAgentGenerator,
    page_timeout: Duration,
    user_data_dir: PathBuf,
}

impl BrowserRenderer {
    pub async fn launch(config: &Config) -> Result<Self> {
        let page_timeout = config.page_timeout()?;

        // unique profile dir to avoid singleton lock issues between runs
        let user_data_dir = std::env::temp_dir().join(format!(
            "ai-news-digest-{}-{}",
            std::process::id(),
            uuid::Uuid::new_v4()
        ));
        std::fs::create_dir_all(&user_data_dir)
            .map_err(|e| CrawlError::BrowserError(format!("Failed to create profile directory: {}", e)))?;

        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg(format!("--user-data-dir={}", user_data_dir.display()))
            .args(vec![
                "--disable-gpu",
                "--disable-dev-shm-usage",
                "--disable-extensions",
                "--mute-audio",
                "--no-first-run",
                "--disable-default-apps",
                "--disable-sync",
                "--disable-blink-features=AutomationControlled", // hide automation
                "--log-level=3",
            ]);
        if !config.browser.headless {
            builder = builder.with_head();
        }
        let browser_config = builder
            .build()
            .map_err(|e| CrawlError::BrowserError(format!("Failed to create browser config: {}", e)))?;

        let (browser, handler_task) = Self::launch_with_retries(browser_config).await?;

        Ok(Self {
            browser: Mutex::new(browser),
            handler_task,
            user_agents: UserAgentGenerator::new(config.network.randomize_user_agents),
            page_timeout,
            user_data_dir,
        })
    }

    async fn launch_with_retries(browser_config: BrowserConfig) -> Result<(Browser, JoinHandle<()>)> {
        let mut last_error = String::new();
        for attempt in 1..=LAUNCH_ATTEMPTS {
            match Browser::launch(browser_config.clone()).await {
                Ok((browser, mut handler)) => {
                    info!("Browser launched successfully on attempt {}", attempt);

                    let handler_task = tokio::spawn(async move {
                        while let Some(event) = handler.next().await {
                            if let Err(e) = event {
                                // filter out common websocket deserialization errors
                                let error_msg = e.to_string();
                                if error_msg.contains("data did not match any variant")
                                    || error_msg.contains("untagged enum Message")
                                {
                                    debug!("Ignoring WebSocket deserialization error: {}", e);
                                } else {
                                    warn!("Browser handler error: {}", e);
                                }
                            }
                        }
                        debug!("Browser handler task ended");
                    });

                    return Ok((browser, handler_task));
                }
                Err(e) => {
                    error!("Browser launch attempt {} failed: {}", attempt, e);
                    last_error = e.to_string();
                    if attempt < LAUNCH_ATTEMPTS {
                        tokio::time::sleep(Duration::from_secs(2)).await;
                    }
                }
            }
        }

        Err(CrawlError::BrowserError(format!(
            "Failed to launch browser after {} attempts: {}",
            LAUNCH_ATTEMPTS, last_error
        ))
        .into())
    }

    async fn open_page(&self) -> Result<Page> {
        let browser = self.browser.lock().await;
        let page = tokio::time::timeout(Duration::from_secs(10), browser.new_page("about:blank"))
            .await
            .map_err(|_| CrawlError::BrowserError("Timeout creating new page".to_string()))?
            .map_err(|e| CrawlError::BrowserError(format!("Failed to create new page: {}", e)))?;
        drop(browser);

        let user_agent_params = SetUserAgentOverrideParams::builder()
            .user_agent(self.user_agents.user_agent())
            .accept_language("en-US,en;q=0.9")
            .build()
            .map_err(|e| CrawlError::BrowserError(format!("Failed to build user agent params: {}", e)))?;
        page.execute(user_agent_params)
            .await
            .map_err(|e| CrawlError::BrowserError(format!("Failed to set user agent: {}", e)))?;

        // must be registered before navigation to run ahead of page scripts
        if let Err(e) = page.execute(stealth_init_params()).await {
            debug!("Failed to install stealth script: {}", e);
        }

        Ok(page)
    }

    async fn load(&self, page: &Page, url: &str, wait_for: Option<&str>) -> Result<String> {
        page.goto(url)
            .await
            .map_err(|e| CrawlError::BrowserError(format!("Failed to navigate to {}: {}", url, e)))?;

        if let Some(selector) = wait_for {
            let waited = tokio::time::timeout(self.page_timeout, async {
                loop {
                    if page.find_element(selector).await.is_ok() {
                        return;
                    }
                    tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
                }
            })
            .await;
            if waited.is_err() {
                warn!("Timed out waiting for '{}' on {}, using current content", selector, url);
            }
        }

        page.content()
            .await
            .map_err(|e| CrawlError::BrowserError(format!("Failed to get page content: {}", e)).into())
    }

    /// Shuts down the last owner of a shared renderer. Returns `false`, and
    /// leaves Chromium running, while other owners remain.
    pub async fn shutdown_shared(self: Arc<Self>) -> Result<bool> {
        match Arc::try_unwrap(self) {
            Ok(renderer) => renderer.shutdown().await.map(|_| true),
            Err(shared) => {
                warn!(
                    "Browser still shared by {} owners, skipping shutdown",
                    Arc::strong_count(&shared) - 1
                );
                Ok(false)
            }
        }
    }

    pub async fn shutdown(self) -> Result<()> {
        info!("Shutting down browser");
        let mut browser = self.browser.into_inner();
        if let Err(e) = browser.close().await {
            warn!("Failed to close browser cleanly: {}", e);
        }
        let _ = browser.wait().await;
        self.handler_task.abort();

        if let Err(e) = std::fs::remove_dir_all(&self.user_data_dir) {
            debug!("Could not remove browser profile {:?}: {}", self.user_data_dir, e);
        }
        Ok(())
    }
}

#[async_trait]
impl PageRenderer for BrowserRenderer {
    async fn render(&self, url: &str, wait_for: Option<&str>) -> Result<String> {
        info!("Rendering {} in browser", url);
        let page = self.open_page().await?;

        let result = self.load(&page, url, wait_for).await;

        if let Err(e) = page.close().await {
            debug!("Failed to close page for {}: {}", url, e);
        }

        result
    }
}
