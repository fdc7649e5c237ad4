use anyhow::{anyhow, Context};
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::types::Bounds;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{BrowserHandle, BrowserPage, BrowserProvider};
use crate::config::{BrowserStrategy, Viewport};

/// Keeps an idle browser alive across the settle delays of a crawl.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(120);

/// headless_chrome is blocking; every CDP call runs on the blocking pool.
async fn blocking<T, F>(op: &'static str, f: F) -> anyhow::Result<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| anyhow!("{} task panicked: {}", op, e))?
}

fn launch_local(executable: &Path, sandbox: bool) -> anyhow::Result<Browser> {
    let options = LaunchOptions::default_builder()
        .headless(true)
        .sandbox(sandbox)
        .path(Some(executable.to_path_buf()))
        .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
        .build()
        .map_err(|e| anyhow!("invalid launch options: {}", e))?;
    Browser::new(options).with_context(|| format!("failed to launch {}", executable.display()))
}

/// Browser provider backed by a real Chromium.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChromeProvider;

impl ChromeProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BrowserProvider for ChromeProvider {
    fn locate_local_binary(&self) -> Option<PathBuf> {
        headless_chrome::browser::default_executable().ok()
    }

    async fn launch(&self, strategy: &BrowserStrategy) -> anyhow::Result<Box<dyn BrowserHandle>> {
        let strategy = strategy.clone();
        let browser = blocking("launch", move || match strategy {
            BrowserStrategy::Remote { ws_url } => {
                Browser::connect(ws_url).context("failed to connect to remote browser")
            }
            // Serverless sandboxes forbid the Chromium sandbox.
            BrowserStrategy::Serverless { executable } => launch_local(&executable, false),
            BrowserStrategy::Local { executable } => launch_local(&executable, true),
        })
        .await?;

        Ok(Box::new(ChromeHandle {
            browser: Mutex::new(Some(browser)),
        }))
    }
}

struct ChromeHandle {
    browser: Mutex<Option<Browser>>,
}

impl ChromeHandle {
    fn browser(&self) -> anyhow::Result<Browser> {
        self.browser
            .lock()
            .map_err(|_| anyhow!("browser lock poisoned"))?
            .clone()
            .ok_or_else(|| anyhow!("browser already closed"))
    }
}

#[async_trait]
impl BrowserHandle for ChromeHandle {
    async fn new_page(&self) -> anyhow::Result<Box<dyn BrowserPage>> {
        let browser = self.browser()?;
        let tab = blocking("new_tab", move || browser.new_tab()).await?;
        Ok(Box::new(ChromePage { tab }))
    }

    async fn close(&self) -> anyhow::Result<()> {
        let browser = self
            .browser
            .lock()
            .map_err(|_| anyhow!("browser lock poisoned"))?
            .take();
        if let Some(browser) = browser {
            // Dropping the last handle kills a launched process or
            // disconnects from a remote one.
            blocking("close", move || {
                drop(browser);
                Ok(())
            })
            .await?;
        }
        Ok(())
    }
}

struct ChromePage {
    tab: Arc<Tab>,
}

#[async_trait]
impl BrowserPage for ChromePage {
    async fn navigate(&self, url: &str, timeout: Duration) -> anyhow::Result<()> {
        let tab = self.tab.clone();
        let url = url.to_string();
        blocking("navigate", move || {
            tab.set_default_timeout(timeout);
            tab.navigate_to(&url)
                .with_context(|| format!("navigation to {} failed", url))?;
            tab.wait_until_navigated()
                .with_context(|| format!("page load of {} failed", url))?;
            Ok(())
        })
        .await
    }

    async fn content(&self) -> anyhow::Result<String> {
        let tab = self.tab.clone();
        blocking("content", move || tab.get_content()).await
    }

    async fn screenshot(&self) -> anyhow::Result<Vec<u8>> {
        let tab = self.tab.clone();
        blocking("screenshot", move || {
            tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
        })
        .await
    }

    async fn set_viewport(&self, viewport: Viewport) -> anyhow::Result<()> {
        let tab = self.tab.clone();
        blocking("set_viewport", move || {
            tab.set_bounds(Bounds::Normal {
                left: Some(0),
                top: Some(0),
                width: Some(f64::from(viewport.width)),
                height: Some(f64::from(viewport.height)),
            })?;
            Ok(())
        })
        .await
    }

    async fn evaluate(&self, script: &str) -> anyhow::Result<serde_json::Value> {
        let tab = self.tab.clone();
        let script = script.to_string();
        blocking("evaluate", move || {
            let result = tab.evaluate(&script, true)?;
            Ok(result.value.unwrap_or(serde_json::Value::Null))
        })
        .await
    }
}
