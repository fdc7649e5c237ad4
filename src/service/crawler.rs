//! Renders the target page in a headless browser and captures a snapshot.

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{BrowserConfig, BrowserStrategy};
use crate::domain::snapshot::{PageResources, PageSnapshot, Screenshots};
use crate::error::{AuditError, Result};
use crate::service::browser::{BrowserHandle, BrowserPage, BrowserProvider};

/// Enumerates resources and re-requests the document for its status and
/// headers. Returns a JSON string so the value survives any CDP serializer.
const PAGE_PROBE_SCRIPT: &str = r#"(async () => {
  const uniq = (xs) => [...new Set(xs.filter(Boolean))];
  const scripts = uniq([...document.scripts].map((s) => s.src));
  const styles = uniq([...document.querySelectorAll('link[rel="stylesheet"]')].map((l) => l.href));
  const images = uniq([...document.images].map((i) => i.currentSrc || i.src));
  const fonts = document.fonts ? uniq([...document.fonts].map((f) => f.family.replace(/["']/g, ''))) : [];
  let status = 0;
  const headers = {};
  try {
    const res = await fetch(location.href, { method: 'HEAD', credentials: 'include' });
    status = res.status;
    res.headers.forEach((value, key) => { headers[key.toLowerCase()] = value; });
  } catch (e) {}
  return JSON.stringify({ resources: { scripts, styles, images, fonts }, status, headers });
})()"#;

/// Shape returned by [`PAGE_PROBE_SCRIPT`].
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PageProbe {
    resources: PageResources,
    status: u16,
    headers: HashMap<String, String>,
}

impl PageProbe {
    fn from_value(value: serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(raw) => serde_json::from_str(&raw).ok(),
            serde_json::Value::Null => None,
            other => serde_json::from_value(other).ok(),
        }
    }
}

pub struct CrawlerService {
    config: BrowserConfig,
    provider: Arc<dyn BrowserProvider>,
    handle: Option<Box<dyn BrowserHandle>>,
}

impl CrawlerService {
    pub fn new(config: BrowserConfig, provider: Arc<dyn BrowserProvider>) -> Self {
        Self {
            config,
            provider,
            handle: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.handle.is_some()
    }

    /// Picks exactly one provisioning strategy and launches the browser.
    pub async fn initialize(&mut self) -> Result<BrowserStrategy> {
        if self.handle.is_some() {
            return Err(AuditError::crawl("crawler already initialized"));
        }

        let provider = self.provider.clone();
        let strategy = self
            .config
            .select_strategy(|| provider.locate_local_binary())
            .ok_or_else(|| {
                AuditError::crawl("no browser available: no remote endpoint, bundle or local binary")
            })?;

        tracing::info!("[CRAWLER] Launching browser with {} strategy", strategy.name());
        let handle = self.provider.launch(&strategy).await.map_err(|e| {
            AuditError::crawl(format!("{} browser launch failed: {:#}", strategy.name(), e))
        })?;

        self.handle = Some(handle);
        Ok(strategy)
    }

    /// Captures the page. Only navigation and content capture are fatal;
    /// screenshots and the resource probe degrade to empty values.
    pub async fn crawl(&self, url: &str) -> Result<PageSnapshot> {
        let handle = self
            .handle
            .as_ref()
            .ok_or_else(|| AuditError::crawl("crawler not initialized"))?;

        let page = handle
            .new_page()
            .await
            .map_err(|e| AuditError::crawl(format!("failed to open page: {:#}", e)))?;

        page.set_viewport(self.config.desktop_viewport)
            .await
            .unwrap_or_else(|e| tracing::debug!("[CRAWLER] Desktop viewport not applied: {:#}", e));

        let started = Instant::now();
        let timeout = self.config.navigation_timeout;
        match tokio::time::timeout(timeout + Duration::from_secs(1), page.navigate(url, timeout)).await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(AuditError::crawl(format!("navigation to {} failed: {:#}", url, e)))
            }
            Err(_) => {
                return Err(AuditError::crawl(format!(
                    "navigation to {} timed out after {}s",
                    url,
                    timeout.as_secs()
                )))
            }
        }
        let load_time_ms = started.elapsed().as_millis() as u64;
        tracing::info!("[CRAWLER] Loaded {} in {}ms", url, load_time_ms);

        tokio::time::sleep(self.config.settle_delay).await;

        let html = page
            .content()
            .await
            .map_err(|e| AuditError::crawl(format!("failed to read page content: {:#}", e)))?;

        let desktop = Self::screenshot(page.as_ref(), "desktop").await;

        let mobile = match page.set_viewport(self.config.mobile_viewport).await {
            Ok(()) => {
                tokio::time::sleep(self.config.mobile_settle_delay).await;
                Self::screenshot(page.as_ref(), "mobile").await
            }
            Err(e) => {
                tracing::warn!("[CRAWLER] Mobile viewport failed, skipping screenshot: {:#}", e);
                Vec::new()
            }
        };

        let probe = match page.evaluate(PAGE_PROBE_SCRIPT).await {
            Ok(value) => PageProbe::from_value(value).unwrap_or_else(|| {
                tracing::warn!("[CRAWLER] Resource probe returned an unreadable value");
                PageProbe::default()
            }),
            Err(e) => {
                tracing::warn!("[CRAWLER] Resource probe failed: {:#}", e);
                PageProbe::default()
            }
        };

        let headers = probe
            .headers
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();

        tracing::debug!(
            "[CRAWLER] Snapshot: {} bytes html, {} scripts, status {}",
            html.len(),
            probe.resources.scripts.len(),
            probe.status
        );

        Ok(PageSnapshot {
            url: url.to_string(),
            html,
            screenshots: Screenshots { desktop, mobile },
            resources: probe.resources,
            headers,
            status: probe.status,
            load_time_ms,
        })
    }

    async fn screenshot(page: &dyn BrowserPage, label: &str) -> Vec<u8> {
        page.screenshot().await.unwrap_or_else(|e| {
            tracing::warn!("[CRAWLER] {} screenshot failed: {:#}", label, e);
            Vec::new()
        })
    }

    /// Releases the browser. Safe to call any number of times.
    pub async fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            match handle.close().await {
                Ok(()) => tracing::info!("[CRAWLER] Browser closed"),
                Err(e) => tracing::warn!("[CRAWLER] Browser close failed: {:#}", e),
            }
        }
    }
}
