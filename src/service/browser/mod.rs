//! Headless browser abstraction used by the crawler.
//!
//! The crawler only sees these three traits. `ChromeProvider` drives a real
//! Chromium over CDP; tests use the scripted provider from `test_utils`.
//! Adapter errors are `anyhow` and get mapped to `AuditError` by the crawler.

mod chrome;

pub use chrome::ChromeProvider;

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{BrowserStrategy, Viewport};

#[async_trait]
pub trait BrowserProvider: Send + Sync {
    /// Path of a browser binary installed on this host, if any.
    fn locate_local_binary(&self) -> Option<PathBuf>;

    async fn launch(&self, strategy: &BrowserStrategy) -> anyhow::Result<Box<dyn BrowserHandle>>;
}

#[async_trait]
pub trait BrowserHandle: Send + Sync {
    async fn new_page(&self) -> anyhow::Result<Box<dyn BrowserPage>>;

    /// Releases the browser. Calling it again is a no-op.
    async fn close(&self) -> anyhow::Result<()>;
}

#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Loads `url` and waits for the navigation to finish within `timeout`.
    async fn navigate(&self, url: &str, timeout: Duration) -> anyhow::Result<()>;

    async fn content(&self) -> anyhow::Result<String>;

    /// PNG of the current viewport.
    async fn screenshot(&self) -> anyhow::Result<Vec<u8>>;

    async fn set_viewport(&self, viewport: Viewport) -> anyhow::Result<()>;

    /// Runs `script` in the page, awaiting a returned promise.
    async fn evaluate(&self, script: &str) -> anyhow::Result<serde_json::Value>;
}
