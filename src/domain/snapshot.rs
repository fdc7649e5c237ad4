//! Captured state of a crawled page.

use std::collections::HashMap;

/// Screenshots captured during the crawl, PNG encoded. Empty when capture failed.
#[derive(Debug, Clone, Default)]
pub struct Screenshots {
    pub desktop: Vec<u8>,
    pub mobile: Vec<u8>,
}

/// Resource URLs (and font families) enumerated in the rendered page.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct PageResources {
    pub scripts: Vec<String>,
    pub styles: Vec<String>,
    pub images: Vec<String>,
    pub fonts: Vec<String>,
}

/// Immutable snapshot built once per run and shared read-only with the
/// platform detector and the content scanners.
#[derive(Debug, Clone, Default)]
pub struct PageSnapshot {
    pub url: String,
    pub html: String,
    pub screenshots: Screenshots,
    pub resources: PageResources,
    /// Response headers with lowercased names.
    pub headers: HashMap<String, String>,
    pub status: u16,
    pub load_time_ms: u64,
}

impl PageSnapshot {
    /// Snapshot carrying only markup, used by tests and benches.
    pub fn from_html(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
            status: 200,
            ..Default::default()
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_https(&self) -> bool {
        url::Url::parse(&self.url)
            .map(|u| u.scheme() == "https")
            .unwrap_or(false)
    }
}
