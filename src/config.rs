//! Immutable audit configuration.
//!
//! Built once (usually from the process environment) and injected into the
//! orchestrator. Components never read the environment themselves.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_LAB_ENDPOINT: &str = "https://www.googleapis.com/pagespeedonline/v5/runPagespeed";
const DEFAULT_COMPLETION_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Device profile requested from the lab-measurement API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabStrategy {
    #[default]
    Mobile,
    Desktop,
}

impl LabStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabStrategy::Mobile => "mobile",
            LabStrategy::Desktop => "desktop",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LabConfig {
    pub api_key: Option<String>,
    pub endpoint: String,
    pub strategy: LabStrategy,
    /// Hard deadline for the whole lab call.
    pub timeout: Duration,
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_LAB_ENDPOINT.to_string(),
            strategy: LabStrategy::Mobile,
            timeout: Duration::from_secs(12),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// How the crawler obtains its browser. Exactly one is selected per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserStrategy {
    /// Remote browser farm reached over a websocket endpoint.
    Remote { ws_url: String },
    /// Bundled binary shipped for serverless runtimes.
    Serverless { executable: PathBuf },
    /// Binary installed on the host.
    Local { executable: PathBuf },
}

impl BrowserStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            BrowserStrategy::Remote { .. } => "remote",
            BrowserStrategy::Serverless { .. } => "serverless",
            BrowserStrategy::Local { .. } => "local",
        }
    }
}

#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub remote_endpoint: Option<String>,
    pub remote_token: Option<String>,
    pub serverless: bool,
    pub bundled_executable: Option<PathBuf>,
    pub local_executable: Option<PathBuf>,
    pub navigation_timeout: Duration,
    pub settle_delay: Duration,
    pub mobile_settle_delay: Duration,
    pub desktop_viewport: Viewport,
    pub mobile_viewport: Viewport,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            remote_endpoint: None,
            remote_token: None,
            serverless: false,
            bundled_executable: None,
            local_executable: None,
            navigation_timeout: Duration::from_secs(45),
            settle_delay: Duration::from_secs(3),
            mobile_settle_delay: Duration::from_secs(1),
            desktop_viewport: Viewport {
                width: 1920,
                height: 1080,
            },
            mobile_viewport: Viewport {
                width: 375,
                height: 812,
            },
        }
    }
}

impl BrowserConfig {
    /// Picks the provisioning strategy. Precedence: remote farm (endpoint and
    /// token both set), then the serverless bundle, then a local binary
    /// (configured path first, then whatever `locate_local` finds).
    pub fn select_strategy(
        &self,
        locate_local: impl FnOnce() -> Option<PathBuf>,
    ) -> Option<BrowserStrategy> {
        if let (Some(endpoint), Some(token)) = (&self.remote_endpoint, &self.remote_token) {
            let separator = if endpoint.contains('?') { '&' } else { '?' };
            return Some(BrowserStrategy::Remote {
                ws_url: format!("{endpoint}{separator}token={token}"),
            });
        }

        if self.serverless {
            if let Some(executable) = &self.bundled_executable {
                return Some(BrowserStrategy::Serverless {
                    executable: executable.clone(),
                });
            }
        }

        self.local_executable
            .clone()
            .or_else(locate_local)
            .map(|executable| BrowserStrategy::Local { executable })
    }
}

#[derive(Debug, Clone)]
pub struct NarrativeConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub summary_max_tokens: u32,
    pub issue_max_tokens: u32,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    /// Concurrent per-issue enrichment calls.
    pub concurrency: usize,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_COMPLETION_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            summary_max_tokens: 1200,
            issue_max_tokens: 500,
            timeout: Duration::from_secs(30),
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
            concurrency: 3,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuditConfig {
    pub lab: LabConfig,
    pub browser: BrowserConfig,
    pub narrative: NarrativeConfig,
}

impl AuditConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup. Empty values count
    /// as unset; unparsable numbers fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        config.lab.api_key = get("PAGESPEED_API_KEY");
        if let Some(endpoint) = get("PAGESPEED_ENDPOINT") {
            config.lab.endpoint = endpoint;
        }
        if get("PAGESPEED_STRATEGY").as_deref() == Some("desktop") {
            config.lab.strategy = LabStrategy::Desktop;
        }

        config.browser.remote_endpoint = get("BROWSER_WS_ENDPOINT");
        config.browser.remote_token = get("BROWSER_TOKEN");
        config.browser.serverless =
            get("AWS_LAMBDA_FUNCTION_NAME").is_some() || get("VERCEL").is_some();
        config.browser.bundled_executable = get("CHROMIUM_BUNDLED_PATH").map(PathBuf::from);
        config.browser.local_executable = get("CHROME_EXECUTABLE_PATH").map(PathBuf::from);

        config.narrative.api_key = get("OPENAI_API_KEY");
        if let Some(base_url) = get("OPENAI_BASE_URL") {
            config.narrative.base_url = base_url;
        }
        if let Some(model) = get("OPENAI_MODEL") {
            config.narrative.model = model;
        }
        if let Some(concurrency) = get("AUDIT_ENRICH_CONCURRENCY").and_then(|v| v.parse().ok()) {
            config.narrative.concurrency = concurrency;
        }

        config
    }

    pub fn with_lab(mut self, lab: LabConfig) -> Self {
        self.lab = lab;
        self
    }

    pub fn with_browser(mut self, browser: BrowserConfig) -> Self {
        self.browser = browser;
        self
    }

    pub fn with_narrative(mut self, narrative: NarrativeConfig) -> Self {
        self.narrative = narrative;
        self
    }
}

/// Per-run adjustments supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub lab_strategy: Option<LabStrategy>,
    pub skip_narrative: bool,
    pub enrich_concurrency: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn remote_strategy_wins_when_endpoint_and_token_set() {
        let config = AuditConfig::from_lookup(lookup(&[
            ("BROWSER_WS_ENDPOINT", "wss://farm.example.com"),
            ("BROWSER_TOKEN", "secret"),
            ("VERCEL", "1"),
            ("CHROMIUM_BUNDLED_PATH", "/opt/chromium"),
        ]));
        let strategy = config.browser.select_strategy(|| None);
        assert_eq!(
            strategy,
            Some(BrowserStrategy::Remote {
                ws_url: "wss://farm.example.com?token=secret".into()
            })
        );
    }

    #[test]
    fn serverless_requires_bundle() {
        let config = AuditConfig::from_lookup(lookup(&[("AWS_LAMBDA_FUNCTION_NAME", "audit")]));
        assert!(config.browser.serverless);
        assert_eq!(config.browser.select_strategy(|| None), None);

        let config = AuditConfig::from_lookup(lookup(&[
            ("AWS_LAMBDA_FUNCTION_NAME", "audit"),
            ("CHROMIUM_BUNDLED_PATH", "/opt/chromium"),
        ]));
        assert_eq!(
            config.browser.select_strategy(|| None).map(|s| s.name()),
            Some("serverless")
        );
    }

    #[test]
    fn local_falls_back_to_probe() {
        let config = AuditConfig::from_lookup(lookup(&[]));
        let strategy = config
            .browser
            .select_strategy(|| Some(PathBuf::from("/usr/bin/chromium")));
        assert_eq!(
            strategy,
            Some(BrowserStrategy::Local {
                executable: PathBuf::from("/usr/bin/chromium")
            })
        );
    }

    #[test]
    fn token_without_endpoint_is_ignored() {
        let config = AuditConfig::from_lookup(lookup(&[("BROWSER_TOKEN", "secret")]));
        assert_eq!(config.browser.select_strategy(|| None), None);
    }

    #[test]
    fn narrative_settings_from_lookup() {
        let config = AuditConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_MODEL", "gpt-4o"),
            ("AUDIT_ENRICH_CONCURRENCY", "5"),
            ("PAGESPEED_API_KEY", "  "),
        ]));
        assert_eq!(config.narrative.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.narrative.model, "gpt-4o");
        assert_eq!(config.narrative.concurrency, 5);
        assert_eq!(config.lab.api_key, None);
        assert_eq!(config.lab.timeout, Duration::from_secs(12));
    }
}
