//! Performance scanner backed by the lab-measurement (PageSpeed) API.
//!
//! Any failure of the lab call, including its deadline, degrades to zeroed
//! metrics and no issues. The run keeps going.

use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Instant;

use super::{Rule, ScanOutput};
use crate::config::{LabConfig, LabStrategy};
use crate::domain::metrics::PerformanceMetrics;
use crate::domain::models::{Category, IssueDraft, Severity};
use crate::error::{AuditError, Result};
use crate::service::http::{create_client, ClientType};
use crate::service::scoring::clamp_score;

const DETECTED_BY: &str = "PerformanceScanner";
const SERVICE: &str = "lab";

const LCP_CRITICAL_MS: f64 = 4000.0;
const LCP_HIGH_MS: f64 = 2500.0;
const CLS_CRITICAL: f64 = 0.25;
const CLS_MEDIUM: f64 = 0.1;
const TBT_HIGH_MS: f64 = 300.0;
const FCP_MEDIUM_MS: f64 = 3000.0;
const SERVER_RESPONSE_MEDIUM_MS: f64 = 600.0;

// ====== Lab API payload ======

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LabResponse {
    lighthouse_result: Option<LighthouseResult>,
}

#[derive(Debug, Default, Deserialize)]
struct LighthouseResult {
    #[serde(default)]
    categories: LabCategories,
    #[serde(default)]
    audits: HashMap<String, LabAudit>,
}

#[derive(Debug, Default, Deserialize)]
struct LabCategories {
    performance: Option<LabCategory>,
}

#[derive(Debug, Deserialize)]
struct LabCategory {
    score: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LabAudit {
    numeric_value: Option<f64>,
}

impl LighthouseResult {
    fn numeric(&self, audit: &str) -> f64 {
        self.audits
            .get(audit)
            .and_then(|a| a.numeric_value)
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    }

    fn into_metrics(self) -> PerformanceMetrics {
        let lab_score = self
            .categories
            .performance
            .as_ref()
            .and_then(|c| c.score)
            .map(|s| clamp_score(s * 100.0))
            .unwrap_or(0);

        PerformanceMetrics {
            lab_score,
            largest_contentful_paint_ms: self.numeric("largest-contentful-paint"),
            cumulative_layout_shift: self.numeric("cumulative-layout-shift"),
            total_blocking_time_ms: self.numeric("total-blocking-time"),
            first_contentful_paint_ms: self.numeric("first-contentful-paint"),
            speed_index_ms: self.numeric("speed-index"),
            time_to_interactive_ms: self.numeric("interactive"),
            server_response_ms: self.numeric("server-response-time"),
            base_score: lab_score,
            score: lab_score,
        }
    }
}

// ====== Rules ======

const SLOW_LCP: Rule = Rule {
    id: "performance.slow_lcp",
    title: "Slow Largest Contentful Paint",
    description: "The main content takes too long to render.",
    category: Category::Performance,
    subcategory: "core-web-vitals",
    severity: Severity::High,
    confidence: 0.95,
    business_impact: "Every extra second of load time costs conversions, especially on mobile.",
    technical_impact: "LCP is a Core Web Vital and feeds search ranking.",
    solution_steps: &[
        "Serve the hero image in a modern format at the rendered size",
        "Preload the LCP image",
        "Defer render-blocking app scripts",
    ],
    code_example: Some(
        "<link rel=\"preload\" as=\"image\" href=\"{{ hero | image_url: width: 1200 }}\">",
    ),
    estimated_time: "2-4 hours",
};

const LAYOUT_SHIFT: Rule = Rule {
    id: "performance.layout_shift",
    title: "High Cumulative Layout Shift",
    description: "Content moves around while the page loads.",
    category: Category::Performance,
    subcategory: "core-web-vitals",
    severity: Severity::Medium,
    confidence: 0.9,
    business_impact: "Shifting buttons cause misclicks and frustration.",
    technical_impact: "CLS is a Core Web Vital and feeds search ranking.",
    solution_steps: &[
        "Set width and height on every image and embed",
        "Reserve space for app widgets and banners",
    ],
    code_example: Some("<img src=\"...\" width=\"800\" height=\"600\" alt=\"...\">"),
    estimated_time: "1-2 hours",
};

const BLOCKING_TIME: Rule = Rule {
    id: "performance.total_blocking_time",
    title: "High Total Blocking Time",
    description: "Long JavaScript tasks keep the page from responding to input.",
    category: Category::Performance,
    subcategory: "javascript",
    severity: Severity::High,
    confidence: 0.9,
    business_impact: "Taps on add-to-cart feel unresponsive.",
    technical_impact: "Main-thread work blocks input handling.",
    solution_steps: &[
        "Remove unused apps and their leftover scripts",
        "Load third-party scripts with defer or on interaction",
    ],
    code_example: Some("<script src=\"...\" defer></script>"),
    estimated_time: "2-4 hours",
};

const SLOW_FCP: Rule = Rule {
    id: "performance.slow_fcp",
    title: "Slow First Contentful Paint",
    description: "Shoppers stare at a blank screen before anything renders.",
    category: Category::Performance,
    subcategory: "rendering",
    severity: Severity::Medium,
    confidence: 0.9,
    business_impact: "Visitors bounce before the page shows anything.",
    technical_impact: "Render-blocking CSS and fonts delay first paint.",
    solution_steps: &[
        "Inline critical CSS",
        "Use font-display: swap for web fonts",
    ],
    code_example: None,
    estimated_time: "2-3 hours",
};

const SLOW_SERVER: Rule = Rule {
    id: "performance.slow_server_response",
    title: "Slow server response",
    description: "The initial document takes too long to arrive.",
    category: Category::Performance,
    subcategory: "server",
    severity: Severity::Medium,
    confidence: 0.85,
    business_impact: "Every later milestone is delayed by the same amount.",
    technical_impact: "Heavy Liquid loops or redirects slow the document response.",
    solution_steps: &[
        "Reduce nested loops over collections in templates",
        "Remove redirect chains to the storefront",
    ],
    code_example: None,
    estimated_time: "2-4 hours",
};

/// Issues implied by a set of lab metrics. Zeroed metrics produce none.
pub fn evaluate(metrics: &PerformanceMetrics) -> Vec<IssueDraft> {
    let mut issues = Vec::new();

    let lcp = metrics.largest_contentful_paint_ms;
    if lcp > LCP_CRITICAL_MS {
        issues.push(
            SLOW_LCP
                .issue(DETECTED_BY)
                .with_severity(Severity::Critical)
                .with_metric("largest_contentful_paint_ms", lcp),
        );
    } else if lcp > LCP_HIGH_MS {
        issues.push(
            SLOW_LCP
                .issue(DETECTED_BY)
                .with_severity(Severity::High)
                .with_metric("largest_contentful_paint_ms", lcp),
        );
    }

    let cls = metrics.cumulative_layout_shift;
    if cls > CLS_CRITICAL {
        issues.push(
            LAYOUT_SHIFT
                .issue(DETECTED_BY)
                .with_severity(Severity::Critical)
                .with_metric("cumulative_layout_shift", cls),
        );
    } else if cls > CLS_MEDIUM {
        issues.push(
            LAYOUT_SHIFT
                .issue(DETECTED_BY)
                .with_severity(Severity::Medium)
                .with_metric("cumulative_layout_shift", cls),
        );
    }

    if metrics.total_blocking_time_ms > TBT_HIGH_MS {
        issues.push(
            BLOCKING_TIME
                .issue(DETECTED_BY)
                .with_metric("total_blocking_time_ms", metrics.total_blocking_time_ms),
        );
    }

    if metrics.first_contentful_paint_ms > FCP_MEDIUM_MS {
        issues.push(
            SLOW_FCP
                .issue(DETECTED_BY)
                .with_metric("first_contentful_paint_ms", metrics.first_contentful_paint_ms),
        );
    }

    if metrics.server_response_ms > SERVER_RESPONSE_MEDIUM_MS {
        issues.push(
            SLOW_SERVER
                .issue(DETECTED_BY)
                .with_metric("server_response_ms", metrics.server_response_ms),
        );
    }

    issues
}

/// Calls the lab API for one URL and turns the result into metrics and issues.
#[derive(Debug, Clone)]
pub struct PerformanceScanner {
    client: Client,
    config: LabConfig,
}

impl PerformanceScanner {
    pub fn new(config: LabConfig) -> Result<Self> {
        let client = create_client(ClientType::LabApi, config.timeout)?;
        Ok(Self { client, config })
    }

    /// Never fails. A lab failure yields zeroed metrics and no issues.
    pub async fn scan(&self, url: &str, strategy: LabStrategy) -> ScanOutput<PerformanceMetrics> {
        let started = Instant::now();
        let metrics = match tokio::time::timeout(self.config.timeout, self.fetch(url, strategy)).await
        {
            Ok(Ok(metrics)) => metrics,
            Ok(Err(e)) => {
                tracing::warn!("[PERF] Lab measurement failed for {}: {}", url, e);
                PerformanceMetrics::zeroed()
            }
            Err(_) => {
                let e = AuditError::timeout(SERVICE, started.elapsed());
                tracing::warn!("[PERF] {} for {}", e, url);
                PerformanceMetrics::zeroed()
            }
        };

        let issues = evaluate(&metrics);
        tracing::info!(
            "[PERF] lab score {} with {} issues in {}ms",
            metrics.lab_score,
            issues.len(),
            started.elapsed().as_millis()
        );
        ScanOutput { metrics, issues }
    }

    async fn fetch(&self, url: &str, strategy: LabStrategy) -> Result<PerformanceMetrics> {
        let mut query = vec![
            ("url", url),
            ("strategy", strategy.as_str()),
            ("category", "performance"),
        ];
        if let Some(key) = self.config.api_key.as_deref() {
            query.push(("key", key));
        }

        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&query)
            .send()
            .await
            .map_err(|e| AuditError::service(SERVICE, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuditError::service(SERVICE, format!("HTTP {}", status)));
        }

        let body: LabResponse = response
            .json()
            .await
            .map_err(|e| AuditError::service(SERVICE, format!("unreadable payload: {}", e)))?;

        body.lighthouse_result
            .map(LighthouseResult::into_metrics)
            .ok_or_else(|| AuditError::service(SERVICE, "payload has no lighthouseResult"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::time::Duration;

    fn scanner_for(server: &mockito::Server, timeout: Duration) -> PerformanceScanner {
        PerformanceScanner::new(LabConfig {
            api_key: Some("test-key".into()),
            endpoint: format!("{}/runPagespeed", server.url()),
            strategy: LabStrategy::Mobile,
            timeout,
        })
        .unwrap()
    }

    fn lab_body(score: f64, lcp: f64, cls: f64) -> String {
        serde_json::json!({
            "lighthouseResult": {
                "categories": { "performance": { "score": score } },
                "audits": {
                    "largest-contentful-paint": { "numericValue": lcp },
                    "cumulative-layout-shift": { "numericValue": cls },
                    "total-blocking-time": { "numericValue": 120.0 },
                    "first-contentful-paint": { "numericValue": 1800.0 },
                    "speed-index": { "numericValue": 3200.0 },
                    "interactive": { "numericValue": 4100.0 },
                    "server-response-time": { "numericValue": 250.0 }
                }
            }
        })
        .to_string()
    }

    #[test]
    fn slow_lcp_is_critical() {
        let metrics = PerformanceMetrics {
            largest_contentful_paint_ms: 5000.0,
            ..Default::default()
        };
        let issues = evaluate(&metrics);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].rule_id, "performance.slow_lcp");
        assert_eq!(issues[0].severity, Some(Severity::Critical));
        assert_eq!(issues[0].metric_value, Some(5000.0));
    }

    #[test]
    fn thresholds_are_exclusive() {
        let metrics = PerformanceMetrics {
            largest_contentful_paint_ms: 2500.0,
            cumulative_layout_shift: 0.1,
            total_blocking_time_ms: 300.0,
            ..Default::default()
        };
        assert!(evaluate(&metrics).is_empty());

        let metrics = PerformanceMetrics {
            largest_contentful_paint_ms: 3000.0,
            cumulative_layout_shift: 0.3,
            ..Default::default()
        };
        let issues = evaluate(&metrics);
        assert_eq!(issues[0].severity, Some(Severity::High));
        assert_eq!(issues[1].severity, Some(Severity::Critical));
    }

    #[test]
    fn zeroed_metrics_have_no_issues() {
        assert!(evaluate(&PerformanceMetrics::zeroed()).is_empty());
    }

    #[tokio::test]
    async fn parses_lab_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/runPagespeed")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("strategy".into(), "mobile".into()),
                Matcher::UrlEncoded("key".into(), "test-key".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(lab_body(0.42, 5000.0, 0.05))
            .create_async()
            .await;

        let scanner = scanner_for(&server, Duration::from_secs(5));
        let output = scanner.scan("https://shop.test/", LabStrategy::Mobile).await;

        mock.assert_async().await;
        assert_eq!(output.metrics.lab_score, 42);
        assert_eq!(output.metrics.score, 42);
        assert_eq!(output.metrics.largest_contentful_paint_ms, 5000.0);
        assert_eq!(output.metrics.time_to_interactive_ms, 4100.0);
        assert_eq!(output.issues.len(), 1);
        assert_eq!(output.issues[0].severity, Some(Severity::Critical));
    }

    #[tokio::test]
    async fn server_error_yields_zeroed_metrics() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/runPagespeed")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let scanner = scanner_for(&server, Duration::from_secs(5));
        let output = scanner.scan("https://shop.test/", LabStrategy::Desktop).await;

        assert_eq!(output.metrics, PerformanceMetrics::zeroed());
        assert!(output.issues.is_empty());
    }

    #[tokio::test]
    async fn payload_without_result_yields_zeroed_metrics() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/runPagespeed")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"error":{"code":429}}"#)
            .create_async()
            .await;

        let scanner = scanner_for(&server, Duration::from_secs(5));
        let output = scanner.scan("https://shop.test/", LabStrategy::Mobile).await;
        assert_eq!(output.metrics.lab_score, 0);
    }

    #[tokio::test]
    async fn unresponsive_lab_hits_the_deadline() {
        // Connections complete in the backlog but no reply is ever written.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("http://{}/runPagespeed", listener.local_addr().unwrap());
        let scanner = PerformanceScanner::new(LabConfig {
            api_key: None,
            endpoint,
            strategy: LabStrategy::Mobile,
            timeout: Duration::from_millis(300),
        })
        .unwrap();

        let started = std::time::Instant::now();
        let output = scanner.scan("https://shop.test/", LabStrategy::Mobile).await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(output.metrics, PerformanceMetrics::zeroed());
        assert!(output.issues.is_empty());
        drop(listener);
    }
}
