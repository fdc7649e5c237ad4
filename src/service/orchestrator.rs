//! Runs one audit end to end.
//!
//! The crawl is the only stage that can abort a run. Every other stage
//! degrades to documented defaults, and the browser is released on every
//! exit path, including caller cancellation.

use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use uuid::Uuid;

use crate::config::{AuditConfig, RunOverrides};
use crate::domain::metrics::{CategoryMetrics, PerformanceMetrics};
use crate::domain::models::{AuditResult, IssueDraft, PlatformInfo, Recommendations};
use crate::domain::snapshot::PageSnapshot;
use crate::error::{AuditError, Result};
use crate::service::browser::BrowserProvider;
use crate::service::classifier::IssueClassifier;
use crate::service::completion::{CompletionClient, OpenAiClient};
use crate::service::crawler::CrawlerService;
use crate::service::narrative::{fallback_analysis, NarrativeEnhancer, StoreDigest};
use crate::service::platform::PlatformDetector;
use crate::service::scanner::{
    ContentScanner, ConversionScanner, PerformanceScanner, ScanOutput, SeoScanner, TrustScanner,
    UxScanner,
};
use crate::service::scoring::ScoreCalculator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AuditStage {
    Init,
    PerformanceScan,
    CrawlerInit,
    Crawl,
    PlatformDetect,
    ContentScan,
    Classify,
    Score,
    NarrativeSummary,
    NarrativeEnhance,
    Done,
}

impl AuditStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStage::Init => "init",
            AuditStage::PerformanceScan => "performance_scan",
            AuditStage::CrawlerInit => "crawler_init",
            AuditStage::Crawl => "crawl",
            AuditStage::PlatformDetect => "platform_detect",
            AuditStage::ContentScan => "content_scan",
            AuditStage::Classify => "classify",
            AuditStage::Score => "score",
            AuditStage::NarrativeSummary => "narrative_summary",
            AuditStage::NarrativeEnhance => "narrative_enhance",
            AuditStage::Done => "done",
        }
    }
}

/// Forward-only record of the stages a run has entered.
#[derive(Debug)]
pub struct StageTracker {
    run_id: Uuid,
    current: AuditStage,
    stage_started: Instant,
    timings: Vec<(AuditStage, u64)>,
}

impl StageTracker {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            current: AuditStage::Init,
            stage_started: Instant::now(),
            timings: Vec::new(),
        }
    }

    pub fn current(&self) -> AuditStage {
        self.current
    }

    /// Milliseconds spent in each completed stage, in order.
    pub fn timings(&self) -> &[(AuditStage, u64)] {
        &self.timings
    }

    /// Moves to `next`. Returns false and stays put if `next` is not later
    /// than the current stage.
    pub fn advance(&mut self, next: AuditStage) -> bool {
        if next <= self.current {
            tracing::warn!(
                "[AUDIT] {} ignoring stage {} after {}",
                self.run_id,
                next.as_str(),
                self.current.as_str()
            );
            return false;
        }
        let elapsed = self.stage_started.elapsed().as_millis() as u64;
        self.timings.push((self.current, elapsed));
        tracing::debug!(
            "[AUDIT] {} {} -> {} ({}ms)",
            self.run_id,
            self.current.as_str(),
            next.as_str(),
            elapsed
        );
        self.current = next;
        self.stage_started = Instant::now();
        true
    }
}

/// Runs a content scanner on the blocking pool. A panicking scanner yields
/// default metrics and no issues.
async fn run_content_scanner<S>(scanner: S, snapshot: Arc<PageSnapshot>) -> ScanOutput<S::Metrics>
where
    S: ContentScanner + 'static,
    S::Metrics: Default,
{
    let name = scanner.name();
    match tokio::task::spawn_blocking(move || scanner.scan(&snapshot)).await {
        Ok(output) => output,
        Err(e) => {
            tracing::error!("[AUDIT] {} failed: {}", name, e);
            ScanOutput {
                metrics: S::Metrics::default(),
                issues: Vec::new(),
            }
        }
    }
}

fn validate_url(url: &str) -> Result<url::Url> {
    let parsed =
        url::Url::parse(url).map_err(|e| AuditError::crawl(format!("invalid URL {}: {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(AuditError::crawl(format!("unsupported URL scheme: {}", other))),
    }
}

pub struct AuditOrchestrator {
    config: AuditConfig,
    browser: Arc<dyn BrowserProvider>,
    performance: PerformanceScanner,
    narrative: NarrativeEnhancer,
}

impl AuditOrchestrator {
    /// Builds the run pipeline. A completion client is created only when an
    /// API key is configured; otherwise narrative stages use fallbacks.
    pub fn new(config: AuditConfig, browser: Arc<dyn BrowserProvider>) -> Result<Self> {
        let performance = PerformanceScanner::new(config.lab.clone())?;
        let client: Option<Arc<dyn CompletionClient>> = match config.narrative.api_key {
            Some(_) => Some(Arc::new(OpenAiClient::new(&config.narrative)?)),
            None => None,
        };
        let narrative = NarrativeEnhancer::new(client, config.narrative.clone());

        Ok(Self {
            config,
            browser,
            performance,
            narrative,
        })
    }

    /// Replaces the completion client, e.g. with a different provider.
    pub fn with_completion_client(mut self, client: Arc<dyn CompletionClient>) -> Self {
        self.narrative = NarrativeEnhancer::new(Some(client), self.config.narrative.clone());
        self
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Audits one storefront URL.
    ///
    /// Returns `FatalCrawl` when the page cannot be rendered and `Cancelled`
    /// when `cancel` fires first. Either way the browser is closed.
    pub async fn run(
        &self,
        url: &str,
        overrides: &RunOverrides,
        cancel: &CancellationToken,
    ) -> Result<AuditResult> {
        let run_id = Uuid::new_v4();
        tracing::info!("[AUDIT] {} starting audit of {}", run_id, url);

        let mut crawler = CrawlerService::new(self.config.browser.clone(), self.browser.clone());
        let mut tracker = StageTracker::new(run_id);

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AuditError::Cancelled),
            result = self.pipeline(run_id, url, overrides, &mut crawler, &mut tracker) => result,
        };

        crawler.close().await;

        match &outcome {
            Ok(result) => tracing::info!(
                "[AUDIT] {} finished: overall {} with {} issues in {}ms",
                run_id,
                result.scores.overall,
                result.issues.len(),
                result.duration_ms
            ),
            Err(e) => tracing::warn!(
                "[AUDIT] {} aborted during {}: {}",
                run_id,
                tracker.current().as_str(),
                e
            ),
        }
        outcome
    }

    async fn pipeline(
        &self,
        run_id: Uuid,
        url: &str,
        overrides: &RunOverrides,
        crawler: &mut CrawlerService,
        tracker: &mut StageTracker,
    ) -> Result<AuditResult> {
        let started = Instant::now();
        let audited_at = Utc::now();
        validate_url(url)?;

        // Lab measurement runs alongside browser launch and crawl.
        tracker.advance(AuditStage::PerformanceScan);
        let strategy = overrides.lab_strategy.unwrap_or(self.config.lab.strategy);
        let lab = {
            let scanner = self.performance.clone();
            let target = url.to_string();
            AbortOnDropHandle::new(tokio::spawn(async move { scanner.scan(&target, strategy).await }))
        };

        tracker.advance(AuditStage::CrawlerInit);
        crawler.initialize().await?;

        tracker.advance(AuditStage::Crawl);
        let snapshot = Arc::new(crawler.crawl(url).await?);
        crawler.close().await;

        let performance = lab.await.unwrap_or_else(|e| {
            tracing::error!("[AUDIT] {} performance task failed: {}", run_id, e);
            ScanOutput {
                metrics: PerformanceMetrics::zeroed(),
                issues: Vec::new(),
            }
        });

        tracker.advance(AuditStage::PlatformDetect);
        let platform_info = {
            let snapshot = snapshot.clone();
            tokio::task::spawn_blocking(move || PlatformDetector::detect(&snapshot))
                .await
                .unwrap_or_else(|e| {
                    tracing::error!("[AUDIT] {} platform detection failed: {}", run_id, e);
                    PlatformInfo::default()
                })
        };

        tracker.advance(AuditStage::ContentScan);
        let (seo, ux, conversion, trust) = tokio::join!(
            run_content_scanner(SeoScanner::new(), snapshot.clone()),
            run_content_scanner(UxScanner::new(), snapshot.clone()),
            run_content_scanner(ConversionScanner::new(), snapshot.clone()),
            run_content_scanner(TrustScanner::new(), snapshot.clone()),
        );

        let drafts: Vec<IssueDraft> = performance
            .issues
            .into_iter()
            .chain(seo.issues)
            .chain(ux.issues)
            .chain(conversion.issues)
            .chain(trust.issues)
            .collect();

        tracker.advance(AuditStage::Classify);
        let issues = IssueClassifier::classify(drafts);

        tracker.advance(AuditStage::Score);
        let metrics = CategoryMetrics {
            performance: performance.metrics,
            seo: seo.metrics,
            ux: ux.metrics,
            conversion: conversion.metrics,
            trust: trust.metrics,
        };
        let scores = ScoreCalculator::calculate(&metrics, &issues);

        let (ai_analysis, issues) = if overrides.skip_narrative || !self.narrative.is_enabled() {
            (fallback_analysis(), issues)
        } else {
            tracker.advance(AuditStage::NarrativeSummary);
            let digest = StoreDigest {
                platform: &platform_info,
                scores: &scores,
                issues: &issues,
            };
            let analysis = self.narrative.analyze_store(url, &digest).await;

            tracker.advance(AuditStage::NarrativeEnhance);
            let concurrency = overrides
                .enrich_concurrency
                .unwrap_or(self.config.narrative.concurrency);
            let issues = self.narrative.enhance_issues(issues, concurrency).await;
            (analysis, issues)
        };

        tracker.advance(AuditStage::Done);

        Ok(AuditResult {
            run_id,
            url: url.to_string(),
            audited_at,
            duration_ms: started.elapsed().as_millis() as u64,
            platform_info,
            performance: metrics.performance,
            seo: metrics.seo,
            ux: metrics.ux,
            conversion: metrics.conversion,
            trust: metrics.trust,
            recommendations: Recommendations::from_issues(&issues),
            issues,
            scores,
            ai_analysis,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_only_moves_forward() {
        let mut tracker = StageTracker::new(Uuid::new_v4());
        assert_eq!(tracker.current(), AuditStage::Init);
        assert!(tracker.advance(AuditStage::PerformanceScan));
        assert!(tracker.advance(AuditStage::Crawl));
        assert!(!tracker.advance(AuditStage::CrawlerInit));
        assert!(!tracker.advance(AuditStage::Crawl));
        assert_eq!(tracker.current(), AuditStage::Crawl);
        assert!(tracker.advance(AuditStage::Done));

        let stages: Vec<AuditStage> = tracker.timings().iter().map(|(s, _)| *s).collect();
        assert_eq!(
            stages,
            vec![AuditStage::Init, AuditStage::PerformanceScan, AuditStage::Crawl]
        );
    }

    #[test]
    fn rejects_non_http_urls() {
        assert!(validate_url("https://shop.test/").is_ok());
        assert!(matches!(validate_url("not a url"), Err(AuditError::FatalCrawl(_))));
        assert!(matches!(
            validate_url("ftp://shop.test/"),
            Err(AuditError::FatalCrawl(_))
        ));
    }
}
