//! Language-model narrative: store summary and per-issue explanations.
//!
//! Both operations are best effort. Without a completion client, or when a
//! call fails, the summary is the fixed fallback and issues pass through
//! untouched.

use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::NarrativeConfig;
use crate::domain::models::{AiAnalysis, Category, Issue, PlatformInfo, Scores, Severity};
use crate::service::completion::{CompletionClient, CompletionRequest};

pub const PRIORITY_ACTION_COUNT: usize = 5;
pub const QUICK_WIN_COUNT: usize = 3;

const TITLES_PER_CATEGORY: usize = 5;

const SUMMARY_SYSTEM_PROMPT: &str = "You are a senior e-commerce conversion consultant. \
Reply with a single JSON object with the keys: summary (string, 2-4 sentences), \
priority_actions (array of exactly 5 strings), quick_wins (array of exactly 3 strings), \
estimated_impact (string).";

const ISSUE_SYSTEM_PROMPT: &str = "You are a senior e-commerce developer explaining audit \
findings to a store owner. Reply with a single JSON object with the keys: explanation \
(string), business_impact (string), technical_impact (string), solution_steps (array of strings).";

/// Analysis used whenever the model is unavailable or its reply is unusable.
pub fn fallback_analysis() -> AiAnalysis {
    AiAnalysis {
        summary: "Automated analysis is unavailable for this audit. The scores and issues \
                  below were produced by the rule-based scanners; start with the critical \
                  and high severity findings."
            .to_string(),
        priority_actions: vec![
            "Fix all critical issues first".to_string(),
            "Improve Largest Contentful Paint by optimizing hero images".to_string(),
            "Make sure every page has a unique title and meta description".to_string(),
            "Show reviews and trust signals near the add-to-cart button".to_string(),
            "Enable express checkout options".to_string(),
        ],
        quick_wins: vec![
            "Add alt text to product images".to_string(),
            "Link refund, privacy and contact pages from the footer".to_string(),
            "Add a free shipping threshold message".to_string(),
        ],
        estimated_impact: "Resolving the critical and high severity issues typically \
                           produces the largest gains in conversion rate and search visibility."
            .to_string(),
    }
}

/// Audit facts the summary prompt is built from.
pub struct StoreDigest<'a> {
    pub platform: &'a PlatformInfo,
    pub scores: &'a Scores,
    pub issues: &'a [Issue],
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SummaryReply {
    summary: String,
    priority_actions: Vec<String>,
    quick_wins: Vec<String>,
    estimated_impact: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IssueReply {
    explanation: Option<String>,
    business_impact: Option<String>,
    technical_impact: Option<String>,
    solution_steps: Vec<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Trims to `len` items, padding from `fallback` (skipping duplicates).
fn normalize_list(items: Vec<String>, fallback: &[String], len: usize) -> Vec<String> {
    let mut out: Vec<String> = items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .take(len)
        .collect();

    for extra in fallback {
        if out.len() >= len {
            break;
        }
        if !out.contains(extra) {
            out.push(extra.clone());
        }
    }
    out
}

pub struct NarrativeEnhancer {
    client: Option<Arc<dyn CompletionClient>>,
    config: NarrativeConfig,
}

impl NarrativeEnhancer {
    pub fn new(client: Option<Arc<dyn CompletionClient>>, config: NarrativeConfig) -> Self {
        Self { client, config }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Store-level summary. Any failure yields [`fallback_analysis`].
    pub async fn analyze_store(&self, url: &str, digest: &StoreDigest<'_>) -> AiAnalysis {
        let Some(client) = &self.client else {
            tracing::info!("[NARRATIVE] No completion client configured, using fallback summary");
            return fallback_analysis();
        };

        let request = CompletionRequest {
            system: SUMMARY_SYSTEM_PROMPT.to_string(),
            prompt: Self::summary_prompt(url, digest),
            max_tokens: self.config.summary_max_tokens,
        };

        let reply = match client.complete_json(&request).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("[NARRATIVE] Summary failed, using fallback: {}", e);
                return fallback_analysis();
            }
        };

        let reply: SummaryReply = match serde_json::from_value(reply) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!("[NARRATIVE] Summary reply has the wrong shape: {}", e);
                return fallback_analysis();
            }
        };

        let fallback = fallback_analysis();
        if reply.summary.trim().is_empty() {
            tracing::warn!("[NARRATIVE] Summary reply is empty, using fallback");
            return fallback;
        }

        AiAnalysis {
            summary: reply.summary.trim().to_string(),
            priority_actions: normalize_list(
                reply.priority_actions,
                &fallback.priority_actions,
                PRIORITY_ACTION_COUNT,
            ),
            quick_wins: normalize_list(reply.quick_wins, &fallback.quick_wins, QUICK_WIN_COUNT),
            estimated_impact: non_empty(Some(reply.estimated_impact))
                .unwrap_or(fallback.estimated_impact),
        }
    }

    fn summary_prompt(url: &str, digest: &StoreDigest<'_>) -> String {
        let mut by_category: BTreeMap<&'static str, Vec<&str>> = BTreeMap::new();
        for issue in digest.issues {
            by_category
                .entry(issue.category.as_str())
                .or_default()
                .push(issue.title.as_str());
        }

        let critical = digest
            .issues
            .iter()
            .filter(|i| i.severity == Severity::Critical)
            .count();

        let mut prompt = format!(
            "Store: {url}\nPlatform detected: {} (theme {} {}, {} add-ons, currency {})\n\
             Scores: overall {}, performance {}, seo {}, ux {}, conversion {}, trust {}\n\
             Issues: {} total, {} critical\n",
            digest.platform.is_platform,
            digest.platform.theme.name,
            digest.platform.theme.version,
            digest.platform.addons.count,
            digest.platform.currency,
            digest.scores.overall,
            digest.scores.performance,
            digest.scores.seo,
            digest.scores.ux,
            digest.scores.conversion,
            digest.scores.trust,
            digest.issues.len(),
            critical,
        );

        for category in Category::ALL {
            if let Some(titles) = by_category.get(category.as_str()) {
                prompt.push_str(&format!(
                    "\n{} ({} issues): {}",
                    category.as_str(),
                    titles.len(),
                    titles
                        .iter()
                        .take(TITLES_PER_CATEGORY)
                        .copied()
                        .collect::<Vec<_>>()
                        .join("; ")
                ));
            }
        }

        prompt.push_str("\n\nWrite the summary, the five most important actions and three quick wins.");
        prompt
    }

    /// Explains each issue through a bounded pool of concurrent requests.
    /// Output order matches input order; a failed item comes back unchanged.
    pub async fn enhance_issues(&self, issues: Vec<Issue>, concurrency: usize) -> Vec<Issue> {
        let Some(client) = &self.client else {
            return issues;
        };
        let total = issues.len();

        let enhanced: Vec<(Issue, bool)> = stream::iter(issues)
            .map(|issue| self.enhance_one(client.as_ref(), issue))
            .buffered(concurrency.max(1))
            .collect()
            .await;

        let succeeded = enhanced.iter().filter(|(_, ok)| *ok).count();
        tracing::info!("[NARRATIVE] Enhanced {}/{} issues", succeeded, total);
        enhanced.into_iter().map(|(issue, _)| issue).collect()
    }

    async fn enhance_one(&self, client: &dyn CompletionClient, issue: Issue) -> (Issue, bool) {
        let request = CompletionRequest {
            system: ISSUE_SYSTEM_PROMPT.to_string(),
            prompt: Self::issue_prompt(&issue),
            max_tokens: self.config.issue_max_tokens,
        };

        let reply = match client.complete_json(&request).await {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!("[NARRATIVE] Enhancement of {} failed: {}", issue.id, e);
                return (issue, false);
            }
        };

        match serde_json::from_value::<IssueReply>(reply) {
            Ok(reply) => (Self::apply(issue, reply), true),
            Err(e) => {
                tracing::debug!("[NARRATIVE] Enhancement of {} unreadable: {}", issue.id, e);
                (issue, false)
            }
        }
    }

    fn issue_prompt(issue: &Issue) -> String {
        let mut prompt = format!(
            "Issue: {}\nCategory: {} / {}\nSeverity: {}\nDescription: {}\n",
            issue.title,
            issue.category.as_str(),
            issue.subcategory,
            issue.severity.as_str(),
            issue.description
        );
        if let (Some(metric), Some(value)) = (&issue.metric, issue.metric_value) {
            prompt.push_str(&format!("Measured {}: {}\n", metric, value));
        }
        if !issue.solution_steps.is_empty() {
            prompt.push_str(&format!("Current fix steps: {}\n", issue.solution_steps.join("; ")));
        }
        prompt.push_str("\nExplain why it matters for this store and how to fix it.");
        prompt
    }

    /// Model values win when non-empty.
    fn apply(mut issue: Issue, reply: IssueReply) -> Issue {
        if let Some(explanation) = non_empty(reply.explanation) {
            issue.ai_explanation = Some(explanation);
        }
        if let Some(impact) = non_empty(reply.business_impact) {
            issue.business_impact = Some(impact);
        }
        if let Some(impact) = non_empty(reply.technical_impact) {
            issue.technical_impact = Some(impact);
        }
        let steps: Vec<String> = reply
            .solution_steps
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if !steps.is_empty() {
            issue.solution_steps = steps;
        }
        issue
    }
}
