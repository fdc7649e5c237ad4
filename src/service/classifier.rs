//! Issue normalization and ranking.
//!
//! Fills every classifier-owned field the scanner left empty, never touching
//! values the scanner supplied, then orders the list by impact.

use chrono::Utc;

use crate::domain::models::{Category, Issue, IssueDraft, Severity};

const DEFAULT_ESTIMATED_TIME: &str = "1-2 hours";
const ID_SUFFIX_LEN: usize = 4;

fn default_confidence(severity: Severity) -> f64 {
    match severity {
        Severity::Critical => 0.95,
        Severity::High => 0.9,
        Severity::Medium => 0.8,
        Severity::Low => 0.7,
    }
}

fn severity_weight(severity: Severity) -> f64 {
    match severity {
        Severity::Critical => 10.0,
        Severity::High => 8.0,
        Severity::Medium => 5.0,
        Severity::Low => 2.0,
    }
}

fn category_weight(category: Category) -> f64 {
    match category {
        Category::Performance => 1.2,
        Category::Security => 1.5,
        Category::Trust => 1.1,
        Category::Conversion => 1.3,
        Category::Seo | Category::Ux => 1.0,
    }
}

fn severity_rank(severity: Severity) -> i32 {
    match severity {
        Severity::Critical => 100,
        Severity::High => 75,
        Severity::Medium => 50,
        Severity::Low => 25,
    }
}

fn category_rank(category: Category) -> i32 {
    match category {
        Category::Security => 15,
        Category::Conversion => 12,
        Category::Performance => 10,
        Category::Trust => 8,
        Category::Seo => 6,
        Category::Ux => 5,
    }
}

/// Effort estimate keyed by `severity-category`.
pub fn estimated_time(severity: Severity, category: Category) -> &'static str {
    match (severity, category) {
        (Severity::Critical, Category::Performance) => "4-8 hours",
        (Severity::Critical, Category::Security) => "2-4 hours",
        (Severity::Critical, Category::Seo) => "30 minutes",
        (Severity::Critical, Category::Ux) => "2-4 hours",
        (Severity::High, Category::Performance) => "2-4 hours",
        (Severity::High, Category::Conversion) => "2-4 hours",
        (Severity::High, Category::Seo) => "1 hour",
        (Severity::High, Category::Trust) => "1 hour",
        (Severity::Medium, Category::Seo) => "30 minutes",
        (Severity::Low, _) => "15-30 minutes",
        _ => DEFAULT_ESTIMATED_TIME,
    }
}

pub fn fix_priority(severity: Severity, category: Category) -> i32 {
    (severity_weight(severity) * category_weight(category)).round() as i32
}

/// Ranking key; higher sorts first.
pub fn priority_score(issue: &Issue) -> i32 {
    severity_rank(issue.severity) + category_rank(issue.category) + issue.fix_priority
}

/// Fill-if-absent merge. A field defined on `base` is never overwritten;
/// empty strings and lists count as absent.
pub fn merge(base: IssueDraft, fallback: IssueDraft) -> IssueDraft {
    fn text(base: String, fallback: String) -> String {
        if base.trim().is_empty() {
            fallback
        } else {
            base
        }
    }

    fn list(base: Vec<String>, fallback: Vec<String>) -> Vec<String> {
        if base.is_empty() {
            fallback
        } else {
            base
        }
    }

    IssueDraft {
        id: base.id.or(fallback.id),
        title: text(base.title, fallback.title),
        description: text(base.description, fallback.description),
        category: base.category.or(fallback.category),
        subcategory: text(base.subcategory, fallback.subcategory),
        severity: base.severity.or(fallback.severity),
        confidence: base.confidence.or(fallback.confidence),
        metric: base.metric.or(fallback.metric),
        metric_value: base.metric_value.or(fallback.metric_value),
        business_impact: base.business_impact.or(fallback.business_impact),
        technical_impact: base.technical_impact.or(fallback.technical_impact),
        solution_steps: list(base.solution_steps, fallback.solution_steps),
        code_examples: list(base.code_examples, fallback.code_examples),
        fix_priority: base.fix_priority.or(fallback.fix_priority),
        estimated_time: base.estimated_time.or(fallback.estimated_time),
        detected_by: text(base.detected_by, fallback.detected_by),
        rule_id: text(base.rule_id, fallback.rule_id),
        ai_explanation: base.ai_explanation.or(fallback.ai_explanation),
    }
}

/// Four lowercase base-36 digits of `value`, zero padded.
fn base36_suffix(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut out = [b'0'; ID_SUFFIX_LEN];
    for slot in out.iter_mut().rev() {
        *slot = DIGITS[(value % 36) as usize];
        value /= 36;
    }
    out.iter().map(|&b| b as char).collect()
}

pub fn issue_id(category: Category, severity: Severity, clock_ms: u64, index: usize) -> String {
    format!(
        "{}-{}-{}",
        category.code(),
        severity.code(),
        base36_suffix(clock_ms.wrapping_add(index as u64))
    )
}

pub struct IssueClassifier;

impl IssueClassifier {
    /// Drops empty drafts, fills defaults and sorts by descending priority.
    /// The sort is stable so equal-priority issues keep scanner order.
    pub fn classify(drafts: Vec<IssueDraft>) -> Vec<Issue> {
        let clock_ms = Utc::now().timestamp_millis().max(0) as u64;
        let before = drafts.len();

        let mut issues: Vec<Issue> = drafts
            .into_iter()
            .filter(|draft| !draft.is_empty())
            .enumerate()
            .map(|(index, draft)| Self::complete(draft, clock_ms, index))
            .collect();

        issues.sort_by(|a, b| priority_score(b).cmp(&priority_score(a)));

        tracing::debug!(
            "[CLASSIFIER] {} issues classified ({} empty dropped)",
            issues.len(),
            before - issues.len()
        );
        issues
    }

    fn complete(draft: IssueDraft, clock_ms: u64, index: usize) -> Issue {
        let category = draft.category.unwrap_or(Category::Seo);
        let severity = draft.severity.unwrap_or(Severity::Medium);

        let defaults = IssueDraft {
            id: Some(issue_id(category, severity, clock_ms, index)),
            category: Some(category),
            severity: Some(severity),
            confidence: Some(default_confidence(severity)),
            fix_priority: Some(fix_priority(severity, category)),
            estimated_time: Some(estimated_time(severity, category).to_string()),
            ..Default::default()
        };
        let merged = merge(draft, defaults);

        let confidence = merged
            .confidence
            .filter(|c| c.is_finite())
            .map(|c| c.clamp(0.0, 1.0))
            .unwrap_or_else(|| default_confidence(severity));

        Issue {
            id: merged.id.unwrap_or_default(),
            title: merged.title,
            description: merged.description,
            category,
            subcategory: merged.subcategory,
            severity,
            confidence,
            metric: merged.metric,
            metric_value: merged.metric_value,
            business_impact: merged.business_impact,
            technical_impact: merged.technical_impact,
            solution_steps: merged.solution_steps,
            code_examples: merged.code_examples,
            fix_priority: merged.fix_priority.unwrap_or_default(),
            estimated_time: merged
                .estimated_time
                .unwrap_or_else(|| DEFAULT_ESTIMATED_TIME.to_string()),
            detected_by: merged.detected_by,
            rule_id: merged.rule_id,
            ai_explanation: merged.ai_explanation,
        }
    }
}
