//! Page scanners.
//!
//! Four content scanners (SEO, UX, conversion, trust) inspect the crawled
//! snapshot; they are pure and never fail. The performance scanner calls the
//! lab-measurement API instead and degrades to zeroed metrics.

mod conversion;
mod performance;
mod seo;
mod trust;
mod ux;

pub use conversion::ConversionScanner;
pub use performance::PerformanceScanner;
pub use seo::SeoScanner;
pub use trust::TrustScanner;
pub use ux::UxScanner;

use crate::domain::models::{Category, IssueDraft, Severity};
use crate::domain::snapshot::PageSnapshot;
use crate::service::scoring::{clamp_score, severity_deduction};

/// Metrics plus the issues a scanner found.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutput<M> {
    pub metrics: M,
    pub issues: Vec<IssueDraft>,
}

/// Scanner over the crawled HTML.
///
/// Each call parses its own document from `snapshot.html`, so scanners can
/// run concurrently over one shared snapshot.
pub trait ContentScanner: Send + Sync {
    type Metrics: Send + 'static;

    fn name(&self) -> &'static str;

    fn scan(&self, snapshot: &PageSnapshot) -> ScanOutput<Self::Metrics>;
}

/// Canned issue with its remediation text.
pub struct Rule {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub category: Category,
    pub subcategory: &'static str,
    pub severity: Severity,
    pub confidence: f64,
    pub business_impact: &'static str,
    pub technical_impact: &'static str,
    pub solution_steps: &'static [&'static str],
    pub code_example: Option<&'static str>,
    pub estimated_time: &'static str,
}

impl Rule {
    /// Issue draft for this rule. Id and fix priority are left to the classifier.
    pub fn issue(&self, detected_by: &str) -> IssueDraft {
        IssueDraft {
            id: None,
            title: self.title.to_string(),
            description: self.description.to_string(),
            category: Some(self.category),
            subcategory: self.subcategory.to_string(),
            severity: Some(self.severity),
            confidence: Some(self.confidence),
            metric: None,
            metric_value: None,
            business_impact: Some(self.business_impact.to_string()),
            technical_impact: Some(self.technical_impact.to_string()),
            solution_steps: self.solution_steps.iter().map(|s| s.to_string()).collect(),
            code_examples: self.code_example.iter().map(|s| s.to_string()).collect(),
            fix_priority: None,
            estimated_time: Some(self.estimated_time.to_string()),
            detected_by: detected_by.to_string(),
            rule_id: self.id.to_string(),
            ai_explanation: None,
        }
    }
}

/// Base score minus the category deductions for a scanner's own issues.
pub(crate) fn score_after_issues(base: u8, issues: &[IssueDraft]) -> u8 {
    let deductions: i32 = issues
        .iter()
        .filter_map(|issue| Some(severity_deduction(issue.category?, issue.severity?)))
        .sum();
    clamp_score(f64::from(base) - f64::from(deductions))
}

/// Base plus bonuses for every detected signal, clamped.
pub(crate) fn base_with_bonuses(base: i32, bonuses: &[(bool, i32)]) -> u8 {
    let total = bonuses
        .iter()
        .filter(|(present, _)| *present)
        .map(|(_, points)| points)
        .sum::<i32>()
        + base;
    clamp_score(f64::from(total))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULE: Rule = Rule {
        id: "test.rule",
        title: "Test rule",
        description: "Something is off",
        category: Category::Ux,
        subcategory: "layout",
        severity: Severity::High,
        confidence: 0.85,
        business_impact: "Lost sales",
        technical_impact: "Broken layout",
        solution_steps: &["Fix it", "Verify it"],
        code_example: Some("<div></div>"),
        estimated_time: "2-4 hours",
    };

    #[test]
    fn rule_issue_is_minimally_populated() {
        let draft = RULE.issue("UxScanner");
        assert_eq!(draft.id, None);
        assert_eq!(draft.fix_priority, None);
        assert_eq!(draft.severity, Some(Severity::High));
        assert_eq!(draft.solution_steps.len(), 2);
        assert_eq!(draft.code_examples, vec!["<div></div>".to_string()]);
        assert_eq!(draft.detected_by, "UxScanner");
    }

    #[test]
    fn scores_clamp() {
        assert_eq!(base_with_bonuses(65, &[(true, 30), (true, 30), (false, 5)]), 100);
        assert_eq!(base_with_bonuses(60, &[(true, 5), (false, 10)]), 65);

        let issues = vec![RULE.issue("x"); 6];
        assert_eq!(score_after_issues(65, &issues), 0);
        assert_eq!(score_after_issues(65, &issues[..1]), 50);
    }
}
