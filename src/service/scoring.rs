//! Category and overall score calculation.
//!
//! Category score = metric-derived base minus severity deductions for that
//! category's issues. Overall = weighted average of the category scores minus
//! a second, cross-category penalty per critical and high issue. Both layers
//! are intentional; an issue is priced once in its category and again overall.

use crate::domain::metrics::CategoryMetrics;
use crate::domain::models::{Category, Issue, Scores, Severity};

pub const WEIGHT_PERFORMANCE: f64 = 0.30;
pub const WEIGHT_SEO: f64 = 0.15;
pub const WEIGHT_UX: f64 = 0.20;
pub const WEIGHT_CONVERSION: f64 = 0.20;
pub const WEIGHT_TRUST: f64 = 0.15;

const OVERALL_CRITICAL_PENALTY: f64 = 5.0;
const OVERALL_HIGH_PENALTY: f64 = 3.0;

/// Points deducted from a category score per issue.
pub fn severity_deduction(category: Category, severity: Severity) -> i32 {
    let (critical, high, medium, low) = match category {
        Category::Performance => (25, 20, 10, 5),
        Category::Seo => (20, 15, 8, 4),
        Category::Ux => (20, 15, 8, 4),
        Category::Conversion => (20, 15, 10, 5),
        Category::Trust | Category::Security => (15, 10, 7, 3),
    };
    match severity {
        Severity::Critical => critical,
        Severity::High => high,
        Severity::Medium => medium,
        Severity::Low => low,
    }
}

/// Rounds to the nearest integer and clamps into [0, 100].
pub fn clamp_score(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}

pub struct ScoreCalculator;

impl ScoreCalculator {
    pub fn calculate(metrics: &CategoryMetrics, issues: &[Issue]) -> Scores {
        let mut scores = Scores {
            overall: 0,
            performance: Self::category_score(
                metrics.performance.base_score,
                Category::Performance,
                issues,
            ),
            seo: Self::category_score(metrics.seo.base_score, Category::Seo, issues),
            ux: Self::category_score(metrics.ux.base_score, Category::Ux, issues),
            conversion: Self::category_score(
                metrics.conversion.base_score,
                Category::Conversion,
                issues,
            ),
            trust: Self::category_score(metrics.trust.base_score, Category::Trust, issues),
        };
        scores.overall = Self::overall(&scores, issues);
        scores
    }

    /// Base minus deductions for every issue scored under `category`.
    /// Security issues are scored under trust.
    pub fn category_score(base: u8, category: Category, issues: &[Issue]) -> u8 {
        let deductions: i32 = issues
            .iter()
            .filter(|issue| issue.category.scored_as() == category)
            .map(|issue| severity_deduction(issue.category, issue.severity))
            .sum();
        clamp_score(f64::from(base) - f64::from(deductions))
    }

    /// Weighted average of the category fields of `scores` minus the
    /// cross-category critical/high penalty. `scores.overall` is ignored.
    pub fn overall(scores: &Scores, issues: &[Issue]) -> u8 {
        let weighted = f64::from(scores.performance) * WEIGHT_PERFORMANCE
            + f64::from(scores.seo) * WEIGHT_SEO
            + f64::from(scores.ux) * WEIGHT_UX
            + f64::from(scores.conversion) * WEIGHT_CONVERSION
            + f64::from(scores.trust) * WEIGHT_TRUST;

        let critical = issues
            .iter()
            .filter(|i| i.severity == Severity::Critical)
            .count() as f64;
        let high = issues
            .iter()
            .filter(|i| i.severity == Severity::High)
            .count() as f64;

        clamp_score(weighted - critical * OVERALL_CRITICAL_PENALTY - high * OVERALL_HIGH_PENALTY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(category: Category, severity: Severity) -> Issue {
        Issue {
            id: "X".into(),
            title: "t".into(),
            description: String::new(),
            category,
            subcategory: String::new(),
            severity,
            confidence: 0.8,
            metric: None,
            metric_value: None,
            business_impact: None,
            technical_impact: None,
            solution_steps: vec![],
            code_examples: vec![],
            fix_priority: 5,
            estimated_time: "1-2 hours".into(),
            detected_by: "test".into(),
            rule_id: "test".into(),
            ai_explanation: None,
        }
    }

    fn metrics_with_base(base: u8) -> CategoryMetrics {
        let mut metrics = CategoryMetrics::default();
        metrics.performance.base_score = base;
        metrics.seo.base_score = base;
        metrics.ux.base_score = base;
        metrics.conversion.base_score = base;
        metrics.trust.base_score = base;
        metrics
    }

    #[test]
    fn weights_sum_to_one() {
        let sum = WEIGHT_PERFORMANCE + WEIGHT_SEO + WEIGHT_UX + WEIGHT_CONVERSION + WEIGHT_TRUST;
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn all_fifty_and_no_issues_is_fifty() {
        let scores = ScoreCalculator::calculate(&metrics_with_base(50), &[]);
        assert_eq!(scores.overall, 50);
        assert_eq!(scores.performance, 50);
        assert_eq!(scores.trust, 50);
    }

    #[test]
    fn clamps_at_upper_bound() {
        let scores = ScoreCalculator::calculate(&metrics_with_base(200), &[]);
        assert_eq!(scores.seo, 100);
        assert_eq!(scores.overall, 100);
    }

    #[test]
    fn clamps_at_lower_bound() {
        let issues: Vec<Issue> = (0..10)
            .map(|_| issue(Category::Ux, Severity::Critical))
            .collect();
        let scores = ScoreCalculator::calculate(&metrics_with_base(10), &issues);
        assert_eq!(scores.ux, 0);
        assert_eq!(scores.overall, 0);
    }

    #[test]
    fn category_penalty_only_hits_own_category() {
        let issues = vec![issue(Category::Performance, Severity::High)];
        let scores = ScoreCalculator::calculate(&metrics_with_base(80), &issues);
        assert_eq!(scores.performance, 60);
        assert_eq!(scores.seo, 80);
    }

    #[test]
    fn security_issues_are_scored_under_trust() {
        let issues = vec![issue(Category::Security, Severity::Critical)];
        assert_eq!(ScoreCalculator::category_score(90, Category::Trust, &issues), 75);
        assert_eq!(ScoreCalculator::category_score(90, Category::Seo, &issues), 90);
    }

    #[test]
    fn critical_issue_is_penalized_twice() {
        // One critical UX issue: -20 on the UX score, then -5 overall.
        let issues = vec![issue(Category::Ux, Severity::Critical)];
        let scores = ScoreCalculator::calculate(&metrics_with_base(100), &issues);
        assert_eq!(scores.ux, 80);
        // 100 - 0.20 * 20 = 96, then -5
        assert_eq!(scores.overall, 91);
    }

    #[test]
    fn high_issue_costs_three_overall() {
        let scores = Scores {
            overall: 0,
            performance: 70,
            seo: 70,
            ux: 70,
            conversion: 70,
            trust: 70,
        };
        let issues = vec![issue(Category::Seo, Severity::High)];
        assert_eq!(ScoreCalculator::overall(&scores, &issues), 67);
    }

    #[test]
    fn clamp_score_rounds() {
        assert_eq!(clamp_score(49.5), 50);
        assert_eq!(clamp_score(-3.0), 0);
        assert_eq!(clamp_score(f64::NAN), 0);
        assert_eq!(clamp_score(100.4), 100);
    }
}
