//! Audit domain entities: issues, scores, platform info and the final result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::metrics::{ConversionMetrics, PerformanceMetrics, SeoMetrics, TrustMetrics, UxMetrics};

// ====== Enums ======

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }

    /// Single-letter code used in issue ids.
    pub fn code(&self) -> char {
        match self {
            Severity::Critical => 'C',
            Severity::High => 'H',
            Severity::Medium => 'M',
            Severity::Low => 'L',
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "critical" => Some(Severity::Critical),
            "high" => Some(Severity::High),
            "medium" => Some(Severity::Medium),
            "low" => Some(Severity::Low),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Performance,
    Seo,
    Ux,
    Conversion,
    Trust,
    Security,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Performance,
        Category::Seo,
        Category::Ux,
        Category::Conversion,
        Category::Trust,
        Category::Security,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Performance => "performance",
            Category::Seo => "seo",
            Category::Ux => "ux",
            Category::Conversion => "conversion",
            Category::Trust => "trust",
            Category::Security => "security",
        }
    }

    /// Uppercased three-letter prefix used in issue ids (`UX` for ux).
    pub fn code(&self) -> String {
        self.as_str().chars().take(3).collect::<String>().to_ascii_uppercase()
    }

    /// Category whose score absorbs this category's issues.
    pub fn scored_as(&self) -> Category {
        match self {
            Category::Security => Category::Trust,
            other => *other,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "performance" => Some(Category::Performance),
            "seo" => Some(Category::Seo),
            "ux" => Some(Category::Ux),
            "conversion" => Some(Category::Conversion),
            "trust" => Some(Category::Trust),
            "security" => Some(Category::Security),
            _ => None,
        }
    }
}

// ====== Issues ======

/// Issue as emitted by a scanner, before classification.
///
/// The optional fields are the ones the classifier fills when absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueDraft {
    pub id: Option<String>,
    pub title: String,
    pub description: String,
    pub category: Option<Category>,
    pub subcategory: String,
    pub severity: Option<Severity>,
    pub confidence: Option<f64>,
    pub metric: Option<String>,
    pub metric_value: Option<f64>,
    pub business_impact: Option<String>,
    pub technical_impact: Option<String>,
    pub solution_steps: Vec<String>,
    pub code_examples: Vec<String>,
    pub fix_priority: Option<i32>,
    pub estimated_time: Option<String>,
    pub detected_by: String,
    pub rule_id: String,
    pub ai_explanation: Option<String>,
}

impl IssueDraft {
    /// A draft with neither a title nor a rule id carries nothing to report.
    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty() && self.rule_id.trim().is_empty()
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn with_metric(mut self, name: &str, value: f64) -> Self {
        self.metric = Some(name.to_string());
        self.metric_value = Some(value);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// A classified issue. Every field the classifier owns is populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub subcategory: String,
    pub severity: Severity,
    pub confidence: f64,
    pub metric: Option<String>,
    pub metric_value: Option<f64>,
    pub business_impact: Option<String>,
    pub technical_impact: Option<String>,
    pub solution_steps: Vec<String>,
    pub code_examples: Vec<String>,
    pub fix_priority: i32,
    pub estimated_time: String,
    pub detected_by: String,
    pub rule_id: String,
    pub ai_explanation: Option<String>,
}

impl From<Issue> for IssueDraft {
    fn from(issue: Issue) -> Self {
        Self {
            id: Some(issue.id),
            title: issue.title,
            description: issue.description,
            category: Some(issue.category),
            subcategory: issue.subcategory,
            severity: Some(issue.severity),
            confidence: Some(issue.confidence),
            metric: issue.metric,
            metric_value: issue.metric_value,
            business_impact: issue.business_impact,
            technical_impact: issue.technical_impact,
            solution_steps: issue.solution_steps,
            code_examples: issue.code_examples,
            fix_priority: Some(issue.fix_priority),
            estimated_time: Some(issue.estimated_time),
            detected_by: issue.detected_by,
            rule_id: issue.rule_id,
            ai_explanation: issue.ai_explanation,
        }
    }
}

// ====== Scores ======

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scores {
    pub overall: u8,
    pub performance: u8,
    pub seo: u8,
    pub ux: u8,
    pub conversion: u8,
    pub trust: u8,
}

// ====== Platform ======

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeInfo {
    pub name: String,
    pub version: String,
    pub is_next_gen: bool,
    pub is_legacy: bool,
}

impl Default for ThemeInfo {
    fn default() -> Self {
        Self {
            name: "Unknown".to_string(),
            version: "1.0".to_string(),
            is_next_gen: false,
            is_legacy: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddonInfo {
    pub count: usize,
    pub list: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformInfo {
    pub is_platform: bool,
    pub theme: ThemeInfo,
    pub addons: AddonInfo,
    pub products: u32,
    pub collections: u32,
    pub currency: String,
    pub country: String,
    pub language: String,
}

impl Default for PlatformInfo {
    fn default() -> Self {
        Self {
            is_platform: false,
            theme: ThemeInfo::default(),
            addons: AddonInfo::default(),
            products: 0,
            collections: 0,
            currency: "USD".to_string(),
            country: "US".to_string(),
            language: "en".to_string(),
        }
    }
}

// ====== Result aggregate ======

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendations {
    pub critical: Vec<String>,
    pub high: Vec<String>,
    pub medium: Vec<String>,
    pub low: Vec<String>,
}

impl Recommendations {
    /// Groups issue titles by severity, keeping the classifier's order.
    pub fn from_issues(issues: &[Issue]) -> Self {
        let mut recs = Self::default();
        for issue in issues {
            let bucket = match issue.severity {
                Severity::Critical => &mut recs.critical,
                Severity::High => &mut recs.high,
                Severity::Medium => &mut recs.medium,
                Severity::Low => &mut recs.low,
            };
            let line = match issue.solution_steps.first() {
                Some(step) => format!("{}: {}", issue.title, step),
                None => issue.title.clone(),
            };
            bucket.push(line);
        }
        recs
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiAnalysis {
    pub summary: String,
    pub priority_actions: Vec<String>,
    pub quick_wins: Vec<String>,
    pub estimated_impact: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditResult {
    pub run_id: Uuid,
    pub url: String,
    pub audited_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub platform_info: PlatformInfo,
    pub performance: PerformanceMetrics,
    pub seo: SeoMetrics,
    pub ux: UxMetrics,
    pub conversion: ConversionMetrics,
    pub trust: TrustMetrics,
    pub issues: Vec<Issue>,
    pub scores: Scores,
    pub recommendations: Recommendations,
    pub ai_analysis: AiAnalysis,
}
