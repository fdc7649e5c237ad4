use scraper::Html;

use super::{ContentScanner, Rule, ScanOutput};
use crate::domain::metrics::{MetaTagMetrics, SeoMetrics};
use crate::domain::models::{Category, IssueDraft, Severity};
use crate::domain::snapshot::PageSnapshot;
use crate::extractor::page_extractor::PageExtractor;
use crate::service::scoring::clamp_score;

const DETECTED_BY: &str = "SeoScanner";

const TITLE_MAX_CHARS: u32 = 60;
const DESCRIPTION_MAX_CHARS: u32 = 160;

const MISSING_TITLE: Rule = Rule {
    id: "seo.missing_title",
    title: "Missing page title",
    description: "The page has no <title> tag, so search engines and browser tabs show a generic label.",
    category: Category::Seo,
    subcategory: "meta-tags",
    severity: Severity::Critical,
    confidence: 0.98,
    business_impact: "Pages without a title rank poorly and get fewer clicks from search results.",
    technical_impact: "Search engines synthesize a title from page content, often badly.",
    solution_steps: &[
        "Add a unique <title> to the theme layout head",
        "Include the primary keyword and the store name",
        "Keep it under 60 characters",
    ],
    code_example: Some("<title>{{ page_title }} | {{ shop.name }}</title>"),
    estimated_time: "15-30 minutes",
};

const TITLE_TOO_LONG: Rule = Rule {
    id: "seo.title_too_long",
    title: "Page title too long",
    description: "The title exceeds 60 characters and will be truncated in search results.",
    category: Category::Seo,
    subcategory: "meta-tags",
    severity: Severity::Low,
    confidence: 0.9,
    business_impact: "Truncated titles hide the value proposition and lower click-through.",
    technical_impact: "Search engines cut the title at roughly 600 pixels.",
    solution_steps: &[
        "Shorten the title to 60 characters or fewer",
        "Move secondary keywords into the meta description",
    ],
    code_example: None,
    estimated_time: "15 minutes",
};

const MISSING_DESCRIPTION: Rule = Rule {
    id: "seo.missing_meta_description",
    title: "Missing meta description",
    description: "No meta description was found, so search engines pick a random snippet.",
    category: Category::Seo,
    subcategory: "meta-tags",
    severity: Severity::High,
    confidence: 0.95,
    business_impact: "A missing description lowers click-through from search results.",
    technical_impact: "Snippets are generated from arbitrary page text.",
    solution_steps: &[
        "Add a meta description to the layout head",
        "Write 120-160 characters that sell the page",
        "Use unique descriptions for products and collections",
    ],
    code_example: Some(
        "<meta name=\"description\" content=\"{{ page_description | escape }}\">",
    ),
    estimated_time: "30 minutes",
};

const DESCRIPTION_TOO_LONG: Rule = Rule {
    id: "seo.description_too_long",
    title: "Meta description too long",
    description: "The meta description exceeds 160 characters and will be truncated.",
    category: Category::Seo,
    subcategory: "meta-tags",
    severity: Severity::Low,
    confidence: 0.85,
    business_impact: "The call to action at the end of the snippet is lost.",
    technical_impact: "Search engines truncate descriptions around 160 characters.",
    solution_steps: &["Trim the description to 160 characters or fewer"],
    code_example: None,
    estimated_time: "15 minutes",
};

const MISSING_CANONICAL: Rule = Rule {
    id: "seo.missing_canonical",
    title: "Missing canonical URL",
    description: "No canonical link tag was found; duplicate URLs may compete with each other.",
    category: Category::Seo,
    subcategory: "indexing",
    severity: Severity::Medium,
    confidence: 0.9,
    business_impact: "Ranking signals are split between duplicate product and collection URLs.",
    technical_impact: "Crawlers cannot tell which URL variant is authoritative.",
    solution_steps: &[
        "Add a canonical link tag to the layout head",
        "Point variant and filtered URLs to the primary URL",
    ],
    code_example: Some("<link rel=\"canonical\" href=\"{{ canonical_url }}\">"),
    estimated_time: "30 minutes",
};

const MISSING_H1: Rule = Rule {
    id: "seo.missing_h1",
    title: "Missing H1 heading",
    description: "The page has no H1 heading describing its main topic.",
    category: Category::Seo,
    subcategory: "content-structure",
    severity: Severity::High,
    confidence: 0.9,
    business_impact: "Search engines get a weaker signal about what the page sells.",
    technical_impact: "The document outline has no top-level heading.",
    solution_steps: &[
        "Wrap the main page heading in an <h1>",
        "Use exactly one H1 per page",
    ],
    code_example: Some("<h1 class=\"product__title\">{{ product.title }}</h1>"),
    estimated_time: "30 minutes",
};

const MULTIPLE_H1: Rule = Rule {
    id: "seo.multiple_h1",
    title: "Multiple H1 headings",
    description: "The page has more than one H1, which blurs the main topic.",
    category: Category::Seo,
    subcategory: "content-structure",
    severity: Severity::Medium,
    confidence: 0.85,
    business_impact: "Competing headings dilute keyword focus.",
    technical_impact: "Theme sections often render their own H1 tags.",
    solution_steps: &[
        "Keep one H1 for the page's main heading",
        "Demote section headings to H2 or H3",
    ],
    code_example: None,
    estimated_time: "1 hour",
};

const MISSING_STRUCTURED_DATA: Rule = Rule {
    id: "seo.missing_structured_data",
    title: "Missing structured data",
    description: "No JSON-LD structured data was found on the page.",
    category: Category::Seo,
    subcategory: "structured-data",
    severity: Severity::Medium,
    confidence: 0.9,
    business_impact: "Products are not eligible for rich results such as price and rating snippets.",
    technical_impact: "Search engines must infer product details from markup.",
    solution_steps: &[
        "Add Product JSON-LD to product templates",
        "Add Organization JSON-LD to the layout",
        "Validate with a rich results testing tool",
    ],
    code_example: Some(
        "<script type=\"application/ld+json\">{\"@context\":\"https://schema.org\",\"@type\":\"Product\",\"name\":\"{{ product.title }}\"}</script>",
    ),
    estimated_time: "2-3 hours",
};

const IMAGES_MISSING_ALT: Rule = Rule {
    id: "seo.images_missing_alt",
    title: "Images missing alt text",
    description: "Some images have no alt attribute.",
    category: Category::Seo,
    subcategory: "images",
    severity: Severity::Medium,
    confidence: 0.9,
    business_impact: "Product images miss out on image search traffic and exclude screen reader users.",
    technical_impact: "Images without alt text carry no indexable description.",
    solution_steps: &[
        "Add descriptive alt text to product and banner images",
        "Mark purely decorative images with an empty alt and role=\"presentation\"",
    ],
    code_example: Some("<img src=\"{{ image | image_url }}\" alt=\"{{ image.alt | escape }}\">"),
    estimated_time: "1-2 hours",
};

const MISSING_OPEN_GRAPH: Rule = Rule {
    id: "seo.missing_open_graph",
    title: "Missing Open Graph tags",
    description: "No og: meta tags were found, so shared links render without a preview.",
    category: Category::Seo,
    subcategory: "social",
    severity: Severity::Low,
    confidence: 0.85,
    business_impact: "Links shared on social networks get fewer clicks.",
    technical_impact: "Social platforms fall back to scraping arbitrary page content.",
    solution_steps: &["Add og:title, og:description, og:image and og:url tags"],
    code_example: None,
    estimated_time: "30 minutes",
};

/// SEO scanner implementing the fixed additive/subtractive SEO formula.
#[derive(Debug, Default, Clone, Copy)]
pub struct SeoScanner;

impl SeoScanner {
    pub fn new() -> Self {
        Self
    }

    /// The SEO score formula, clamped into [0, 100].
    pub fn score(metrics: &SeoMetrics) -> u8 {
        let mut score: i32 = 100;

        if !metrics.meta_title.present {
            score -= 15;
        } else if metrics.meta_title.length > TITLE_MAX_CHARS {
            score -= 5;
        } else {
            score += 5;
        }

        if !metrics.meta_description.present {
            score -= 10;
        } else if metrics.meta_description.length > DESCRIPTION_MAX_CHARS {
            score -= 5;
        }

        if !metrics.has_canonical {
            score -= 10;
        }

        if metrics.heading_hierarchy_valid {
            score += 5;
        } else {
            score -= 5;
        }

        if metrics.has_structured_data {
            score += 10;
        } else {
            score -= 5;
        }

        clamp_score(f64::from(score))
    }

    fn collect_metrics(document: &Html) -> SeoMetrics {
        let title = PageExtractor::extract_title(document);
        let description = PageExtractor::extract_meta_description(document);
        let headings = PageExtractor::extract_headings(document);
        let images = PageExtractor::extract_images(document);
        let structured = PageExtractor::extract_structured_data(document);

        let h1_count = headings.iter().filter(|h| h.level == 1).count() as u32;

        let mut metrics = SeoMetrics {
            meta_title: MetaTagMetrics {
                present: title.is_some(),
                length: title.map(|t| t.chars().count() as u32).unwrap_or(0),
            },
            meta_description: MetaTagMetrics {
                present: description.is_some(),
                length: description.map(|d| d.chars().count() as u32).unwrap_or(0),
            },
            has_canonical: PageExtractor::extract_canonical(document).is_some(),
            h1_count,
            heading_hierarchy_valid: h1_count == 1,
            has_structured_data: structured.blocks > 0,
            structured_data_blocks: structured.blocks,
            has_product_schema: structured.has_type("Product"),
            images_total: images.len() as u32,
            images_missing_alt: images.iter().filter(|i| i.missing_alt()).count() as u32,
            has_open_graph: PageExtractor::has_open_graph(document),
            base_score: 0,
            score: 0,
        };
        metrics.base_score = Self::score(&metrics);
        metrics.score = metrics.base_score;
        metrics
    }

    fn evaluate(metrics: &SeoMetrics) -> Vec<IssueDraft> {
        let mut issues = Vec::new();

        if !metrics.meta_title.present {
            issues.push(MISSING_TITLE.issue(DETECTED_BY).with_metric("meta_title", 0.0));
        } else if metrics.meta_title.length > TITLE_MAX_CHARS {
            issues.push(
                TITLE_TOO_LONG
                    .issue(DETECTED_BY)
                    .with_metric("meta_title_length", f64::from(metrics.meta_title.length)),
            );
        }

        if !metrics.meta_description.present {
            issues.push(MISSING_DESCRIPTION.issue(DETECTED_BY).with_metric("meta_description", 0.0));
        } else if metrics.meta_description.length > DESCRIPTION_MAX_CHARS {
            issues.push(DESCRIPTION_TOO_LONG.issue(DETECTED_BY).with_metric(
                "meta_description_length",
                f64::from(metrics.meta_description.length),
            ));
        }

        if !metrics.has_canonical {
            issues.push(MISSING_CANONICAL.issue(DETECTED_BY));
        }

        match metrics.h1_count {
            0 => issues.push(MISSING_H1.issue(DETECTED_BY).with_metric("h1_count", 0.0)),
            1 => {}
            n => issues.push(MULTIPLE_H1.issue(DETECTED_BY).with_metric("h1_count", f64::from(n))),
        }

        if !metrics.has_structured_data {
            issues.push(MISSING_STRUCTURED_DATA.issue(DETECTED_BY));
        }

        if metrics.images_missing_alt > 0 {
            issues.push(
                IMAGES_MISSING_ALT
                    .issue(DETECTED_BY)
                    .with_metric("images_missing_alt", f64::from(metrics.images_missing_alt))
                    .with_description(format!(
                        "{} of {} images have no alt attribute.",
                        metrics.images_missing_alt, metrics.images_total
                    )),
            );
        }

        if !metrics.has_open_graph {
            issues.push(MISSING_OPEN_GRAPH.issue(DETECTED_BY));
        }

        issues
    }
}

impl ContentScanner for SeoScanner {
    type Metrics = SeoMetrics;

    fn name(&self) -> &'static str {
        DETECTED_BY
    }

    fn scan(&self, snapshot: &PageSnapshot) -> ScanOutput<SeoMetrics> {
        let document = Html::parse_document(&snapshot.html);
        let metrics = Self::collect_metrics(&document);
        let issues = Self::evaluate(&metrics);
        tracing::debug!(
            "[SEO] score {} with {} issues for {}",
            metrics.score,
            issues.len(),
            snapshot.url
        );
        ScanOutput { metrics, issues }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures;

    fn scan(html: &str) -> ScanOutput<SeoMetrics> {
        SeoScanner::new().scan(&PageSnapshot::from_html("https://shop.test/", html))
    }

    fn has_rule(output: &ScanOutput<SeoMetrics>, rule_id: &str) -> bool {
        output.issues.iter().any(|i| i.rule_id == rule_id)
    }

    #[test]
    fn missing_title_is_critical() {
        let output = scan("<html><head></head><body><h1>Shop</h1></body></html>");
        assert!(!output.metrics.meta_title.present);
        let issue = output
            .issues
            .iter()
            .find(|i| i.rule_id == "seo.missing_title")
            .expect("missing title issue");
        assert_eq!(issue.severity, Some(Severity::Critical));
        assert_eq!(issue.category, Some(Category::Seo));
    }

    #[test]
    fn well_formed_page_scores_full_marks() {
        let output = scan(fixtures::WELL_FORMED_STORE_HTML);
        // 100 + 5 title + 5 hierarchy + 10 structured data, clamped
        assert_eq!(output.metrics.score, 100);
        assert!(output.metrics.has_product_schema);
        assert!(!has_rule(&output, "seo.missing_title"));
        assert!(!has_rule(&output, "seo.missing_canonical"));
    }

    #[test]
    fn bare_page_formula() {
        let output = scan("<html><body><p>hello</p></body></html>");
        // 100 - 15 - 10 - 10 - 5 - 5
        assert_eq!(output.metrics.score, 55);
        assert_eq!(output.metrics.h1_count, 0);
        assert!(has_rule(&output, "seo.missing_h1"));
        assert!(has_rule(&output, "seo.missing_structured_data"));
    }

    #[test]
    fn long_title_and_description() {
        let title = "t".repeat(61);
        let description = "d".repeat(161);
        let html = format!(
            r#"<html><head><title>{title}</title><meta name="description" content="{description}">
            <link rel="canonical" href="https://shop.test/"></head>
            <body><h1>One</h1><h1>Two</h1></body></html>"#
        );
        let output = scan(&html);
        // 100 - 5 (title) - 5 (description) - 5 (hierarchy) - 5 (no structured data)
        assert_eq!(output.metrics.score, 80);
        assert!(has_rule(&output, "seo.title_too_long"));
        assert!(has_rule(&output, "seo.description_too_long"));
        assert!(has_rule(&output, "seo.multiple_h1"));
    }

    #[test]
    fn score_formula_clamps_at_both_ends() {
        let best = SeoMetrics {
            meta_title: MetaTagMetrics { present: true, length: 20 },
            meta_description: MetaTagMetrics { present: true, length: 100 },
            has_canonical: true,
            heading_hierarchy_valid: true,
            has_structured_data: true,
            ..Default::default()
        };
        assert_eq!(SeoScanner::score(&best), 100);
        assert_eq!(SeoScanner::score(&SeoMetrics::default()), 55);
    }

    #[test]
    fn malformed_html_does_not_panic() {
        let output = scan("<html><head><title>Broken<body><h1>unterminated");
        assert!(output.metrics.score <= 100);
    }
}
