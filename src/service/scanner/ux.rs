use scraper::Html;

use super::{base_with_bonuses, score_after_issues, ContentScanner, Rule, ScanOutput};
use crate::domain::metrics::UxMetrics;
use crate::domain::models::{Category, IssueDraft, Severity};
use crate::domain::snapshot::PageSnapshot;
use crate::extractor::page_extractor::PageExtractor;
use crate::extractor::signals::{PresenceSignal, SignalSource};

const DETECTED_BY: &str = "UxScanner";
const BASE_SCORE: i32 = 65;

/// Lazy loading is only worth flagging on image-heavy pages.
const LAZY_LOADING_MIN_IMAGES: u32 = 5;

const STICKY_CART: PresenceSignal = PresenceSignal {
    name: "sticky_cart",
    selectors: &[
        ".sticky-cart",
        ".sticky-atc",
        "[class*='sticky-add-to-cart']",
        "sticky-add-to-cart",
    ],
    markers: &["sticky-cart", "sticky_cart", "sticky-atc", "sticky-add-to-cart", "stickycart"],
};

const IMAGE_ZOOM: PresenceSignal = PresenceSignal {
    name: "image_zoom",
    selectors: &["[data-zoom]", "[data-image-zoom]", ".product__media-zoom", ".zoom-image"],
    markers: &["image-zoom", "product-zoom", "photoswipe", "drift-zoom", "data-zoom"],
};

const REVIEWS: PresenceSignal = PresenceSignal {
    name: "reviews",
    selectors: &[
        "[itemprop='aggregateRating']",
        ".product-reviews",
        ".jdgm-widget",
        ".yotpo",
        ".stamped-reviews",
        ".loox-rating",
        ".okeReviews",
    ],
    markers: &["judge.me", "yotpo", "stamped.io", "loox.io", "okendo", "aggregaterating", "product-reviews"],
};

const SEARCH: PresenceSignal = PresenceSignal {
    name: "search",
    selectors: &["input[type='search']", "form[action*='/search']", "predictive-search"],
    markers: &["predictive-search", "search-modal"],
};

const BREADCRUMBS: PresenceSignal = PresenceSignal {
    name: "breadcrumbs",
    selectors: &[
        "nav[aria-label*='readcrumb']",
        ".breadcrumb",
        ".breadcrumbs",
        "[itemtype*='BreadcrumbList']",
    ],
    markers: &["breadcrumblist", "breadcrumb"],
};

const MISSING_VIEWPORT: Rule = Rule {
    id: "ux.missing_viewport",
    title: "Page is not mobile friendly",
    description: "No viewport meta tag was found, so mobile browsers render the desktop layout zoomed out.",
    category: Category::Ux,
    subcategory: "mobile",
    severity: Severity::Critical,
    confidence: 0.95,
    business_impact: "Most storefront traffic is mobile; an unscaled layout drives shoppers away.",
    technical_impact: "Mobile browsers assume a 980px layout viewport.",
    solution_steps: &[
        "Add a viewport meta tag to the layout head",
        "Check the theme on a real phone after the change",
    ],
    code_example: Some("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">"),
    estimated_time: "15 minutes",
};

const MISSING_REVIEWS: Rule = Rule {
    id: "ux.missing_reviews",
    title: "No product reviews",
    description: "No review widget or rating markup was found.",
    category: Category::Ux,
    subcategory: "social-proof",
    severity: Severity::High,
    confidence: 0.8,
    business_impact: "Shoppers rely on reviews to decide; products without them convert noticeably worse.",
    technical_impact: "No aggregateRating data is available for rich results.",
    solution_steps: &[
        "Install a review app",
        "Show the star rating near the product title",
        "Send post-purchase review requests",
    ],
    code_example: None,
    estimated_time: "2-4 hours",
};

const MISSING_STICKY_CART: Rule = Rule {
    id: "ux.missing_sticky_cart",
    title: "No sticky add-to-cart",
    description: "The add-to-cart button scrolls out of view on long product pages.",
    category: Category::Ux,
    subcategory: "navigation",
    severity: Severity::Medium,
    confidence: 0.7,
    business_impact: "Shoppers who scroll through details must scroll back to buy.",
    technical_impact: "No fixed-position purchase bar was detected.",
    solution_steps: &[
        "Enable the theme's sticky add-to-cart option or install an app",
        "Show it only after the main button scrolls out of view",
    ],
    code_example: None,
    estimated_time: "1-2 hours",
};

const MISSING_SEARCH: Rule = Rule {
    id: "ux.missing_search",
    title: "No site search",
    description: "No search input or search form was found.",
    category: Category::Ux,
    subcategory: "navigation",
    severity: Severity::Medium,
    confidence: 0.75,
    business_impact: "Shoppers who search convert at a higher rate than browsers.",
    technical_impact: "No search entry point in the header markup.",
    solution_steps: &[
        "Add a search icon or field to the header",
        "Enable predictive search results",
    ],
    code_example: Some("<form action=\"/search\"><input type=\"search\" name=\"q\"></form>"),
    estimated_time: "1-2 hours",
};

const MISSING_IMAGE_ZOOM: Rule = Rule {
    id: "ux.missing_image_zoom",
    title: "No product image zoom",
    description: "Product images cannot be zoomed for detail.",
    category: Category::Ux,
    subcategory: "product-media",
    severity: Severity::Low,
    confidence: 0.65,
    business_impact: "Shoppers cannot inspect materials and finish.",
    technical_impact: "No zoom or lightbox behavior was detected.",
    solution_steps: &["Enable the theme's image zoom or lightbox option"],
    code_example: None,
    estimated_time: "30 minutes",
};

const MISSING_BREADCRUMBS: Rule = Rule {
    id: "ux.missing_breadcrumbs",
    title: "No breadcrumbs",
    description: "No breadcrumb navigation was found.",
    category: Category::Ux,
    subcategory: "navigation",
    severity: Severity::Low,
    confidence: 0.7,
    business_impact: "Shoppers landing on a product page have no path back to its collection.",
    technical_impact: "No BreadcrumbList markup is available to search engines.",
    solution_steps: &[
        "Add a breadcrumb snippet to product and collection templates",
        "Mark it up with BreadcrumbList structured data",
    ],
    code_example: None,
    estimated_time: "1 hour",
};

const IMAGES_NOT_LAZY: Rule = Rule {
    id: "ux.images_not_lazy_loaded",
    title: "Images are not lazy loaded",
    description: "Most images load eagerly, including those far below the fold.",
    category: Category::Ux,
    subcategory: "performance",
    severity: Severity::Low,
    confidence: 0.75,
    business_impact: "Mobile shoppers wait for images they may never scroll to.",
    technical_impact: "Offscreen images compete with above-the-fold content for bandwidth.",
    solution_steps: &[
        "Add loading=\"lazy\" to images below the fold",
        "Keep the hero image eager",
    ],
    code_example: Some("<img src=\"...\" loading=\"lazy\" alt=\"...\">"),
    estimated_time: "30 minutes",
};

/// UX scanner: mobile readiness and the navigation/product-page helpers
/// shoppers expect.
#[derive(Debug, Default, Clone, Copy)]
pub struct UxScanner;

impl UxScanner {
    pub fn new() -> Self {
        Self
    }

    fn collect_metrics(source: &SignalSource<'_>) -> UxMetrics {
        let images = PageExtractor::extract_images(source.document);

        let mut metrics = UxMetrics {
            mobile_friendly: PageExtractor::extract_viewport(source.document)
                .map(|content| content.to_ascii_lowercase().contains("width=device-width"))
                .unwrap_or(false),
            has_sticky_cart: STICKY_CART.detect(source),
            has_image_zoom: IMAGE_ZOOM.detect(source),
            has_reviews: REVIEWS.detect(source),
            has_search: SEARCH.detect(source),
            has_breadcrumbs: BREADCRUMBS.detect(source),
            images_total: images.len() as u32,
            images_lazy_loaded: images.iter().filter(|i| i.is_lazy()).count() as u32,
            base_score: 0,
            score: 0,
        };
        metrics.base_score = base_with_bonuses(
            BASE_SCORE,
            &[
                (metrics.mobile_friendly, 10),
                (metrics.has_sticky_cart, 8),
                (metrics.has_image_zoom, 5),
                (metrics.has_reviews, 10),
                (metrics.has_search, 7),
                (metrics.has_breadcrumbs, 5),
            ],
        );
        metrics
    }

    fn evaluate(metrics: &UxMetrics) -> Vec<IssueDraft> {
        let mut issues = Vec::new();

        if !metrics.mobile_friendly {
            issues.push(MISSING_VIEWPORT.issue(DETECTED_BY));
        }
        if !metrics.has_reviews {
            issues.push(MISSING_REVIEWS.issue(DETECTED_BY));
        }
        if !metrics.has_sticky_cart {
            issues.push(MISSING_STICKY_CART.issue(DETECTED_BY));
        }
        if !metrics.has_search {
            issues.push(MISSING_SEARCH.issue(DETECTED_BY));
        }
        if !metrics.has_image_zoom {
            issues.push(MISSING_IMAGE_ZOOM.issue(DETECTED_BY));
        }
        if !metrics.has_breadcrumbs {
            issues.push(MISSING_BREADCRUMBS.issue(DETECTED_BY));
        }

        if metrics.images_total > LAZY_LOADING_MIN_IMAGES {
            let ratio = f64::from(metrics.images_lazy_loaded) / f64::from(metrics.images_total);
            if ratio < 0.5 {
                issues.push(
                    IMAGES_NOT_LAZY
                        .issue(DETECTED_BY)
                        .with_metric("lazy_loaded_ratio", ratio),
                );
            }
        }

        issues
    }
}

impl ContentScanner for UxScanner {
    type Metrics = UxMetrics;

    fn name(&self) -> &'static str {
        DETECTED_BY
    }

    fn scan(&self, snapshot: &PageSnapshot) -> ScanOutput<UxMetrics> {
        let document = Html::parse_document(&snapshot.html);
        let source = SignalSource::new(&snapshot.url, &snapshot.html, &snapshot.headers, &document);

        let mut metrics = Self::collect_metrics(&source);
        let issues = Self::evaluate(&metrics);
        metrics.score = score_after_issues(metrics.base_score, &issues);

        tracing::debug!(
            "[UX] base {} score {} with {} issues",
            metrics.base_score,
            metrics.score,
            issues.len()
        );
        ScanOutput { metrics, issues }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures;

    fn scan(html: &str) -> ScanOutput<UxMetrics> {
        UxScanner::new().scan(&PageSnapshot::from_html("https://shop.test/", html))
    }

    fn severity_of(output: &ScanOutput<UxMetrics>, rule_id: &str) -> Option<Severity> {
        output
            .issues
            .iter()
            .find(|i| i.rule_id == rule_id)
            .and_then(|i| i.severity)
    }

    #[test]
    fn bare_page_is_not_mobile_friendly() {
        let output = scan("<html><head><title>Shop</title></head><body><p>hi</p></body></html>");
        assert!(!output.metrics.mobile_friendly);
        assert!(!output.metrics.has_sticky_cart);
        assert!(!output.metrics.has_reviews);
        assert_eq!(severity_of(&output, "ux.missing_viewport"), Some(Severity::Critical));
        assert_eq!(severity_of(&output, "ux.missing_reviews"), Some(Severity::High));
        assert_eq!(severity_of(&output, "ux.missing_sticky_cart"), Some(Severity::Medium));
        assert_eq!(output.metrics.base_score, 65);
        // 65 - 20 - 15 - 8 - 8 - 4 - 4
        assert_eq!(output.metrics.score, 6);
    }

    #[test]
    fn storefront_fixture_detects_helpers() {
        let output = scan(fixtures::WELL_FORMED_STORE_HTML);
        assert!(output.metrics.mobile_friendly);
        assert!(output.metrics.has_reviews);
        assert!(output.metrics.has_search);
        assert!(output.metrics.has_sticky_cart);
        assert!(output.metrics.has_breadcrumbs);
        assert!(output.metrics.base_score > 65);
        assert_eq!(severity_of(&output, "ux.missing_viewport"), None);
    }

    #[test]
    fn flags_eager_images_on_image_heavy_pages() {
        let images = "<img src=\"x.jpg\" alt=\"x\">".repeat(6);
        let html = format!("<html><body>{images}</body></html>");
        let output = scan(&html);
        assert_eq!(output.metrics.images_total, 6);
        assert!(severity_of(&output, "ux.images_not_lazy_loaded").is_some());

        let lazy = "<img src=\"x.jpg\" alt=\"x\" loading=\"lazy\">".repeat(6);
        let output = scan(&format!("<html><body>{lazy}</body></html>"));
        assert!(severity_of(&output, "ux.images_not_lazy_loaded").is_none());
    }

    #[test]
    fn viewport_without_device_width_is_not_mobile_friendly() {
        let output =
            scan(r#"<html><head><meta name="viewport" content="width=1024"></head></html>"#);
        assert!(!output.metrics.mobile_friendly);
    }
}
