use scraper::Html;

use super::{base_with_bonuses, score_after_issues, ContentScanner, Rule, ScanOutput};
use crate::domain::metrics::TrustMetrics;
use crate::domain::models::{Category, IssueDraft, Severity};
use crate::domain::snapshot::PageSnapshot;
use crate::extractor::page_extractor::PageExtractor;
use crate::extractor::signals::{MarkerSignal, PresenceSignal, SignalSource};

const DETECTED_BY: &str = "TrustScanner";
const BASE_SCORE: i32 = 70;

/// Presence checked against link targets first, page text second.
struct LinkSignal {
    href_fragments: &'static [&'static str],
    markers: MarkerSignal,
}

impl LinkSignal {
    fn detect(&self, hrefs: &[String], source: &SignalSource<'_>) -> bool {
        hrefs
            .iter()
            .any(|href| self.href_fragments.iter().any(|f| href.contains(f)))
            || self.markers.detect(source)
    }
}

const REFUND_POLICY: LinkSignal = LinkSignal {
    href_fragments: &["refund-policy", "return-policy", "/returns", "/refund"],
    markers: MarkerSignal {
        name: "refund_policy",
        markers: &["refund policy", "return policy", "returns & exchanges", "money-back guarantee"],
    },
};

const CONTACT: LinkSignal = LinkSignal {
    href_fragments: &["/pages/contact", "/contact", "mailto:", "tel:"],
    markers: MarkerSignal {
        name: "contact",
        markers: &["contact us", "customer service", "get in touch"],
    },
};

const ABOUT: LinkSignal = LinkSignal {
    href_fragments: &["/pages/about", "/about"],
    markers: MarkerSignal {
        name: "about",
        markers: &["about us", "our story"],
    },
};

const PRIVACY_POLICY: LinkSignal = LinkSignal {
    href_fragments: &["privacy-policy", "/privacy"],
    markers: MarkerSignal {
        name: "privacy_policy",
        markers: &["privacy policy"],
    },
};

const PAYMENT_ICONS: PresenceSignal = PresenceSignal {
    name: "payment_icons",
    selectors: &[".payment-icons", ".list-payment", "svg.icon--full-color", "[class*='payment-icon']"],
    markers: &["payment-icon", "payment_icon", "visa", "mastercard", "american express", "paypal"],
};

const SOCIAL_PROOF: MarkerSignal = MarkerSignal {
    name: "social_proof",
    markers: &[
        "customer reviews",
        "testimonials",
        "happy customers",
        "as seen in",
        "verified buyer",
        "rated 4",
        "stars from",
        "instagram.com",
    ],
};

const TRUST_BADGES: PresenceSignal = PresenceSignal {
    name: "trust_badges",
    selectors: &[".trust-badges", ".trust-badge", "[class*='trust-badge']"],
    markers: &["trust-badge", "secure checkout", "ssl secured", "norton", "mcafee", "guaranteed safe"],
};

const MISSING_SSL: Rule = Rule {
    id: "security.missing_ssl",
    title: "Site is not served over HTTPS",
    description: "The audited URL does not use HTTPS.",
    category: Category::Security,
    subcategory: "transport",
    severity: Severity::Critical,
    confidence: 0.99,
    business_impact: "Browsers mark the store as not secure and shoppers will not enter payment details.",
    technical_impact: "Traffic, including session cookies, travels unencrypted.",
    solution_steps: &[
        "Provision a TLS certificate for the domain",
        "Redirect all HTTP traffic to HTTPS",
        "Enable HSTS once the redirect is verified",
    ],
    code_example: None,
    estimated_time: "1-2 hours",
};

const MISSING_REFUND_POLICY: Rule = Rule {
    id: "trust.missing_refund_policy",
    title: "No refund policy linked",
    description: "No refund or return policy is linked from the page.",
    category: Category::Trust,
    subcategory: "policies",
    severity: Severity::High,
    confidence: 0.8,
    business_impact: "Shoppers hesitate to buy when they cannot find the return terms.",
    technical_impact: "No policy link was found in the page or footer.",
    solution_steps: &[
        "Publish a refund policy in the store's policy settings",
        "Link it from the footer and the product page",
    ],
    code_example: Some("<a href=\"/policies/refund-policy\">Refund policy</a>"),
    estimated_time: "1 hour",
};

const MISSING_CONTACT: Rule = Rule {
    id: "trust.missing_contact_info",
    title: "No contact information",
    description: "No contact page, email or phone link was found.",
    category: Category::Trust,
    subcategory: "transparency",
    severity: Severity::High,
    confidence: 0.8,
    business_impact: "Shoppers doubt a store they cannot reach.",
    technical_impact: "No contact link was found in the page.",
    solution_steps: &[
        "Create a contact page",
        "Link it from the header or footer",
        "Show a support email address",
    ],
    code_example: None,
    estimated_time: "1 hour",
};

const MISSING_PAYMENT_ICONS: Rule = Rule {
    id: "trust.missing_payment_icons",
    title: "No payment icons",
    description: "Accepted payment methods are not shown.",
    category: Category::Trust,
    subcategory: "checkout-confidence",
    severity: Severity::Medium,
    confidence: 0.7,
    business_impact: "Familiar payment logos reassure first-time buyers.",
    technical_impact: "No payment icon markup was found.",
    solution_steps: &["Enable payment icons in the footer section settings"],
    code_example: Some(
        "{% for type in shop.enabled_payment_types %}{{ type | payment_type_svg_tag }}{% endfor %}",
    ),
    estimated_time: "30 minutes",
};

const MISSING_SOCIAL_PROOF: Rule = Rule {
    id: "trust.missing_social_proof",
    title: "No social proof",
    description: "No testimonials, review counts or press mentions were found.",
    category: Category::Trust,
    subcategory: "social-proof",
    severity: Severity::Medium,
    confidence: 0.65,
    business_impact: "New visitors have no evidence that others buy here.",
    technical_impact: "No testimonial or review-summary content was detected.",
    solution_steps: &[
        "Add a testimonials section to the home page",
        "Show the total review count near the hero",
    ],
    code_example: None,
    estimated_time: "1-2 hours",
};

const MISSING_PRIVACY_POLICY: Rule = Rule {
    id: "trust.missing_privacy_policy",
    title: "No privacy policy linked",
    description: "No privacy policy is linked from the page.",
    category: Category::Trust,
    subcategory: "policies",
    severity: Severity::Medium,
    confidence: 0.8,
    business_impact: "Shoppers, and some ad platforms, expect a visible privacy policy.",
    technical_impact: "No privacy policy link was found.",
    solution_steps: &["Publish a privacy policy and link it from the footer"],
    code_example: None,
    estimated_time: "30 minutes",
};

const MISSING_ABOUT: Rule = Rule {
    id: "trust.missing_about_page",
    title: "No about page",
    description: "No about page is linked from the page.",
    category: Category::Trust,
    subcategory: "transparency",
    severity: Severity::Low,
    confidence: 0.7,
    business_impact: "Shoppers like to know who they are buying from.",
    technical_impact: "No about link was found.",
    solution_steps: &["Write a short brand story page and link it from the footer"],
    code_example: None,
    estimated_time: "1-2 hours",
};

const MISSING_TRUST_BADGES: Rule = Rule {
    id: "trust.missing_trust_badges",
    title: "No trust badges",
    description: "No secure checkout or guarantee badges were found.",
    category: Category::Trust,
    subcategory: "checkout-confidence",
    severity: Severity::Low,
    confidence: 0.6,
    business_impact: "Badges near the cart button reduce last-second hesitation.",
    technical_impact: "No badge markup was found.",
    solution_steps: &["Add a secure checkout and guarantee badge below the add-to-cart button"],
    code_example: None,
    estimated_time: "30 minutes",
};

/// Trust scanner: transport security, policies and credibility signals.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrustScanner;

impl TrustScanner {
    pub fn new() -> Self {
        Self
    }

    fn collect_metrics(snapshot: &PageSnapshot, source: &SignalSource<'_>) -> TrustMetrics {
        let hrefs = PageExtractor::extract_link_hrefs(source.document);

        let mut metrics = TrustMetrics {
            has_ssl: snapshot.is_https(),
            has_payment_icons: PAYMENT_ICONS.detect(source),
            has_social_proof: SOCIAL_PROOF.detect(source),
            has_refund_policy: REFUND_POLICY.detect(&hrefs, source),
            has_contact_info: CONTACT.detect(&hrefs, source),
            has_about_page: ABOUT.detect(&hrefs, source),
            has_privacy_policy: PRIVACY_POLICY.detect(&hrefs, source),
            has_trust_badges: TRUST_BADGES.detect(source),
            base_score: 0,
            score: 0,
        };
        metrics.base_score = base_with_bonuses(
            BASE_SCORE,
            &[
                (metrics.has_ssl, 10),
                (metrics.has_payment_icons, 6),
                (metrics.has_social_proof, 6),
                (metrics.has_refund_policy, 6),
                (metrics.has_contact_info, 5),
                (metrics.has_about_page, 4),
                (metrics.has_privacy_policy, 3),
                (metrics.has_trust_badges, 4),
            ],
        );
        metrics
    }

    fn evaluate(metrics: &TrustMetrics) -> Vec<IssueDraft> {
        [
            (metrics.has_ssl, &MISSING_SSL),
            (metrics.has_refund_policy, &MISSING_REFUND_POLICY),
            (metrics.has_contact_info, &MISSING_CONTACT),
            (metrics.has_payment_icons, &MISSING_PAYMENT_ICONS),
            (metrics.has_social_proof, &MISSING_SOCIAL_PROOF),
            (metrics.has_privacy_policy, &MISSING_PRIVACY_POLICY),
            (metrics.has_about_page, &MISSING_ABOUT),
            (metrics.has_trust_badges, &MISSING_TRUST_BADGES),
        ]
        .into_iter()
        .filter(|(present, _)| !present)
        .map(|(_, rule)| rule.issue(DETECTED_BY))
        .collect()
    }
}

impl ContentScanner for TrustScanner {
    type Metrics = TrustMetrics;

    fn name(&self) -> &'static str {
        DETECTED_BY
    }

    fn scan(&self, snapshot: &PageSnapshot) -> ScanOutput<TrustMetrics> {
        let document = Html::parse_document(&snapshot.html);
        let source = SignalSource::new(&snapshot.url, &snapshot.html, &snapshot.headers, &document);

        let mut metrics = Self::collect_metrics(snapshot, &source);
        let issues = Self::evaluate(&metrics);
        metrics.score = score_after_issues(metrics.base_score, &issues);

        tracing::debug!(
            "[TRUST] base {} score {} with {} issues",
            metrics.base_score,
            metrics.score,
            issues.len()
        );
        ScanOutput { metrics, issues }
    }
}
