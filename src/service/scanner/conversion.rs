use scraper::Html;

use super::{base_with_bonuses, score_after_issues, ContentScanner, Rule, ScanOutput};
use crate::domain::metrics::ConversionMetrics;
use crate::domain::models::{Category, IssueDraft, Severity};
use crate::domain::snapshot::PageSnapshot;
use crate::extractor::signals::{MarkerSignal, PresenceSignal, SignalSource};

const DETECTED_BY: &str = "ConversionScanner";
const BASE_SCORE: i32 = 60;

const ADD_TO_CART: PresenceSignal = PresenceSignal {
    name: "add_to_cart",
    selectors: &[
        "form[action*='/cart/add']",
        "button[name='add']",
        ".product-form__submit",
        "[data-add-to-cart]",
    ],
    markers: &["add to cart", "add-to-cart", "addtocart", "add to bag"],
};

const GUEST_CHECKOUT: MarkerSignal = MarkerSignal {
    name: "guest_checkout",
    markers: &["guest checkout", "checkout as guest", "continue as guest", "guest-checkout"],
};

const EXPRESS_CHECKOUT: PresenceSignal = PresenceSignal {
    name: "express_checkout",
    selectors: &["shopify-payment-button", ".shopify-payment-button", "[data-shopify='payment-button']"],
    markers: &["shop pay", "shop-pay", "apple pay", "apple-pay", "google pay", "paypal-button", "dynamic-checkout"],
};

const EMAIL_CAPTURE: PresenceSignal = PresenceSignal {
    name: "email_capture",
    selectors: &[
        "input[type='email']",
        "form[action*='/contact#contact_form']",
        ".newsletter-form",
    ],
    markers: &["newsletter", "klaviyo", "privy", "omnisend", "subscribe"],
};

const UPSELL: MarkerSignal = MarkerSignal {
    name: "upsell",
    markers: &[
        "you may also like",
        "related products",
        "frequently bought together",
        "complementary products",
        "product-recommendations",
        "upsell",
        "cross-sell",
    ],
};

const URGENCY: MarkerSignal = MarkerSignal {
    name: "urgency",
    markers: &[
        "only a few left",
        "low stock",
        "left in stock",
        "selling fast",
        "countdown",
        "limited time",
        "ends in",
    ],
};

const FREE_SHIPPING_BAR: MarkerSignal = MarkerSignal {
    name: "free_shipping_bar",
    markers: &["free shipping", "free-shipping", "away from free", "free delivery"],
};

const MISSING_ADD_TO_CART: Rule = Rule {
    id: "conversion.missing_add_to_cart",
    title: "No add-to-cart button found",
    description: "The page has no visible add-to-cart form or button.",
    category: Category::Conversion,
    subcategory: "purchase-path",
    severity: Severity::High,
    confidence: 0.7,
    business_impact: "Shoppers cannot buy directly from the audited page.",
    technical_impact: "No /cart/add form or add button was detected in the markup.",
    solution_steps: &[
        "Add a quick-add button to featured products",
        "Check that the product form renders without JavaScript errors",
    ],
    code_example: Some(
        "<form action=\"/cart/add\" method=\"post\"><button type=\"submit\" name=\"add\">Add to cart</button></form>",
    ),
    estimated_time: "1-2 hours",
};

const MISSING_GUEST_CHECKOUT: Rule = Rule {
    id: "conversion.missing_guest_checkout",
    title: "Guest checkout not advertised",
    description: "Nothing on the page tells shoppers they can check out without an account.",
    category: Category::Conversion,
    subcategory: "checkout",
    severity: Severity::Medium,
    confidence: 0.6,
    business_impact: "Forced account creation is a leading cause of checkout abandonment.",
    technical_impact: "No guest checkout wording or option was found.",
    solution_steps: &[
        "Set customer accounts to optional in checkout settings",
        "Mention guest checkout near the cart button",
    ],
    code_example: None,
    estimated_time: "30 minutes",
};

const MISSING_EXPRESS_CHECKOUT: Rule = Rule {
    id: "conversion.missing_express_checkout",
    title: "No express checkout",
    description: "No accelerated payment buttons (Shop Pay, Apple Pay, Google Pay, PayPal) were found.",
    category: Category::Conversion,
    subcategory: "checkout",
    severity: Severity::Medium,
    confidence: 0.75,
    business_impact: "Mobile shoppers abandon long checkout forms.",
    technical_impact: "No dynamic checkout buttons were rendered.",
    solution_steps: &[
        "Enable accelerated checkouts in payment settings",
        "Turn on dynamic checkout buttons in the product template",
    ],
    code_example: Some("{{ form | payment_button }}"),
    estimated_time: "1 hour",
};

const MISSING_EMAIL_CAPTURE: Rule = Rule {
    id: "conversion.missing_email_capture",
    title: "No email capture",
    description: "No newsletter signup or email capture form was found.",
    category: Category::Conversion,
    subcategory: "retention",
    severity: Severity::Medium,
    confidence: 0.8,
    business_impact: "Visitors who are not ready to buy leave without a way to bring them back.",
    technical_impact: "No email input was found on the page.",
    solution_steps: &[
        "Add a newsletter signup to the footer",
        "Offer a first-order incentive in a delayed popup",
    ],
    code_example: None,
    estimated_time: "1-2 hours",
};

const MISSING_UPSELL: Rule = Rule {
    id: "conversion.missing_upsell",
    title: "No product recommendations",
    description: "No related-product or upsell section was found.",
    category: Category::Conversion,
    subcategory: "average-order-value",
    severity: Severity::Medium,
    confidence: 0.7,
    business_impact: "Missed chances to raise average order value.",
    technical_impact: "No recommendation section was rendered.",
    solution_steps: &[
        "Add the product recommendations section to the product template",
        "Show complementary products near the cart button",
    ],
    code_example: None,
    estimated_time: "1-2 hours",
};

const MISSING_URGENCY: Rule = Rule {
    id: "conversion.missing_urgency",
    title: "No urgency cues",
    description: "No stock level or time-limited messaging was found.",
    category: Category::Conversion,
    subcategory: "persuasion",
    severity: Severity::Low,
    confidence: 0.6,
    business_impact: "Hesitant shoppers have no reason to buy now.",
    technical_impact: "Inventory counts are not surfaced in the page.",
    solution_steps: &["Show a low-stock message when inventory is low"],
    code_example: None,
    estimated_time: "1 hour",
};

const MISSING_FREE_SHIPPING_BAR: Rule = Rule {
    id: "conversion.missing_free_shipping_bar",
    title: "No free shipping message",
    description: "No free shipping threshold or announcement was found.",
    category: Category::Conversion,
    subcategory: "average-order-value",
    severity: Severity::Low,
    confidence: 0.65,
    business_impact: "Unexpected shipping costs are a top reason for cart abandonment.",
    technical_impact: "No shipping announcement bar was rendered.",
    solution_steps: &["Announce the free shipping threshold in the header bar"],
    code_example: None,
    estimated_time: "30 minutes",
};

/// Conversion scanner: purchase path, checkout and order-value features.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConversionScanner;

impl ConversionScanner {
    pub fn new() -> Self {
        Self
    }

    fn collect_metrics(source: &SignalSource<'_>) -> ConversionMetrics {
        let mut metrics = ConversionMetrics {
            has_add_to_cart: ADD_TO_CART.detect(source),
            has_guest_checkout: GUEST_CHECKOUT.detect(source),
            has_express_checkout: EXPRESS_CHECKOUT.detect(source),
            has_email_capture: EMAIL_CAPTURE.detect(source),
            has_upsell: UPSELL.detect(source),
            has_urgency: URGENCY.detect(source),
            has_free_shipping_bar: FREE_SHIPPING_BAR.detect(source),
            base_score: 0,
            score: 0,
        };
        metrics.base_score = base_with_bonuses(
            BASE_SCORE,
            &[
                (metrics.has_add_to_cart, 5),
                (metrics.has_guest_checkout, 8),
                (metrics.has_express_checkout, 7),
                (metrics.has_email_capture, 8),
                (metrics.has_upsell, 7),
                (metrics.has_urgency, 5),
                (metrics.has_free_shipping_bar, 5),
            ],
        );
        metrics
    }

    fn evaluate(metrics: &ConversionMetrics) -> Vec<IssueDraft> {
        [
            (metrics.has_add_to_cart, &MISSING_ADD_TO_CART),
            (metrics.has_guest_checkout, &MISSING_GUEST_CHECKOUT),
            (metrics.has_express_checkout, &MISSING_EXPRESS_CHECKOUT),
            (metrics.has_email_capture, &MISSING_EMAIL_CAPTURE),
            (metrics.has_upsell, &MISSING_UPSELL),
            (metrics.has_urgency, &MISSING_URGENCY),
            (metrics.has_free_shipping_bar, &MISSING_FREE_SHIPPING_BAR),
        ]
        .into_iter()
        .filter(|(present, _)| !present)
        .map(|(_, rule)| rule.issue(DETECTED_BY))
        .collect()
    }
}

impl ContentScanner for ConversionScanner {
    type Metrics = ConversionMetrics;

    fn name(&self) -> &'static str {
        DETECTED_BY
    }

    fn scan(&self, snapshot: &PageSnapshot) -> ScanOutput<ConversionMetrics> {
        let document = Html::parse_document(&snapshot.html);
        let source = SignalSource::new(&snapshot.url, &snapshot.html, &snapshot.headers, &document);

        let mut metrics = Self::collect_metrics(&source);
        let issues = Self::evaluate(&metrics);
        metrics.score = score_after_issues(metrics.base_score, &issues);

        tracing::debug!(
            "[CONVERSION] base {} score {} with {} issues",
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

    fn scan(html: &str) -> ScanOutput<ConversionMetrics> {
        ConversionScanner::new().scan(&PageSnapshot::from_html("https://shop.test/", html))
    }

    #[test]
    fn bare_page_reports_every_gap() {
        let output = scan("<html><body><p>Welcome</p></body></html>");
        assert_eq!(output.issues.len(), 7);
        assert_eq!(output.metrics.base_score, 60);
        // 60 - 15 - 4 * 10 - 2 * 5
        assert_eq!(output.metrics.score, 0);
        let add = output
            .issues
            .iter()
            .find(|i| i.rule_id == "conversion.missing_add_to_cart")
            .unwrap();
        assert_eq!(add.severity, Some(Severity::High));
    }

    #[test]
    fn storefront_fixture_has_purchase_path() {
        let output = scan(fixtures::WELL_FORMED_STORE_HTML);
        assert!(output.metrics.has_add_to_cart);
        assert!(output.metrics.has_express_checkout);
        assert!(output.metrics.has_email_capture);
        assert!(output.metrics.has_free_shipping_bar);
        assert!(output
            .issues
            .iter()
            .all(|i| i.rule_id != "conversion.missing_add_to_cart"));
    }

    #[test]
    fn markers_are_case_insensitive() {
        let output = scan("<div>FREE SHIPPING on orders over $50. Only a few left!</div>");
        assert!(output.metrics.has_free_shipping_bar);
        assert!(output.metrics.has_urgency);
    }
}
