//! Storefront platform fingerprinting.
//!
//! Pure function of the crawled snapshot. Each field of [`PlatformInfo`] is
//! its own named signal with an explicit fallback chain, so detection rules
//! can be tested one by one.

use regex::Regex;
use scraper::Html;
use std::sync::OnceLock;

use crate::domain::models::{AddonInfo, PlatformInfo, ThemeInfo};
use crate::domain::snapshot::PageSnapshot;
use crate::extractor::page_extractor::PageExtractor;
use crate::extractor::signals::{cached_regex, capture, MarkerSignal, Signal, SignalSource};

const PLATFORM_HTML: MarkerSignal = MarkerSignal {
    name: "platform_html",
    markers: &[
        "cdn.shopify.com",
        "shopify.theme",
        "window.shopify",
        "shopify-section",
        "shopify.shop",
    ],
};

const PLATFORM_HEADERS: &[&str] = &["x-shopid", "x-shopify-stage", "x-sorting-hat-shopid"];

const NEXT_GEN_THEME: MarkerSignal = MarkerSignal {
    name: "next_gen_theme",
    markers: &["section-template--", "shopify-section-template--"],
};

const LEGACY_THEME: MarkerSignal = MarkerSignal {
    name: "legacy_theme",
    markers: &["shopify-section-"],
};

/// Known add-on vendors, keyed by the domain their scripts load from.
const ADDON_CATALOG: &[(&str, &str)] = &[
    ("klaviyo.com", "Klaviyo"),
    ("judge.me", "Judge.me"),
    ("yotpo.com", "Yotpo"),
    ("stamped.io", "Stamped"),
    ("loox.io", "Loox"),
    ("privy.com", "Privy"),
    ("gorgias.chat", "Gorgias"),
    ("rechargeapps.com", "Recharge"),
    ("boldapps.net", "Bold"),
    ("okendo.io", "Okendo"),
    ("afterpay.com", "Afterpay"),
    ("smile.io", "Smile"),
    ("omnisend.com", "Omnisend"),
    ("tidio.co", "Tidio"),
    ("hotjar.com", "Hotjar"),
    ("pagefly.io", "PageFly"),
    ("shogun.app", "Shogun"),
    ("vitals.co", "Vitals"),
    ("searchanise.com", "Searchanise"),
    ("zendesk.com", "Zendesk"),
];

// ====== Extractors ======

fn is_platform_url(source: &SignalSource<'_>) -> Option<bool> {
    url::Url::parse(source.url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.ends_with(".myshopify.com")))
        .filter(|hit| *hit)
}

fn is_platform_header(source: &SignalSource<'_>) -> Option<bool> {
    let by_name = PLATFORM_HEADERS.iter().any(|h| source.header(h).is_some());
    let by_powered_by = source
        .header("powered-by")
        .map(|v| v.to_ascii_lowercase().contains("shopify"))
        .unwrap_or(false);
    (by_name || by_powered_by).then_some(true)
}

fn is_platform_markup(source: &SignalSource<'_>) -> Option<bool> {
    PLATFORM_HTML.detect(source).then_some(true)
}

fn theme_name_from_script(source: &SignalSource<'_>) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    capture(
        cached_regex(&RE, r#"Shopify\.theme\s*=\s*\{[^}]*?"name"\s*:\s*"([^"]+)""#),
        source.html,
    )
}

fn theme_name_from_stylesheet(source: &SignalSource<'_>) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    capture(
        cached_regex(&RE, r#"data-theme-name="([^"]+)""#),
        source.html,
    )
}

fn theme_version_from_script(source: &SignalSource<'_>) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    capture(
        cached_regex(&RE, r#""schema_version"\s*:\s*"([^"]+)""#),
        source.html,
    )
}

fn theme_version_from_attribute(source: &SignalSource<'_>) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    capture(
        cached_regex(&RE, r#"data-theme-version="([^"]+)""#),
        source.html,
    )
}

fn products_from_json(source: &SignalSource<'_>) -> Option<u32> {
    static RE: OnceLock<Regex> = OnceLock::new();
    capture(cached_regex(&RE, r#""products_count"\s*:\s*(\d+)"#), source.html)
        .and_then(|n| n.parse().ok())
}

fn collections_from_json(source: &SignalSource<'_>) -> Option<u32> {
    static RE: OnceLock<Regex> = OnceLock::new();
    capture(cached_regex(&RE, r#""collections_count"\s*:\s*(\d+)"#), source.html)
        .and_then(|n| n.parse().ok())
}

fn currency_from_script(source: &SignalSource<'_>) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    capture(
        cached_regex(
            &RE,
            r#"Shopify\.currency\s*=\s*\{[^}]*?"active"\s*:\s*"([A-Za-z]{3})""#,
        ),
        source.html,
    )
    .map(|c| c.to_ascii_uppercase())
}

fn currency_from_meta(source: &SignalSource<'_>) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    capture(
        cached_regex(
            &RE,
            r#"property="og:price:currency"\s+content="([A-Za-z]{3})""#,
        ),
        source.html,
    )
    .map(|c| c.to_ascii_uppercase())
}

fn country_from_script(source: &SignalSource<'_>) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    capture(
        cached_regex(&RE, r#"Shopify\.country\s*=\s*"([A-Za-z]{2})""#),
        source.html,
    )
    .map(|c| c.to_ascii_uppercase())
}

fn country_from_headers(source: &SignalSource<'_>) -> Option<String> {
    source
        .header("cf-ipcountry")
        .or_else(|| source.header("x-country-code"))
        .map(|c| c.trim().to_ascii_uppercase())
        .filter(|c| c.len() == 2)
}

fn language_from_script(source: &SignalSource<'_>) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    capture(
        cached_regex(&RE, r#"Shopify\.locale\s*=\s*"([A-Za-z-]+)""#),
        source.html,
    )
}

fn language_from_html_attr(source: &SignalSource<'_>) -> Option<String> {
    PageExtractor::extract_lang(source.document)
}

fn not_platform() -> bool {
    false
}

fn unknown_theme() -> String {
    ThemeInfo::default().name
}

fn default_theme_version() -> String {
    ThemeInfo::default().version
}

fn zero() -> u32 {
    0
}

fn default_currency() -> String {
    PlatformInfo::default().currency
}

fn default_country() -> String {
    PlatformInfo::default().country
}

fn default_language() -> String {
    PlatformInfo::default().language
}

// ====== Signals ======

pub const IS_PLATFORM: Signal<bool> = Signal {
    name: "is_platform",
    chain: &[is_platform_url, is_platform_header, is_platform_markup],
    default: not_platform,
};

pub const THEME_NAME: Signal<String> = Signal {
    name: "theme_name",
    chain: &[theme_name_from_script, theme_name_from_stylesheet],
    default: unknown_theme,
};

pub const THEME_VERSION: Signal<String> = Signal {
    name: "theme_version",
    chain: &[theme_version_from_script, theme_version_from_attribute],
    default: default_theme_version,
};

pub const PRODUCTS: Signal<u32> = Signal {
    name: "products",
    chain: &[products_from_json],
    default: zero,
};

pub const COLLECTIONS: Signal<u32> = Signal {
    name: "collections",
    chain: &[collections_from_json],
    default: zero,
};

pub const CURRENCY: Signal<String> = Signal {
    name: "currency",
    chain: &[currency_from_script, currency_from_meta],
    default: default_currency,
};

pub const COUNTRY: Signal<String> = Signal {
    name: "country",
    chain: &[country_from_script, country_from_headers],
    default: default_country,
};

pub const LANGUAGE: Signal<String> = Signal {
    name: "language",
    chain: &[language_from_script, language_from_html_attr],
    default: default_language,
};

// ====== Detector ======

pub struct PlatformDetector;

impl PlatformDetector {
    /// Fingerprints the snapshot. Theme, add-ons and catalog counts are only
    /// read once the page is classified as a hosted storefront; an unclassified
    /// page gets best-effort locale fields and defaults for the rest.
    pub fn detect(snapshot: &PageSnapshot) -> PlatformInfo {
        let document = Html::parse_document(&snapshot.html);
        let source = SignalSource::new(&snapshot.url, &snapshot.html, &snapshot.headers, &document);

        let currency = CURRENCY.resolve(&source);
        let country = COUNTRY.resolve(&source);
        let language = LANGUAGE.resolve(&source);

        if !IS_PLATFORM.resolve(&source) {
            tracing::info!(
                "[PLATFORM] not a hosted storefront, currency={} country={} language={}",
                currency,
                country,
                language
            );
            return PlatformInfo {
                is_platform: false,
                currency,
                country,
                language,
                ..Default::default()
            };
        }

        let is_next_gen = NEXT_GEN_THEME.detect(&source);
        let info = PlatformInfo {
            is_platform: true,
            theme: ThemeInfo {
                name: THEME_NAME.resolve(&source),
                version: THEME_VERSION.resolve(&source),
                is_next_gen,
                is_legacy: !is_next_gen && LEGACY_THEME.detect(&source),
            },
            addons: Self::detect_addons(snapshot, &document),
            products: PRODUCTS.resolve(&source),
            collections: COLLECTIONS.resolve(&source),
            currency,
            country,
            language,
        };

        tracing::info!(
            "[PLATFORM] platform={} theme={} addons={} currency={}",
            info.is_platform,
            info.theme.name,
            info.addons.count,
            info.currency
        );
        info
    }

    /// Catalog vendors whose domain appears in a loaded script or stylesheet
    /// URL, or in a `script[src]`/`link[href]` of the markup. Catalog order.
    fn detect_addons(snapshot: &PageSnapshot, document: &Html) -> AddonInfo {
        let urls: Vec<String> = snapshot
            .resources
            .scripts
            .iter()
            .chain(&snapshot.resources.styles)
            .cloned()
            .chain(PageExtractor::extract_resource_urls(document))
            .map(|u| u.to_ascii_lowercase())
            .collect();

        let list: Vec<String> = ADDON_CATALOG
            .iter()
            .filter(|(domain, _)| urls.iter().any(|u| u.contains(domain)))
            .map(|(_, name)| name.to_string())
            .collect();

        AddonInfo {
            count: list.len(),
            list,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures;
    use std::collections::HashMap;

    fn detect(url: &str, html: &str) -> PlatformInfo {
        PlatformDetector::detect(&PageSnapshot::from_html(url, html))
    }

    #[test]
    fn plain_page_gets_every_default() {
        let info = detect("https://example.com/", "<html><body>hello</body></html>");
        assert_eq!(info, PlatformInfo::default());
        assert!(!info.is_platform);
        assert_eq!(info.theme.name, "Unknown");
        assert_eq!(info.theme.version, "1.0");
        assert_eq!(info.currency, "USD");
        assert_eq!(info.country, "US");
        assert_eq!(info.language, "en");
    }

    #[test]
    fn hosted_domain_is_enough() {
        let info = detect("https://demo.myshopify.com/", "<html></html>");
        assert!(info.is_platform);
    }

    #[test]
    fn platform_header_is_enough() {
        let mut snapshot = PageSnapshot::from_html("https://shop.example/", "<html></html>");
        snapshot.headers = HashMap::from([("x-shopid".to_string(), "123".to_string())]);
        assert!(PlatformDetector::detect(&snapshot).is_platform);
    }

    #[test]
    fn storefront_fixture_is_fully_fingerprinted() {
        let info = detect("https://www.demo-store.com/", fixtures::WELL_FORMED_STORE_HTML);
        assert!(info.is_platform);
        assert_eq!(info.theme.name, "Dawn");
        assert_eq!(info.theme.version, "15.0.0");
        assert!(info.theme.is_next_gen);
        assert!(!info.theme.is_legacy);
        assert_eq!(info.currency, "EUR");
        assert_eq!(info.country, "DE");
        assert_eq!(info.language, "de");
        assert_eq!(info.products, 128);
        assert_eq!(info.collections, 12);
        assert!(info.addons.list.contains(&"Klaviyo".to_string()));
        assert!(info.addons.list.contains(&"Judge.me".to_string()));
        assert_eq!(info.addons.count, info.addons.list.len());
    }

    #[test]
    fn legacy_sections_without_template_ids() {
        let info = detect(
            "https://shop.example/",
            r#"<div id="shopify-section-header" class="shopify-section"></div>"#,
        );
        assert!(info.is_platform);
        assert!(info.theme.is_legacy);
        assert!(!info.theme.is_next_gen);
    }

    #[test]
    fn fallbacks_follow_precedence() {
        let mut snapshot = PageSnapshot::from_html(
            "https://shop.example/",
            r#"<html lang="fr"><head><meta property="og:price:currency" content="cad"></head></html>"#,
        );
        snapshot.headers = HashMap::from([("cf-ipcountry".to_string(), "ca".to_string())]);
        let info = PlatformDetector::detect(&snapshot);
        assert_eq!(info.currency, "CAD");
        assert_eq!(info.country, "CA");
        assert_eq!(info.language, "fr");
    }

    #[test]
    fn addons_come_from_script_urls() {
        let mut snapshot = PageSnapshot::from_html("https://shop.myshopify.com/", "<html></html>");
        snapshot.resources.scripts = vec![
            "https://static.klaviyo.com/onsite/js/klaviyo.js".to_string(),
            "https://cdn.judge.me/widget.js".to_string(),
        ];
        let info = PlatformDetector::detect(&snapshot);
        assert_eq!(info.addons.list, vec!["Klaviyo", "Judge.me"]);
        assert_eq!(info.addons.count, 2);
    }

    #[test]
    fn addons_ignore_vendor_names_in_body_text() {
        let html = r#"<html><head>
            <link rel="stylesheet" href="https://cdn.loox.io/widget.css">
          </head><body>
            <p>We moved our newsletter from klaviyo.com last year.</p>
          </body></html>"#;
        let info = detect("https://shop.myshopify.com/", html);
        assert_eq!(info.addons.list, vec!["Loox"]);
    }

    #[test]
    fn unclassified_page_keeps_only_locale_fields() {
        let html = r#"<html lang="nl"><head>
            <meta property="og:price:currency" content="eur">
            <script src="https://static.klaviyo.com/onsite/js/klaviyo.js"></script>
          </head><body>
            <div data-theme-name="Custom" data-theme-version="9.9"></div>
            <script type="application/json">{"products_count":42,"collections_count":7}</script>
          </body></html>"#;
        let mut snapshot = PageSnapshot::from_html("https://plain-store.example/", html);
        snapshot.resources.scripts = vec!["https://static.klaviyo.com/onsite/js/klaviyo.js".into()];

        let info = PlatformDetector::detect(&snapshot);
        assert!(!info.is_platform);
        assert_eq!(info.theme, ThemeInfo::default());
        assert_eq!(info.addons, AddonInfo::default());
        assert_eq!(info.products, 0);
        assert_eq!(info.collections, 0);
        assert_eq!(info.currency, "EUR");
        assert_eq!(info.language, "nl");
        assert_eq!(info.country, "US");
    }
}
