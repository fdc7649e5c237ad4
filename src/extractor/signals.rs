//! Named signal extractors.
//!
//! A signal is a small, independently testable question about a page ("is
//! there a search box?", "which currency is active?"). Each one is a chain of
//! extractors tried in order; the first `Some` wins and the documented default
//! is used when none match.

use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

/// Everything an extractor is allowed to look at.
pub struct SignalSource<'a> {
    pub url: &'a str,
    pub html: &'a str,
    /// Lowercased copy of `html` for case-insensitive marker checks.
    pub lower_html: String,
    /// Header names are lowercase.
    pub headers: &'a HashMap<String, String>,
    pub document: &'a Html,
}

impl<'a> SignalSource<'a> {
    pub fn new(
        url: &'a str,
        html: &'a str,
        headers: &'a HashMap<String, String>,
        document: &'a Html,
    ) -> Self {
        Self {
            url,
            html,
            lower_html: html.to_lowercase(),
            headers,
            document,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn contains_any(&self, markers: &[&str]) -> bool {
        markers.iter().any(|m| self.lower_html.contains(m))
    }

    pub fn matches_selector(&self, selector: &Selector) -> bool {
        self.document.select(selector).next().is_some()
    }
}

pub type Extractor<T> = fn(&SignalSource<'_>) -> Option<T>;

/// Value signal composed from extractors by explicit precedence.
pub struct Signal<T: 'static> {
    pub name: &'static str,
    pub chain: &'static [Extractor<T>],
    pub default: fn() -> T,
}

impl<T> Signal<T> {
    /// First value any extractor produces, without applying the default.
    pub fn extract(&self, source: &SignalSource<'_>) -> Option<T> {
        self.chain.iter().find_map(|extract| extract(source))
    }

    pub fn resolve(&self, source: &SignalSource<'_>) -> T {
        self.extract(source).unwrap_or_else(self.default)
    }
}

/// Presence signal backed by lowercase substring markers.
pub struct MarkerSignal {
    pub name: &'static str,
    pub markers: &'static [&'static str],
}

impl MarkerSignal {
    pub fn detect(&self, source: &SignalSource<'_>) -> bool {
        source.contains_any(self.markers)
    }
}

/// Presence signal that checks CSS selectors first, then substring markers.
/// Absent by default.
pub struct PresenceSignal {
    pub name: &'static str,
    pub selectors: &'static [&'static str],
    pub markers: &'static [&'static str],
}

impl PresenceSignal {
    pub fn detect(&self, source: &SignalSource<'_>) -> bool {
        let by_selector = self.selectors.iter().any(|css| match cached_selector(*css) {
            Some(selector) => source.matches_selector(&selector),
            None => {
                tracing::debug!("[SIGNALS] Invalid selector for {}: {}", self.name, css);
                false
            }
        });
        by_selector || source.contains_any(self.markers)
    }
}

type SelectorCache = RwLock<HashMap<&'static str, Option<Arc<Selector>>>>;

/// Parses each static selector once per process. Invalid selectors are
/// remembered as `None`.
pub fn cached_selector(css: &'static str) -> Option<Arc<Selector>> {
    static CACHE: OnceLock<SelectorCache> = OnceLock::new();
    let cache = CACHE.get_or_init(|| RwLock::new(HashMap::new()));

    if let Some(hit) = cache.read().ok().and_then(|c| c.get(css).cloned()) {
        return hit;
    }

    let parsed = Selector::parse(css).ok().map(Arc::new);
    if let Ok(mut c) = cache.write() {
        c.entry(css).or_insert_with(|| parsed.clone());
    }
    parsed
}

/// Lazily compiled regex held in a `static OnceLock`.
pub fn cached_regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).unwrap())
}

/// First capture group of `re` in `text`, trimmed and non-empty.
pub fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_meta(source: &SignalSource<'_>) -> Option<String> {
        static RE: OnceLock<Regex> = OnceLock::new();
        capture(cached_regex(&RE, r#"data-currency="([A-Z]{3})""#), source.html)
    }

    fn from_header(source: &SignalSource<'_>) -> Option<String> {
        source.header("x-currency").map(str::to_string)
    }

    fn usd() -> String {
        "USD".to_string()
    }

    const CURRENCY: Signal<String> = Signal {
        name: "currency",
        chain: &[from_meta, from_header],
        default: usd,
    };

    #[test]
    fn first_extractor_wins() {
        let html = r#"<div data-currency="EUR"></div>"#;
        let doc = Html::parse_document(html);
        let headers = HashMap::from([("x-currency".to_string(), "GBP".to_string())]);
        let source = SignalSource::new("https://shop.test", html, &headers, &doc);
        assert_eq!(CURRENCY.resolve(&source), "EUR");
    }

    #[test]
    fn falls_through_to_later_extractor_then_default() {
        let html = "<div></div>";
        let doc = Html::parse_document(html);
        let headers = HashMap::from([("x-currency".to_string(), "GBP".to_string())]);
        let source = SignalSource::new("https://shop.test", html, &headers, &doc);
        assert_eq!(CURRENCY.resolve(&source), "GBP");

        let empty = HashMap::new();
        let source = SignalSource::new("https://shop.test", html, &empty, &doc);
        assert_eq!(CURRENCY.extract(&source), None);
        assert_eq!(CURRENCY.resolve(&source), "USD");
    }

    #[test]
    fn presence_signal_uses_selector_or_marker() {
        const SEARCH: PresenceSignal = PresenceSignal {
            name: "search",
            selectors: &["input[type='search']"],
            markers: &["predictive-search"],
        };
        let headers = HashMap::new();

        let html = r#"<form><input type="search" name="q"></form>"#;
        let doc = Html::parse_document(html);
        assert!(SEARCH.detect(&SignalSource::new("", html, &headers, &doc)));

        let html = r#"<Predictive-Search></Predictive-Search>"#;
        let doc = Html::parse_document(html);
        assert!(SEARCH.detect(&SignalSource::new("", html, &headers, &doc)));

        let html = "<p>nothing here</p>";
        let doc = Html::parse_document(html);
        assert!(!SEARCH.detect(&SignalSource::new("", html, &headers, &doc)));
    }

    #[test]
    fn selectors_are_parsed_once() {
        let first = cached_selector("div.sticky-atc").unwrap();
        let second = cached_selector("div.sticky-atc").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(cached_selector("div[[").is_none());
        assert!(cached_selector("div[[").is_none());
    }
}
