use scraper::{Html, Selector};
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct ExtractedHeading {
    pub level: u8,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct ExtractedImage {
    pub src: String,
    pub alt: Option<String>,
    pub loading: Option<String>,
    pub is_decorative: bool,
}

impl ExtractedImage {
    pub fn missing_alt(&self) -> bool {
        !self.is_decorative && self.alt.as_deref().map(str::is_empty).unwrap_or(true)
    }

    pub fn is_lazy(&self) -> bool {
        self.loading.as_deref() == Some("lazy")
    }
}

/// JSON-LD blocks found in the page.
#[derive(Debug, Clone, Default)]
pub struct StructuredData {
    pub blocks: u32,
    pub types: Vec<String>,
}

impl StructuredData {
    pub fn has_type(&self, name: &str) -> bool {
        self.types.iter().any(|t| t.eq_ignore_ascii_case(name))
    }
}

pub struct PageExtractor;

impl PageExtractor {
    pub fn extract_title(html: &Html) -> Option<String> {
        static SELECTOR: OnceLock<Selector> = OnceLock::new();
        let selector = SELECTOR.get_or_init(|| Selector::parse("title").unwrap());
        html.select(selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|s| !s.is_empty())
    }

    pub fn extract_meta_description(html: &Html) -> Option<String> {
        static SELECTOR: OnceLock<Selector> = OnceLock::new();
        let selector =
            SELECTOR.get_or_init(|| Selector::parse("meta[name='description']").unwrap());
        html.select(selector)
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    pub fn extract_canonical(html: &Html) -> Option<String> {
        static SELECTOR: OnceLock<Selector> = OnceLock::new();
        let selector = SELECTOR.get_or_init(|| Selector::parse("link[rel='canonical']").unwrap());
        html.select(selector)
            .next()
            .and_then(|el| el.value().attr("href"))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    pub fn extract_viewport(html: &Html) -> Option<String> {
        static SELECTOR: OnceLock<Selector> = OnceLock::new();
        let selector = SELECTOR.get_or_init(|| Selector::parse("meta[name='viewport']").unwrap());
        html.select(selector)
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    pub fn extract_lang(html: &Html) -> Option<String> {
        static SELECTOR: OnceLock<Selector> = OnceLock::new();
        let selector = SELECTOR.get_or_init(|| Selector::parse("html[lang]").unwrap());
        html.select(selector)
            .next()
            .and_then(|el| el.value().attr("lang"))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    pub fn extract_headings(html: &Html) -> Vec<ExtractedHeading> {
        static SELECTOR: OnceLock<Selector> = OnceLock::new();
        let selector = SELECTOR.get_or_init(|| Selector::parse("h1, h2, h3, h4, h5, h6").unwrap());

        html.select(selector)
            .filter_map(|element| {
                let tag = element.value().name();
                let level = tag.trim_start_matches('h').parse::<u8>().ok()?;
                let text = element.text().collect::<String>().trim().to_string();
                Some(ExtractedHeading { level, text })
            })
            .collect()
    }

    pub fn extract_images(html: &Html) -> Vec<ExtractedImage> {
        static SELECTOR: OnceLock<Selector> = OnceLock::new();
        let selector = SELECTOR.get_or_init(|| Selector::parse("img").unwrap());

        html.select(selector)
            .map(|element| {
                let value = element.value();
                let src = value
                    .attr("src")
                    .or_else(|| value.attr("data-src"))
                    .unwrap_or_default()
                    .trim()
                    .to_string();
                let alt = value.attr("alt").map(|s| s.trim().to_string());
                let loading = value.attr("loading").map(|s| s.trim().to_ascii_lowercase());
                let is_decorative = value.attr("role") == Some("presentation")
                    || value.attr("aria-hidden") == Some("true");

                ExtractedImage {
                    src,
                    alt,
                    loading,
                    is_decorative,
                }
            })
            .collect()
    }

    /// Parses every `application/ld+json` block; unparsable blocks still count
    /// as present but contribute no types.
    pub fn extract_structured_data(html: &Html) -> StructuredData {
        static SELECTOR: OnceLock<Selector> = OnceLock::new();
        let selector = SELECTOR
            .get_or_init(|| Selector::parse("script[type='application/ld+json']").unwrap());

        let mut data = StructuredData::default();
        for element in html.select(selector) {
            data.blocks += 1;
            let raw = element.text().collect::<String>();
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) {
                collect_types(&value, &mut data.types);
            }
        }
        data
    }

    pub fn has_open_graph(html: &Html) -> bool {
        static SELECTOR: OnceLock<Selector> = OnceLock::new();
        let selector = SELECTOR.get_or_init(|| Selector::parse("meta[property^='og:']").unwrap());
        html.select(selector).next().is_some()
    }

    /// Lowercased `href`s of every anchor, used for policy/about/contact checks.
    pub fn extract_link_hrefs(html: &Html) -> Vec<String> {
        static SELECTOR: OnceLock<Selector> = OnceLock::new();
        let selector = SELECTOR.get_or_init(|| Selector::parse("a[href]").unwrap());
        html.select(selector)
            .filter_map(|a| a.value().attr("href"))
            .map(|href| href.trim().to_ascii_lowercase())
            .filter(|href| !href.is_empty() && !href.starts_with('#'))
            .collect()
    }

    /// `src` of scripts and `href` of link tags, as written in the markup.
    pub fn extract_resource_urls(html: &Html) -> Vec<String> {
        static SELECTOR: OnceLock<Selector> = OnceLock::new();
        let selector =
            SELECTOR.get_or_init(|| Selector::parse("script[src], link[href]").unwrap());
        html.select(selector)
            .filter_map(|el| el.value().attr("src").or_else(|| el.value().attr("href")))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

fn collect_types(value: &serde_json::Value, types: &mut Vec<String>) {
    match value {
        serde_json::Value::Array(items) => items.iter().for_each(|v| collect_types(v, types)),
        serde_json::Value::Object(map) => {
            match map.get("@type") {
                Some(serde_json::Value::String(t)) => types.push(t.clone()),
                Some(serde_json::Value::Array(ts)) => types.extend(
                    ts.iter().filter_map(|t| t.as_str()).map(str::to_string),
                ),
                _ => {}
            }
            if let Some(graph) = map.get("@graph") {
                collect_types(graph, types);
            }
        }
        _ => {}
    }
}
