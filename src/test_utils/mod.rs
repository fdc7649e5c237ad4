//! Shared test utilities and fixtures.
//!
//! `ScriptedBrowser` stands in for a real Chromium so crawler and
//! orchestrator tests run without a browser binary. It is public so the
//! integration tests under `tests/` can use it too.

use anyhow::anyhow;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::{BrowserStrategy, Viewport};
use crate::service::browser::{BrowserHandle, BrowserPage, BrowserProvider};

/// 1x1 transparent PNG.
const PNG_PIXEL: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f, 0x15, 0xc4,
    0x89, 0x00, 0x00, 0x00, 0x0a, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4e, 0x44, 0xae,
    0x42, 0x60, 0x82,
];

#[derive(Default)]
struct Counters {
    launches: AtomicUsize,
    closes: AtomicUsize,
    navigations: Mutex<Vec<String>>,
    viewports: Mutex<Vec<Viewport>>,
}

/// Browser provider that replays canned page content.
#[derive(Clone)]
pub struct ScriptedBrowser {
    html: String,
    probe: serde_json::Value,
    local_binary: bool,
    fail_launch: bool,
    fail_navigation: bool,
    fail_probe: bool,
    navigation_delay: Duration,
    counters: Arc<Counters>,
}

impl ScriptedBrowser {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            probe: serde_json::Value::String(fixtures::page_probe_json()),
            local_binary: true,
            fail_launch: false,
            fail_navigation: false,
            fail_probe: false,
            navigation_delay: Duration::ZERO,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn failing_navigation(mut self) -> Self {
        self.fail_navigation = true;
        self
    }

    pub fn failing_launch(mut self) -> Self {
        self.fail_launch = true;
        self
    }

    pub fn failing_probe(mut self) -> Self {
        self.fail_probe = true;
        self
    }

    pub fn without_local_binary(mut self) -> Self {
        self.local_binary = false;
        self
    }

    /// Navigation sleeps this long before succeeding.
    pub fn with_navigation_delay(mut self, delay: Duration) -> Self {
        self.navigation_delay = delay;
        self
    }

    pub fn launch_count(&self) -> usize {
        self.counters.launches.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.counters.closes.load(Ordering::SeqCst)
    }

    pub fn navigations(&self) -> Vec<String> {
        self.counters
            .navigations
            .lock()
            .map(|n| n.clone())
            .unwrap_or_default()
    }

    pub fn viewports(&self) -> Vec<Viewport> {
        self.counters
            .viewports
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl BrowserProvider for ScriptedBrowser {
    fn locate_local_binary(&self) -> Option<PathBuf> {
        self.local_binary
            .then(|| PathBuf::from("/usr/bin/chromium"))
    }

    async fn launch(&self, _strategy: &BrowserStrategy) -> anyhow::Result<Box<dyn BrowserHandle>> {
        if self.fail_launch {
            return Err(anyhow!("browser process exited during startup"));
        }
        self.counters.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl BrowserHandle for ScriptedBrowser {
    async fn new_page(&self) -> anyhow::Result<Box<dyn BrowserPage>> {
        Ok(Box::new(self.clone()))
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl BrowserPage for ScriptedBrowser {
    async fn navigate(&self, url: &str, _timeout: Duration) -> anyhow::Result<()> {
        if let Ok(mut navigations) = self.counters.navigations.lock() {
            navigations.push(url.to_string());
        }
        if !self.navigation_delay.is_zero() {
            tokio::time::sleep(self.navigation_delay).await;
        }
        if self.fail_navigation {
            return Err(anyhow!("net::ERR_NAME_NOT_RESOLVED at {}", url));
        }
        Ok(())
    }

    async fn content(&self) -> anyhow::Result<String> {
        Ok(self.html.clone())
    }

    async fn screenshot(&self) -> anyhow::Result<Vec<u8>> {
        Ok(PNG_PIXEL.to_vec())
    }

    async fn set_viewport(&self, viewport: Viewport) -> anyhow::Result<()> {
        if let Ok(mut viewports) = self.counters.viewports.lock() {
            viewports.push(viewport);
        }
        Ok(())
    }

    async fn evaluate(&self, _script: &str) -> anyhow::Result<serde_json::Value> {
        if self.fail_probe {
            return Err(anyhow!("Execution context was destroyed"));
        }
        Ok(self.probe.clone())
    }
}

pub mod fixtures {
    /// Product page of a storefront that does most things right.
    pub const WELL_FORMED_STORE_HTML: &str = r##"<!doctype html>
<html lang="de">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Merino Wool Sneaker | Demo Store</title>
  <meta name="description" content="Lightweight merino wool sneakers with free shipping and 30-day returns.">
  <link rel="canonical" href="https://www.demo-store.com/products/merino-sneaker">
  <meta property="og:title" content="Merino Wool Sneaker">
  <meta property="og:price:currency" content="EUR">
  <link rel="stylesheet" href="//www.demo-store.com/cdn/shop/t/3/assets/base.css">
  <script src="https://cdn.shopify.com/s/files/1/0001/t/3/assets/global.js" defer></script>
  <script src="https://static.klaviyo.com/onsite/js/klaviyo.js?company_id=AbC123" async></script>
  <script src="https://cdn.judge.me/widget_preloader.js" async></script>
  <script>
    var Shopify = Shopify || {};
    Shopify.shop = "demo-store.myshopify.com";
    Shopify.locale = "de";
    Shopify.currency = {"active":"EUR","rate":"1.0"};
    Shopify.country = "DE";
    Shopify.theme = {"name":"Dawn","id":136421245,"schema_name":"Dawn","schema_version":"15.0.0","role":"main"};
  </script>
  <script type="application/json" id="shop-stats">{"products_count":128,"collections_count":12}</script>
  <script type="application/ld+json">
    {"@context":"https://schema.org","@type":"Product","name":"Merino Wool Sneaker",
     "offers":{"@type":"Offer","price":"119.00","priceCurrency":"EUR"},
     "aggregateRating":{"@type":"AggregateRating","ratingValue":"4.8","reviewCount":"312"}}
  </script>
</head>
<body>
  <div class="announcement-bar">Free shipping on orders over 75 EUR</div>
  <header>
    <form action="/search" method="get" role="search">
      <input type="search" name="q" placeholder="Search">
    </form>
  </header>
  <nav aria-label="Breadcrumb" class="breadcrumbs">
    <a href="/">Home</a> / <a href="/collections/sneakers">Sneakers</a>
  </nav>
  <main>
    <div id="shopify-section-template--20931__main" class="shopify-section">
      <div class="product__media" data-zoom="true">
        <img src="//www.demo-store.com/cdn/shop/products/sneaker.jpg" alt="Grey merino sneaker, side view" width="800" height="800">
      </div>
      <h1 class="product__title">Merino Wool Sneaker</h1>
      <div class="jdgm-widget jdgm-preview-badge">Rated 4.8 from 312 customer reviews</div>
      <p class="inventory">Only a few left in stock</p>
      <form method="post" action="/cart/add" class="product-form">
        <input type="hidden" name="id" value="4021">
        <button type="submit" name="add" class="product-form__submit">Add to cart</button>
        <div class="shopify-payment-button" data-shopify="payment-button"></div>
      </form>
      <div class="trust-badges">Secure checkout guaranteed</div>
    </div>
    <section class="product-recommendations">
      <h2>You may also like</h2>
      <img src="//www.demo-store.com/cdn/shop/products/runner.jpg" alt="Merino runner" loading="lazy">
    </section>
    <section class="testimonials"><h2>Happy customers</h2></section>
  </main>
  <div class="sticky-atc"><button>Add to cart</button></div>
  <footer>
    <form class="newsletter-form"><input type="email" name="contact[email]" placeholder="Email"></form>
    <ul class="payment-icons" aria-label="Payment methods"><li>Visa</li><li>Mastercard</li><li>PayPal</li></ul>
    <a href="/pages/about-us">About us</a>
    <a href="/pages/contact">Contact</a>
    <a href="/policies/refund-policy">Refund policy</a>
    <a href="/policies/privacy-policy">Privacy policy</a>
    <p>Checkout as guest, no account needed.</p>
  </footer>
</body>
</html>
"##;

    /// Page without mobile viewport, reviews or sticky cart.
    pub const BARE_STORE_HTML: &str = r#"<html>
<head><title>Corner Shop</title></head>
<body>
  <h1>Corner Shop</h1>
  <p>Handmade candles.</p>
  <img src="/candle.jpg">
</body>
</html>
"#;

    /// What the crawler's resource probe returns for the well-formed store.
    pub fn page_probe_json() -> String {
        serde_json::json!({
            "resources": {
                "scripts": [
                    "https://static.klaviyo.com/onsite/js/klaviyo.js?company_id=AbC123",
                    "https://cdn.judge.me/widget_preloader.js"
                ],
                "styles": ["https://www.demo-store.com/cdn/shop/t/3/assets/base.css"],
                "images": ["https://www.demo-store.com/cdn/shop/products/sneaker.jpg"],
                "fonts": ["Assistant"]
            },
            "status": 200,
            "headers": {
                "Content-Type": "text/html; charset=utf-8",
                "X-ShopId": "987",
                "CF-IPCountry": "DE"
            }
        })
        .to_string()
    }
}
