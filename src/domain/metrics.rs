//! Per-category metric records.
//!
//! Each record is produced once by its scanner and never mutated afterwards.
//! `base_score` is the metric-derived part of the category formula and
//! `score` is what the scanner reports after deducting its own issues. For
//! performance (lab score) and SEO (the formula already prices in every
//! finding) the two are the same.

use serde::{Deserialize, Serialize};

/// Detailed performance metrics from the lab-measurement API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub lab_score: u8,
    pub largest_contentful_paint_ms: f64,
    pub cumulative_layout_shift: f64,
    pub total_blocking_time_ms: f64,
    pub first_contentful_paint_ms: f64,
    pub speed_index_ms: f64,
    pub time_to_interactive_ms: f64,
    pub server_response_ms: f64,
    pub base_score: u8,
    pub score: u8,
}

impl PerformanceMetrics {
    /// Fully zeroed record used when the lab call fails.
    pub fn zeroed() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaTagMetrics {
    pub present: bool,
    pub length: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeoMetrics {
    pub meta_title: MetaTagMetrics,
    pub meta_description: MetaTagMetrics,
    pub has_canonical: bool,
    pub h1_count: u32,
    pub heading_hierarchy_valid: bool,
    pub has_structured_data: bool,
    pub structured_data_blocks: u32,
    pub has_product_schema: bool,
    pub images_total: u32,
    pub images_missing_alt: u32,
    pub has_open_graph: bool,
    pub base_score: u8,
    pub score: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UxMetrics {
    pub mobile_friendly: bool,
    pub has_sticky_cart: bool,
    pub has_image_zoom: bool,
    pub has_reviews: bool,
    pub has_search: bool,
    pub has_breadcrumbs: bool,
    pub images_total: u32,
    pub images_lazy_loaded: u32,
    pub base_score: u8,
    pub score: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionMetrics {
    pub has_add_to_cart: bool,
    pub has_guest_checkout: bool,
    pub has_express_checkout: bool,
    pub has_email_capture: bool,
    pub has_upsell: bool,
    pub has_urgency: bool,
    pub has_free_shipping_bar: bool,
    pub base_score: u8,
    pub score: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustMetrics {
    pub has_ssl: bool,
    pub has_payment_icons: bool,
    pub has_social_proof: bool,
    pub has_refund_policy: bool,
    pub has_contact_info: bool,
    pub has_about_page: bool,
    pub has_privacy_policy: bool,
    pub has_trust_badges: bool,
    pub base_score: u8,
    pub score: u8,
}

/// The five metric records of one run, as consumed by the score calculator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryMetrics {
    pub performance: PerformanceMetrics,
    pub seo: SeoMetrics,
    pub ux: UxMetrics,
    pub conversion: ConversionMetrics,
    pub trust: TrustMetrics,
}
