//! Diagnostic frame addressing and overlay layout.
//!
//! The frame is a separately served document.  The host page only needs to
//! know how to address it and how to lay it out so that it overlays the page
//! without disturbing sibling layout.
//!
//! # Frame URL
//!
//! ```text
//! {scheme}://{host}/tikibar/?correlation_id={id}&render=1&run_js=1
//! ```
//!
//! # Layout
//!
//! ```text
//! target element   position:absolute; width:100%; top:{h}px; margin:0
//!   └── container  height:{h}px; margin-top:-{h}px      (first child)
//!         └── iframe  width=100% height={h}px; position:absolute; z-index:1000
//! ```
//!
//! The target is shifted down by the initial height and the container is
//! pulled back up by the same amount, so the frame sits in the gap.

use std::fmt;

/// Reserved id of the element that holds the diagnostic frame.
pub const CONTAINER_ID: &str = "tikibar_iframe_container";

/// Initial height of the container and frame, in CSS pixels.
pub const DEFAULT_HEIGHT_PX: f64 = 60.0;

/// Stacking order of the frame above page content.
pub const FRAME_Z_INDEX: i32 = 1000;

/// Path of the diagnostic document on the host's own origin.
pub const FRAME_PATH: &str = "/tikibar/";

/// Address of the diagnostic frame.
///
/// `Display` renders the full URL.  A missing correlation id renders as an
/// empty query value; the frame then shows no server metrics but still loads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameUrl {
    pub scheme: String,
    pub host: String,
    pub path: String,
    pub correlation_id: Option<String>,
}

impl FrameUrl {
    pub fn new(
        scheme: impl Into<String>,
        host: impl Into<String>,
        correlation_id: Option<String>,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            path: FRAME_PATH.to_string(),
            correlation_id,
        }
    }

    /// Overrides the frame document path (default `/tikibar/`).
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }
}

impl fmt::Display for FrameUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}{}?correlation_id={}&render=1&run_js=1",
            self.scheme,
            self.host,
            self.path,
            self.correlation_id.as_deref().unwrap_or("")
        )
    }
}

/// One CSS declaration applied to an element's inline style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleRule {
    /// Kebab-case CSS property name, e.g. `margin-top`.
    pub property: &'static str,
    pub value: String,
}

impl StyleRule {
    pub fn new(property: &'static str, value: impl Into<String>) -> Self {
        Self {
            property,
            value: value.into(),
        }
    }
}

/// Inline styles for the overlay at a given initial height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameLayout {
    pub height: f64,
    pub z_index: i32,
}

impl Default for FrameLayout {
    fn default() -> Self {
        Self {
            height: DEFAULT_HEIGHT_PX,
            z_index: FRAME_Z_INDEX,
        }
    }
}

impl FrameLayout {
    pub fn new(height: f64, z_index: i32) -> Self {
        Self { height, z_index }
    }

    /// Styles for the container element.
    pub fn container_rules(&self) -> Vec<StyleRule> {
        vec![
            StyleRule::new("height", px(self.height)),
            StyleRule::new("margin-top", px(-self.height)),
        ]
    }

    /// Styles for the iframe element.
    ///
    /// The height is set on the iframe as well as the container because
    /// mobile Safari ignores `height: 100%` on iframes.
    pub fn frame_rules(&self) -> Vec<StyleRule> {
        vec![
            StyleRule::new("height", px(self.height)),
            StyleRule::new("position", "absolute"),
            StyleRule::new("z-index", self.z_index.to_string()),
        ]
    }

    /// Styles for the element the overlay is attached to.
    pub fn target_rules(&self) -> Vec<StyleRule> {
        vec![
            StyleRule::new("position", "absolute"),
            StyleRule::new("width", "100%"),
            StyleRule::new("top", px(self.height)),
            StyleRule::new("margin", "0"),
        ]
    }
}

/// Normalises a requested frame height.
///
/// Non-finite values are rejected; negative values clamp to zero.
pub fn clamp_height(height: f64) -> Option<f64> {
    if height.is_finite() {
        Some(height.max(0.0))
    } else {
        None
    }
}

/// Formats a CSS pixel length; whole numbers render without a fraction.
pub fn px(value: f64) -> String {
    format!("{value}px")
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_url_matches_documented_shape() {
        let url = FrameUrl::new("https", "shop.example.com", Some("abc123".to_string()));
        assert_eq!(
            url.to_string(),
            "https://shop.example.com/tikibar/?correlation_id=abc123&render=1&run_js=1"
        );
    }

    #[test]
    fn test_frame_url_keeps_port_in_host() {
        let url = FrameUrl::new("http", "localhost:8000", Some("id".to_string()));
        assert_eq!(
            url.to_string(),
            "http://localhost:8000/tikibar/?correlation_id=id&render=1&run_js=1"
        );
    }

    #[test]
    fn test_frame_url_without_correlation_id_has_empty_value() {
        let url = FrameUrl::new("https", "example.com", None);
        assert_eq!(
            url.to_string(),
            "https://example.com/tikibar/?correlation_id=&render=1&run_js=1"
        );
    }

    #[test]
    fn test_frame_url_custom_path() {
        let url = FrameUrl::new("https", "example.com", Some("x".to_string())).with_path("/diag/");
        assert!(url.to_string().starts_with("https://example.com/diag/?"));
    }

    #[test]
    fn test_default_layout_uses_sixty_pixels() {
        let layout = FrameLayout::default();

        assert!(layout.container_rules().contains(&StyleRule::new("height", "60px")));
        assert!(layout.container_rules().contains(&StyleRule::new("margin-top", "-60px")));
        assert!(layout.frame_rules().contains(&StyleRule::new("z-index", "1000")));
        assert!(layout.target_rules().contains(&StyleRule::new("top", "60px")));
    }

    #[test]
    fn test_px_formats_fractions() {
        assert_eq!(px(120.0), "120px");
        assert_eq!(px(60.5), "60.5px");
    }

    #[test]
    fn test_clamp_height() {
        assert_eq!(clamp_height(120.0), Some(120.0));
        assert_eq!(clamp_height(-5.0), Some(0.0));
        assert_eq!(clamp_height(f64::NAN), None);
        assert_eq!(clamp_height(f64::INFINITY), None);
    }
}
