//! Server-side page bootstrap.
//!
//! The in-page runtime depends on a small markup and header contract that the
//! server serving the host page must fulfil:
//!
//! - a `<meta name="correlation_id" value="...">` element in the document,
//! - a `window.TIKI_PROTOCOL` global naming the diagnostic frame's scheme,
//! - a script that loads and installs the runtime,
//! - `X-Tiki-Time` / `X-Correlation-ID` headers on every response, including
//!   the AJAX and fetch responses the runtime later observes.
//!
//! This module produces all of it.  It performs no I/O: callers pass response
//! bodies and headers in and get rewritten values back.

use tracing::debug;
use uuid::Uuid;

use super::config::InjectionConfig;

/// Response header that opts a single response out of injection.
pub const SUPPRESS_HEADER: &str = "x-suppress-tikibar";

/// Header names as emitted by the server.  Browsers match them
/// case-insensitively against [`super::request::TIKI_TIME_HEADER`] and
/// [`super::request::CORRELATION_ID_HEADER`].
pub const TIKI_TIME_RESPONSE_HEADER: &str = "X-Tiki-Time";
pub const CORRELATION_ID_RESPONSE_HEADER: &str = "X-Correlation-ID";

/// Generates a fresh correlation id: 32 lowercase hex characters.
pub fn new_correlation_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Scheme the diagnostic frame should be served over.
///
/// Plain `http` is only used for debug deployments reached over an insecure
/// connection; everything else gets `https`.
pub fn protocol_for(debug: bool, is_secure: bool) -> &'static str {
    if debug && !is_secure {
        "http"
    } else {
        "https"
    }
}

/// Decides whether a response body should receive the bootstrap markup.
///
/// Only non-empty HTML bodies qualify, and a response can opt out by carrying
/// the [`SUPPRESS_HEADER`] header with any value.
pub fn should_inject(content_type: Option<&str>, body: &str, suppress_header: Option<&str>) -> bool {
    let is_html = content_type
        .map(|ct| ct.trim_start().starts_with("text/html"))
        .unwrap_or(false);
    is_html && !body.is_empty() && suppress_header.is_none()
}

/// Inserts the bootstrap markup into an HTML document.
///
/// - The correlation `<meta>` element goes before every `</head>`.
/// - The protocol global and the runtime loader go before every `</body>`.
///
/// Returns the body unchanged when injection is disabled in `config`.
pub fn inject_bootstrap(
    html: &str,
    correlation_id: &str,
    scheme: &str,
    config: &InjectionConfig,
) -> String {
    if !config.enabled {
        return html.to_string();
    }

    if !html.contains("</body>") {
        debug!(correlation_id, "document has no </body>; runtime loader not injected");
    }

    let meta = format!(r#"<meta name="correlation_id" value="{correlation_id}">"#);
    let scripts = bootstrap_scripts(scheme, &config.script_url);

    html.replace("</head>", &format!("{meta}</head>"))
        .replace("</body>", &format!("{scripts}</body>"))
}

/// The two script elements appended to the body: the protocol global, then a
/// module script that loads the runtime and installs it.
fn bootstrap_scripts(scheme: &str, script_url: &str) -> String {
    format!(
        "<script>window.TIKI_PROTOCOL = \"{scheme}\";</script>\n\
         <script type=\"module\">import init, {{ installTikibar }} from \"{script_url}\"; \
         init().then(() => installTikibar());</script>"
    )
}

/// The telemetry header pair attached to every response.
///
/// `duration_secs` is the server-side request duration in seconds; the
/// runtime converts it to milliseconds when it reports the request.
pub fn telemetry_headers(duration_secs: f64, correlation_id: &str) -> [(&'static str, String); 2] {
    [
        (TIKI_TIME_RESPONSE_HEADER, duration_secs.to_string()),
        (CORRELATION_ID_RESPONSE_HEADER, correlation_id.to_string()),
    ]
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::request::elapsed_ms_from_header;

    const PAGE: &str = "<html><head><title>t</title></head><body><p>hi</p></body></html>";

    #[test]
    fn test_correlation_id_is_32_hex_chars() {
        let id = new_correlation_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_correlation_ids_are_unique() {
        assert_ne!(new_correlation_id(), new_correlation_id());
    }

    #[test]
    fn test_protocol_is_http_only_for_insecure_debug() {
        assert_eq!(protocol_for(true, false), "http");
        assert_eq!(protocol_for(true, true), "https");
        assert_eq!(protocol_for(false, false), "https");
        assert_eq!(protocol_for(false, true), "https");
    }

    #[test]
    fn test_should_inject_html_only() {
        assert!(should_inject(Some("text/html; charset=utf-8"), PAGE, None));
        assert!(!should_inject(Some("application/json"), "{}", None));
        assert!(!should_inject(None, PAGE, None));
    }

    #[test]
    fn test_should_not_inject_empty_or_suppressed() {
        assert!(!should_inject(Some("text/html"), "", None));
        assert!(!should_inject(Some("text/html"), PAGE, Some("1")));
    }

    #[test]
    fn test_inject_places_meta_in_head_and_scripts_in_body() {
        // Arrange
        let config = InjectionConfig::default();

        // Act
        let out = inject_bootstrap(PAGE, "abc123", "https", &config);

        // Assert
        assert!(out.contains(r#"<meta name="correlation_id" value="abc123"></head>"#));
        assert!(out.contains(r#"window.TIKI_PROTOCOL = "https";"#));
        assert!(out.contains(r#"from "/static/tikibar/tikibar_host.js""#));
        let body_close = out.find("</body>").unwrap();
        let loader = out.find("installTikibar()").unwrap();
        assert!(loader < body_close);
    }

    #[test]
    fn test_inject_disabled_returns_body_unchanged() {
        let config = InjectionConfig {
            enabled: false,
            ..InjectionConfig::default()
        };
        assert_eq!(inject_bootstrap(PAGE, "abc", "https", &config), PAGE);
    }

    #[test]
    fn test_inject_without_head_or_body_is_a_no_op() {
        let fragment = "<div>partial</div>";
        let out = inject_bootstrap(fragment, "abc", "https", &InjectionConfig::default());
        assert_eq!(out, fragment);
    }

    #[test]
    fn test_telemetry_headers_feed_the_runtime_conversion() {
        let headers = telemetry_headers(0.25, "abc123");

        assert_eq!(headers[0].0, "X-Tiki-Time");
        assert_eq!(headers[1], ("X-Correlation-ID", "abc123".to_string()));
        // The runtime reads the seconds value back as 250 ms.
        assert_eq!(elapsed_ms_from_header(Some(&headers[0].1)), 250.0);
    }
}
