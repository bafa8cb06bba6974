//! Origin policy: reduces an origin or URL to a comparable site identity.
//!
//! Cross-document messages carry the sender's origin (`https://shop.example.com`)
//! while the host page knows its own `location.host` (`shop.example.com`).  The
//! two strings are never equal as-is, so both are reduced to a *site identity*:
//! the registrable-domain-like part of the host, e.g. `example.com`.
//!
//! # Recognised suffixes
//!
//! The policy is a deliberately coarse allow-list, not a public-suffix-list
//! implementation.  A host is only recognised when it ends in one of:
//!
//! ```text
//! com  ca  co.uk  ie  de  es  fr  it  nl  pt  sv  co.nz  com.au  hk  sg  in  com.br
//! ```
//!
//! Hosts under any other suffix, hosts with an explicit port, and opaque
//! origins such as `"null"` have no identity and are therefore never trusted.
//!
//! # Matching rules
//!
//! - Comparison is exact and case-sensitive (no lowercasing, no trailing-dot
//!   normalisation).
//! - An input without an identity never equals anything, including another
//!   input without an identity.

use std::sync::OnceLock;

use regex::Regex;

/// Optional scheme, any number of subdomain labels, the registrable domain
/// (capture group 3), and an optional path.
///
/// `\w` is spelled out as an ASCII class because the `regex` crate's `\w` is
/// Unicode-aware.
const SITE_PATTERN: &str = concat!(
    r"^(https?://)?",
    r"([-A-Za-z0-9_]+\.)*",
    r"([-A-Za-z0-9_]+\.(com|ca|co\.uk|ie|de|es|fr|it|nl|pt|sv|co\.nz|com\.au|hk|sg|in|com\.br))",
    r"(/.*)?$",
);

/// Capture group holding the registrable domain.
const DOMAIN_GROUP: usize = 3;

fn site_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(SITE_PATTERN).expect("site pattern is a valid regex"))
}

/// Returns the site identity of an origin, URL, or bare host.
///
/// The returned slice borrows from `origin_or_url`.  Returns `None` when the
/// input does not match the recognised pattern at all.
///
/// # Example
///
/// ```rust
/// use tikibar_core::site_identity;
///
/// assert_eq!(site_identity("https://shop.example.com"), Some("example.com"));
/// assert_eq!(site_identity("www.example.co.uk"), Some("example.co.uk"));
/// assert_eq!(site_identity("https://example.org"), None);
/// ```
pub fn site_identity(origin_or_url: &str) -> Option<&str> {
    site_pattern()
        .captures(origin_or_url)
        .and_then(|caps| caps.get(DOMAIN_GROUP))
        .map(|m| m.as_str())
}

/// Returns `true` only when both inputs have a site identity and the two
/// identities are exactly equal.
///
/// This is the check applied to every inbound cross-frame message:
/// `is_same_site(event.origin, location.host)`.
pub fn is_same_site(a: &str, b: &str) -> bool {
    match (site_identity(a), site_identity(b)) {
        (Some(left), Some(right)) => left == right,
        _ => false,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_with_subdomain_reduces_to_registrable_domain() {
        assert_eq!(site_identity("https://shop.example.com"), Some("example.com"));
    }

    #[test]
    fn test_bare_host_reduces_to_registrable_domain() {
        // location.host has no scheme
        assert_eq!(site_identity("shop.example.com"), Some("example.com"));
    }

    #[test]
    fn test_http_scheme_and_path_are_tolerated() {
        assert_eq!(
            site_identity("http://www.example.co.uk/checkout/step-2"),
            Some("example.co.uk")
        );
    }

    #[test]
    fn test_two_part_suffix_wins_over_single_label() {
        // `com.au` must be treated as the suffix, not `au`
        assert_eq!(site_identity("https://shop.example.com.au"), Some("example.com.au"));
        assert_eq!(site_identity("example.com.br"), Some("example.com.br"));
        assert_eq!(site_identity("a.b.example.co.nz"), Some("example.co.nz"));
    }

    #[test]
    fn test_deep_subdomains_are_stripped() {
        assert_eq!(site_identity("https://a.b.c.d.example.de"), Some("example.de"));
    }

    #[test]
    fn test_hyphen_and_underscore_labels_are_accepted() {
        assert_eq!(site_identity("https://my-shop_1.example-site.ie"), Some("example-site.ie"));
    }

    #[test]
    fn test_unlisted_suffix_has_no_identity() {
        assert_eq!(site_identity("https://example.org"), None);
        assert_eq!(site_identity("https://example.net"), None);
        assert_eq!(site_identity("https://example.uk"), None);
    }

    #[test]
    fn test_explicit_port_has_no_identity() {
        assert_eq!(site_identity("https://shop.example.com:8443"), None);
        assert_eq!(site_identity("localhost:8000"), None);
    }

    #[test]
    fn test_opaque_origin_has_no_identity() {
        assert_eq!(site_identity("null"), None);
        assert_eq!(site_identity(""), None);
    }

    #[test]
    fn test_other_schemes_have_no_identity() {
        assert_eq!(site_identity("ftp://example.com"), None);
        assert_eq!(site_identity("file:///tmp/example.com"), None);
    }

    #[test]
    fn test_suffix_match_is_case_sensitive() {
        assert_eq!(site_identity("https://EXAMPLE.COM"), None);
        // Upper-case labels are fine as long as the suffix is listed verbatim
        assert_eq!(site_identity("https://Shop.Example.com"), Some("Example.com"));
    }

    #[test]
    fn test_lookalike_host_resolves_to_its_real_domain() {
        assert_eq!(site_identity("https://example.com.evil.com"), Some("evil.com"));
    }

    #[test]
    fn test_same_site_across_subdomains() {
        assert!(is_same_site("https://tiki.example.com", "shop.example.com"));
        assert!(is_same_site("http://example.com", "www.example.com"));
    }

    #[test]
    fn test_different_sites_are_not_same_site() {
        assert!(!is_same_site("https://evil.com", "shop.example.com"));
        assert!(!is_same_site("https://example.co.uk", "example.com"));
    }

    #[test]
    fn test_missing_identity_never_matches_even_itself() {
        assert!(!is_same_site("null", "null"));
        assert!(!is_same_site("https://example.org", "example.org"));
        assert!(!is_same_site("https://example.com", "localhost:8000"));
    }

    #[test]
    fn test_comparison_is_exact_without_case_folding() {
        assert!(!is_same_site("https://Example.com", "example.com"));
    }
}
