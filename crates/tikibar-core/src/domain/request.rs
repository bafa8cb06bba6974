//! Request records: the normalised shape of one completed outbound HTTP call.
//!
//! The host page makes HTTP calls through two surfaces (a callback-style AJAX
//! helper and a promise-style `fetch`).  Both are reduced to the same
//! [`RequestRecord`] so the frame sees one message shape regardless of which
//! surface the page used.
//!
//! # Server-assigned headers
//!
//! | Header             | Meaning                                     |
//! |--------------------|---------------------------------------------|
//! | `x-tiki-time`      | Server-side elapsed time, in **seconds**    |
//! | `x-correlation-id` | Opaque id tying the call to server metrics  |
//!
//! A missing or unparseable `x-tiki-time` resolves to `0` milliseconds so a
//! non-numeric value never reaches the wire.

use crate::protocol::messages::OutboundMessage;

/// Response header carrying the server-assigned correlation id.
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Response header carrying the server-side elapsed time in seconds.
pub const TIKI_TIME_HEADER: &str = "x-tiki-time";

/// HTTP verb reported when the caller did not specify one.
pub const DEFAULT_VERB: &str = "GET";

/// Read access to a completed HTTP response.
///
/// Implemented by the browser adapters (`Response`, jQuery's `jqXHR`) and by
/// the in-memory test page.  Header lookup must be case-insensitive, as it is
/// for every browser API.
pub trait ObservedResponse {
    /// HTTP status code.  `0` when the platform reports no status (for
    /// example a network failure on the AJAX surface).
    fn status(&self) -> u16;

    /// Value of the named response header, if present.
    fn header(&self, name: &str) -> Option<String>;
}

/// The caller-side facts about a request: where it went and with which verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescription {
    pub url: String,
    pub verb: String,
}

impl RequestDescription {
    /// Builds a description, falling back to `GET` when no verb was given.
    pub fn new(url: impl Into<String>, verb: Option<&str>) -> Self {
        let verb = match verb {
            Some(v) if !v.is_empty() => v.to_string(),
            _ => DEFAULT_VERB.to_string(),
        };
        Self {
            url: url.into(),
            verb,
        }
    }

    /// Describes one `fetch(input, init)` call.
    ///
    /// `input` is either a URL string or a request object.  The url comes
    /// from the string, else from the request object.  The verb comes from
    /// `init.method`, else from the request object's method, else `GET`.
    /// Empty values count as absent.
    pub fn from_fetch_parts(
        input_url: Option<&str>,
        request_url: Option<&str>,
        init_method: Option<&str>,
        request_method: Option<&str>,
    ) -> Self {
        let present = |value: &&str| !value.is_empty();
        let url = input_url.or(request_url).unwrap_or_default();
        let verb = init_method.filter(present).or(request_method.filter(present));
        Self::new(url, verb)
    }
}

/// Anything that can describe the request it represents.
///
/// Implemented by each fetch surface's request type so the observing wrapper
/// can capture the url and verb before the request is handed to the real
/// implementation.
pub trait DescribeRequest {
    fn describe(&self) -> RequestDescription;
}

impl DescribeRequest for RequestDescription {
    fn describe(&self) -> RequestDescription {
        self.clone()
    }
}

/// One completed outbound request, ready to be sent to the frame.
///
/// Records are ephemeral: produced once per completed request and consumed
/// immediately into an [`OutboundMessage::AjaxRequest`].
#[derive(Debug, Clone, PartialEq)]
pub struct RequestRecord {
    pub url: String,
    pub verb: String,
    pub status_code: u16,
    /// Server-side elapsed time in milliseconds.
    pub elapsed_ms: f64,
    pub correlation_id: Option<String>,
}

impl RequestRecord {
    /// Derives a record from the request description and its response.
    ///
    /// The response is only read, never consumed.
    pub fn from_response<R>(request: &RequestDescription, response: &R) -> Self
    where
        R: ObservedResponse + ?Sized,
    {
        Self {
            url: request.url.clone(),
            verb: request.verb.clone(),
            status_code: response.status(),
            elapsed_ms: elapsed_ms_from_header(response.header(TIKI_TIME_HEADER).as_deref()),
            correlation_id: response.header(CORRELATION_ID_HEADER),
        }
    }
}

impl From<RequestRecord> for OutboundMessage {
    fn from(record: RequestRecord) -> Self {
        OutboundMessage::AjaxRequest {
            url: record.url,
            verb: record.verb,
            status_code: record.status_code,
            ms: record.elapsed_ms,
            correlation_id: record.correlation_id,
        }
    }
}

/// Converts an `x-tiki-time` header value (seconds) into milliseconds.
///
/// The longest leading decimal number is read and trailing text ignored, so
/// `"0.25s"` is 250 ms.  Absent, empty, non-numeric, or non-finite values all
/// yield `0.0`.
pub fn elapsed_ms_from_header(value: Option<&str>) -> f64 {
    value
        .and_then(leading_float)
        .filter(|secs| secs.is_finite())
        .map(|secs| secs * 1000.0)
        .unwrap_or(0.0)
}

fn leading_float(raw: &str) -> Option<f64> {
    let raw = raw.trim_start();
    let end = raw
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E')))
        .unwrap_or(raw.len());
    let candidate = &raw[..end];
    (1..=candidate.len())
        .rev()
        .find_map(|len| candidate[..len].parse::<f64>().ok())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
