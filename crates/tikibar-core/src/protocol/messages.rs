//! Cross-frame message types.
//!
//! The host page and the diagnostic frame exchange JSON objects over
//! `postMessage`.  Every object carries a `tiki_msg_type` field naming the
//! variant; all other fields sit beside it in the same object:
//!
//! ```json
//! {"tiki_msg_type":"height","height":120}
//! ```
//!
//! Serde's `#[serde(tag = "tiki_msg_type")]` attribute handles this.
//!
//! # Directions
//!
//! - The host *sends* telemetry ([`OutboundMessage`]).
//! - The frame *sends* layout control ([`InboundMessage`]).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Discriminant field present in every message object.
pub const KIND_FIELD: &str = "tiki_msg_type";

// ── Host → Frame messages ─────────────────────────────────────────────────────

/// All messages the host page sends to the diagnostic frame.
///
/// # Serde representation
///
/// ```json
/// {"tiki_msg_type":"ajax_request","url":"/api","verb":"GET","status_code":200,"ms":250.0,"correlation_id":"abc123"}
/// {"tiki_msg_type":"performance_timing","timing":{"navigationStart":1700000000000.0}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tiki_msg_type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// One completed HTTP call made by the host page.
    AjaxRequest {
        /// URL as the page passed it to the request API (may be relative).
        url: String,
        /// HTTP verb, `GET` when the caller gave none.
        verb: String,
        /// HTTP status code of the response.
        status_code: u16,
        /// Server-side elapsed time in milliseconds.
        ms: f64,
        /// Server-assigned correlation id; `null` when the response had none.
        correlation_id: Option<String>,
    },

    /// Navigation-timing snapshot, sent once after the page's load event.
    PerformanceTiming {
        /// Numeric navigation-timing entries keyed by name.
        timing: BTreeMap<String, f64>,
    },
}

impl OutboundMessage {
    /// The `tiki_msg_type` value of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMessage::AjaxRequest { .. } => "ajax_request",
            OutboundMessage::PerformanceTiming { .. } => "performance_timing",
        }
    }
}

// ── Frame → Host messages ─────────────────────────────────────────────────────

/// Control messages the diagnostic frame sends to the host page.
///
/// # Serde representation
///
/// ```json
/// {"tiki_msg_type":"height","height":120}
/// {"tiki_msg_type":"hide"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tiki_msg_type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// The frame's content changed size; resize the container and the frame.
    Height {
        /// New height in CSS pixels.
        height: f64,
    },

    /// The user dismissed the toolbar; remove the container.
    Hide,
}

impl InboundMessage {
    /// Every `tiki_msg_type` value this host understands.  Other values are
    /// ignored so newer frames can add message kinds.
    pub const KNOWN_KINDS: [&'static str; 2] = ["height", "hide"];
}

// ── Tests ─────────────────────────────────────────────────────────────────────
