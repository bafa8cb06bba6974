//! # tikibar-core
//!
//! Shared library for the tikibar diagnostic overlay containing the
//! cross-frame wire protocol, the origin policy, and the page bootstrap
//! helpers used by the server that serves the host page.
//!
//! This crate is used by both the in-page runtime (`tikibar-host`, compiled
//! to wasm32) and by server-side code that injects the runtime into HTML
//! responses.  It has zero dependencies on the DOM, async runtimes, or
//! network sockets.
//!
//! # Architecture overview
//!
//! A host page embeds the tikibar as an iframe and relays telemetry (page load
//! timing, outgoing HTTP request metadata) to it with `postMessage`.  The
//! frame talks back with small control messages (resize, hide).
//!
//! - **`protocol`** – What travels between the host page and the frame.  Every
//!   message is one JSON object discriminated by a `tiki_msg_type` field and
//!   carried as a single text payload.
//!
//! - **`domain`** – Pure rules with no browser dependencies: which origins
//!   count as the same site, how a completed HTTP call becomes a
//!   [`RequestRecord`], which navigation-timing entries are reportable, what
//!   URL the diagnostic frame points at, and how a server injects the
//!   bootstrap markup into a page.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `tikibar_core::site_identity` instead of `tikibar_core::domain::origin::site_identity`.
pub use domain::config::{ConfigError, HostConfig, InjectionConfig};
pub use domain::origin::{is_same_site, site_identity};
pub use domain::request::{DescribeRequest, ObservedResponse, RequestDescription, RequestRecord};
pub use protocol::codec::{decode_inbound, encode_outbound, InboundPayload, ProtocolError};
pub use protocol::messages::{InboundMessage, OutboundMessage};
