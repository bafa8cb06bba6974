//! tikibar-host library crate.
//!
//! The in-page runtime of the tikibar diagnostic toolbar.  It embeds the
//! diagnostic frame at the top of a host page, reports every completed HTTP
//! call the page makes, and obeys layout commands the frame sends back.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Host page (DOM, jQuery, fetch)          Diagnostic frame
//!         ↕                                      ↕  postMessage
//! [tikibar-host]
//!   ├── application/      FrameController, MessageChannel, RequestObserver,
//!   │                     TikibarHost, and the HostPage port they drive
//!   └── infrastructure/
//!         ├── memory_page/  In-memory HostPage (tests, native callers)
//!         └── browser/      web-sys HostPage + wasm-bindgen entry point
//! ```
//!
//! Domain types (messages, origin policy, layout rules, configuration) live in
//! `tikibar-core` and are shared with the server-side bootstrap.
//!
//! # Layer rules
//!
//! - `application` depends on `tikibar-core` only and talks to the page
//!   through [`application::HostPage`].
//! - `infrastructure` implements that port.  The browser implementation is
//!   compiled for `wasm32` targets only.

/// Application layer: frame lifecycle, messaging, request observation.
pub mod application;

/// Infrastructure layer: concrete host pages.
pub mod infrastructure;

pub use application::{
    Delivery, FrameController, HostError, HostPage, InstallReport, MessageChannel, PageError,
    RequestObserver, SurfaceStatus, TelemetrySink, TikibarHost,
};
