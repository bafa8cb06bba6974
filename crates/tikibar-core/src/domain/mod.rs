//! Domain layer for tikibar-core.
//!
//! Pure rules that have no dependencies on the DOM, timers, or network I/O.
//! Everything here can be exercised from a plain `#[test]`.
//!
//! # What belongs in the domain layer?
//!
//! - The origin policy (which senders are trusted)
//! - Request records and how they are derived from response headers
//! - Navigation-timing filtering
//! - Diagnostic frame URL and overlay layout rules
//! - Configuration structures
//! - Server-side bootstrap injection
//!
//! # What does NOT belong here?
//!
//! - Any `web_sys`, `js_sys`, or `wasm_bindgen` types
//! - Event listeners, timers, or fetch wrappers (that is `tikibar-host`)

pub mod config;
pub mod frame;
pub mod injection;
pub mod origin;
pub mod request;
pub mod timing;

pub use config::{ConfigError, HostConfig, InjectionConfig};
pub use frame::{FrameLayout, FrameUrl, StyleRule};
pub use request::{DescribeRequest, ObservedResponse, RequestDescription, RequestRecord};
