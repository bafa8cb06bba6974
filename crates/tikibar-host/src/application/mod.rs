//! Application layer for tikibar-host.
//!
//! The application layer knows *what* the runtime does to a page, but
//! delegates *how* to the [`HostPage`] port implemented in infrastructure.
//!
//! # Responsibilities
//!
//! - Attaching, resizing, and removing the diagnostic frame
//! - Encoding telemetry for the frame and filtering what the frame sends back
//! - Turning completed HTTP calls into `ajax_request` records
//! - Wiring all of the above together exactly once per page
//!
//! # What does NOT belong here?
//!
//! - `web-sys` calls, closures handed to JavaScript (that is infrastructure)
//! - Message shapes and origin rules (those live in `tikibar-core`)

pub mod frame_controller;
pub mod message_channel;
pub mod orchestrator;
pub mod page;
pub mod request_observer;

pub use frame_controller::FrameController;
pub use message_channel::{ChannelError, Delivery, MessageChannel, Snapshot, TelemetrySink};
pub use orchestrator::{HostError, InstallReport, TikibarHost};
pub use page::{FrameHandles, HostPage, InboundEvent, MessageHandler, PageError, PayloadReader, RequestHook, SurfaceStatus};
pub use request_observer::{
    Fetch, FetchSlot, HookRelay, InstallGuard, ObservingFetch, RequestObserver, SharedFetch,
};
