//! Bidirectional messaging between the host page and the diagnostic frame.
//!
//! Outbound telemetry is encoded to one JSON string and posted to the frame's
//! window with target origin `*`; the frame's origin is not known in advance.
//!
//! Inbound events are filtered by site: only events whose origin resolves to
//! the same site identity as the page's own host are decoded.  Everything
//! else is dropped without a log line (third-party frames post constantly).

use std::rc::Rc;

use thiserror::Error;
use tikibar_core::domain::timing::numeric_timing;
use tikibar_core::{decode_inbound, encode_outbound, is_same_site, InboundMessage, OutboundMessage, ProtocolError};
use tracing::{debug, trace};

use super::frame_controller::FrameController;
use super::page::{HostPage, InboundEvent, PageError};
use super::request_observer::InstallGuard;

/// Target origin for every outbound post.
pub const POST_TARGET_ORIGIN: &str = "*";

/// Errors that can occur while sending to the frame.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("could not encode message: {0}")]
    Encode(#[from] ProtocolError),

    #[error("could not post to frame: {0}")]
    Page(#[from] PageError),
}

/// Anything that accepts outbound telemetry.
///
/// Delivery is best-effort: implementations log failures instead of returning
/// them, so an unreachable frame never disturbs the page's own requests.
#[cfg_attr(test, mockall::automock)]
pub trait TelemetrySink {
    fn emit(&self, message: OutboundMessage);
}

/// What happened to one inbound event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Delivery {
    /// The sender is not on the page's site.
    ForeignOrigin,
    /// Same site, but not a decodable message.
    Malformed,
    /// A well-formed message with nothing to do (unknown kind, unusable
    /// height, or the frame is already gone).
    Ignored,
    /// The frame was resized to this height.
    Resized(f64),
    /// The frame was removed.
    Hidden,
}

/// Result of a navigation-timing snapshot attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Snapshot {
    /// Posted with this many numeric entries.
    Sent(usize),
    /// The platform had no timing record, or nothing numeric in it.
    Empty,
    /// A snapshot was already attempted for this page.
    AlreadyAttempted,
    /// Encoding or posting failed.
    Undeliverable,
}

/// Message channel bound to one attached frame.
pub struct MessageChannel<P: HostPage> {
    page: Rc<P>,
    frame: Rc<FrameController<P>>,
    snapshot: InstallGuard,
}

impl<P: HostPage> MessageChannel<P> {
    pub fn new(page: Rc<P>, frame: Rc<FrameController<P>>) -> Self {
        Self {
            page,
            frame,
            snapshot: InstallGuard::new(),
        }
    }

    /// Encodes `message` and posts it to the frame.
    ///
    /// # Errors
    ///
    /// [`ChannelError::Page`] with [`PageError::Detached`] once the frame has
    /// been hidden, or any encode/post failure.
    pub fn send(&self, message: &OutboundMessage) -> Result<(), ChannelError> {
        let payload = encode_outbound(message)?;
        self.frame.post(&payload, POST_TARGET_ORIGIN)?;
        trace!(kind = message.kind(), "posted to frame");
        Ok(())
    }

    /// Handles one message event from the page window.
    pub fn receive(&self, event: &InboundEvent) -> Delivery {
        if !is_same_site(&event.origin, &self.page.location_host()) {
            return Delivery::ForeignOrigin;
        }

        let Some(payload) = event.payload() else {
            trace!(origin = %event.origin, "discarding message without a JSON form");
            return Delivery::Malformed;
        };

        match decode_inbound(&payload) {
            Err(e) => {
                trace!(origin = %event.origin, error = %e, "discarding malformed message");
                Delivery::Malformed
            }
            Ok(None) => Delivery::Ignored,
            Ok(Some(InboundMessage::Height { height })) => match self.frame.resize(height) {
                Some(applied) => Delivery::Resized(applied),
                None => Delivery::Ignored,
            },
            Ok(Some(InboundMessage::Hide)) => {
                if self.frame.remove() {
                    Delivery::Hidden
                } else {
                    Delivery::Ignored
                }
            }
        }
    }

    /// Sends the navigation-timing snapshot.
    ///
    /// Only the first call per channel does anything.  Non-numeric entries
    /// are dropped; nothing is sent if none remain.
    pub fn send_performance_snapshot(&self) -> Snapshot {
        if !self.snapshot.claim() {
            return Snapshot::AlreadyAttempted;
        }

        let Some(timing) = self.page.navigation_timing().as_ref().and_then(numeric_timing) else {
            debug!("no navigation timing available");
            return Snapshot::Empty;
        };

        let entries = timing.len();
        match self.send(&OutboundMessage::PerformanceTiming { timing }) {
            Ok(()) => {
                debug!(entries, "performance timing sent");
                Snapshot::Sent(entries)
            }
            Err(e) => {
                debug!(error = %e, "performance timing not delivered");
                Snapshot::Undeliverable
            }
        }
    }

    pub fn frame(&self) -> &Rc<FrameController<P>> {
        &self.frame
    }
}

impl<P: HostPage> TelemetrySink for MessageChannel<P> {
    fn emit(&self, message: OutboundMessage) {
        if let Err(e) = self.send(&message) {
            debug!(kind = message.kind(), error = %e, "telemetry dropped");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
