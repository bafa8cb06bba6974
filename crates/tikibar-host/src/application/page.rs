//! The `HostPage` port: everything the runtime needs from the page it runs in.
//!
//! The application layer never touches the DOM directly.  Every read and
//! write goes through this trait, which has two implementations:
//!
//! - `infrastructure::browser::BrowserPage` – the real document, via `web-sys`
//! - `infrastructure::memory_page::MemoryPage` – an in-memory page for tests
//!
//! The runtime is single-threaded (one page, one event loop), so callbacks are
//! plain `Fn` objects behind `Rc`/`Box` with no `Send` bounds.

use std::rc::Rc;

use serde_json::{Map, Value};
use thiserror::Error;
use tikibar_core::{InboundPayload, ObservedResponse, RequestDescription};

/// Errors raised by page operations.
#[derive(Debug, Error)]
pub enum PageError {
    /// The page has no document or no `window` global.
    #[error("page has no document")]
    NoDocument,

    /// A DOM call threw.
    #[error("DOM operation `{operation}` failed: {detail}")]
    Dom {
        operation: &'static str,
        detail: String,
    },

    /// The element is not part of the document (e.g. a removed frame has no
    /// window to post to).
    #[error("element is not attached to the document")]
    Detached,
}

/// Callback invoked for every completed HTTP call on an observed surface.
pub type RequestHook = Rc<dyn Fn(&RequestDescription, &dyn ObservedResponse)>;

/// Callback invoked for every message event the page window receives.
pub type MessageHandler = Box<dyn Fn(InboundEvent)>;

/// Produces the payload of a message event on demand.
pub type PayloadReader = Box<dyn Fn() -> Option<InboundPayload>>;

/// One message event as delivered to the page window.
///
/// The payload is read lazily: a page only converts the event's data once a
/// consumer asks for it, so data from senders that fail the origin check is
/// never walked.
pub struct InboundEvent {
    /// Origin of the sender, e.g. `https://shop.example.com`.
    pub origin: String,
    read: PayloadReader,
}

impl InboundEvent {
    /// An event whose payload is already converted.
    pub fn new(origin: impl Into<String>, data: impl Into<InboundPayload>) -> Self {
        let data = data.into();
        Self::deferred(origin, move || Some(data.clone()))
    }

    /// An event whose payload is produced by `read` when first asked for.
    /// `read` returns `None` for data that has no JSON form.
    pub fn deferred(origin: impl Into<String>, read: impl Fn() -> Option<InboundPayload> + 'static) -> Self {
        Self {
            origin: origin.into(),
            read: Box::new(read),
        }
    }

    /// Converts and returns the payload.
    pub fn payload(&self) -> Option<InboundPayload> {
        (self.read)()
    }
}

impl std::fmt::Debug for InboundEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundEvent")
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// The two elements created for the diagnostic frame.
#[derive(Debug, Clone)]
pub struct FrameHandles<E> {
    /// The wrapper `div` carrying the reserved id.
    pub container: E,
    /// The `iframe` inside it.
    pub frame: E,
}

/// Outcome of asking the page to observe one request surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceStatus {
    /// The surface was hooked for the first time.
    Installed,
    /// The surface was already hooked; the existing hook now reports to the
    /// new observer.  No second wrapper was added.
    Retargeted,
    /// The page does not offer this surface (no jQuery, no fetch).
    Unavailable,
}

impl SurfaceStatus {
    pub fn is_observed(self) -> bool {
        !matches!(self, SurfaceStatus::Unavailable)
    }
}

/// Port to the host page.
pub trait HostPage {
    /// Handle to a DOM element.
    type Element: Clone + 'static;

    // ── Document ──────────────────────────────────────────────────────────────

    /// Removes the element with the given id from the document.  Returns
    /// `true` if one was found.
    fn remove_element_by_id(&self, id: &str) -> bool;

    /// Reads `attribute` from the first element whose `name` attribute equals
    /// `name`.
    fn named_attribute(&self, name: &str, attribute: &str) -> Option<String>;

    /// Creates a detached `div#container_id` holding an `iframe` whose source
    /// is `src` and whose width and height attributes are `100%`.
    fn create_frame_container(
        &self,
        container_id: &str,
        src: &str,
    ) -> Result<FrameHandles<Self::Element>, PageError>;

    fn set_style(&self, element: &Self::Element, property: &str, value: &str) -> Result<(), PageError>;

    /// Inserts `child` as the first child of `parent`.
    fn prepend_child(&self, parent: &Self::Element, child: &Self::Element) -> Result<(), PageError>;

    /// Removes `element` from its parent.  A no-op for detached elements.
    fn remove_element(&self, element: &Self::Element);

    // ── Window ────────────────────────────────────────────────────────────────

    /// Host (and port, if any) of the page's own location.
    fn location_host(&self) -> String;

    /// Reads a string-valued global variable.
    fn global_string(&self, name: &str) -> Option<String>;

    /// The navigation-timing record, or `None` where the platform has none.
    fn navigation_timing(&self) -> Option<Map<String, Value>>;

    /// Posts a text payload to the content window of `frame`.
    fn post_to_frame(&self, frame: &Self::Element, payload: &str, target_origin: &str) -> Result<(), PageError>;

    // ── Events ────────────────────────────────────────────────────────────────

    /// Subscribes to message events on the page window.
    fn listen_messages(&self, handler: MessageHandler) -> Result<(), PageError>;

    /// Subscribes to the jQuery global AJAX-completion event.
    fn observe_ajax(&self, hook: RequestHook) -> SurfaceStatus;

    /// Wraps the page's promise-based fetch so every settled call reports to
    /// `hook` before the caller sees the response.
    fn observe_fetch(&self, hook: RequestHook) -> SurfaceStatus;

    /// Runs `callback` once the page's load event has fired; immediately if it
    /// already has.
    fn when_loaded(&self, callback: Box<dyn FnOnce()>) -> Result<(), PageError>;
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_event_accepts_text_and_values() {
        let text = InboundEvent::new("https://a.example.com", r#"{"tiki_msg_type":"hide"}"#);
        let value = InboundEvent::new("https://a.example.com", serde_json::json!({"x": 1}));

        assert!(matches!(text.payload(), Some(InboundPayload::Text(_))));
        assert!(matches!(value.payload(), Some(InboundPayload::Structured(_))));
    }

    #[test]
    fn test_deferred_event_reads_nothing_until_asked() {
        // Arrange
        let reads = Rc::new(std::cell::Cell::new(0));
        let counter = Rc::clone(&reads);
        let event = InboundEvent::deferred("https://a.example.com", move || {
            counter.set(counter.get() + 1);
            None
        });

        // Act
        let untouched = reads.get();
        let payload = event.payload();

        // Assert
        assert_eq!(untouched, 0);
        assert_eq!(payload, None);
        assert_eq!(reads.get(), 1);
    }

    #[test]
    fn test_only_unavailable_surface_is_unobserved() {
        assert!(SurfaceStatus::Installed.is_observed());
        assert!(SurfaceStatus::Retargeted.is_observed());
        assert!(!SurfaceStatus::Unavailable.is_observed());
    }

    #[test]
    fn test_page_error_messages_name_the_operation() {
        let err = PageError::Dom {
            operation: "insertBefore",
            detail: "HierarchyRequestError".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "DOM operation `insertBefore` failed: HierarchyRequestError"
        );
    }
}
