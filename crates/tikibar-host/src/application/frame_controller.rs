//! Lifecycle of the diagnostic frame inside the host page.
//!
//! The overlay is a `div` container holding an `iframe`, inserted as the first
//! child of a target element.  The container sits in the reserved strip above
//! the target (negative top margin); the target itself is pushed down by the
//! same height.
//!
//! At most one container with the reserved id exists at any time: attaching
//! removes any previous one first.

use std::cell::RefCell;
use std::rc::Rc;

use tikibar_core::domain::frame::{clamp_height, px, FrameLayout, FrameUrl, StyleRule};
use tikibar_core::HostConfig;
use tracing::{debug, warn};

use super::page::{HostPage, PageError};

struct FrameState<E> {
    container: E,
    iframe: E,
    height: f64,
}

/// Owns the diagnostic frame once it is attached.
pub struct FrameController<P: HostPage> {
    page: Rc<P>,
    src: String,
    state: RefCell<Option<FrameState<P::Element>>>,
}

impl<P: HostPage> FrameController<P> {
    /// Creates the overlay and inserts it at the top of `target`.
    ///
    /// The frame's location is derived from the page: the scheme from the
    /// protocol global, the host from the page's own location, and the
    /// correlation id from the named correlation element.  A missing scheme or
    /// correlation id is logged and replaced by the fallback scheme or an
    /// empty id; it never aborts the attach.
    ///
    /// # Errors
    ///
    /// Returns [`PageError`] if the page refuses to create or insert the
    /// elements.
    pub fn attach(page: Rc<P>, target: &P::Element, config: &HostConfig) -> Result<Self, PageError> {
        if page.remove_element_by_id(&config.container_id) {
            debug!(id = %config.container_id, "replaced existing diagnostic frame");
        }

        let src = frame_url(page.as_ref(), config).to_string();
        let handles = page.create_frame_container(&config.container_id, &src)?;

        let layout = FrameLayout::new(config.initial_height, config.z_index);
        apply_rules(page.as_ref(), &handles.container, &layout.container_rules())?;
        apply_rules(page.as_ref(), &handles.frame, &layout.frame_rules())?;
        page.prepend_child(target, &handles.container)?;
        apply_rules(page.as_ref(), target, &layout.target_rules())?;

        debug!(%src, height = config.initial_height, "diagnostic frame attached");

        Ok(Self {
            page,
            src,
            state: RefCell::new(Some(FrameState {
                container: handles.container,
                iframe: handles.frame,
                height: layout.height,
            })),
        })
    }

    /// Sets the height of both the container and the iframe.
    ///
    /// Negative heights clamp to zero; non-finite heights are ignored.
    /// Returns the applied height, or `None` if nothing changed (detached
    /// frame, unusable value, or a style the page refused).
    pub fn resize(&self, height: f64) -> Option<f64> {
        let height = clamp_height(height)?;
        let mut state = self.state.borrow_mut();
        let frame = state.as_mut()?;

        let value = px(height);
        let applied = self
            .page
            .set_style(&frame.container, "height", &value)
            .and_then(|()| self.page.set_style(&frame.iframe, "height", &value));
        if let Err(e) = applied {
            debug!(error = %e, "could not resize diagnostic frame");
            return None;
        }

        frame.height = height;
        Some(height)
    }

    /// Detaches the container from the page.  Returns `false` if it was
    /// already gone.
    pub fn remove(&self) -> bool {
        match self.state.borrow_mut().take() {
            Some(frame) => {
                self.page.remove_element(&frame.container);
                debug!("diagnostic frame removed");
                true
            }
            None => false,
        }
    }

    /// Posts a text payload to the frame's window.
    ///
    /// # Errors
    ///
    /// [`PageError::Detached`] once the frame has been removed, or whatever
    /// the page reports for the post itself.
    pub fn post(&self, payload: &str, target_origin: &str) -> Result<(), PageError> {
        let state = self.state.borrow();
        let frame = state.as_ref().ok_or(PageError::Detached)?;
        self.page.post_to_frame(&frame.iframe, payload, target_origin)
    }

    pub fn is_attached(&self) -> bool {
        self.state.borrow().is_some()
    }

    /// Current frame height, `None` once removed.
    pub fn height(&self) -> Option<f64> {
        self.state.borrow().as_ref().map(|frame| frame.height)
    }

    /// The frame's source URL as it was set at attach time.
    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn iframe(&self) -> Option<P::Element> {
        self.state.borrow().as_ref().map(|frame| frame.iframe.clone())
    }

    pub fn container(&self) -> Option<P::Element> {
        self.state.borrow().as_ref().map(|frame| frame.container.clone())
    }
}

/// Builds the frame URL from what the page exposes.
pub fn frame_url<P: HostPage + ?Sized>(page: &P, config: &HostConfig) -> FrameUrl {
    let scheme = match page.global_string(&config.protocol_global) {
        Some(scheme) if !scheme.is_empty() => scheme,
        _ => {
            warn!(
                global = %config.protocol_global,
                fallback = %config.fallback_scheme,
                "protocol global missing; using fallback scheme"
            );
            config.fallback_scheme.clone()
        }
    };

    let correlation_id = page.named_attribute(&config.correlation_field, &config.correlation_attribute);
    if correlation_id.is_none() {
        warn!(field = %config.correlation_field, "correlation element missing; frame will load without an id");
    }

    FrameUrl::new(scheme, page.location_host(), correlation_id).with_path(config.frame_path.clone())
}

fn apply_rules<P: HostPage + ?Sized>(
    page: &P,
    element: &P::Element,
    rules: &[StyleRule],
) -> Result<(), PageError> {
    rules
        .iter()
        .try_for_each(|rule| page.set_style(element, rule.property, &rule.value))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
