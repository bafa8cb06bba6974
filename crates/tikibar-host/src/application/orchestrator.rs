//! `TikibarHost`: wires the frame, the channel, and the request observer into
//! one page.
//!
//! Construction attaches the frame.  [`TikibarHost::install`] then subscribes
//! to the page exactly once:
//!
//! 1. window message events → [`MessageChannel::receive`]
//! 2. AJAX completions and fetch results → [`RequestObserver`]
//! 3. the load event → one navigation-timing snapshot
//!
//! Page callbacks hold weak references, so dropping the host silences them
//! without unhooking anything from the page.

use std::cell::Cell;
use std::rc::Rc;

use thiserror::Error;
use tikibar_core::{ConfigError, HostConfig};
use tracing::{debug, info};

use super::frame_controller::FrameController;
use super::message_channel::MessageChannel;
use super::page::{HostPage, PageError, SurfaceStatus};
use super::request_observer::{InstallGuard, RequestObserver};

/// Errors that abort bringing the runtime up.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("invalid host configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("page operation failed: {0}")]
    Page(#[from] PageError),
}

/// What [`TikibarHost::install`] managed to hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallReport {
    pub ajax: SurfaceStatus,
    pub fetch: SurfaceStatus,
    /// `true` when this host had already been installed; nothing was done.
    pub repeated: bool,
}

/// The runtime for one page.
pub struct TikibarHost<P: HostPage> {
    page: Rc<P>,
    frame: Rc<FrameController<P>>,
    channel: Rc<MessageChannel<P>>,
    observer: Rc<RequestObserver<MessageChannel<P>>>,
    installed: InstallGuard,
    ajax: Cell<SurfaceStatus>,
    fetch: Cell<SurfaceStatus>,
}

impl<P: HostPage + 'static> TikibarHost<P> {
    /// Validates `config` and attaches the diagnostic frame to `target`.
    ///
    /// # Errors
    ///
    /// [`HostError::Config`] for an unusable configuration,
    /// [`HostError::Page`] if the frame could not be attached.
    pub fn new(page: Rc<P>, target: &P::Element, config: HostConfig) -> Result<Rc<Self>, HostError> {
        config.validate()?;

        let frame = Rc::new(FrameController::attach(Rc::clone(&page), target, &config)?);
        let channel = Rc::new(MessageChannel::new(Rc::clone(&page), Rc::clone(&frame)));
        let observer = Rc::new(RequestObserver::new(Rc::clone(&channel)));

        Ok(Rc::new(Self {
            page,
            frame,
            channel,
            observer,
            installed: InstallGuard::new(),
            ajax: Cell::new(SurfaceStatus::Unavailable),
            fetch: Cell::new(SurfaceStatus::Unavailable),
        }))
    }

    /// Subscribes the runtime to the page.  Calling it again is a no-op that
    /// reports the original outcome with `repeated` set.
    ///
    /// # Errors
    ///
    /// [`HostError::Page`] if the page rejects the message or load listener.
    pub fn install(self: &Rc<Self>) -> Result<InstallReport, HostError> {
        if !self.installed.claim() {
            debug!("runtime already installed on this page");
            return Ok(InstallReport {
                ajax: self.ajax.get(),
                fetch: self.fetch.get(),
                repeated: true,
            });
        }

        let channel = Rc::downgrade(&self.channel);
        self.page.listen_messages(Box::new(move |event| {
            if let Some(channel) = channel.upgrade() {
                channel.receive(&event);
            }
        }))?;

        let (ajax, fetch) = self.observer.install(self.page.as_ref());
        self.ajax.set(ajax);
        self.fetch.set(fetch);

        let channel = Rc::downgrade(&self.channel);
        self.page.when_loaded(Box::new(move || {
            if let Some(channel) = channel.upgrade() {
                channel.send_performance_snapshot();
            }
        }))?;

        info!(?ajax, ?fetch, src = %self.frame.src(), "tikibar installed");
        Ok(InstallReport {
            ajax,
            fetch,
            repeated: false,
        })
    }

    pub fn frame(&self) -> &Rc<FrameController<P>> {
        &self.frame
    }

    pub fn channel(&self) -> &Rc<MessageChannel<P>> {
        &self.channel
    }

    pub fn page(&self) -> &Rc<P> {
        &self.page
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
