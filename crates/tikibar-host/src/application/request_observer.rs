//! Observation of the page's HTTP calls.
//!
//! Two surfaces exist:
//!
//! - **AJAX** – jQuery's global completion event.  Subscribing is additive in
//!   the page, so a [`HookRelay`] owns the single subscription and later
//!   observers merely retarget it.
//! - **fetch** – a promise-returning function.  Observing it means replacing
//!   it with an [`ObservingFetch`] that calls through to the original and
//!   reports the response before handing it back untouched.  A [`FetchSlot`]
//!   holds the current function and makes sure the wrapper is applied once,
//!   however many times the runtime is installed.
//!
//! Both surfaces feed a [`RequestObserver`], which turns each completed call
//! into an `ajax_request` message for its [`TelemetrySink`].

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use async_trait::async_trait;
use tikibar_core::{DescribeRequest, ObservedResponse, RequestDescription, RequestRecord};
use tracing::trace;

use super::message_channel::TelemetrySink;
use super::page::{HostPage, RequestHook, SurfaceStatus};

// ── Install guards ────────────────────────────────────────────────────────────

/// A flag that can be claimed exactly once.
#[derive(Debug, Default)]
pub struct InstallGuard {
    claimed: Cell<bool>,
}

impl InstallGuard {
    pub const fn new() -> Self {
        Self {
            claimed: Cell::new(false),
        }
    }

    /// Returns `true` for the first caller only.
    pub fn claim(&self) -> bool {
        !self.claimed.replace(true)
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed.get()
    }

    /// Makes the guard claimable again.
    pub fn release(&self) {
        self.claimed.set(false);
    }
}

/// Single hook installed on a page surface, forwarding to whichever observer
/// attached last.
#[derive(Default)]
pub struct HookRelay {
    guard: InstallGuard,
    target: RefCell<Option<RequestHook>>,
}

impl HookRelay {
    pub const fn new() -> Self {
        Self {
            guard: InstallGuard::new(),
            target: RefCell::new(None),
        }
    }

    /// Points the relay at `hook`.
    ///
    /// Returns [`SurfaceStatus::Installed`] the first time, telling the caller
    /// to wire the relay into the page; [`SurfaceStatus::Retargeted`] after.
    pub fn attach(&self, hook: RequestHook) -> SurfaceStatus {
        *self.target.borrow_mut() = Some(hook);
        if self.guard.claim() {
            SurfaceStatus::Installed
        } else {
            SurfaceStatus::Retargeted
        }
    }

    /// Forgets the target and the installation, for when wiring the relay
    /// into the page failed.  The next `attach` reports `Installed` again.
    pub fn reset(&self) {
        self.target.borrow_mut().take();
        self.guard.release();
    }

    /// Delivers one completed call to the current target, if any.
    pub fn forward(&self, request: &RequestDescription, response: &dyn ObservedResponse) {
        // Clone out of the cell so the hook may re-enter `attach`.
        let hook = self.target.borrow().clone();
        if let Some(hook) = hook {
            hook(request, response);
        }
    }
}

// ── fetch surface ─────────────────────────────────────────────────────────────

/// A promise-style request function.
#[async_trait(?Send)]
pub trait Fetch {
    type Request: DescribeRequest;
    type Response: ObservedResponse;
    type Error;

    async fn fetch(&self, request: Self::Request) -> Result<Self::Response, Self::Error>;
}

/// Shared handle to a fetch implementation.
pub type SharedFetch<Q, R, E> = Rc<dyn Fetch<Request = Q, Response = R, Error = E>>;

/// Wraps a fetch so every successful call is reported to a hook.
///
/// The request is described before it is handed over (the request object may
/// be consumed by the call).  Rejections pass through without a report.
pub struct ObservingFetch<Q, R, E> {
    inner: SharedFetch<Q, R, E>,
    hook: RequestHook,
}

impl<Q, R, E> ObservingFetch<Q, R, E> {
    pub fn new(inner: SharedFetch<Q, R, E>, hook: RequestHook) -> Self {
        Self { inner, hook }
    }
}

#[async_trait(?Send)]
impl<Q, R, E> Fetch for ObservingFetch<Q, R, E>
where
    Q: DescribeRequest + 'static,
    R: ObservedResponse + 'static,
    E: 'static,
{
    type Request = Q;
    type Response = R;
    type Error = E;

    async fn fetch(&self, request: Q) -> Result<R, E> {
        let description = request.describe();
        let response = self.inner.fetch(request).await?;
        let observed: &dyn ObservedResponse = &response;
        (self.hook)(&description, observed);
        Ok(response)
    }
}

/// The page's current fetch function.
pub struct FetchSlot<Q, R, E> {
    current: RefCell<Option<SharedFetch<Q, R, E>>>,
    relay: Rc<HookRelay>,
}

impl<Q, R, E> FetchSlot<Q, R, E>
where
    Q: DescribeRequest + 'static,
    R: ObservedResponse + 'static,
    E: 'static,
{
    pub fn new(fetch: SharedFetch<Q, R, E>) -> Self {
        Self {
            current: RefCell::new(Some(fetch)),
            relay: Rc::new(HookRelay::new()),
        }
    }

    /// A page without a fetch function.
    pub fn unavailable() -> Self {
        Self {
            current: RefCell::new(None),
            relay: Rc::new(HookRelay::new()),
        }
    }

    /// The function callers should invoke right now.
    pub fn current(&self) -> Option<SharedFetch<Q, R, E>> {
        self.current.borrow().clone()
    }

    /// Routes completed calls to `hook`, wrapping the function on first use.
    pub fn observe(&self, hook: RequestHook) -> SurfaceStatus {
        let Some(inner) = self.current() else {
            return SurfaceStatus::Unavailable;
        };

        let status = self.relay.attach(hook);
        if status == SurfaceStatus::Installed {
            let relay = Rc::clone(&self.relay);
            let forward: RequestHook = Rc::new(move |request: &RequestDescription, response: &dyn ObservedResponse| {
                relay.forward(request, response)
            });
            let wrapped: SharedFetch<Q, R, E> = Rc::new(ObservingFetch::new(inner, forward));
            *self.current.borrow_mut() = Some(wrapped);
        }
        status
    }
}

// ── Observer ──────────────────────────────────────────────────────────────────

/// Turns completed calls into telemetry.
pub struct RequestObserver<S> {
    sink: Rc<S>,
}

impl<S: TelemetrySink + 'static> RequestObserver<S> {
    pub fn new(sink: Rc<S>) -> Self {
        Self { sink }
    }

    /// Reports one completed call.  The response is only read.
    pub fn observe(&self, request: &RequestDescription, response: &dyn ObservedResponse) {
        let record = RequestRecord::from_response(request, response);
        trace!(
            url = %record.url,
            verb = %record.verb,
            status = record.status_code,
            ms = record.elapsed_ms,
            "request completed"
        );
        self.sink.emit(record.into());
    }

    /// A hook that reports to this observer for as long as it is alive.
    pub fn hook(self: &Rc<Self>) -> RequestHook {
        let observer = Rc::downgrade(self);
        Rc::new(move |request: &RequestDescription, response: &dyn ObservedResponse| {
            if let Some(observer) = observer.upgrade() {
                observer.observe(request, response);
            }
        })
    }

    /// Hooks both request surfaces of `page`.
    pub fn install<P: HostPage + ?Sized>(self: &Rc<Self>, page: &P) -> (SurfaceStatus, SurfaceStatus) {
        let ajax = page.observe_ajax(self.hook());
        let fetch = page.observe_fetch(self.hook());
        (ajax, fetch)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::message_channel::MockTelemetrySink;
    use crate::infrastructure::memory_page::{MemoryFetchError, MemoryRequest, MemoryResponse, ScriptedFetch};
    use mockall::predicate::eq;
    use tikibar_core::OutboundMessage;

    fn ajax_message(url: &str, verb: &str, status: u16, ms: f64, id: Option<&str>) -> OutboundMessage {
        OutboundMessage::AjaxRequest {
            url: url.to_string(),
            verb: verb.to_string(),
            status_code: status,
            ms,
            correlation_id: id.map(str::to_string),
        }
    }

    #[test]
    fn test_guard_claims_once() {
        let guard = InstallGuard::new();
        assert!(guard.claim());
        assert!(!guard.claim());
        assert!(guard.is_claimed());
    }

    #[test]
    fn test_released_guard_can_be_claimed_again() {
        let guard = InstallGuard::new();
        assert!(guard.claim());

        guard.release();

        assert!(!guard.is_claimed());
        assert!(guard.claim());
    }

    #[test]
    fn test_reset_relay_reports_installed_again_and_drops_target() {
        // Arrange
        let relay = HookRelay::new();
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let first = relay.attach(Rc::new(move |_: &RequestDescription, _: &dyn ObservedResponse| {
            counter.set(counter.get() + 1)
        }));

        // Act
        relay.reset();
        relay.forward(&RequestDescription::new("/", None), &MemoryResponse::new(200));
        let again = relay.attach(Rc::new(|_: &RequestDescription, _: &dyn ObservedResponse| {}));

        // Assert
        assert_eq!(first, SurfaceStatus::Installed);
        assert_eq!(calls.get(), 0);
        assert_eq!(again, SurfaceStatus::Installed);
    }

    #[test]
    fn test_observe_emits_record_from_headers() {
        // Arrange
        let mut sink = MockTelemetrySink::new();
        sink.expect_emit()
            .with(eq(ajax_message("/api/cart", "POST", 200, 250.0, Some("abc123"))))
            .times(1)
            .return_const(());
        let observer = RequestObserver::new(Rc::new(sink));
        let response = MemoryResponse::new(200)
            .with_header("X-Tiki-Time", "0.25")
            .with_header("X-Correlation-ID", "abc123");

        // Act
        observer.observe(&RequestDescription::new("/api/cart", Some("POST")), &response);
    }

    #[test]
    fn test_observe_without_headers_reports_zero_and_null() {
        let mut sink = MockTelemetrySink::new();
        sink.expect_emit()
            .with(eq(ajax_message("/missing", "GET", 404, 0.0, None)))
            .times(1)
            .return_const(());
        let observer = RequestObserver::new(Rc::new(sink));

        observer.observe(&RequestDescription::new("/missing", None), &MemoryResponse::new(404));
    }

    #[test]
    fn test_hook_is_inert_once_observer_is_dropped() {
        let mut sink = MockTelemetrySink::new();
        sink.expect_emit().times(0);
        let observer = Rc::new(RequestObserver::new(Rc::new(sink)));
        let hook = observer.hook();
        drop(observer);

        hook(&RequestDescription::new("/", None), &MemoryResponse::new(200));
    }

    #[test]
    fn test_relay_installs_once_and_forwards_to_latest() {
        // Arrange
        let relay = HookRelay::new();
        let first_calls = Rc::new(Cell::new(0));
        let second_calls = Rc::new(Cell::new(0));
        let first = Rc::clone(&first_calls);
        let second = Rc::clone(&second_calls);

        // Act
        let a = relay.attach(Rc::new(move |_: &RequestDescription, _: &dyn ObservedResponse| {
            first.set(first.get() + 1)
        }));
        let b = relay.attach(Rc::new(move |_: &RequestDescription, _: &dyn ObservedResponse| {
            second.set(second.get() + 1)
        }));
        relay.forward(&RequestDescription::new("/", None), &MemoryResponse::new(200));

        // Assert
        assert_eq!(a, SurfaceStatus::Installed);
        assert_eq!(b, SurfaceStatus::Retargeted);
        assert_eq!(first_calls.get(), 0);
        assert_eq!(second_calls.get(), 1);
    }

    #[tokio::test]
    async fn test_observing_fetch_returns_response_unchanged() {
        // Arrange
        let response = MemoryResponse::new(201)
            .with_header("x-tiki-time", "0.1")
            .with_body("created");
        let network: SharedFetch<MemoryRequest, MemoryResponse, MemoryFetchError> =
            Rc::new(ScriptedFetch::new().route("/api/items", response.clone()));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let hook: RequestHook = Rc::new(move |request: &RequestDescription, response: &dyn ObservedResponse| {
            sink.borrow_mut().push((request.clone(), response.status()))
        });
        let wrapped = ObservingFetch::new(network, hook);

        // Act
        let result = wrapped
            .fetch(MemoryRequest::new("/api/items").with_method("PUT"))
            .await
            .unwrap();

        // Assert
        assert_eq!(result, response);
        assert_eq!(
            seen.borrow().as_slice(),
            &[(RequestDescription::new("/api/items", Some("PUT")), 201)]
        );
    }

    #[tokio::test]
    async fn test_observing_fetch_passes_rejections_through_silently() {
        let network: SharedFetch<MemoryRequest, MemoryResponse, MemoryFetchError> =
            Rc::new(ScriptedFetch::new());
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let hook: RequestHook = Rc::new(move |_: &RequestDescription, _: &dyn ObservedResponse| {
            counter.set(counter.get() + 1)
        });
        let wrapped = ObservingFetch::new(network, hook);

        let result = wrapped.fetch(MemoryRequest::new("/offline")).await;

        assert!(matches!(result, Err(MemoryFetchError::Unreachable(url)) if url == "/offline"));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_slot_wraps_once_and_retargets() {
        let network: SharedFetch<MemoryRequest, MemoryResponse, MemoryFetchError> =
            Rc::new(ScriptedFetch::new());
        let slot = FetchSlot::new(network);
        let noop: RequestHook = Rc::new(|_: &RequestDescription, _: &dyn ObservedResponse| {});

        let first = slot.observe(Rc::clone(&noop));
        let wrapped = slot.current().unwrap();
        let second = slot.observe(noop);

        assert_eq!(first, SurfaceStatus::Installed);
        assert_eq!(second, SurfaceStatus::Retargeted);
        assert!(Rc::ptr_eq(&wrapped, &slot.current().unwrap()), "no second wrapper");
    }

    #[test]
    fn test_slot_without_fetch_is_unavailable() {
        let slot: FetchSlot<MemoryRequest, MemoryResponse, MemoryFetchError> = FetchSlot::unavailable();
        let noop: RequestHook = Rc::new(|_: &RequestDescription, _: &dyn ObservedResponse| {});

        assert_eq!(slot.observe(noop), SurfaceStatus::Unavailable);
        assert!(slot.current().is_none());
    }
}
