//! Browser implementation of `HostPage`, built on `web-sys`.
//!
//! Callbacks handed to JavaScript are `Closure`s that are leaked with
//! `forget()`: the page keeps them for its whole lifetime.  Surfaces that must
//! be hooked once per window (jQuery's AJAX event, `window.fetch`) keep their
//! relay in a thread-local, so a second runtime on the same page retargets the
//! existing hook instead of stacking another one.
//!
//! ```text
//! window "message" ──Closure──► MessageHandler ──► MessageChannel::receive
//! jQuery ajaxComplete ──Closure──► AJAX relay ──► RequestObserver
//! window.fetch ──Closure──► FetchSlot (ObservingFetch → original fetch)
//! ```

mod ajax;
mod fetch;

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{anyhow, Context};
use serde_json::{Map, Value};
use tikibar_core::{HostConfig, InboundPayload};
use tracing::{error, info, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement, HtmlIFrameElement, MessageEvent, Window};

use crate::application::page::{
    FrameHandles, HostPage, InboundEvent, MessageHandler, PageError, RequestHook, SurfaceStatus,
};
use crate::application::TikibarHost;

pub use fetch::{BrowserFetch, BrowserRequest, BrowserResponse};

/// Converts a thrown JavaScript value into a [`PageError::Dom`].
fn dom_error(operation: &'static str) -> impl FnOnce(JsValue) -> PageError {
    move |err| PageError::Dom {
        operation,
        detail: format!("{err:?}"),
    }
}

/// Converts message data to a payload.  Structured data goes through
/// `JSON.stringify`, which throws on cycles instead of recursing, and the
/// text is then parsed with `serde_json`'s nesting limit.
fn read_payload(data: &JsValue) -> Option<InboundPayload> {
    if let Some(text) = data.as_string() {
        return Some(InboundPayload::Text(text));
    }
    // Transferables and other data with no JSON form yield `None`.
    let text = js_sys::JSON::stringify(data).ok()?.as_string()?;
    serde_json::from_str::<Value>(&text).ok().map(InboundPayload::Structured)
}

/// The page the runtime was loaded into.
pub struct BrowserPage {
    window: Window,
    document: Document,
}

impl BrowserPage {
    /// # Errors
    ///
    /// [`PageError::NoDocument`] outside a window context (e.g. a worker).
    pub fn new() -> Result<Self, PageError> {
        let window = web_sys::window().ok_or(PageError::NoDocument)?;
        let document = window.document().ok_or(PageError::NoDocument)?;
        Ok(Self { window, document })
    }

    pub fn body(&self) -> Option<HtmlElement> {
        self.document.body()
    }

    fn create_html(&self, tag: &str) -> Result<HtmlElement, PageError> {
        self.document
            .create_element(tag)
            .map_err(dom_error("createElement"))?
            .dyn_into::<HtmlElement>()
            .map_err(|_| PageError::Dom {
                operation: "createElement",
                detail: format!("<{tag}> is not an HTML element"),
            })
    }
}

impl HostPage for BrowserPage {
    type Element = HtmlElement;

    fn remove_element_by_id(&self, id: &str) -> bool {
        match self.document.get_element_by_id(id) {
            Some(element) => {
                element.remove();
                true
            }
            None => false,
        }
    }

    fn named_attribute(&self, name: &str, attribute: &str) -> Option<String> {
        self.document
            .get_elements_by_name(name)
            .item(0)?
            .dyn_into::<Element>()
            .ok()?
            .get_attribute(attribute)
    }

    fn create_frame_container(&self, container_id: &str, src: &str) -> Result<FrameHandles<HtmlElement>, PageError> {
        let container = self.create_html("div")?;
        container.set_id(container_id);

        let frame = self.create_html("iframe")?;
        if let Some(iframe) = frame.dyn_ref::<HtmlIFrameElement>() {
            iframe.set_src(src);
            iframe.set_width("100%");
            iframe.set_height("100%");
        }
        container.append_child(&frame).map_err(dom_error("appendChild"))?;

        Ok(FrameHandles { container, frame })
    }

    fn set_style(&self, element: &HtmlElement, property: &str, value: &str) -> Result<(), PageError> {
        element
            .style()
            .set_property(property, value)
            .map_err(dom_error("style.setProperty"))
    }

    fn prepend_child(&self, parent: &HtmlElement, child: &HtmlElement) -> Result<(), PageError> {
        let first = parent.first_child();
        parent
            .insert_before(child, first.as_ref())
            .map(|_| ())
            .map_err(dom_error("insertBefore"))
    }

    fn remove_element(&self, element: &HtmlElement) {
        element.remove();
    }

    fn location_host(&self) -> String {
        self.window.location().host().unwrap_or_default()
    }

    fn global_string(&self, name: &str) -> Option<String> {
        js_sys::Reflect::get(&self.window, &JsValue::from_str(name))
            .ok()
            .and_then(|value| value.as_string())
    }

    fn navigation_timing(&self) -> Option<Map<String, Value>> {
        let timing = self.window.performance()?.timing().to_json();
        serde_wasm_bindgen::from_value(timing.into()).ok()
    }

    fn post_to_frame(&self, frame: &HtmlElement, payload: &str, target_origin: &str) -> Result<(), PageError> {
        let content = frame
            .dyn_ref::<HtmlIFrameElement>()
            .and_then(HtmlIFrameElement::content_window)
            .ok_or(PageError::Detached)?;
        content
            .post_message(&JsValue::from_str(payload), target_origin)
            .map_err(dom_error("postMessage"))
    }

    fn listen_messages(&self, handler: MessageHandler) -> Result<(), PageError> {
        let callback = Closure::wrap(Box::new(move |event: MessageEvent| {
            let data = event.data();
            handler(InboundEvent::deferred(event.origin(), move || read_payload(&data)));
        }) as Box<dyn FnMut(MessageEvent)>);

        self.window
            .add_event_listener_with_callback("message", callback.as_ref().unchecked_ref())
            .map_err(dom_error("addEventListener"))?;
        callback.forget();
        Ok(())
    }

    fn observe_ajax(&self, hook: RequestHook) -> SurfaceStatus {
        ajax::observe(&self.window, &self.document, hook)
    }

    fn observe_fetch(&self, hook: RequestHook) -> SurfaceStatus {
        fetch::observe(&self.window, hook)
    }

    fn when_loaded(&self, callback: Box<dyn FnOnce()>) -> Result<(), PageError> {
        if self.document.ready_state() == "complete" {
            callback();
            return Ok(());
        }
        let listener = Closure::once_into_js(move || callback());
        self.window
            .add_event_listener_with_callback("load", listener.unchecked_ref())
            .map_err(dom_error("addEventListener"))
    }
}

// ── Entry points ──────────────────────────────────────────────────────────────

thread_local! {
    static HOST: RefCell<Option<Rc<TikibarHost<BrowserPage>>>> = RefCell::new(None);
}

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    tracing_wasm::set_as_global_default();
}

/// Attaches the diagnostic frame to `document.body` and starts observing the
/// page.
///
/// `config` is an optional object with `HostConfig` fields; omitted fields
/// take their defaults.  Calling this again replaces the frame and routes all
/// observation to the new instance.
#[wasm_bindgen(js_name = installTikibar)]
pub fn install_tikibar(config: JsValue) -> Result<(), JsValue> {
    install(config).map_err(|e| {
        error!(error = %format!("{e:#}"), "tikibar install failed");
        JsValue::from_str(&format!("{e:#}"))
    })
}

fn install(config: JsValue) -> anyhow::Result<()> {
    let config: HostConfig = if config.is_undefined() || config.is_null() {
        HostConfig::default()
    } else {
        serde_wasm_bindgen::from_value(config).map_err(|e| anyhow!("invalid tikibar config: {e}"))?
    };

    let page = Rc::new(BrowserPage::new().context("no browser window")?);
    let Some(body) = page.body() else {
        warn!("document has no body; tikibar not installed");
        return Ok(());
    };

    let host = TikibarHost::new(page, &body, config).context("could not attach the diagnostic frame")?;
    let report = host.install().context("could not subscribe to the page")?;
    info!(ajax = ?report.ajax, fetch = ?report.fetch, "tikibar ready");

    HOST.with(|slot| *slot.borrow_mut() = Some(host));
    Ok(())
}
