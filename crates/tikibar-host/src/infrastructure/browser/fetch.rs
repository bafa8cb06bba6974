//! `window.fetch` surface.
//!
//! The page's fetch is replaced once per window by a function that forwards
//! to the thread-local [`FetchSlot`].  The slot holds an `ObservingFetch`
//! around the original, so callers receive the original promise's `Response`
//! object unchanged and rejections propagate as they would have.

use std::cell::RefCell;
use std::rc::Rc;

use async_trait::async_trait;
use js_sys::{Function, Promise, Reflect};
use tikibar_core::{DescribeRequest, ObservedResponse, RequestDescription};
use tracing::{debug, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{future_to_promise, JsFuture};
use web_sys::{Request, Response, Window};

use crate::application::page::{RequestHook, SurfaceStatus};
use crate::application::request_observer::{Fetch, FetchSlot, SharedFetch};

type BrowserSlot = FetchSlot<BrowserRequest, BrowserResponse, JsValue>;

thread_local! {
    static FETCH_SLOT: RefCell<Option<Rc<BrowserSlot>>> = RefCell::new(None);
}

/// The two arguments of one `fetch(input, init)` call.
pub struct BrowserRequest {
    input: JsValue,
    init: JsValue,
}

impl DescribeRequest for BrowserRequest {
    fn describe(&self) -> RequestDescription {
        let request = self.input.dyn_ref::<Request>();

        // A `URL` object or anything else that is neither a string nor a
        // `Request` is stringified, as `fetch` itself does.
        let input_url = match (self.input.as_string(), request) {
            (Some(text), _) => Some(text),
            (None, Some(_)) => None,
            (None, None) => Some(String::from(js_sys::Object::from(self.input.clone()).to_string())),
        };
        let init_method = if self.init.is_object() {
            Reflect::get(&self.init, &"method".into())
                .ok()
                .and_then(|v| v.as_string())
        } else {
            None
        };

        RequestDescription::from_fetch_parts(
            input_url.as_deref(),
            request.map(Request::url).as_deref(),
            init_method.as_deref(),
            request.map(Request::method).as_deref(),
        )
    }
}

/// A settled fetch `Response`.
pub struct BrowserResponse(pub Response);

impl ObservedResponse for BrowserResponse {
    fn status(&self) -> u16 {
        self.0.status()
    }

    fn header(&self, name: &str) -> Option<String> {
        self.0.headers().get(name).ok().flatten()
    }
}

/// The page's original fetch function.
pub struct BrowserFetch {
    original: Function,
    window: Window,
}

#[async_trait(?Send)]
impl Fetch for BrowserFetch {
    type Request = BrowserRequest;
    type Response = BrowserResponse;
    type Error = JsValue;

    async fn fetch(&self, request: BrowserRequest) -> Result<BrowserResponse, JsValue> {
        let promise = self
            .original
            .call2(&self.window, &request.input, &request.init)?
            .dyn_into::<Promise>()?;
        let response = JsFuture::from(promise).await?.dyn_into::<Response>()?;
        Ok(BrowserResponse(response))
    }
}

pub(super) fn observe(window: &Window, hook: RequestHook) -> SurfaceStatus {
    FETCH_SLOT.with(|cell| {
        let existing = cell.borrow().clone();
        let slot = match existing {
            Some(slot) => slot,
            None => {
                let Some(original) = Reflect::get(window, &"fetch".into())
                    .ok()
                    .and_then(|f| f.dyn_into::<Function>().ok())
                else {
                    debug!("fetch not present; fetch surface unavailable");
                    return SurfaceStatus::Unavailable;
                };
                let original: SharedFetch<BrowserRequest, BrowserResponse, JsValue> = Rc::new(BrowserFetch {
                    original,
                    window: window.clone(),
                });
                let slot = Rc::new(FetchSlot::new(original));
                *cell.borrow_mut() = Some(Rc::clone(&slot));
                slot
            }
        };

        let status = slot.observe(hook);
        if status == SurfaceStatus::Installed {
            if let Err(e) = replace_window_fetch(window, Rc::clone(&slot)) {
                warn!(error = ?e, "could not replace window.fetch");
                // Nothing was hooked; the next install starts over.
                *cell.borrow_mut() = None;
                return SurfaceStatus::Unavailable;
            }
        }
        status
    })
}

fn replace_window_fetch(window: &Window, slot: Rc<BrowserSlot>) -> Result<(), JsValue> {
    let replacement = Closure::wrap(Box::new(move |input: JsValue, init: JsValue| -> Promise {
        let slot = Rc::clone(&slot);
        future_to_promise(async move {
            let fetch = slot
                .current()
                .ok_or_else(|| JsValue::from_str("fetch is unavailable"))?;
            let response = fetch.fetch(BrowserRequest { input, init }).await?;
            Ok(response.0.into())
        })
    }) as Box<dyn FnMut(JsValue, JsValue) -> Promise>);

    Reflect::set(window, &"fetch".into(), replacement.as_ref())?;
    replacement.forget();
    Ok(())
}
