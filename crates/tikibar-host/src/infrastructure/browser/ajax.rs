//! jQuery AJAX completion surface.
//!
//! jQuery broadcasts `ajaxComplete` on the document after every request, with
//! `(event, jqXHR, settings)`.  The subscription is made once per window and
//! forwards through a thread-local [`HookRelay`].

use js_sys::{Function, Reflect};
use tikibar_core::{ObservedResponse, RequestDescription};
use tracing::{debug, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Window};

use crate::application::page::{RequestHook, SurfaceStatus};
use crate::application::request_observer::HookRelay;

thread_local! {
    static AJAX_RELAY: HookRelay = HookRelay::new();
}

/// A jQuery `jqXHR` object.
struct JqXhr(JsValue);

impl ObservedResponse for JqXhr {
    fn status(&self) -> u16 {
        Reflect::get(&self.0, &"status".into())
            .ok()
            .and_then(|v| v.as_f64())
            .filter(|s| (0.0..=f64::from(u16::MAX)).contains(s))
            .map(|s| s as u16)
            .unwrap_or(0)
    }

    fn header(&self, name: &str) -> Option<String> {
        let get = Reflect::get(&self.0, &"getResponseHeader".into())
            .ok()?
            .dyn_into::<Function>()
            .ok()?;
        get.call1(&self.0, &JsValue::from_str(name)).ok()?.as_string()
    }
}

fn string_field(object: &JsValue, field: &str) -> Option<String> {
    Reflect::get(object, &JsValue::from_str(field))
        .ok()
        .and_then(|v| v.as_string())
}

fn jquery(window: &Window) -> Option<Function> {
    Reflect::get(window, &"jQuery".into()).ok()?.dyn_into::<Function>().ok()
}

pub(super) fn observe(window: &Window, document: &Document, hook: RequestHook) -> SurfaceStatus {
    let Some(jquery) = jquery(window) else {
        debug!("jQuery not present; AJAX surface unavailable");
        return SurfaceStatus::Unavailable;
    };

    let status = AJAX_RELAY.with(|relay| relay.attach(hook));
    if status == SurfaceStatus::Installed {
        if let Err(e) = subscribe(&jquery, document) {
            warn!(error = ?e, "could not subscribe to ajaxComplete");
            AJAX_RELAY.with(HookRelay::reset);
            return SurfaceStatus::Unavailable;
        }
    }
    status
}

fn subscribe(jquery: &Function, document: &Document) -> Result<(), JsValue> {
    let wrapped = jquery.call1(&JsValue::NULL, document)?;
    let on = Reflect::get(&wrapped, &"on".into())?.dyn_into::<Function>()?;

    let callback = Closure::wrap(Box::new(move |_event: JsValue, xhr: JsValue, settings: JsValue| {
        let request = RequestDescription::new(
            string_field(&settings, "url").unwrap_or_default(),
            string_field(&settings, "type").as_deref(),
        );
        AJAX_RELAY.with(|relay| relay.forward(&request, &JqXhr(xhr)));
    }) as Box<dyn FnMut(JsValue, JsValue, JsValue)>);

    on.call2(&wrapped, &"ajaxComplete".into(), callback.as_ref().unchecked_ref())?;
    callback.forget();
    Ok(())
}
