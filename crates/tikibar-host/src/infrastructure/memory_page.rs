//! In-memory `HostPage` for tests and native callers.
//!
//! `MemoryPage` models just enough of a browser page to drive the runtime
//! without JavaScript:
//!
//! - a small element tree (`html` → `head`, `body`) with ids, attributes, and
//!   inline styles
//! - per-frame mailboxes recording every posted message
//! - message listeners that tests trigger with [`MemoryPage::dispatch_message`]
//! - a jQuery-style AJAX completion surface ([`MemoryPage::complete_ajax`])
//! - a scripted fetch function ([`ScriptedFetch`]) callers invoke through
//!   [`MemoryPage::fetch`], so wrapping behaves as it does in a browser
//! - a load event fired with [`MemoryPage::finish_load`]
//!
//! Element handles are plain [`NodeId`]s.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use tikibar_core::{DescribeRequest, InboundPayload, ObservedResponse, RequestDescription};
use tracing::trace;

use crate::application::page::{
    FrameHandles, HostPage, InboundEvent, MessageHandler, PageError, RequestHook, SurfaceStatus,
};
use crate::application::request_observer::{Fetch, FetchSlot, HookRelay, SharedFetch};

/// Handle to an element of a [`MemoryPage`].
pub type NodeId = usize;

const ROOT: NodeId = 0;
const HEAD: NodeId = 1;
const BODY: NodeId = 2;

/// Default name and attribute of the correlation element.
const CORRELATION_FIELD: &str = "correlation_id";
const CORRELATION_ATTRIBUTE: &str = "value";

#[derive(Debug, Clone, Default)]
struct MemoryNode {
    tag: String,
    attributes: BTreeMap<String, String>,
    styles: BTreeMap<String, String>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl MemoryNode {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Self::default()
        }
    }
}

/// One message posted to a frame's window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedMessage {
    pub payload: String,
    pub target_origin: String,
}

// ── Request / response doubles ────────────────────────────────────────────────

/// A canned HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl MemoryResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }
}

impl ObservedResponse for MemoryResponse {
    fn status(&self) -> u16 {
        self.status
    }

    fn header(&self, name: &str) -> Option<String> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    }
}

/// A fetch call: the input URL plus an optional method from the init options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRequest {
    pub url: String,
    pub method: Option<String>,
}

impl MemoryRequest {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            method: None,
        }
    }

    pub fn with_method(mut self, method: &str) -> Self {
        self.method = Some(method.to_string());
        self
    }
}

impl DescribeRequest for MemoryRequest {
    fn describe(&self) -> RequestDescription {
        RequestDescription::new(self.url.clone(), self.method.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryFetchError {
    /// No scripted response for this URL (the promise rejects).
    #[error("network request to {0} failed")]
    Unreachable(String),

    #[error("page has no fetch function")]
    Unavailable,
}

/// The page's original fetch: answers from a fixed route table.
#[derive(Debug, Default)]
pub struct ScriptedFetch {
    routes: BTreeMap<String, MemoryResponse>,
    calls: Cell<usize>,
}

impl ScriptedFetch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, url: &str, response: MemoryResponse) -> Self {
        self.routes.insert(url.to_string(), response);
        self
    }

    /// Number of calls that reached this function.
    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

#[async_trait(?Send)]
impl Fetch for ScriptedFetch {
    type Request = MemoryRequest;
    type Response = MemoryResponse;
    type Error = MemoryFetchError;

    async fn fetch(&self, request: MemoryRequest) -> Result<MemoryResponse, MemoryFetchError> {
        self.calls.set(self.calls.get() + 1);
        match self.routes.get(&request.url) {
            Some(response) => Ok(response.clone()),
            None => Err(MemoryFetchError::Unreachable(request.url)),
        }
    }
}

// ── MemoryPage ────────────────────────────────────────────────────────────────

/// A fake page.  Build it with the `with_*` methods, then share it in an `Rc`.
pub struct MemoryPage {
    host: String,
    nodes: RefCell<Vec<MemoryNode>>,
    globals: BTreeMap<String, String>,
    timing: Option<Map<String, Value>>,
    mailboxes: RefCell<BTreeMap<NodeId, Vec<PostedMessage>>>,
    message_handlers: RefCell<Vec<Rc<dyn Fn(InboundEvent)>>>,
    payload_reads: Rc<Cell<usize>>,
    ajax: Option<HookRelay>,
    network: Rc<ScriptedFetch>,
    fetch: FetchSlot<MemoryRequest, MemoryResponse, MemoryFetchError>,
    loaded: Cell<bool>,
    load_callbacks: RefCell<Vec<Box<dyn FnOnce()>>>,
}

impl MemoryPage {
    /// An empty page served from `host`, with jQuery and a fetch function
    /// that rejects every call.
    pub fn new(host: &str) -> Self {
        let mut html = MemoryNode::new("html");
        html.children = vec![HEAD, BODY];
        let mut head = MemoryNode::new("head");
        head.parent = Some(ROOT);
        let mut body = MemoryNode::new("body");
        body.parent = Some(ROOT);

        let network = Rc::new(ScriptedFetch::new());
        let fetch: SharedFetch<MemoryRequest, MemoryResponse, MemoryFetchError> = network.clone();

        Self {
            host: host.to_string(),
            nodes: RefCell::new(vec![html, head, body]),
            globals: BTreeMap::new(),
            timing: None,
            mailboxes: RefCell::new(BTreeMap::new()),
            message_handlers: RefCell::new(Vec::new()),
            payload_reads: Rc::new(Cell::new(0)),
            ajax: Some(HookRelay::new()),
            network,
            fetch: FetchSlot::new(fetch),
            loaded: Cell::new(false),
            load_callbacks: RefCell::new(Vec::new()),
        }
    }

    pub fn with_global(mut self, name: &str, value: &str) -> Self {
        self.globals.insert(name.to_string(), value.to_string());
        self
    }

    /// Adds `<meta name="correlation_id" value="{id}">` to the head.
    pub fn with_correlation_id(self, id: &str) -> Self {
        self.with_named_element(HEAD, CORRELATION_FIELD, CORRELATION_ATTRIBUTE, id)
    }

    /// Adds a `meta` element with the given `name` and one attribute under
    /// `parent`.
    pub fn with_named_element(mut self, parent: NodeId, name: &str, attribute: &str, value: &str) -> Self {
        let nodes = self.nodes.get_mut();
        let id = nodes.len();
        let mut meta = MemoryNode::new("meta");
        meta.attributes.insert("name".to_string(), name.to_string());
        meta.attributes.insert(attribute.to_string(), value.to_string());
        meta.parent = Some(parent);
        nodes.push(meta);
        nodes[parent].children.push(id);
        self
    }

    pub fn with_timing(mut self, timing: Map<String, Value>) -> Self {
        self.timing = Some(timing);
        self
    }

    /// Replaces the page's fetch function.
    pub fn with_fetch(mut self, network: ScriptedFetch) -> Self {
        self.network = Rc::new(network);
        let fetch: SharedFetch<MemoryRequest, MemoryResponse, MemoryFetchError> = self.network.clone();
        self.fetch = FetchSlot::new(fetch);
        self
    }

    pub fn without_fetch(mut self) -> Self {
        self.fetch = FetchSlot::unavailable();
        self
    }

    pub fn without_jquery(mut self) -> Self {
        self.ajax = None;
        self
    }

    /// A page whose load event has already fired.
    pub fn already_loaded(self) -> Self {
        self.loaded.set(true);
        self
    }

    // ── Driving the page ──────────────────────────────────────────────────────

    /// Delivers a message event to every listener on the window.  Each read
    /// of the event's payload is counted, see [`MemoryPage::payload_reads`].
    pub fn dispatch_message(&self, origin: &str, data: impl Into<InboundPayload>) {
        let data = data.into();
        let handlers = self.message_handlers.borrow().clone();
        for handler in handlers {
            let reads = Rc::clone(&self.payload_reads);
            let data = data.clone();
            handler(InboundEvent::deferred(origin, move || {
                reads.set(reads.get() + 1);
                Some(data.clone())
            }));
        }
    }

    /// Fires the global AJAX completion event, as jQuery does after every
    /// request.  Does nothing on a page without jQuery.
    pub fn complete_ajax(&self, request: &RequestDescription, response: &MemoryResponse) {
        if let Some(relay) = &self.ajax {
            relay.forward(request, response);
        }
    }

    /// Calls whatever function currently sits in the page's fetch slot.
    pub async fn fetch(&self, request: MemoryRequest) -> Result<MemoryResponse, MemoryFetchError> {
        let fetch = self.fetch.current().ok_or(MemoryFetchError::Unavailable)?;
        fetch.fetch(request).await
    }

    /// Fires the load event.  Later calls do nothing.
    pub fn finish_load(&self) {
        if self.loaded.replace(true) {
            return;
        }
        let callbacks = std::mem::take(&mut *self.load_callbacks.borrow_mut());
        for callback in callbacks {
            callback();
        }
    }

    // ── Inspection ────────────────────────────────────────────────────────────

    pub fn body(&self) -> NodeId {
        BODY
    }

    pub fn head(&self) -> NodeId {
        HEAD
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .borrow()
            .get(node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.nodes.borrow().get(node)?.attributes.get(name).cloned()
    }

    pub fn style(&self, node: NodeId, property: &str) -> Option<String> {
        self.nodes.borrow().get(node)?.styles.get(property).cloned()
    }

    pub fn tag(&self, node: NodeId) -> Option<String> {
        self.nodes.borrow().get(node).map(|n| n.tag.clone())
    }

    /// First element in the document with the given id.
    pub fn find_by_id(&self, id: &str) -> Option<NodeId> {
        self.find_in_document(|node| node.attributes.get("id").map(String::as_str) == Some(id))
    }

    /// Number of elements in the document with the given id.
    pub fn count_by_id(&self, id: &str) -> usize {
        self.document_order()
            .into_iter()
            .filter(|&n| self.attribute(n, "id").as_deref() == Some(id))
            .count()
    }

    pub fn is_attached(&self, node: NodeId) -> bool {
        let nodes = self.nodes.borrow();
        let mut current = Some(node);
        // A parent chain longer than the arena is a cycle.
        for _ in 0..=nodes.len() {
            match current {
                Some(ROOT) => return true,
                Some(n) => current = nodes.get(n).and_then(|n| n.parent),
                None => return false,
            }
        }
        false
    }

    /// Every message posted to `frame`, oldest first.
    pub fn posted(&self, frame: NodeId) -> Vec<PostedMessage> {
        self.mailboxes.borrow().get(&frame).cloned().unwrap_or_default()
    }

    /// Payloads posted to `frame`, parsed as JSON.
    pub fn posted_values(&self, frame: NodeId) -> Vec<Value> {
        self.posted(frame)
            .iter()
            .filter_map(|m| serde_json::from_str(&m.payload).ok())
            .collect()
    }

    pub fn message_listener_count(&self) -> usize {
        self.message_handlers.borrow().len()
    }

    /// How many times listeners have converted a dispatched event's payload.
    pub fn payload_reads(&self) -> usize {
        self.payload_reads.get()
    }

    /// The original fetch function, whether or not it has been wrapped.
    pub fn network(&self) -> &ScriptedFetch {
        &self.network
    }

    fn document_order(&self) -> Vec<NodeId> {
        let nodes = self.nodes.borrow();
        let mut order = Vec::new();
        let mut stack = vec![ROOT];
        while let Some(n) = stack.pop() {
            if order.len() > nodes.len() {
                break;
            }
            order.push(n);
            if let Some(node) = nodes.get(n) {
                stack.extend(node.children.iter().rev());
            }
        }
        order
    }

    fn find_in_document(&self, matches: impl Fn(&MemoryNode) -> bool) -> Option<NodeId> {
        let order = self.document_order();
        let nodes = self.nodes.borrow();
        order.into_iter().find(|&n| nodes.get(n).map(&matches).unwrap_or(false))
    }

    fn detach(&self, node: NodeId) {
        let mut nodes = self.nodes.borrow_mut();
        let Some(parent) = nodes.get_mut(node).and_then(|n| n.parent.take()) else {
            return;
        };
        if let Some(parent) = nodes.get_mut(parent) {
            parent.children.retain(|&c| c != node);
        }
    }

    fn create(&self, tag: &str, attributes: &[(&str, &str)]) -> NodeId {
        let mut node = MemoryNode::new(tag);
        for (name, value) in attributes {
            node.attributes.insert(name.to_string(), value.to_string());
        }
        let mut nodes = self.nodes.borrow_mut();
        nodes.push(node);
        nodes.len() - 1
    }
}

fn unknown_node(operation: &'static str, node: NodeId) -> PageError {
    PageError::Dom {
        operation,
        detail: format!("no element {node}"),
    }
}

impl HostPage for MemoryPage {
    type Element = NodeId;

    fn remove_element_by_id(&self, id: &str) -> bool {
        match self.find_by_id(id) {
            Some(node) => {
                self.detach(node);
                true
            }
            None => false,
        }
    }

    fn named_attribute(&self, name: &str, attribute: &str) -> Option<String> {
        let node = self.find_in_document(|n| n.attributes.get("name").map(String::as_str) == Some(name))?;
        self.attribute(node, attribute)
    }

    fn create_frame_container(&self, container_id: &str, src: &str) -> Result<FrameHandles<NodeId>, PageError> {
        let container = self.create("div", &[("id", container_id)]);
        let frame = self.create("iframe", &[("src", src), ("width", "100%"), ("height", "100%")]);
        let mut nodes = self.nodes.borrow_mut();
        nodes[container].children.push(frame);
        nodes[frame].parent = Some(container);
        Ok(FrameHandles { container, frame })
    }

    fn set_style(&self, element: &NodeId, property: &str, value: &str) -> Result<(), PageError> {
        let mut nodes = self.nodes.borrow_mut();
        let node = nodes.get_mut(*element).ok_or_else(|| unknown_node("style.setProperty", *element))?;
        node.styles.insert(property.to_string(), value.to_string());
        Ok(())
    }

    fn prepend_child(&self, parent: &NodeId, child: &NodeId) -> Result<(), PageError> {
        let (parent, child) = (*parent, *child);
        {
            let nodes = self.nodes.borrow();
            if nodes.get(parent).is_none() || nodes.get(child).is_none() || parent == child {
                return Err(unknown_node("insertBefore", child));
            }
        }
        self.detach(child);
        let mut nodes = self.nodes.borrow_mut();
        nodes[parent].children.insert(0, child);
        nodes[child].parent = Some(parent);
        Ok(())
    }

    fn remove_element(&self, element: &NodeId) {
        self.detach(*element);
    }

    fn location_host(&self) -> String {
        self.host.clone()
    }

    fn global_string(&self, name: &str) -> Option<String> {
        self.globals.get(name).cloned()
    }

    fn navigation_timing(&self) -> Option<Map<String, Value>> {
        self.timing.clone()
    }

    fn post_to_frame(&self, frame: &NodeId, payload: &str, target_origin: &str) -> Result<(), PageError> {
        if !self.is_attached(*frame) {
            return Err(PageError::Detached);
        }
        if self.tag(*frame).as_deref() != Some("iframe") {
            return Err(PageError::Dom {
                operation: "postMessage",
                detail: "element has no content window".to_string(),
            });
        }
        trace!(frame, bytes = payload.len(), "memory page post");
        self.mailboxes
            .borrow_mut()
            .entry(*frame)
            .or_default()
            .push(PostedMessage {
                payload: payload.to_string(),
                target_origin: target_origin.to_string(),
            });
        Ok(())
    }

    fn listen_messages(&self, handler: MessageHandler) -> Result<(), PageError> {
        self.message_handlers.borrow_mut().push(Rc::from(handler));
        Ok(())
    }

    fn observe_ajax(&self, hook: RequestHook) -> SurfaceStatus {
        match &self.ajax {
            Some(relay) => relay.attach(hook),
            None => SurfaceStatus::Unavailable,
        }
    }

    fn observe_fetch(&self, hook: RequestHook) -> SurfaceStatus {
        self.fetch.observe(hook)
    }

    fn when_loaded(&self, callback: Box<dyn FnOnce()>) -> Result<(), PageError> {
        if self.loaded.get() {
            callback();
        } else {
            self.load_callbacks.borrow_mut().push(callback);
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_headers_are_case_insensitive() {
        let response = MemoryResponse::new(200).with_header("X-Tiki-Time", "0.5");

        assert_eq!(response.header("x-tiki-time").as_deref(), Some("0.5"));
        assert_eq!(response.header("x-correlation-id"), None);
    }

    #[test]
    fn test_request_without_method_describes_as_get() {
        let described = MemoryRequest::new("/a").describe();
        assert_eq!(described, RequestDescription::new("/a", Some("GET")));
    }

    #[test]
    fn test_named_attribute_finds_meta_in_head() {
        let page = MemoryPage::new("a.example.com").with_correlation_id("abc123");

        assert_eq!(page.named_attribute("correlation_id", "value").as_deref(), Some("abc123"));
        assert_eq!(page.named_attribute("correlation_id", "content"), None);
        assert_eq!(page.named_attribute("other", "value"), None);
    }

    #[test]
    fn test_prepend_moves_child_to_front() {
        let page = MemoryPage::new("a.example.com");
        let body = page.body();
        let first = page.create("p", &[]);
        let second = page.create("p", &[]);

        page.prepend_child(&body, &first).unwrap();
        page.prepend_child(&body, &second).unwrap();
        page.prepend_child(&body, &first).unwrap();

        assert_eq!(page.children(body), vec![first, second]);
    }

    #[test]
    fn test_detached_subtree_is_not_found_by_id() {
        let page = MemoryPage::new("a.example.com");
        let handles = page.create_frame_container("box", "https://x/").unwrap();
        assert_eq!(page.find_by_id("box"), None);

        page.prepend_child(&page.body(), &handles.container).unwrap();
        assert_eq!(page.find_by_id("box"), Some(handles.container));
        assert!(page.is_attached(handles.frame));

        assert!(page.remove_element_by_id("box"));
        assert!(!page.is_attached(handles.frame));
    }

    #[test]
    fn test_post_requires_attached_iframe() {
        let page = MemoryPage::new("a.example.com");
        let handles = page.create_frame_container("box", "https://x/").unwrap();

        assert!(matches!(page.post_to_frame(&handles.frame, "{}", "*"), Err(PageError::Detached)));

        page.prepend_child(&page.body(), &handles.container).unwrap();
        assert!(page.post_to_frame(&handles.container, "{}", "*").is_err());
        page.post_to_frame(&handles.frame, "{}", "*").unwrap();
        assert_eq!(page.posted(handles.frame).len(), 1);
    }

    #[test]
    fn test_when_loaded_defers_until_load_then_runs_immediately() {
        let page = MemoryPage::new("a.example.com");
        let runs = Rc::new(Cell::new(0));

        let counter = Rc::clone(&runs);
        page.when_loaded(Box::new(move || counter.set(counter.get() + 1))).unwrap();
        assert_eq!(runs.get(), 0);

        page.finish_load();
        page.finish_load();
        assert_eq!(runs.get(), 1);

        let counter = Rc::clone(&runs);
        page.when_loaded(Box::new(move || counter.set(counter.get() + 1))).unwrap();
        assert_eq!(runs.get(), 2);
    }

    #[tokio::test]
    async fn test_fetch_without_function_is_unavailable() {
        let page = MemoryPage::new("a.example.com").without_fetch();

        let result = page.fetch(MemoryRequest::new("/")).await;

        assert_eq!(result, Err(MemoryFetchError::Unavailable));
    }
}
