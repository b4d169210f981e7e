//! In-process doubles for driving a whole page session without a browser or a server.

use crate::host::page::{UiEvent, UiEventSink};
use crate::host::transport::{HttpResponse, Transport, TransportError, TransportFuture};
use futures::FutureExt as _;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use url::Url;

/// Canned answer for requests whose path ends with a routed suffix.
#[derive(Clone, Debug, PartialEq)]
pub enum MockReply {
    Json(u16, Value),
    Status(u16),
    NetworkError,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub url: Url,
    pub body: Option<Value>,
    pub beacon: bool,
}

impl RecordedRequest {
    /// First query value named `name`.
    pub fn query(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// String field of the JSON body.
    pub fn field(&self, name: &str) -> Option<String> {
        self.body
            .as_ref()?
            .get(name)?
            .as_str()
            .map(str::to_owned)
    }
}

#[derive(Default)]
struct MockState {
    routes: Vec<(String, MockReply)>,
    requests: Vec<RecordedRequest>,
}

/// Recording transport. Requests are logged when issued, so coalescing is observable
/// before any response is delivered. Unrouted paths answer 404.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Rc<RefCell<MockState>>,
    held: Rc<Cell<bool>>,
    beacon: Rc<Cell<bool>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests whose path ends with `path_suffix`. Later routes win.
    #[must_use]
    pub fn route(self, path_suffix: &str, reply: MockReply) -> Self {
        self.set_route(path_suffix, reply);
        self
    }

    pub fn set_route(&self, path_suffix: &str, reply: MockReply) {
        self.state
            .borrow_mut()
            .routes
            .insert(0, (path_suffix.to_owned(), reply));
    }

    /// Accept beacons instead of reporting them unavailable.
    pub fn enable_beacon(&self, enabled: bool) {
        self.beacon.set(enabled);
    }

    /// Keep every response pending until [`MockTransport::release`].
    pub fn hold(&self) {
        self.held.set(true);
    }

    pub fn release(&self) {
        self.held.set(false);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.borrow().requests.clone()
    }

    /// Requests whose path ends with `path_suffix`.
    pub fn requests_to(&self, path_suffix: &str) -> Vec<RecordedRequest> {
        self.state
            .borrow()
            .requests
            .iter()
            .filter(|request| request.url.path().ends_with(path_suffix))
            .cloned()
            .collect()
    }

    pub fn count(&self, path_suffix: &str) -> usize {
        self.requests_to(path_suffix).len()
    }

    fn reply_for(&self, url: &Url) -> MockReply {
        self.state
            .borrow()
            .routes
            .iter()
            .find(|(suffix, _)| url.path().ends_with(suffix.as_str()))
            .map_or(MockReply::Status(404), |(_, reply)| reply.clone())
    }

    fn record(&self, method: &'static str, url: &Url, body: Option<Value>, beacon: bool) {
        self.state.borrow_mut().requests.push(RecordedRequest {
            method,
            url: url.clone(),
            body,
            beacon,
        });
    }

    fn respond(&self, url: &Url) -> TransportFuture {
        let reply = self.reply_for(url);
        let held = Rc::clone(&self.held);
        async move {
            while held.get() {
                tokio::task::yield_now().await;
            }
            match reply {
                MockReply::Json(status, body) => Ok(HttpResponse {
                    status,
                    body: body.to_string(),
                }),
                MockReply::Status(status) => Ok(HttpResponse {
                    status,
                    body: String::new(),
                }),
                MockReply::NetworkError => {
                    Err(TransportError::Network(String::from("connection refused")))
                }
            }
        }
        .boxed_local()
    }
}

impl Transport for MockTransport {
    fn get(&self, url: Url) -> TransportFuture {
        self.record("GET", &url, None, false);
        self.respond(&url)
    }

    fn post_json(&self, url: Url, body: Value) -> TransportFuture {
        self.record("POST", &url, Some(body), false);
        self.respond(&url)
    }

    fn send_beacon(&self, url: Url, body: Value) -> bool {
        if !self.beacon.get() {
            return false;
        }
        self.record("POST", &url, Some(body), true);
        true
    }
}

/// UI sink that keeps every dispatched event.
#[derive(Clone, Default)]
pub struct RecordingUiSink {
    events: Rc<RefCell<Vec<UiEvent>>>,
}

impl RecordingUiSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<UiEvent> {
        self.events.borrow().clone()
    }
}

impl UiEventSink for RecordingUiSink {
    fn dispatch(&self, event: UiEvent) {
        self.events.borrow_mut().push(event);
    }
}
