//! Engagement telemetry, independent of slot experiments.
//!
//! `page_view` is sent as soon as the pipeline starts. Every other event is queued
//! and sent when the host reports idle time through [`EngagementPipeline::flush_idle`].
//! Failed sends are dropped.

pub mod classify;
pub mod heartbeat;
pub mod rate_limit;
pub mod scroll;

pub use classify::{CtaMatch, classify_cta, cta_label, cta_target, is_lead_form, lead_form_for, selector_hint};
pub use heartbeat::Heartbeat;
pub use rate_limit::CtaRateLimiter;
pub use scroll::{ScrollDebouncer, ScrollDepth, ScrollSample, scroll_percent};

use crate::host::{Host, UiEvent};
use crate::identity::IdentityStore;
use crate::settings::RuntimeSettings;
use page_dom::NodeId;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::Instrument as _;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PageView,
    Heartbeat,
    Scroll,
    CtaClick,
    FormStart,
    FormSubmit,
}

/// One engagement event before the common envelope fields are added.
#[derive(Clone, Debug, PartialEq)]
pub struct EngagementEvent {
    pub kind: EventKind,
    pub fields: Map<String, Value>,
}

impl EngagementEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            fields: Map::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, name: &str, value: Value) -> Self {
        self.fields.insert(name.to_owned(), value);
        self
    }
}

pub struct EngagementPipeline {
    host: Rc<Host>,
    settings: Rc<RuntimeSettings>,
    identity: Rc<IdentityStore>,
    /// Envelopes completed when the event happened, waiting for idle time.
    queue: RefCell<VecDeque<(EventKind, Value)>>,
    depth: RefCell<ScrollDepth>,
    debouncer: RefCell<ScrollDebouncer>,
    limiter: RefCell<CtaRateLimiter>,
    heartbeat: RefCell<Heartbeat>,
    page_view_sent: Cell<bool>,
    form_started: Cell<bool>,
    form_shown: Cell<bool>,
}

impl EngagementPipeline {
    pub fn new(host: Rc<Host>, settings: Rc<RuntimeSettings>, identity: Rc<IdentityStore>) -> Self {
        let now = host.clock.now_ms();
        let visible = !host.page.is_hidden();
        Self {
            queue: RefCell::new(VecDeque::new()),
            depth: RefCell::new(ScrollDepth::new(&settings.scroll_thresholds)),
            debouncer: RefCell::new(ScrollDebouncer::default()),
            limiter: RefCell::new(CtaRateLimiter::new(
                settings.cta_rate_limit,
                settings.cta_rate_window(),
            )),
            heartbeat: RefCell::new(Heartbeat::new(settings.heartbeat_interval(), now, visible)),
            page_view_sent: Cell::new(false),
            form_started: Cell::new(false),
            form_shown: Cell::new(false),
            host,
            settings,
            identity,
        }
    }

    /// Send `page_view` once and start the heartbeat clock.
    pub async fn start(&self) {
        if self.page_view_sent.replace(true) {
            return;
        }
        let now = self.host.clock.now_ms();
        self.heartbeat
            .borrow_mut()
            .set_visible(!self.host.page.is_hidden(), now);
        let body = self.envelope(EngagementEvent::new(EventKind::PageView));
        self.send(EventKind::PageView, body)
            .instrument(tracing::info_span!("engagement.page_view"))
            .await;
    }

    pub fn queued(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Send every queued event. Returns how many were delivered.
    pub async fn flush_idle(&self) -> usize {
        self.settle_scroll();
        let batch: Vec<(EventKind, Value)> = self.queue.borrow_mut().drain(..).collect();
        let mut delivered = 0;
        for (kind, body) in batch {
            if self.send(kind, body).await {
                delivered += 1;
            }
        }
        delivered
    }

    /// Delegated click handler: rate-limited `cta_click` for CTA-like links and buttons.
    pub fn on_click(&self, target: NodeId) {
        let event = {
            let doc = self.host.document.borrow();
            let Some(cta) = cta_target(&doc, target) else {
                return;
            };
            let Some(matched) = classify_cta(&doc, cta) else {
                return;
            };
            EngagementEvent::new(EventKind::CtaClick)
                .with("label", Value::String(cta_label(&doc, cta)))
                .with("selectorHint", Value::String(selector_hint(&doc, cta)))
                .with("matchedBy", Value::String(matched.as_str().to_owned()))
        };
        if !self.limiter.borrow_mut().allow(self.host.clock.now_ms()) {
            log::debug!("cta_click dropped by rate limit");
            return;
        }
        self.enqueue(event);
    }

    /// Focus entering a lead form starts it, once per browser session.
    pub fn on_focus_in(&self, target: NodeId) {
        let form = {
            let doc = self.host.document.borrow();
            lead_form_for(&doc, target).map(|form| selector_hint(&doc, form))
        };
        let Some(form) = form else {
            return;
        };
        if !self.claim_session_flag(&self.settings.form_start_key(), &self.form_started) {
            return;
        }
        self.enqueue(EngagementEvent::new(EventKind::FormStart).with("form", Value::String(form)));
    }

    pub fn on_submit(&self, form: NodeId) {
        let hint = {
            let doc = self.host.document.borrow();
            is_lead_form(&doc, form).then(|| selector_hint(&doc, form))
        };
        if let Some(hint) = hint {
            self.enqueue(EngagementEvent::new(EventKind::FormSubmit).with("form", Value::String(hint)));
        }
    }

    pub fn on_scroll(&self, sample: ScrollSample) {
        self.debouncer
            .borrow_mut()
            .push(sample, self.host.clock.now_ms());
    }

    pub fn on_visibility_change(&self, hidden: bool) {
        self.heartbeat
            .borrow_mut()
            .set_visible(!hidden, self.host.clock.now_ms());
    }

    /// Timer turn: settle a quiet scroll burst and queue a due heartbeat.
    pub fn tick(&self) {
        self.settle_scroll();
        let due = self.heartbeat.borrow_mut().due(self.host.clock.now_ms());
        if let Some(seconds) = due {
            self.enqueue(EngagementEvent::new(EventKind::Heartbeat).with("timeOnPageSec", json!(seconds)));
        }
    }

    fn settle_scroll(&self) {
        let quiet_ms = self.settings.scroll_debounce_ms;
        let settled = self
            .debouncer
            .borrow_mut()
            .settle(self.host.clock.now_ms(), quiet_ms);
        let Some(sample) = settled else {
            return;
        };
        let crossed = self.depth.borrow_mut().observe(scroll_percent(sample));
        for threshold in crossed {
            self.enqueue(EngagementEvent::new(EventKind::Scroll).with("scrollPct", json!(threshold)));
        }
    }

    fn enqueue(&self, event: EngagementEvent) {
        let kind = event.kind;
        let body = self.envelope(event);
        self.queue.borrow_mut().push_back((kind, body));
    }

    /// True the first time in this browser session; the in-memory flag covers
    /// unavailable session storage.
    fn claim_session_flag(&self, key: &str, memory: &Cell<bool>) -> bool {
        if memory.get() {
            return false;
        }
        match self.host.session.get(key) {
            Ok(Some(_)) => {
                memory.set(true);
                return false;
            }
            Ok(None) => {
                if let Err(err) = self.host.session.set(key, "1") {
                    log::debug!("{key} not persisted: {err}");
                }
            }
            Err(err) => log::debug!("{key} unreadable: {err}"),
        }
        memory.set(true);
        true
    }

    fn envelope(&self, event: EngagementEvent) -> Value {
        let mut body = Map::new();
        body.insert(String::from("site"), Value::String(self.settings.site.clone()));
        body.insert(String::from("path"), Value::String(self.host.page.full_path()));
        body.insert(
            String::from("referrer"),
            Value::String(self.host.page.referrer().to_owned()),
        );
        body.insert(String::from("ts"), json!(self.host.clock.now_ms()));
        body.insert(String::from("sessionId"), Value::String(self.identity.session_id()));
        body.insert(String::from("visitorId"), Value::String(self.identity.visitor_id()));
        body.insert(String::from("kind"), json!(event.kind));
        body.extend(event.fields);
        Value::Object(body)
    }

    async fn send(&self, kind: EventKind, body: Value) -> bool {
        let Some(url) = self.settings.ingest_url(self.host.page.location()) else {
            return false;
        };
        match self.host.transport.post_json(url, body).await {
            Ok(response) if response.ok() => {
                if let Ok(answer) = response.json::<Value>() {
                    self.handle_answer(answer);
                }
                true
            }
            Ok(response) => {
                log::debug!("engagement {kind:?} rejected with status {}", response.status);
                false
            }
            Err(err) => {
                log::debug!("engagement {kind:?} failed: {err}");
                false
            }
        }
    }

    /// A `show_form` action dispatches the configured UI event once per session.
    fn handle_answer(&self, answer: Value) {
        if answer.get("action").and_then(Value::as_str) != Some("show_form") {
            return;
        }
        if !self.claim_session_flag(&self.settings.show_form_key(), &self.form_shown) {
            return;
        }
        log::info!("server requested {}", self.settings.show_form_event);
        self.host.ui.dispatch(UiEvent {
            name: self.settings.show_form_event.clone(),
            detail: answer,
        });
    }
}
