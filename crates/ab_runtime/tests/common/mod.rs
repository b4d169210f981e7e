#![allow(dead_code, reason = "Each test binary uses a different subset of helpers")]

use ab_runtime::host::{
    Clock, CookieJar, Host, KeyValueStore, ManualClock, MemoryCookieJar, MemoryStore, PageEnv,
};
use ab_runtime::testing::{MockReply, MockTransport, RecordedRequest, RecordingUiSink};
use ab_runtime::{RuntimeSettings, SessionContext, SlotRuntime};
use anyhow::{Result, anyhow};
use page_dom::{Document, NodeId};
use serde_json::json;
use std::rc::Rc;
use url::Url;

pub const START_MS: u64 = 1_700_000_000_000;

/// Home page whose only configured slot is the hero button.
pub const HOME: &str = r#"<!DOCTYPE html>
<html><head><title>Relief</title></head>
<body>
  <header><nav><a class="nav-link" href="/about">About</a><a href="tel:+18005550100">Call</a></nav></header>
  <section class="hero"><a class="btn" id="primary" href="/apply">Get started</a></section>
  <main id="main"><h1>Welcome</h1><p>Debt help.</p></main>
</body></html>"#;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}

/// Backend answering every endpoint successfully.
pub fn backend() -> MockTransport {
    MockTransport::new()
        .route("/ab-config", MockReply::Json(200, json!({
            "primaryCtaLabel": "Check my options",
            "navCtaLabel": "Apply today",
            "ttlSeconds": 300
        })))
        .route("/variant", MockReply::Json(200, json!({
            "variant": "B",
            "meta": {"label": "See my options"},
            "correlation_id": "corr-1"
        })))
        .route("/track", MockReply::Status(204))
        .route("/ingest", MockReply::Json(200, json!({"ok": true})))
}

/// Requests to `track` carrying `event`.
pub fn tracked(transport: &MockTransport, event: &str) -> Vec<RecordedRequest> {
    transport
        .requests_to("/track")
        .into_iter()
        .filter(|request| request.field("event").as_deref() == Some(event))
        .collect()
}

/// Ingest requests of one engagement kind.
pub fn ingested(transport: &MockTransport, kind: &str) -> Vec<RecordedRequest> {
    transport
        .requests_to("/ingest")
        .into_iter()
        .filter(|request| request.field("kind").as_deref() == Some(kind))
        .collect()
}

/// Browser state that survives a reload: storage, cookies, clock, network and UI.
pub struct Browser {
    pub transport: MockTransport,
    pub cookies: Rc<MemoryCookieJar>,
    pub local: Rc<MemoryStore>,
    pub session: Rc<MemoryStore>,
    pub clock: Rc<ManualClock>,
    pub ui: RecordingUiSink,
}

impl Browser {
    pub fn new(transport: MockTransport) -> Self {
        Self {
            transport,
            cookies: Rc::new(MemoryCookieJar::new()),
            local: Rc::new(MemoryStore::new()),
            session: Rc::new(MemoryStore::new()),
            clock: Rc::new(ManualClock::new(START_MS)),
            ui: RecordingUiSink::new(),
        }
    }

    /// A freshly loaded page at `url`, with a 1024px wide viewport.
    pub fn open(&self, url: &str, html: &str) -> Result<Rc<Host>> {
        let page = PageEnv::new(Url::parse(url)?).with_viewport_width(1024);
        Ok(Rc::new(
            Host::new(Document::parse(html), page, Rc::new(self.transport.clone()))
                .with_local_storage(Rc::clone(&self.local) as Rc<dyn KeyValueStore>)
                .with_session_storage(Rc::clone(&self.session) as Rc<dyn KeyValueStore>)
                .with_cookies(Rc::clone(&self.cookies) as Rc<dyn CookieJar>)
                .with_clock(Rc::clone(&self.clock) as Rc<dyn Clock>)
                .with_ui_sink(Rc::new(self.ui.clone())),
        ))
    }

    pub fn runtime(&self, url: &str, html: &str) -> Result<(Rc<Host>, SlotRuntime)> {
        let host = self.open(url, html)?;
        let runtime = SlotRuntime::new(Rc::clone(&host), RuntimeSettings::default());
        Ok((host, runtime))
    }

    pub fn session(&self, url: &str, html: &str) -> Result<SessionContext> {
        Ok(SessionContext::new(self.open(url, html)?, RuntimeSettings::default()))
    }
}

pub fn element(host: &Host, id: &str) -> Result<NodeId> {
    host.document
        .borrow()
        .get_element_by_id(id)
        .ok_or_else(|| anyhow!("element #{id} missing"))
}
