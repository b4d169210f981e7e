mod common;

use ab_runtime::testing::MockReply;
use anyhow::Result;
use common::{Browser, START_MS, backend, block_on, element, ingested, init_logging};
use core::time::Duration;
use serde_json::{Value, json};

const PAGE: &str = r#"<body>
  <a id="cta" class="cta" href="/apply">Start now</a>
  <a id="about" href="/about">About us</a>
  <form id="lead-form"><input id="name" name="name"><input name="zip"></form>
  <form id="search"><input id="q" name="q"></form>
</body>"#;

const URL: &str = "https://dhf.example/blog/debt-101?utm_source=mail#top";

fn scroll_pcts(browser: &Browser) -> Vec<Value> {
    ingested(&browser.transport, "scroll")
        .iter()
        .filter_map(|request| request.body.as_ref()?.get("scrollPct").cloned())
        .collect()
}

#[test]
fn page_view_is_sent_immediately_with_envelope() -> Result<()> {
    init_logging();
    let browser = Browser::new(backend());
    let (_host, runtime) = browser.runtime(URL, PAGE)?;
    block_on(runtime.start())?;

    let views = ingested(&browser.transport, "page_view");
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].field("path").as_deref(), Some("/blog/debt-101?utm_source=mail#top"));
    assert_eq!(views[0].field("referrer").as_deref(), Some(""));
    assert_eq!(views[0].field("site").as_deref(), Some("DHF"));
    assert!(views[0].field("sessionId").is_some_and(|id| id.starts_with("sid_")));
    assert!(views[0].field("visitorId").is_some_and(|id| id.starts_with("vid_")));
    assert_eq!(runtime.engagement().queued(), 0);
    Ok(())
}

#[test]
fn scroll_milestones_fire_once_and_together() -> Result<()> {
    init_logging();
    let browser = Browser::new(backend());
    let (_host, runtime) = browser.runtime(URL, PAGE)?;
    let settle = || {
        browser.clock.advance(Duration::from_millis(250));
        runtime.tick();
    };

    runtime.dispatch_scroll(300.0, 2_000.0, 1_000.0);
    settle();
    // oscillating around the first milestone
    runtime.dispatch_scroll(100.0, 2_000.0, 1_000.0);
    settle();
    runtime.dispatch_scroll(290.0, 2_000.0, 1_000.0);
    settle();
    // a burst only measures its last position
    runtime.dispatch_scroll(900.0, 2_000.0, 1_000.0);
    runtime.dispatch_scroll(200.0, 2_000.0, 1_000.0);
    settle();
    block_on(runtime.flush_idle())?;
    assert_eq!(scroll_pcts(&browser), vec![json!(25)]);

    runtime.dispatch_scroll(800.0, 2_000.0, 1_000.0);
    settle();
    block_on(runtime.flush_idle())?;
    assert_eq!(scroll_pcts(&browser), vec![json!(25), json!(50), json!(75)]);
    Ok(())
}

#[test]
fn cta_clicks_are_rate_limited_per_window() -> Result<()> {
    init_logging();
    let browser = Browser::new(backend());
    let (host, runtime) = browser.runtime(URL, PAGE)?;
    let cta = element(&host, "cta")?;
    let about = element(&host, "about")?;

    for _ in 0..11 {
        runtime.engagement().on_click(cta);
        browser.clock.advance(Duration::from_secs(1));
    }
    runtime.engagement().on_click(about);
    assert_eq!(runtime.engagement().queued(), 10);

    browser.clock.advance(Duration::from_secs(60));
    runtime.engagement().on_click(cta);
    assert_eq!(runtime.engagement().queued(), 11);

    assert_eq!(block_on(runtime.flush_idle())?, 11);
    let clicks = ingested(&browser.transport, "cta_click");
    assert_eq!(clicks.len(), 11);
    assert_eq!(clicks[0].field("label").as_deref(), Some("Start now"));
    assert_eq!(clicks[0].field("selectorHint").as_deref(), Some("a#cta.cta"));
    assert_eq!(clicks[0].field("matchedBy").as_deref(), Some("text"));
    Ok(())
}

#[test]
fn form_start_once_per_session_and_submit_every_time() -> Result<()> {
    init_logging();
    let browser = Browser::new(backend());
    let (host, runtime) = browser.runtime(URL, PAGE)?;
    let name = element(&host, "name")?;
    let search_field = element(&host, "q")?;
    let lead = element(&host, "lead-form")?;
    let search = element(&host, "search")?;

    runtime.dispatch_focus_in(search_field);
    runtime.dispatch_focus_in(name);
    runtime.dispatch_focus_in(name);
    runtime.dispatch_submit(lead);
    runtime.dispatch_submit(lead);
    runtime.dispatch_submit(search);
    block_on(runtime.flush_idle())?;
    assert_eq!(ingested(&browser.transport, "form_start").len(), 1);
    assert_eq!(ingested(&browser.transport, "form_submit").len(), 2);

    let (reloaded_host, reloaded) = browser.runtime(URL, PAGE)?;
    reloaded.dispatch_focus_in(element(&reloaded_host, "name")?);
    assert_eq!(reloaded.engagement().queued(), 0);
    Ok(())
}

#[test]
fn show_form_action_dispatches_once_per_session() -> Result<()> {
    init_logging();
    let answer = json!({"action": "show_form", "formId": "debt-quiz"});
    let browser = Browser::new(backend().route("/ingest", MockReply::Json(200, answer.clone())));
    let (host, runtime) = browser.runtime(URL, PAGE)?;
    block_on(runtime.start())?;

    runtime.dispatch_submit(element(&host, "lead-form")?);
    block_on(runtime.flush_idle())?;

    let events = browser.ui.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name, "ab:showLeadForm");
    assert_eq!(events[0].detail, answer);
    assert_eq!(browser.session.peek("ab015_show_form").as_deref(), Some("1"));
    Ok(())
}

#[test]
fn heartbeat_counts_visible_time_only() -> Result<()> {
    init_logging();
    let browser = Browser::new(backend());
    let (_host, runtime) = browser.runtime(URL, PAGE)?;
    block_on(runtime.start())?;

    browser.clock.advance(Duration::from_secs(15));
    runtime.tick();
    runtime.set_hidden(true);
    browser.clock.advance(Duration::from_secs(45));
    runtime.tick();
    runtime.set_hidden(false);
    browser.clock.advance(Duration::from_secs(16));
    runtime.tick();
    block_on(runtime.flush_idle())?;

    let beats: Vec<Value> = ingested(&browser.transport, "heartbeat")
        .iter()
        .filter_map(|request| request.body.as_ref()?.get("timeOnPageSec").cloned())
        .collect();
    assert_eq!(beats, vec![json!(15), json!(16)]);
    Ok(())
}

#[test]
fn queued_events_keep_the_time_they_happened() -> Result<()> {
    init_logging();
    let browser = Browser::new(backend());
    let (host, runtime) = browser.runtime(URL, PAGE)?;

    browser.clock.advance(Duration::from_secs(2));
    runtime.engagement().on_click(element(&host, "cta")?);
    browser.clock.advance(Duration::from_secs(30));
    block_on(runtime.flush_idle())?;

    let clicks = ingested(&browser.transport, "cta_click");
    assert_eq!(clicks.len(), 1);
    let ts = clicks[0].body.as_ref().and_then(|body| body.get("ts")).cloned();
    assert_eq!(ts, Some(json!(START_MS + 2_000)));
    Ok(())
}

#[test]
fn failed_sends_are_dropped() -> Result<()> {
    init_logging();
    let browser = Browser::new(backend().route("/ingest", MockReply::NetworkError));
    let (host, runtime) = browser.runtime(URL, PAGE)?;
    runtime.engagement().on_click(element(&host, "cta")?);
    assert_eq!(block_on(runtime.flush_idle())?, 0);
    assert_eq!(runtime.engagement().queued(), 0);
    Ok(())
}
