//! Loads a page, runs the slot experiment runtime on it, replays the interactions in
//! `AB_INTERACTIONS` and prints the resulting HTML.
//!
//! Usage: `ab_runner <url-or-path>`
//!
//! Environment: `AB_VIEWPORT_WIDTH`, `AB_REFERRER`, `AB_STATE_FILE` (JSON file used as
//! durable local storage) and the `AB_*` runtime settings.

use ab_runtime::host::{
    CookieJar, Host, HttpTransport, JsonFileStore, KeyValueStore, MemoryCookieJar, PageEnv,
};
use ab_runtime::{RuntimeSettings, SlotRuntime};
use anyhow::{Error, anyhow};
use core::time::Duration;
use interactions::{Interaction, parse_script};
use log::info;
use page_dom::{Document, NodeId};
use std::env;
use std::path::Path;
use std::rc::Rc;
use url::Url;

mod interactions;

/// Time given to fire-and-forget beacons before the process exits.
const BEACON_GRACE: Duration = Duration::from_millis(500);

fn main() -> Result<(), Error> {
    env_logger::init();

    let target = env::args()
        .nth(1)
        .ok_or_else(|| anyhow!("usage: ab_runner <url-or-path>"))?;
    let url = page_url(&target)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let html = runtime.block_on(run(url))?;
    println!("{html}");
    Ok(())
}

/// Accept absolute URLs or filesystem paths.
fn page_url(target: &str) -> Result<Url, Error> {
    if let Ok(url) = Url::parse(target) {
        return Ok(url);
    }
    let path = Path::new(target);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()?.join(path)
    };
    Url::from_file_path(&absolute).map_err(|()| anyhow!("invalid page path {}", absolute.display()))
}

async fn fetch_page(url: &Url) -> Result<String, Error> {
    match url.scheme() {
        "http" | "https" => {
            let response = reqwest::get(url.clone())
                .await
                .map_err(|err| anyhow!("Failed to fetch URL {url}: {err}"))?;
            if !response.status().is_success() {
                return Err(anyhow!(
                    "Failed to fetch URL: {} (Status: {})",
                    url,
                    response.status()
                ));
            }
            Ok(response.text().await?)
        }
        "file" => {
            let path = url
                .to_file_path()
                .map_err(|()| anyhow!("Invalid file path for file url: {url}"))?;
            Ok(tokio::fs::read_to_string(path).await?)
        }
        _ => Err(anyhow!("Unsupported url scheme {}", url.scheme())),
    }
}

fn build_host(url: Url, html: &str) -> Result<Rc<Host>, Error> {
    let mut page = PageEnv::new(url);
    if let Some(width) = env::var("AB_VIEWPORT_WIDTH")
        .ok()
        .and_then(|raw| raw.trim().parse::<u32>().ok())
    {
        page = page.with_viewport_width(width);
    }
    if let Ok(referrer) = env::var("AB_REFERRER") {
        page = page.with_referrer(referrer.trim());
    }

    let cookies: Rc<dyn CookieJar> = Rc::new(MemoryCookieJar::new());
    let transport = Rc::new(HttpTransport::new(Rc::clone(&cookies)));
    let mut host = Host::new(Document::parse(html), page, transport).with_cookies(cookies);
    if let Ok(path) = env::var("AB_STATE_FILE") {
        let store: Rc<dyn KeyValueStore> = Rc::new(JsonFileStore::open(path.trim())?);
        host = host.with_local_storage(store);
    }
    Ok(Rc::new(host))
}

fn find(host: &Host, selector: &str) -> Result<NodeId, Error> {
    let doc = host.document.borrow();
    doc.query_selector(doc.root(), selector)
        .ok_or_else(|| anyhow!("no element matches {selector:?}"))
}

async fn replay(
    runtime: &SlotRuntime,
    host: &Host,
    settings: &RuntimeSettings,
    step: Interaction,
) -> Result<(), Error> {
    match step {
        Interaction::Click(selector) => {
            let target = find(host, &selector)?;
            let tracked = runtime.dispatch_click(target).await;
            info!("click {selector}: slot tracking {tracked:?}");
        }
        Interaction::Focus(selector) => runtime.dispatch_focus_in(find(host, &selector)?),
        Interaction::Submit(selector) => runtime.dispatch_submit(find(host, &selector)?),
        Interaction::Scroll { top, height, viewport } => {
            runtime.dispatch_scroll(top, height, viewport);
            tokio::time::sleep(settings.scroll_debounce()).await;
            runtime.tick();
        }
        Interaction::Insert { selector, html } => {
            let parent = find(host, &selector)?;
            host.document.borrow_mut().append_html(parent, &html)?;
            let report = runtime.process_mutations().await;
            info!("insert into {selector}: {report:?}");
        }
        Interaction::Hide => runtime.set_hidden(true),
        Interaction::Show => runtime.set_hidden(false),
        Interaction::Tick => runtime.tick(),
    }
    let sent = runtime.flush_idle().await;
    if sent > 0 {
        info!("flushed {sent} engagement event(s)");
    }
    Ok(())
}

async fn run(url: Url) -> Result<String, Error> {
    let html = fetch_page(&url).await?;
    let settings = RuntimeSettings::from_env();
    let script = parse_script(&env::var("AB_INTERACTIONS").unwrap_or_default())?;
    let host = build_host(url, &html)?;
    let runtime = SlotRuntime::new(Rc::clone(&host), settings.clone());

    let report = runtime.start().await;
    info!("initial pass: {report:?}");
    for step in script {
        replay(&runtime, &host, &settings, step).await?;
    }
    tokio::time::sleep(BEACON_GRACE).await;

    let output = host.document.borrow().serialize();
    Ok(output)
}
