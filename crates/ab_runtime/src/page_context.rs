//! Request context dimensions attached to variant and track requests.

use crate::host::{Host, KeyValueStore, PageEnv};
use crate::settings::RuntimeSettings;
use once_cell::unsync::OnceCell;
use serde::Serialize;
use serde_json::Value;
use std::rc::Rc;
use url::Url;

/// Globals page script uses to publish the current lead-flow step.
pub const STEP_INDEX_GLOBALS: [&str; 5] = [
    "stepIndex",
    "step_index",
    "leadStep",
    "leadStepIndex",
    "currentStep",
];

/// Referrer hosts with one of these labels count as search engines.
const SEARCH_LABELS: &[&str] = &["google", "bing", "yahoo", "duckduckgo", "baidu", "yandex", "ecosia"];

const SOCIAL_LABELS: &[&str] = &[
    "facebook", "instagram", "twitter", "linkedin", "reddit", "pinterest", "tiktok", "youtube",
];

/// Short social domains matched as the host or one of its parents.
const SOCIAL_DOMAINS: &[&str] = &["t.co", "x.com", "lnkd.in", "fb.me"];

const CLICK_IDS: [(&str, &str); 5] = [
    ("gclid", "google"),
    ("msclkid", "bing"),
    ("fbclid", "facebook"),
    ("ttclid", "tiktok"),
    ("yclid", "yahoo"),
];

const LEADFLOW_PATH_HINTS: [&str; 5] = ["apply", "lead", "form", "get-started", "eligibility"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageType {
    Home,
    Blog,
    Info,
}

impl PageType {
    /// Classify a pathname: anything under a blog path, then the root or an index page.
    pub fn from_path(path: &str) -> Self {
        let path = path.to_ascii_lowercase();
        if path.contains("blog") {
            Self::Blog
        } else if path == "/" || path.is_empty() || path.ends_with("/index.html") {
            Self::Home
        } else {
            Self::Info
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Blog => "blog",
            Self::Info => "info",
        }
    }
}

/// Step index from the well-known globals: numbers are stringified, blank strings skipped.
pub fn probe_step_index(page: &PageEnv) -> Option<String> {
    STEP_INDEX_GLOBALS.iter().find_map(|name| match page.global(name)? {
        Value::Number(number) => Some(format_number(&number)),
        Value::String(text) if !text.trim().is_empty() => Some(text),
        _ => None,
    })
}

/// Integral floats print without a fraction, matching script stringification.
fn format_number(number: &serde_json::Number) -> String {
    match number.as_f64() {
        Some(float) if number.is_f64() && float.fract() == 0.0 && float.abs() < 1e15 => {
            format!("{float:.0}")
        }
        _ => number.to_string(),
    }
}

pub fn step_index(page: &PageEnv) -> String {
    probe_step_index(page).unwrap_or_else(|| String::from("0"))
}

pub fn funnel_stage(page_type: PageType, path: &str, step: Option<&str>) -> &'static str {
    if page_type == PageType::Blog {
        return "blog";
    }
    let path = path.to_ascii_lowercase();
    if step.is_some() || LEADFLOW_PATH_HINTS.iter().any(|hint| path.contains(hint)) {
        "leadflow"
    } else {
        "info"
    }
}

pub fn device_type(viewport_width: u32, breakpoint_px: u32) -> &'static str {
    if viewport_width <= breakpoint_px {
        "mobile"
    } else {
        "desktop"
    }
}

/// `utm_source`, then known click ids, then the referrer's host class, else `direct`.
pub fn traffic_source(location: &Url, referrer: &str) -> String {
    let params: Vec<(String, String)> = location.query_pairs().into_owned().collect();
    let param = |name: &str| {
        params
            .iter()
            .find(|(key, value)| key == name && !value.is_empty())
            .map(|(_, value)| value.clone())
    };
    if let Some(source) = param("utm_source") {
        return source;
    }
    for (click_id, source) in CLICK_IDS {
        if param(click_id).is_some() {
            return source.to_owned();
        }
    }
    let Some(referrer_host) = Url::parse(referrer)
        .ok()
        .and_then(|url| url.host_str().map(str::to_ascii_lowercase))
    else {
        return String::from("direct");
    };
    if location.host_str().is_some_and(|host| host.eq_ignore_ascii_case(&referrer_host)) {
        return String::from("direct");
    }
    let has_label = |labels: &[&str]| referrer_host.split('.').any(|label| labels.contains(&label));
    let under_domain = |domains: &[&str]| {
        domains.iter().any(|domain| {
            referrer_host == *domain || referrer_host.ends_with(&format!(".{domain}"))
        })
    };
    if has_label(SEARCH_LABELS) {
        String::from("search")
    } else if has_label(SOCIAL_LABELS) || under_domain(SOCIAL_DOMAINS) {
        String::from("social")
    } else {
        String::from("other")
    }
}

/// `new` on the first visit, `returning` afterwards; the flag is first-write-wins.
pub fn visitor_type(local: &dyn KeyValueStore, seen_key: &str) -> &'static str {
    match local.get(seen_key) {
        Ok(Some(_)) => "returning",
        Ok(None) => {
            if let Err(err) = local.set(seen_key, "1") {
                log::debug!("visitor flag not persisted: {err}");
            }
            "new"
        }
        Err(_) => "new",
    }
}

/// Dimensions sent with variant and track requests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RequestContext {
    pub page_type: String,
    pub funnel_stage: String,
    pub step_index: String,
    pub device_type: String,
    pub traffic_source: String,
    pub time_bucket: String,
    pub visitor_type: String,
    pub page_path: String,
}

impl RequestContext {
    /// Query pairs in wire order.
    pub fn query_pairs(&self) -> [(&'static str, &str); 8] {
        [
            ("page_type", self.page_type.as_str()),
            ("funnel_stage", self.funnel_stage.as_str()),
            ("step_index", self.step_index.as_str()),
            ("device_type", self.device_type.as_str()),
            ("traffic_source", self.traffic_source.as_str()),
            ("time_bucket", self.time_bucket.as_str()),
            ("visitor_type", self.visitor_type.as_str()),
            ("page_path", self.page_path.as_str()),
        ]
    }
}

/// Builds a fresh `RequestContext` on demand. The visitor type is decided once per page.
pub struct PageContextProvider {
    host: Rc<Host>,
    mobile_breakpoint_px: u32,
    seen_key: &'static str,
    visitor_type: OnceCell<&'static str>,
}

impl PageContextProvider {
    pub fn new(host: Rc<Host>, settings: &RuntimeSettings) -> Self {
        Self {
            host,
            mobile_breakpoint_px: settings.mobile_breakpoint_px,
            seen_key: settings.seen_key(),
            visitor_type: OnceCell::new(),
        }
    }

    pub fn page_type(&self) -> PageType {
        PageType::from_path(self.host.page.pathname())
    }

    pub fn current(&self) -> RequestContext {
        let page = &self.host.page;
        let page_type = self.page_type();
        let step = probe_step_index(page);
        let visitor = *self
            .visitor_type
            .get_or_init(|| visitor_type(self.host.local.as_ref(), self.seen_key));
        RequestContext {
            page_type: page_type.as_str().to_owned(),
            funnel_stage: funnel_stage(page_type, page.pathname(), step.as_deref()).to_owned(),
            step_index: step.unwrap_or_else(|| String::from("0")),
            device_type: device_type(page.viewport_width(), self.mobile_breakpoint_px).to_owned(),
            traffic_source: traffic_source(page.location(), page.referrer()),
            time_bucket: self.host.clock.local_hour().to_string(),
            visitor_type: visitor.to_owned(),
            page_path: page.path_with_query(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryStore;
    use serde_json::json;

    fn url(raw: &str) -> Url {
        Url::parse(raw).expect("test url")
    }

    #[test]
    fn page_types_follow_path() {
        assert_eq!(PageType::from_path("/"), PageType::Home);
        assert_eq!(PageType::from_path("/en/index.html"), PageType::Home);
        assert_eq!(PageType::from_path("/Blog/debt-tips"), PageType::Blog);
        assert_eq!(PageType::from_path("/about"), PageType::Info);
    }

    #[test]
    fn traffic_source_precedence() {
        let page = url("https://dhf.example/?utm_source=newsletter&gclid=1");
        assert_eq!(traffic_source(&page, "https://www.google.com/"), "newsletter");
        let page = url("https://dhf.example/?msclkid=abc");
        assert_eq!(traffic_source(&page, ""), "bing");
        let page = url("https://dhf.example/apply");
        assert_eq!(traffic_source(&page, "https://www.google.com/search?q=x"), "search");
        assert_eq!(traffic_source(&page, "https://t.co/xyz"), "social");
        assert_eq!(traffic_source(&page, "https://news.example.org/a"), "other");
        assert_eq!(traffic_source(&page, "https://dhf.example/blog"), "direct");
        assert_eq!(traffic_source(&page, ""), "direct");
    }

    #[test]
    fn step_index_probes_globals_in_order() {
        let page = PageEnv::new(url("https://dhf.example/apply"));
        assert_eq!(step_index(&page), "0");
        page.set_global("currentStep", json!("  "));
        assert_eq!(step_index(&page), "0");
        page.set_global("leadStep", json!(3));
        assert_eq!(step_index(&page), "3");
        page.set_global("stepIndex", json!(2.0));
        assert_eq!(step_index(&page), "2");
        page.set_global("stepIndex", json!("review"));
        assert_eq!(step_index(&page), "review");
    }

    #[test]
    fn funnel_and_device_classification() {
        assert_eq!(funnel_stage(PageType::Blog, "/blog/x", Some("2")), "blog");
        assert_eq!(funnel_stage(PageType::Info, "/get-started", None), "leadflow");
        assert_eq!(funnel_stage(PageType::Home, "/", Some("1")), "leadflow");
        assert_eq!(funnel_stage(PageType::Home, "/", None), "info");
        assert_eq!(device_type(860, 860), "mobile");
        assert_eq!(device_type(1024, 860), "desktop");
    }

    #[test]
    fn visitor_flag_is_first_write_wins() {
        let store = MemoryStore::new();
        assert_eq!(visitor_type(&store, "ab_seen"), "new");
        assert_eq!(visitor_type(&store, "ab_seen"), "returning");
        store.set_unavailable(true);
        assert_eq!(visitor_type(&store, "ab_seen"), "new");
    }
}
