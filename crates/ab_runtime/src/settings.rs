//! Runtime settings for the slot experiment runtime.
//!
//! Settings cover the backend endpoints, the storage namespace, timing knobs of the
//! engagement pipeline and the built-in selector catalog and alias table. They can be
//! constructed programmatically or loaded from environment variables.

use crate::slot::SlotKey;
use core::time::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use url::Url;

/// Runtime configuration shared by every component of a page session.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeSettings {
    /// Site code sent with every request (for example `DHF`).
    pub site: String,
    /// Base path or absolute URL of the experimentation service.
    pub base_endpoint: String,
    /// Path or absolute URL of the engagement ingest endpoint.
    pub ingest_endpoint: String,
    /// Test id attached to variant and track requests.
    pub test_id: String,
    /// Prefix for every persisted key and cookie name.
    pub storage_prefix: String,
    /// Overrides the `<site>` part of `<site>_<slot>` scopes.
    pub scope_prefix: Option<String>,
    /// Viewports at or below this width count as mobile.
    pub mobile_breakpoint_px: u32,
    /// Config TTL used when the server omits `ttlSeconds`.
    pub default_config_ttl_secs: u64,
    /// Lifetime of persisted variant assignments.
    pub variant_ttl_secs: u64,
    /// Heartbeat interval.
    pub heartbeat_secs: u64,
    /// Quiet period before a scroll burst is measured.
    pub scroll_debounce_ms: u64,
    /// Scroll depth milestones in percent, ascending.
    pub scroll_thresholds: Vec<u8>,
    /// CTA clicks allowed per window.
    pub cta_rate_limit: u32,
    /// Length of the CTA rate window.
    pub cta_rate_window_secs: u64,
    /// Name of the UI event dispatched for a server `show_form` action.
    pub show_form_event: String,
    /// Slot selector catalog used by configured-selector discovery.
    pub selectors: BTreeMap<SlotKey, Vec<String>>,
    /// Non-canonical slot names mapped onto canonical slots.
    pub aliases: BTreeMap<String, SlotKey>,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self::new("DHF")
    }
}

fn default_selectors() -> BTreeMap<SlotKey, Vec<String>> {
    let table: [(SlotKey, &[&str]); 8] = [
        (
            SlotKey::HeroHeadline,
            &[".hero h1", "[data-hero] h1", "header h1"],
        ),
        (
            SlotKey::NavCta,
            &["nav a.nav-cta", "header .nav-cta", "nav a.cta", "nav .btn-primary"],
        ),
        (
            SlotKey::HomepageButtons,
            &[
                ".hero a.btn",
                ".hero button.btn",
                "a.btn-primary",
                "button.btn-primary",
                "a.cta-button",
            ],
        ),
        (
            SlotKey::BlogMidSegue,
            &[".blog-mid-segue", "article .segue", "[data-blog-segue]"],
        ),
        (
            SlotKey::BlogEndCta,
            &[".blog-end-cta", "article .cta", "article a.btn"],
        ),
        (
            SlotKey::FormNext,
            &["form .next-step", "form button.next", "[data-step-next]"],
        ),
        (
            SlotKey::FormSubmit,
            &["form button[type=submit]", "form input[type=submit]"],
        ),
        (
            SlotKey::LeadAnchor,
            &["a[href*='#lead']", "a[href*='#form']", "a.lead-anchor"],
        ),
    ];
    table
        .into_iter()
        .map(|(slot, selectors)| {
            (
                slot,
                selectors.iter().map(|selector| (*selector).to_owned()).collect(),
            )
        })
        .collect()
}

fn default_aliases() -> BTreeMap<String, SlotKey> {
    [
        ("primary_cta", SlotKey::HomepageButtons),
        ("primary_button", SlotKey::HomepageButtons),
        ("hero_cta", SlotKey::HomepageButtons),
        ("homepage_cta", SlotKey::HomepageButtons),
        ("headline", SlotKey::HeroHeadline),
        ("hero_title", SlotKey::HeroHeadline),
        ("nav_button", SlotKey::NavCta),
        ("header_cta", SlotKey::NavCta),
        ("blog_segue", SlotKey::BlogMidSegue),
        ("mid_segue", SlotKey::BlogMidSegue),
        ("blog_cta", SlotKey::BlogEndCta),
        ("end_cta", SlotKey::BlogEndCta),
        ("next_step", SlotKey::FormNext),
        ("form_continue", SlotKey::FormNext),
        ("submit", SlotKey::FormSubmit),
        ("form_complete", SlotKey::FormSubmit),
        ("lead_link", SlotKey::LeadAnchor),
    ]
    .into_iter()
    .map(|(alias, slot)| (alias.to_owned(), slot))
    .collect()
}

fn env_parse<T: core::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|val| val.trim().parse::<T>().ok())
}

fn env_string(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|val| val.trim().to_owned())
        .filter(|val| !val.is_empty())
}

/// Parse a comma list like `25,50,75` into sorted, deduplicated percentages.
pub fn parse_thresholds(raw: &str) -> Vec<u8> {
    let mut thresholds: Vec<u8> = raw
        .split(',')
        .filter_map(|part| part.trim().parse::<u8>().ok())
        .filter(|pct| (1..=100).contains(pct))
        .collect();
    thresholds.sort_unstable();
    thresholds.dedup();
    thresholds
}

impl RuntimeSettings {
    /// Construct settings for `site` with the built-in defaults.
    #[must_use]
    pub fn new(site: &str) -> Self {
        Self {
            site: site.to_owned(),
            base_endpoint: String::from("/api/mesh/015-a-b-test-accelerator"),
            ingest_endpoint: String::from("/api/mesh/038-engagement-router/ingest"),
            test_id: String::from("ab015"),
            storage_prefix: String::from("ab015"),
            scope_prefix: None,
            mobile_breakpoint_px: 860,
            default_config_ttl_secs: 300,
            variant_ttl_secs: 24 * 60 * 60,
            heartbeat_secs: 15,
            scroll_debounce_ms: 200,
            scroll_thresholds: vec![25, 50, 75],
            cta_rate_limit: 10,
            cta_rate_window_secs: 60,
            show_form_event: String::from("ab:showLeadForm"),
            selectors: default_selectors(),
            aliases: default_aliases(),
        }
    }

    /// Load settings from environment variables on top of the defaults.
    ///
    /// Reads `AB_SITE`, `AB_BASE_ENDPOINT`, `AB_INGEST_ENDPOINT`, `AB_TEST_ID`,
    /// `AB_STORAGE_PREFIX`, `AB_MOBILE_BREAKPOINT_PX`, `AB_DEFAULT_CONFIG_TTL_SECS`,
    /// `AB_VARIANT_TTL_SECS`, `AB_HEARTBEAT_SECS`, `AB_CTA_RATE_LIMIT`,
    /// `AB_CTA_RATE_WINDOW_SECS`, `AB_SCROLL_THRESHOLDS` and `AB_SHOW_FORM_EVENT`.
    /// Unparseable values keep their default.
    #[must_use]
    pub fn from_env() -> Self {
        let mut settings = env_string("AB_SITE").map_or_else(Self::default, |site| Self::new(&site));
        if let Some(val) = env_string("AB_BASE_ENDPOINT") {
            settings.base_endpoint = val;
        }
        if let Some(val) = env_string("AB_INGEST_ENDPOINT") {
            settings.ingest_endpoint = val;
        }
        if let Some(val) = env_string("AB_TEST_ID") {
            settings.test_id = val;
        }
        if let Some(val) = env_string("AB_STORAGE_PREFIX") {
            settings.storage_prefix = val;
        }
        if let Some(val) = env_parse::<u32>("AB_MOBILE_BREAKPOINT_PX") {
            settings.mobile_breakpoint_px = val;
        }
        if let Some(val) = env_parse::<u64>("AB_DEFAULT_CONFIG_TTL_SECS") {
            settings.default_config_ttl_secs = val;
        }
        if let Some(val) = env_parse::<u64>("AB_VARIANT_TTL_SECS") {
            settings.variant_ttl_secs = val;
        }
        if let Some(val) = env_parse::<u64>("AB_HEARTBEAT_SECS") {
            settings.heartbeat_secs = val.max(1);
        }
        if let Some(val) = env_parse::<u32>("AB_CTA_RATE_LIMIT") {
            settings.cta_rate_limit = val;
        }
        if let Some(val) = env_parse::<u64>("AB_CTA_RATE_WINDOW_SECS") {
            settings.cta_rate_window_secs = val;
        }
        if let Some(val) = env_string("AB_SCROLL_THRESHOLDS") {
            let thresholds = parse_thresholds(&val);
            if !thresholds.is_empty() {
                settings.scroll_thresholds = thresholds;
            }
        }
        if let Some(val) = env_string("AB_SHOW_FORM_EVENT") {
            settings.show_form_event = val;
        }
        settings
    }

    // -----------------------
    // Persisted key names
    // -----------------------

    pub fn session_cookie(&self) -> String {
        format!("{}_sid", self.storage_prefix)
    }

    pub fn visitor_key(&self) -> String {
        format!("{}_vid", self.storage_prefix)
    }

    pub fn bucket_key(&self) -> String {
        format!("{}_bucket", self.storage_prefix)
    }

    pub fn config_key(&self) -> String {
        format!("{}_config_{}", self.storage_prefix, self.site)
    }

    pub fn variants_key(&self) -> String {
        format!("{}_variants_{}", self.storage_prefix, self.site)
    }

    pub fn exposed_key(&self) -> String {
        format!("{}_exposed_{}", self.storage_prefix, self.site)
    }

    pub fn correlation_key(&self) -> String {
        format!("{}_correlation_{}", self.storage_prefix, self.site)
    }

    pub fn form_start_key(&self) -> String {
        format!("{}_form_start", self.storage_prefix)
    }

    pub fn show_form_key(&self) -> String {
        format!("{}_show_form", self.storage_prefix)
    }

    /// First-visit flag shared with other scripts on the site.
    pub fn seen_key(&self) -> &'static str {
        "ab_seen"
    }

    // -----------------------
    // Derived values
    // -----------------------

    /// Backend scope of a slot: `<site lowercase>_<slot>`.
    pub fn scope_for(&self, slot: SlotKey) -> String {
        let prefix = self
            .scope_prefix
            .clone()
            .unwrap_or_else(|| self.site.to_ascii_lowercase());
        format!("{prefix}_{}", slot.as_str())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    pub fn cta_rate_window(&self) -> Duration {
        Duration::from_secs(self.cta_rate_window_secs)
    }

    pub fn scroll_debounce(&self) -> Duration {
        Duration::from_millis(self.scroll_debounce_ms)
    }

    /// Resolve `<base_endpoint>/<name>` against the page location.
    pub fn service_url(&self, location: &Url, name: &str) -> Option<Url> {
        let base = self.base_endpoint.trim_end_matches('/');
        location.join(&format!("{base}/{name}")).ok()
    }

    /// Resolve the ingest endpoint against the page location.
    pub fn ingest_url(&self, location: &Url) -> Option<Url> {
        location.join(&self.ingest_endpoint).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_by_prefix_and_site() {
        let settings = RuntimeSettings::new("DHF");
        assert_eq!(settings.session_cookie(), "ab015_sid");
        assert_eq!(settings.config_key(), "ab015_config_DHF");
        assert_eq!(settings.exposed_key(), "ab015_exposed_DHF");
        assert_eq!(settings.scope_for(SlotKey::HomepageButtons), "dhf_homepage_buttons");
    }

    #[test]
    fn scope_prefix_override_wins() {
        let mut settings = RuntimeSettings::new("DHF");
        settings.scope_prefix = Some(String::from("gfsr"));
        assert_eq!(settings.scope_for(SlotKey::NavCta), "gfsr_nav_cta");
    }

    #[test]
    fn service_urls_resolve_against_page() {
        let settings = RuntimeSettings::default();
        let page = Url::parse("https://example.com/blog/post?x=1").ok();
        let url = page.and_then(|page| settings.service_url(&page, "variant"));
        assert_eq!(
            url.map(String::from).as_deref(),
            Some("https://example.com/api/mesh/015-a-b-test-accelerator/variant")
        );
    }

    #[test]
    fn thresholds_parse_sorted_and_bounded() {
        assert_eq!(parse_thresholds("75, 25,x,50,25,0,101"), vec![25, 50, 75]);
    }

    #[test]
    fn settings_round_trip_through_json_with_defaults() {
        let parsed: Result<RuntimeSettings, _> =
            serde_json::from_str(r#"{"site":"GF","aliases":{"cta":"homepage_buttons"}}"#);
        let parsed = parsed.unwrap_or_default();
        assert_eq!(parsed.site, "GF");
        assert_eq!(parsed.mobile_breakpoint_px, 860);
        assert_eq!(parsed.aliases.get("cta"), Some(&SlotKey::HomepageButtons));
        assert!(parsed.selectors.contains_key(&SlotKey::HeroHeadline));
    }
}
