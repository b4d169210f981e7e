//! Per-session label configuration with a TTL envelope and request coalescing.

use crate::host::Host;
use crate::host::storage::{read_json, write_json};
use crate::host::transport::Transport;
use crate::identity::{IdentityStore, MIN_ID_LEN};
use crate::settings::RuntimeSettings;
use crate::slot::SlotKey;
use futures::FutureExt as _;
use futures::future::{LocalBoxFuture, Shared};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::Instrument as _;
use url::Url;

type ConfigFetch = Shared<LocalBoxFuture<'static, Option<Value>>>;

/// Label configuration for one session.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub labels: BTreeMap<SlotKey, String>,
    /// Variant the config assigns to `homepage_buttons`.
    pub variant_id: Option<String>,
    pub ttl_seconds: u64,
    pub fetched_at_ms: u64,
    pub data: Value,
}

impl Config {
    /// Build from the response body. Non-object bodies are rejected.
    pub fn from_value(data: Value, default_ttl_secs: u64, fetched_at_ms: u64) -> Option<Self> {
        let object = data.as_object()?;
        let labels = SlotKey::ALL
            .into_iter()
            .filter_map(|slot| {
                object
                    .get(slot.label_key())
                    .and_then(Value::as_str)
                    .filter(|label| !label.trim().is_empty())
                    .map(|label| (slot, label.to_owned()))
            })
            .collect();
        let variant_id = match object.get("variantId") {
            Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
            Some(Value::Number(id)) => Some(id.to_string()),
            _ => None,
        };
        let ttl_seconds = ttl_from(object.get("ttlSeconds")).unwrap_or(default_ttl_secs);
        Some(Self {
            labels,
            variant_id,
            ttl_seconds,
            fetched_at_ms,
            data,
        })
    }

    pub fn label_for(&self, slot: SlotKey) -> Option<&str> {
        self.labels.get(&slot).map(String::as_str)
    }

    /// Variant assigned by the config itself, only defined for `homepage_buttons`.
    pub fn assigned_variant(&self, slot: SlotKey) -> Option<&str> {
        if slot == SlotKey::HomepageButtons {
            self.variant_id.as_deref()
        } else {
            None
        }
    }

    pub fn is_fresh(&self, now_ms: u64) -> bool {
        is_fresh(self.fetched_at_ms, self.ttl_seconds, now_ms)
    }
}

/// Positive TTL in seconds from a number or numeric string.
fn ttl_from(value: Option<&Value>) -> Option<u64> {
    let ttl = match value? {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (ttl.is_finite() && ttl > 0.0).then(|| ttl.round() as u64)
}

fn is_fresh(fetched_at_ms: u64, ttl_seconds: u64, now_ms: u64) -> bool {
    fetched_at_ms > 0 && now_ms.saturating_sub(fetched_at_ms) <= ttl_seconds.saturating_mul(1000)
}

/// Persisted form of a fetched config.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedEnvelope {
    session_id: String,
    data: Value,
    ttl_seconds: u64,
    fetched_at: u64,
}

fn fetch_config(transport: Rc<dyn Transport>, url: Url) -> LocalBoxFuture<'static, Option<Value>> {
    async move {
        let response = match transport.get(url).await {
            Ok(response) => response,
            Err(err) => {
                log::debug!("config request failed: {err}");
                return None;
            }
        };
        if !response.ok() {
            log::debug!("config request returned status {}", response.status);
            return None;
        }
        match response.json::<Value>() {
            Ok(data) if data.is_object() => Some(data),
            Ok(_) => None,
            Err(err) => {
                log::debug!("config body rejected: {err}");
                None
            }
        }
    }
    .instrument(tracing::info_span!("config.fetch"))
    .boxed_local()
}

pub struct ConfigCache {
    host: Rc<Host>,
    settings: Rc<RuntimeSettings>,
    identity: Rc<IdentityStore>,
    memory: RefCell<Option<Config>>,
    in_flight: RefCell<Option<(u64, ConfigFetch)>>,
    generation: Cell<u64>,
}

impl ConfigCache {
    pub fn new(host: Rc<Host>, settings: Rc<RuntimeSettings>, identity: Rc<IdentityStore>) -> Self {
        Self {
            host,
            settings,
            identity,
            memory: RefCell::new(None),
            in_flight: RefCell::new(None),
            generation: Cell::new(0),
        }
    }

    /// Fresh cached config, or the result of the single shared network request.
    /// Every failure resolves to `None`.
    pub async fn get_config(&self) -> Option<Config> {
        let session_id = self.identity.session_id();
        if let Some(config) = self.cached(&session_id) {
            return Some(config);
        }
        if session_id.len() < MIN_ID_LEN {
            return None;
        }
        let (generation, fetch) = self.join_or_start(&session_id)?;
        let data = fetch.await;
        {
            let mut in_flight = self.in_flight.borrow_mut();
            if in_flight.as_ref().is_some_and(|(current, _)| *current == generation) {
                *in_flight = None;
            }
        }
        // A caller that shared the request may find the config already stored.
        if let Some(config) = self.fresh_memory() {
            return Some(config);
        }
        let config = Config::from_value(
            data?,
            self.settings.default_config_ttl_secs,
            self.host.clock.now_ms(),
        )?;
        self.persist(&session_id, &config);
        self.memory.replace(Some(config.clone()));
        Some(config)
    }

    /// Current in-memory config regardless of freshness.
    pub fn peek(&self) -> Option<Config> {
        self.memory.borrow().clone()
    }

    fn fresh_memory(&self) -> Option<Config> {
        let now = self.host.clock.now_ms();
        self.memory
            .borrow()
            .as_ref()
            .filter(|config| config.is_fresh(now))
            .cloned()
    }

    fn cached(&self, session_id: &str) -> Option<Config> {
        if let Some(config) = self.fresh_memory() {
            return Some(config);
        }
        let config = self.read_persisted(session_id)?;
        self.memory.replace(Some(config.clone()));
        Some(config)
    }

    fn read_persisted(&self, session_id: &str) -> Option<Config> {
        let key = self.settings.config_key();
        let envelope: CachedEnvelope = match read_json(self.host.local.as_ref(), &key) {
            Ok(envelope) => envelope?,
            Err(err) => {
                log::debug!("cached config unreadable: {err}");
                return None;
            }
        };
        let now = self.host.clock.now_ms();
        if envelope.session_id != session_id
            || !is_fresh(envelope.fetched_at, envelope.ttl_seconds, now)
        {
            if let Err(err) = self.host.local.remove(&key) {
                log::debug!("stale config not removed: {err}");
            }
            return None;
        }
        let mut config = Config::from_value(
            envelope.data,
            self.settings.default_config_ttl_secs,
            envelope.fetched_at,
        )?;
        config.ttl_seconds = envelope.ttl_seconds;
        Some(config)
    }

    fn persist(&self, session_id: &str, config: &Config) {
        let envelope = CachedEnvelope {
            session_id: session_id.to_owned(),
            data: config.data.clone(),
            ttl_seconds: config.ttl_seconds,
            fetched_at: config.fetched_at_ms,
        };
        if let Err(err) = write_json(self.host.local.as_ref(), &self.settings.config_key(), &envelope) {
            log::debug!("config not persisted: {err}");
        }
    }

    fn join_or_start(&self, session_id: &str) -> Option<(u64, ConfigFetch)> {
        if let Some((generation, fetch)) = self.in_flight.borrow().as_ref() {
            return Some((*generation, fetch.clone()));
        }
        let mut url = self.settings.service_url(self.host.page.location(), "ab-config")?;
        url.query_pairs_mut()
            .append_pair("sessionId", session_id)
            .append_pair("site", &self.settings.site);
        let generation = self.generation.get().wrapping_add(1);
        self.generation.set(generation);
        let fetch = fetch_config(Rc::clone(&self.host.transport), url).shared();
        self.in_flight
            .replace(Some((generation, fetch.clone())));
        Some((generation, fetch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn config_reads_labels_variant_and_ttl() {
        let data = json!({
            "primaryCtaLabel": "Check my options",
            "navCtaLabel": "  ",
            "heroHeadlineText": "Get out of debt",
            "variantId": "B",
            "ttlSeconds": "120"
        });
        let config = Config::from_value(data, 300, 1_000).expect("object body");
        assert_eq!(config.label_for(SlotKey::HomepageButtons), Some("Check my options"));
        assert_eq!(config.label_for(SlotKey::NavCta), None);
        assert_eq!(config.assigned_variant(SlotKey::HomepageButtons), Some("B"));
        assert_eq!(config.assigned_variant(SlotKey::HeroHeadline), None);
        assert_eq!(config.ttl_seconds, 120);
        assert!(Config::from_value(json!(["not", "object"]), 300, 1).is_none());
    }

    #[test]
    fn freshness_uses_strictly_greater_than_ttl() {
        assert!(is_fresh(1_000, 300, 301_000));
        assert!(!is_fresh(1_000, 300, 301_001));
        assert!(!is_fresh(0, 300, 10));
    }

    #[test]
    fn ttl_falls_back_for_missing_or_invalid() {
        assert_eq!(ttl_from(None), None);
        assert_eq!(ttl_from(Some(&json!(0))), None);
        assert_eq!(ttl_from(Some(&json!("abc"))), None);
        assert_eq!(ttl_from(Some(&json!(90))), Some(90));
    }
}
