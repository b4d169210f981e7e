//! Per-slot variant assignment: page memory, persisted cache, then one shared request.

use crate::host::Host;
use crate::host::storage::{read_json, write_json};
use crate::host::transport::Transport;
use crate::identity::IdentityStore;
use crate::page_context::RequestContext;
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

type VariantFetch = Shared<LocalBoxFuture<'static, Option<Value>>>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariantAssignment {
    pub slot: SlotKey,
    pub variant: String,
    pub label: Option<String>,
    pub correlation_id: Option<String>,
}

/// Persisted assignment, keyed by scope.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredVariant {
    variant: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
    stored_at: u64,
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Read an assignment from a variant response. The variant id may be named
/// `variant`, `variant_id` or `id`; the label comes from `meta.label` or `meta.text`.
pub fn parse_assignment(slot: SlotKey, body: &Value) -> Option<VariantAssignment> {
    let variant = ["variant", "variant_id", "id"]
        .into_iter()
        .find_map(|key| non_empty_string(body.get(key)))?;
    let label = body.get("meta").and_then(|meta| {
        ["label", "text"]
            .into_iter()
            .find_map(|key| non_empty_string(meta.get(key)))
    });
    Some(VariantAssignment {
        slot,
        variant,
        label,
        correlation_id: non_empty_string(body.get("correlation_id")),
    })
}

fn fetch_variant(transport: Rc<dyn Transport>, url: Url, slot: SlotKey) -> LocalBoxFuture<'static, Option<Value>> {
    async move {
        match transport.get(url).await {
            Ok(response) if response.ok() => match response.json::<Value>() {
                Ok(body) => Some(body),
                Err(err) => {
                    log::debug!("variant body for {slot} rejected: {err}");
                    None
                }
            },
            Ok(response) => {
                log::debug!("variant request for {slot} returned status {}", response.status);
                None
            }
            Err(err) => {
                log::debug!("variant request for {slot} failed: {err}");
                None
            }
        }
    }
    .instrument(tracing::info_span!("variant.fetch", slot = slot.as_str()))
    .boxed_local()
}

pub struct VariantResolver {
    host: Rc<Host>,
    settings: Rc<RuntimeSettings>,
    identity: Rc<IdentityStore>,
    memory: RefCell<BTreeMap<SlotKey, VariantAssignment>>,
    in_flight: RefCell<BTreeMap<SlotKey, (u64, VariantFetch)>>,
    generation: Cell<u64>,
}

impl VariantResolver {
    pub fn new(host: Rc<Host>, settings: Rc<RuntimeSettings>, identity: Rc<IdentityStore>) -> Self {
        Self {
            host,
            settings,
            identity,
            memory: RefCell::new(BTreeMap::new()),
            in_flight: RefCell::new(BTreeMap::new()),
            generation: Cell::new(0),
        }
    }

    /// Assignment for `slot`, `None` when the service gives no usable answer.
    pub async fn resolve_variant(&self, slot: SlotKey, ctx: &RequestContext) -> Option<VariantAssignment> {
        if let Some(assignment) = self.cached(slot) {
            return Some(assignment);
        }
        if let Some(assignment) = self.read_persisted(slot) {
            self.memory.borrow_mut().insert(slot, assignment.clone());
            return Some(assignment);
        }
        let (generation, fetch) = self.join_or_start(slot, ctx)?;
        let body = fetch.await;
        {
            let mut in_flight = self.in_flight.borrow_mut();
            if in_flight.get(&slot).is_some_and(|(current, _)| *current == generation) {
                in_flight.remove(&slot);
            }
        }
        if let Some(assignment) = self.cached(slot) {
            return Some(assignment);
        }
        let assignment = parse_assignment(slot, &body?)?;
        if let Some(correlation_id) = &assignment.correlation_id {
            if let Err(err) = self.host.local.set(&self.settings.correlation_key(), correlation_id) {
                log::debug!("correlation id not persisted: {err}");
            }
        }
        self.persist(&assignment);
        self.memory.borrow_mut().insert(slot, assignment.clone());
        Some(assignment)
    }

    /// Assignment already resolved during this page life.
    pub fn cached(&self, slot: SlotKey) -> Option<VariantAssignment> {
        self.memory.borrow().get(&slot).cloned()
    }

    /// Last correlation id handed out by the service.
    pub fn correlation_id(&self) -> Option<String> {
        self.host
            .local
            .get(&self.settings.correlation_key())
            .ok()
            .flatten()
            .filter(|id| !id.is_empty())
    }

    fn read_all(&self) -> BTreeMap<String, StoredVariant> {
        match read_json(self.host.local.as_ref(), &self.settings.variants_key()) {
            Ok(stored) => stored.unwrap_or_default(),
            Err(err) => {
                log::debug!("variant cache unreadable: {err}");
                BTreeMap::new()
            }
        }
    }

    fn read_persisted(&self, slot: SlotKey) -> Option<VariantAssignment> {
        let stored = self.read_all().remove(&self.settings.scope_for(slot))?;
        let age_ms = self.host.clock.now_ms().saturating_sub(stored.stored_at);
        if age_ms > self.settings.variant_ttl_secs.saturating_mul(1000) {
            return None;
        }
        Some(VariantAssignment {
            slot,
            variant: stored.variant,
            label: stored.label,
            correlation_id: stored.correlation_id,
        })
    }

    fn persist(&self, assignment: &VariantAssignment) {
        let mut all = self.read_all();
        all.insert(
            self.settings.scope_for(assignment.slot),
            StoredVariant {
                variant: assignment.variant.clone(),
                label: assignment.label.clone(),
                correlation_id: assignment.correlation_id.clone(),
                stored_at: self.host.clock.now_ms(),
            },
        );
        if let Err(err) = write_json(self.host.local.as_ref(), &self.settings.variants_key(), &all) {
            log::debug!("variant cache not persisted: {err}");
        }
    }

    fn join_or_start(&self, slot: SlotKey, ctx: &RequestContext) -> Option<(u64, VariantFetch)> {
        if let Some((generation, fetch)) = self.in_flight.borrow().get(&slot) {
            return Some((*generation, fetch.clone()));
        }
        let mut url = self.settings.service_url(self.host.page.location(), "variant")?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("bucket", &self.identity.bucket_id())
                .append_pair("scope", &self.settings.scope_for(slot))
                .append_pair("site", &self.settings.site)
                .append_pair("test_id", &self.settings.test_id);
            for (name, value) in ctx.query_pairs() {
                query.append_pair(name, value);
            }
            if let Some(correlation_id) = self.correlation_id() {
                query.append_pair("correlation_id", &correlation_id);
            }
        }
        let generation = self.generation.get().wrapping_add(1);
        self.generation.set(generation);
        let fetch = fetch_variant(Rc::clone(&self.host.transport), url, slot).shared();
        self.in_flight
            .borrow_mut()
            .insert(slot, (generation, fetch.clone()));
        Some((generation, fetch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn response_field_fallbacks() {
        let assignment = parse_assignment(
            SlotKey::NavCta,
            &json!({"variant_id": "B", "meta": {"text": "Apply now"}, "correlation_id": "c-1"}),
        );
        assert_eq!(
            assignment,
            Some(VariantAssignment {
                slot: SlotKey::NavCta,
                variant: String::from("B"),
                label: Some(String::from("Apply now")),
                correlation_id: Some(String::from("c-1")),
            })
        );
        let numeric = parse_assignment(SlotKey::NavCta, &json!({"id": 7, "meta": {"label": ""}}));
        assert_eq!(numeric.map(|a| (a.variant, a.label)), Some((String::from("7"), None)));
        assert!(parse_assignment(SlotKey::NavCta, &json!({"meta": {"label": "x"}})).is_none());
    }
}
