//! Slot event delivery to the `track` endpoint.

use crate::config_cache::ConfigCache;
use crate::host::Host;
use crate::identity::IdentityStore;
use crate::page_context::{PageContextProvider, RequestContext};
use crate::settings::RuntimeSettings;
use crate::slot::SlotKey;
use crate::variant::VariantResolver;
use serde::Serialize;
use std::rc::Rc;
use tracing::Instrument as _;

/// Caller supplied details of one slot event.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackMeta {
    /// Variant to report instead of the resolved one.
    pub variant: Option<String>,
    /// Step index to report instead of the one probed from page globals.
    pub step_index: Option<String>,
}

impl TrackMeta {
    #[must_use]
    pub fn with_variant(variant: &str) -> Self {
        Self {
            variant: Some(variant.to_owned()),
            step_index: None,
        }
    }
}

/// Body of a `track` request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TrackPayload {
    pub bucket: String,
    pub scope: String,
    pub variant: String,
    pub event: String,
    pub site: String,
    pub test_id: String,
    #[serde(flatten)]
    pub context: RequestContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

pub struct Tracker {
    host: Rc<Host>,
    settings: Rc<RuntimeSettings>,
    identity: Rc<IdentityStore>,
    context: Rc<PageContextProvider>,
    variants: Rc<VariantResolver>,
    config: Rc<ConfigCache>,
}

impl Tracker {
    pub fn new(
        host: Rc<Host>,
        settings: Rc<RuntimeSettings>,
        identity: Rc<IdentityStore>,
        context: Rc<PageContextProvider>,
        variants: Rc<VariantResolver>,
        config: Rc<ConfigCache>,
    ) -> Self {
        Self {
            host,
            settings,
            identity,
            context,
            variants,
            config,
        }
    }

    /// Variant to report for `slot`: the caller's, the resolved assignment, then the
    /// config assigned variant.
    pub fn variant_for(&self, slot: SlotKey, meta: &TrackMeta) -> Option<String> {
        meta.variant
            .clone()
            .filter(|variant| !variant.is_empty())
            .or_else(|| self.variants.cached(slot).map(|assignment| assignment.variant))
            .or_else(|| {
                self.config
                    .peek()
                    .and_then(|config| config.assigned_variant(slot).map(str::to_owned))
            })
    }

    pub fn payload(&self, event: &str, slot: SlotKey, meta: &TrackMeta) -> Option<TrackPayload> {
        let variant = self.variant_for(slot, meta)?;
        let mut context = self.context.current();
        if let Some(step) = meta.step_index.as_ref().filter(|step| !step.trim().is_empty()) {
            context.step_index.clone_from(step);
        }
        let correlation_id = self
            .variants
            .cached(slot)
            .and_then(|assignment| assignment.correlation_id)
            .or_else(|| self.variants.correlation_id());
        Some(TrackPayload {
            bucket: self.identity.bucket_id(),
            scope: self.settings.scope_for(slot),
            variant,
            event: event.to_owned(),
            site: self.settings.site.clone(),
            test_id: self.settings.test_id.clone(),
            context,
            correlation_id,
        })
    }

    /// Send `event` for `slot`. True once delivery is confirmed: a queued beacon or a
    /// 2xx answer. Events for slots without a known variant are dropped.
    pub async fn track(&self, event: &str, slot: SlotKey, meta: &TrackMeta) -> bool {
        let Some(payload) = self.payload(event, slot, meta) else {
            log::debug!("{event} on {slot} dropped: no variant");
            return false;
        };
        let Some(url) = self.settings.service_url(self.host.page.location(), "track") else {
            return false;
        };
        let body = match serde_json::to_value(&payload) {
            Ok(body) => body,
            Err(err) => {
                log::warn!("track payload not serializable: {err}");
                return false;
            }
        };
        if self.host.transport.send_beacon(url.clone(), body.clone()) {
            return true;
        }
        let span = tracing::info_span!("track.send", event, slot = slot.as_str());
        match self.host.transport.post_json(url, body).instrument(span).await {
            Ok(response) if response.ok() => true,
            Ok(response) => {
                log::debug!("{event} on {slot} rejected with status {}", response.status);
                false
            }
            Err(err) => {
                log::debug!("{event} on {slot} failed: {err}");
                false
            }
        }
    }

    /// Report a finished lead flow against `form_submit`.
    pub async fn track_completion(&self, meta: &TrackMeta) -> bool {
        self.track("completion", SlotKey::FormSubmit, meta).await
    }
}
