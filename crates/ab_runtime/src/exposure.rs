//! At-most-once exposure reporting per session and slot.

use crate::host::Host;
use crate::host::storage::{read_json, write_json};
use crate::identity::IdentityStore;
use crate::settings::RuntimeSettings;
use crate::slot::SlotKey;
use crate::tracking::{TrackMeta, Tracker};
use crate::variant::VariantAssignment;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExposureOutcome {
    Sent,
    AlreadyRecorded,
    /// Another exposure for this slot has not finished yet.
    InFlight,
    /// Delivery failed; a later pass may retry.
    Failed,
}

/// `sid|slot`, plus `|variant` for variant-scoped slots.
pub fn exposure_key(session_id: &str, slot: SlotKey, variant: &str) -> String {
    if slot.is_variant_scoped() {
        format!("{session_id}|{slot}|{variant}")
    } else {
        format!("{session_id}|{slot}")
    }
}

/// Stored keys that belong to `session_id`.
pub fn current_session_keys(stored: Vec<String>, session_id: &str) -> Vec<String> {
    let prefix = format!("{session_id}|");
    stored
        .into_iter()
        .filter(|key| key.starts_with(&prefix))
        .collect()
}

pub struct ExposureTracker {
    host: Rc<Host>,
    settings: Rc<RuntimeSettings>,
    identity: Rc<IdentityStore>,
    tracker: Rc<Tracker>,
    pending: RefCell<BTreeSet<SlotKey>>,
    recorded: RefCell<BTreeSet<String>>,
}

impl ExposureTracker {
    pub fn new(
        host: Rc<Host>,
        settings: Rc<RuntimeSettings>,
        identity: Rc<IdentityStore>,
        tracker: Rc<Tracker>,
    ) -> Self {
        Self {
            host,
            settings,
            identity,
            tracker,
            pending: RefCell::new(BTreeSet::new()),
            recorded: RefCell::new(BTreeSet::new()),
        }
    }

    pub async fn track_exposure_once(&self, slot: SlotKey, assignment: &VariantAssignment) -> ExposureOutcome {
        let session_id = self.identity.session_id();
        let key = exposure_key(&session_id, slot, &assignment.variant);
        if self.pending.borrow().contains(&slot) {
            return ExposureOutcome::InFlight;
        }
        if self.is_recorded(&key) {
            return ExposureOutcome::AlreadyRecorded;
        }
        self.pending.borrow_mut().insert(slot);
        let delivered = self
            .tracker
            .track("exposure", slot, &TrackMeta::with_variant(&assignment.variant))
            .await;
        self.pending.borrow_mut().remove(&slot);
        if !delivered {
            return ExposureOutcome::Failed;
        }
        self.commit(&session_id, key);
        ExposureOutcome::Sent
    }

    fn persisted(&self) -> Vec<String> {
        match read_json(self.host.local.as_ref(), &self.settings.exposed_key()) {
            Ok(keys) => keys.unwrap_or_default(),
            Err(err) => {
                log::debug!("exposure record unreadable: {err}");
                Vec::new()
            }
        }
    }

    fn is_recorded(&self, key: &str) -> bool {
        self.recorded.borrow().contains(key) || self.persisted().iter().any(|stored| stored == key)
    }

    /// Persist `key`, dropping records of earlier sessions that can never match again.
    fn commit(&self, session_id: &str, key: String) {
        let mut stored = current_session_keys(self.persisted(), session_id);
        if !stored.contains(&key) {
            stored.push(key.clone());
        }
        if let Err(err) = write_json(self.host.local.as_ref(), &self.settings.exposed_key(), &stored) {
            log::debug!("exposure record not persisted: {err}");
        }
        self.recorded.borrow_mut().insert(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_homepage_buttons_key_on_variant() {
        assert_eq!(
            exposure_key("sid_1", SlotKey::HomepageButtons, "B"),
            "sid_1|homepage_buttons|B"
        );
        assert_eq!(exposure_key("sid_1", SlotKey::NavCta, "B"), "sid_1|nav_cta");
    }

    #[test]
    fn earlier_sessions_are_pruned() {
        let stored = vec![
            String::from("sid_old|nav_cta"),
            String::from("sid_new|nav_cta"),
            String::from("sid_new_2|hero_headline"),
            String::from("sid_new|homepage_buttons|B"),
        ];
        assert_eq!(
            current_session_keys(stored, "sid_new"),
            vec![
                String::from("sid_new|nav_cta"),
                String::from("sid_new|homepage_buttons|B")
            ]
        );
    }
}
