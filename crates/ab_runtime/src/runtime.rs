//! Page-level orchestration: discover, resolve, apply, track, then keep watching.

use crate::context::SessionContext;
use crate::discovery::DiscoveryPipeline;
use crate::engagement::{EngagementPipeline, ScrollSample};
use crate::exposure::ExposureOutcome;
use crate::host::Host;
use crate::interaction;
use crate::label::{LabelOutcome, apply_label};
use crate::settings::RuntimeSettings;
use crate::slot::{SlotKey, SlotMap, canonicalize};
use crate::tracking::TrackMeta;
use crate::variant::VariantAssignment;
use crate::watcher::DomWatcher;
use futures::future::join_all;
use page_dom::NodeId;
use std::cell::Cell;
use std::rc::Rc;
use tracing::Instrument as _;

/// What one pass over a set of slots did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PassReport {
    pub slots: Vec<SlotKey>,
    pub labels_applied: usize,
    pub elements_bound: usize,
    pub exposures_sent: usize,
}

pub struct SlotRuntime {
    session: Rc<SessionContext>,
    watcher: DomWatcher,
    engagement: EngagementPipeline,
    started: Cell<bool>,
}

impl SlotRuntime {
    pub fn new(host: Rc<Host>, settings: RuntimeSettings) -> Self {
        let session = Rc::new(SessionContext::new(host, settings));
        let watcher = DomWatcher::new(&session.settings);
        let engagement = EngagementPipeline::new(
            Rc::clone(&session.host),
            Rc::clone(&session.settings),
            Rc::clone(&session.identity),
        );
        Self {
            session,
            watcher,
            engagement,
            started: Cell::new(false),
        }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn engagement(&self) -> &EngagementPipeline {
        &self.engagement
    }

    /// Run the page-ready sequence once: engagement start alongside the initial slot
    /// pass, then begin recording DOM insertions.
    pub async fn start(&self) -> PassReport {
        if self.started.replace(true) {
            return PassReport::default();
        }
        let (_, report) = futures::join!(self.engagement.start(), self.run_initial_pass());
        self.session.host.document.borrow_mut().observe(true);
        log::info!(
            "slot runtime started: {} slot(s), {} label(s), {} exposure(s)",
            report.slots.len(),
            report.labels_applied,
            report.exposures_sent
        );
        report
    }

    async fn run_initial_pass(&self) -> PassReport {
        let span = tracing::info_span!("slots.start");
        let found = {
            let _entered = span.enter();
            let pipeline = DiscoveryPipeline::full(&self.session.settings, self.session.page.page_type());
            let mut doc = self.session.host.document.borrow_mut();
            let body = doc.body();
            pipeline.discover(&mut doc, body)
        };
        self.run_slots(&found).instrument(span).await
    }

    /// Scan DOM insertions recorded since the last call and run the pipeline for the
    /// slots they touched.
    pub async fn process_mutations(&self) -> PassReport {
        let found = {
            let mut doc = self.session.host.document.borrow_mut();
            self.watcher.collect(&mut doc)
        };
        if found.is_empty() {
            return PassReport::default();
        }
        self.run_slots(&found)
            .instrument(tracing::info_span!("slots.mutations"))
            .await
    }

    /// Merge `found` into the index, then resolve, apply, bind and expose the touched slots.
    async fn run_slots(&self, found: &SlotMap) -> PassReport {
        let slots = self.session.slots.borrow_mut().merge(found);
        if slots.is_empty() {
            return PassReport::default();
        }
        let ctx = self.session.page.current();
        let variants = &self.session.variants;
        let (config, assignments) = futures::join!(
            self.session.config.get_config(),
            join_all(slots.iter().map(|slot| variants.resolve_variant(*slot, &ctx)))
        );

        let mut report = PassReport {
            slots: slots.clone(),
            ..PassReport::default()
        };
        let mut exposures: Vec<(SlotKey, VariantAssignment)> = Vec::new();
        for (slot, assignment) in slots.iter().copied().zip(assignments) {
            let Some(assignment) = assignment else {
                log::debug!("{slot}: no variant, leaving untouched");
                continue;
            };
            let label = assignment
                .label
                .clone()
                .or_else(|| config.as_ref().and_then(|cfg| cfg.label_for(slot).map(str::to_owned)));
            let live = {
                let mut doc = self.session.host.document.borrow_mut();
                let live = self.session.slots.borrow().live_elements(slot, &doc);
                if let Some(label) = &label {
                    for element in &live {
                        if apply_label(&mut doc, *element, label) == LabelOutcome::Applied {
                            report.labels_applied += 1;
                        }
                    }
                }
                report.elements_bound += interaction::bind(&mut doc, slot, &live);
                live
            };
            if !live.is_empty() {
                exposures.push((slot, assignment));
            }
        }

        let outcomes = join_all(
            exposures
                .iter()
                .map(|(slot, assignment)| self.session.exposure.track_exposure_once(*slot, assignment)),
        )
        .await;
        report.exposures_sent = outcomes
            .iter()
            .filter(|outcome| **outcome == ExposureOutcome::Sent)
            .count();
        report
    }

    /// Click on `target`: slot tracking for bound elements and CTA engagement.
    pub async fn dispatch_click(&self, target: NodeId) -> Option<bool> {
        self.engagement.on_click(target);
        self.session.interaction.handle_click(target).await
    }

    pub fn dispatch_focus_in(&self, target: NodeId) {
        self.engagement.on_focus_in(target);
    }

    pub fn dispatch_submit(&self, form: NodeId) {
        self.engagement.on_submit(form);
    }

    pub fn dispatch_scroll(&self, top: f64, height: f64, viewport: f64) {
        self.engagement.on_scroll(ScrollSample { top, height, viewport });
    }

    pub fn set_hidden(&self, hidden: bool) {
        self.session.host.page.set_hidden(hidden);
        self.engagement.on_visibility_change(hidden);
    }

    pub fn tick(&self) {
        self.engagement.tick();
    }

    /// Idle turn: flush queued engagement events.
    pub async fn flush_idle(&self) -> usize {
        self.engagement
            .flush_idle()
            .instrument(tracing::info_span!("engagement.flush"))
            .await
    }

    /// Track `event` against a slot named by its canonical name or an alias.
    pub async fn track(&self, event: &str, slot_name: &str, meta: &TrackMeta) -> bool {
        let Some(slot) = canonicalize(slot_name, &self.session.settings.aliases) else {
            log::warn!("track({event}) for unknown slot {slot_name:?} ignored");
            return false;
        };
        self.session.tracker.track(event, slot, meta).await
    }

    pub async fn track_completion(&self, meta: &TrackMeta) -> bool {
        self.session.tracker.track_completion(meta).await
    }
}
