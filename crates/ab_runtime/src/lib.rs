//! Slot experiment runtime for server-rendered pages.
//!
//! A page session resolves visitor identity, finds the elements that belong to named
//! experiment slots, asks the experimentation service which variant to show, rewrites
//! the slot labels and reports exposures and clicks. An independent engagement stream
//! reports page views, heartbeats, scroll depth, CTA clicks and lead-form activity.
//!
//! Browser facilities (document, storage, cookies, network, clock) sit behind the
//! traits in [`host`], so the same pipeline runs against a parsed page in-process.
#![allow(
    clippy::missing_docs_in_private_items,
    reason = "Internal implementation details don't need public documentation"
)]
#![allow(
    clippy::missing_inline_in_public_items,
    reason = "Inlining decisions left to compiler for this crate"
)]
#![cfg_attr(
    test,
    allow(clippy::expect_used, clippy::panic, reason = "Fixtures are static; a miss is a test bug")
)]

pub mod config_cache;
pub mod context;
pub mod discovery;
pub mod engagement;
pub mod exposure;
pub mod host;
pub mod identity;
pub mod interaction;
pub mod label;
pub mod page_context;
pub mod runtime;
pub mod settings;
pub mod slot;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod tracking;
pub mod variant;
pub mod watcher;

pub use config_cache::{Config, ConfigCache};
pub use context::SessionContext;
pub use discovery::{DiscoveryPipeline, DiscoveryStrategy};
pub use engagement::{EngagementEvent, EngagementPipeline, EventKind};
pub use exposure::{ExposureOutcome, ExposureTracker};
pub use host::Host;
pub use identity::IdentityStore;
pub use interaction::InteractionTracker;
pub use label::{LabelOutcome, apply_label};
pub use page_context::{PageContextProvider, PageType, RequestContext};
pub use runtime::{PassReport, SlotRuntime};
pub use settings::RuntimeSettings;
pub use slot::{SlotIndex, SlotKey, SlotMap};
pub use tracking::{TrackMeta, Tracker};
pub use variant::{VariantAssignment, VariantResolver};
pub use watcher::DomWatcher;
