//! Window level state: location, referrer, viewport, visibility and page globals.

use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use url::Url;

/// A custom event dispatched to page script.
#[derive(Clone, Debug, PartialEq)]
pub struct UiEvent {
    pub name: String,
    pub detail: Value,
}

/// Receives custom events dispatched on the window.
pub trait UiEventSink {
    fn dispatch(&self, event: UiEvent);
}

/// Sink that only logs dispatched events.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingUiSink;

impl UiEventSink for LoggingUiSink {
    fn dispatch(&self, event: UiEvent) {
        log::info!("ui event {} detail={}", event.name, event.detail);
    }
}

#[derive(Debug)]
pub struct PageEnv {
    location: Url,
    referrer: String,
    viewport_width: Cell<u32>,
    hidden: Cell<bool>,
    globals: RefCell<BTreeMap<String, Value>>,
}

impl PageEnv {
    pub fn new(location: Url) -> Self {
        Self {
            location,
            referrer: String::new(),
            viewport_width: Cell::new(1024),
            hidden: Cell::new(false),
            globals: RefCell::new(BTreeMap::new()),
        }
    }

    #[must_use]
    pub fn with_referrer(mut self, referrer: &str) -> Self {
        referrer.clone_into(&mut self.referrer);
        self
    }

    #[must_use]
    pub fn with_viewport_width(self, width: u32) -> Self {
        self.viewport_width.set(width);
        self
    }

    pub fn location(&self) -> &Url {
        &self.location
    }

    /// `document.referrer`, empty when there is none.
    pub fn referrer(&self) -> &str {
        &self.referrer
    }

    pub fn viewport_width(&self) -> u32 {
        self.viewport_width.get()
    }

    pub fn set_viewport_width(&self, width: u32) {
        self.viewport_width.set(width);
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden.get()
    }

    pub fn set_hidden(&self, hidden: bool) {
        self.hidden.set(hidden);
    }

    pub fn set_global(&self, name: &str, value: Value) {
        self.globals.borrow_mut().insert(name.to_owned(), value);
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.borrow().get(name).cloned()
    }

    pub fn pathname(&self) -> &str {
        self.location.path()
    }

    /// Pathname plus `?query`.
    pub fn path_with_query(&self) -> String {
        match self.location.query() {
            Some(query) => format!("{}?{query}", self.location.path()),
            None => self.location.path().to_owned(),
        }
    }

    /// Pathname plus `?query` and `#fragment`.
    pub fn full_path(&self) -> String {
        let mut path = self.path_with_query();
        if let Some(fragment) = self.location.fragment() {
            path.push('#');
            path.push_str(fragment);
        }
        path
    }
}
