//! Browser facilities the runtime depends on, behind replaceable seams.

pub mod clock;
pub mod cookies;
pub mod page;
pub mod storage;
pub mod transport;

pub use clock::{Clock, ManualClock, SystemClock};
pub use cookies::{CookieJar, MemoryCookieJar};
pub use page::{LoggingUiSink, PageEnv, UiEvent, UiEventSink};
pub use storage::{FailingStore, JsonFileStore, KeyValueStore, MemoryStore, StorageError};
pub use transport::{HttpResponse, HttpTransport, Transport, TransportError};

use page_dom::Document;
use std::cell::RefCell;
use std::rc::Rc;

/// Everything the page offers to the runtime. Components hold it behind an `Rc`.
pub struct Host {
    pub document: RefCell<Document>,
    pub page: PageEnv,
    pub local: Rc<dyn KeyValueStore>,
    pub session: Rc<dyn KeyValueStore>,
    pub cookies: Rc<dyn CookieJar>,
    pub transport: Rc<dyn Transport>,
    pub clock: Rc<dyn Clock>,
    pub ui: Rc<dyn UiEventSink>,
}

impl Host {
    /// Host with in-memory storage, an empty cookie jar, the system clock and a
    /// logging UI sink.
    pub fn new(document: Document, page: PageEnv, transport: Rc<dyn Transport>) -> Self {
        Self {
            document: RefCell::new(document),
            page,
            local: Rc::new(MemoryStore::new()),
            session: Rc::new(MemoryStore::new()),
            cookies: Rc::new(MemoryCookieJar::new()),
            transport,
            clock: Rc::new(SystemClock),
            ui: Rc::new(LoggingUiSink),
        }
    }

    #[must_use]
    pub fn with_local_storage(mut self, store: Rc<dyn KeyValueStore>) -> Self {
        self.local = store;
        self
    }

    #[must_use]
    pub fn with_session_storage(mut self, store: Rc<dyn KeyValueStore>) -> Self {
        self.session = store;
        self
    }

    #[must_use]
    pub fn with_cookies(mut self, cookies: Rc<dyn CookieJar>) -> Self {
        self.cookies = cookies;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_ui_sink(mut self, ui: Rc<dyn UiEventSink>) -> Self {
        self.ui = ui;
        self
    }
}
