//! Session, visitor and bucket identifiers.
//!
//! Each id is resolved once per page life and memoized, so a storage failure after
//! the first read can never produce a second id for the same page.

use crate::host::Host;
use crate::settings::RuntimeSettings;
use once_cell::unsync::OnceCell;
use std::rc::Rc;
use uuid::Uuid;

/// Ids shorter than this are treated as absent.
pub const MIN_ID_LEN: usize = 8;

pub(crate) fn generate_id(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4())
}

fn usable(id: Option<String>) -> Option<String> {
    id.filter(|value| value.len() >= MIN_ID_LEN)
}

pub struct IdentityStore {
    host: Rc<Host>,
    session_cookie: String,
    visitor_key: String,
    bucket_key: String,
    session: OnceCell<String>,
    visitor: OnceCell<String>,
    bucket: OnceCell<String>,
}

impl IdentityStore {
    pub fn new(host: Rc<Host>, settings: &RuntimeSettings) -> Self {
        Self {
            host,
            session_cookie: settings.session_cookie(),
            visitor_key: settings.visitor_key(),
            bucket_key: settings.bucket_key(),
            session: OnceCell::new(),
            visitor: OnceCell::new(),
            bucket: OnceCell::new(),
        }
    }

    /// Session id bound to a browser-session cookie.
    pub fn session_id(&self) -> String {
        self.session.get_or_init(|| self.resolve_session()).clone()
    }

    /// Visitor id bound to durable local storage.
    pub fn visitor_id(&self) -> String {
        self.visitor
            .get_or_init(|| {
                self.resolve_local(&self.visitor_key, "vid")
                    .unwrap_or_else(|| generate_id("vid"))
            })
            .clone()
    }

    /// Durable bucket id used for variant assignment. Falls back to the session id
    /// when local storage is unavailable so assignments stay stable for the session.
    pub fn bucket_id(&self) -> String {
        self.bucket
            .get_or_init(|| {
                self.resolve_local(&self.bucket_key, "bkt")
                    .unwrap_or_else(|| self.session_id())
            })
            .clone()
    }

    fn resolve_session(&self) -> String {
        match self.host.cookies.get(&self.session_cookie) {
            Ok(existing) => {
                if let Some(id) = usable(existing) {
                    return id;
                }
            }
            Err(err) => {
                log::debug!("session cookie unreadable, using ephemeral id: {err}");
                return generate_id("sid");
            }
        }
        let created = generate_id("sid");
        let cookie = format!("{}={created}; Path=/; SameSite=Lax", self.session_cookie);
        if let Err(err) = self.host.cookies.set(&cookie) {
            log::debug!("session cookie not persisted: {err}");
        }
        created
    }

    /// Existing or freshly persisted id under `key`; `None` when storage is unavailable.
    fn resolve_local(&self, key: &str, prefix: &str) -> Option<String> {
        match self.host.local.get(key) {
            Ok(existing) => {
                if let Some(id) = usable(existing) {
                    return Some(id);
                }
                let created = generate_id(prefix);
                if let Err(err) = self.host.local.set(key, &created) {
                    log::debug!("{key} not persisted: {err}");
                }
                Some(created)
            }
            Err(err) => {
                log::debug!("{key} unreadable: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{FailingStore, KeyValueStore, MemoryCookieJar, MemoryStore, PageEnv};
    use crate::testing::MockTransport;
    use page_dom::Document;
    use url::Url;

    fn host(cookies: Rc<MemoryCookieJar>, local: Rc<dyn KeyValueStore>) -> Rc<Host> {
        let location = Url::parse("https://example.com/").expect("static url");
        Rc::new(
            Host::new(
                Document::new(),
                PageEnv::new(location),
                Rc::new(MockTransport::new()),
            )
            .with_cookies(cookies)
            .with_local_storage(local),
        )
    }

    #[test]
    fn session_id_is_stable_when_cookies_fail_later() {
        let jar = Rc::new(MemoryCookieJar::new());
        let identity = IdentityStore::new(
            host(Rc::clone(&jar), Rc::new(MemoryStore::new())),
            &RuntimeSettings::default(),
        );
        let first = identity.session_id();
        jar.set_unavailable(true);
        assert_eq!(identity.session_id(), first);
        assert!(first.starts_with("sid_"));
        assert_eq!(jar.writes(), vec![format!("ab015_sid={first}; Path=/; SameSite=Lax")]);
    }

    #[test]
    fn existing_ids_are_reused_and_short_ids_replaced() {
        let jar = Rc::new(MemoryCookieJar::from_header("ab015_sid=sid_existing01"));
        let local = Rc::new(MemoryStore::with_entries([("ab015_vid", "short")]));
        let identity = IdentityStore::new(
            host(Rc::clone(&jar), Rc::clone(&local) as Rc<dyn KeyValueStore>),
            &RuntimeSettings::default(),
        );
        assert_eq!(identity.session_id(), "sid_existing01");
        assert!(jar.writes().is_empty());

        let visitor = identity.visitor_id();
        assert!(visitor.starts_with("vid_"));
        assert_eq!(local.peek("ab015_vid"), Some(visitor.clone()));
        assert_eq!(identity.visitor_id(), visitor);
    }

    #[test]
    fn unavailable_local_storage_gives_ephemeral_ids() {
        let identity = IdentityStore::new(
            host(Rc::new(MemoryCookieJar::new()), Rc::new(FailingStore)),
            &RuntimeSettings::default(),
        );
        let visitor = identity.visitor_id();
        assert_eq!(identity.visitor_id(), visitor);
        assert_eq!(identity.bucket_id(), identity.session_id());
    }
}
