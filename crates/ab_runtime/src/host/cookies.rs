//! Cookie jar seam modelled on `document.cookie`.

use super::storage::StorageError;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

/// Reads and writes cookies the way page script does: `set` takes a full
/// `name=value; Attr=...` string, `get` returns the value by name.
pub trait CookieJar {
    fn get(&self, name: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, cookie: &str) -> Result<(), StorageError>;
    /// `name=value; name2=value2` for request headers.
    fn header(&self) -> String;
}

/// Split `name=value; Path=/` into its name and value.
pub fn parse_set_cookie(cookie: &str) -> Option<(String, String)> {
    let pair = cookie.split(';').next()?.trim();
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_owned(), value.trim().to_owned()))
}

/// Parse a `Cookie:` header style string.
pub fn parse_cookie_header(header: &str) -> Vec<(String, String)> {
    header
        .split(';')
        .filter_map(|part| {
            let (name, value) = part.trim().split_once('=')?;
            let name = name.trim();
            (!name.is_empty()).then(|| (name.to_owned(), value.trim().to_owned()))
        })
        .collect()
}

/// In-memory jar that also keeps every raw cookie string written to it.
#[derive(Debug, Default)]
pub struct MemoryCookieJar {
    values: RefCell<BTreeMap<String, String>>,
    writes: RefCell<Vec<String>>,
    unavailable: Cell<bool>,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a `Cookie:` header string.
    pub fn from_header(header: &str) -> Self {
        let jar = Self::default();
        jar.values.borrow_mut().extend(parse_cookie_header(header));
        jar
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.set(unavailable);
    }

    /// Raw cookie strings in the order they were written.
    pub fn writes(&self) -> Vec<String> {
        self.writes.borrow().clone()
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.unavailable.get() {
            Err(StorageError::Unavailable(String::from("cookies disabled")))
        } else {
            Ok(())
        }
    }
}

impl CookieJar for MemoryCookieJar {
    fn get(&self, name: &str) -> Result<Option<String>, StorageError> {
        self.check()?;
        Ok(self.values.borrow().get(name).cloned())
    }

    fn set(&self, cookie: &str) -> Result<(), StorageError> {
        self.check()?;
        let (name, value) = parse_set_cookie(cookie)
            .ok_or_else(|| StorageError::Format(format!("malformed cookie {cookie:?}")))?;
        self.values.borrow_mut().insert(name, value);
        self.writes.borrow_mut().push(cookie.to_owned());
        Ok(())
    }

    fn header(&self) -> String {
        self.values
            .borrow()
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jar_round_trips_cookie_strings() -> Result<(), StorageError> {
        let jar = MemoryCookieJar::from_header("a=1; other=two");
        jar.set("ab015_sid=sid_abc; Path=/; SameSite=Lax")?;
        assert_eq!(jar.get("ab015_sid")?.as_deref(), Some("sid_abc"));
        assert_eq!(jar.header(), "a=1; ab015_sid=sid_abc; other=two");
        assert_eq!(jar.writes(), vec![String::from("ab015_sid=sid_abc; Path=/; SameSite=Lax")]);
        assert!(jar.set("; Path=/").is_err());
        Ok(())
    }
}
