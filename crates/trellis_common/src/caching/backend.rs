//! Cache storage backends.

use crate::error::{Result, TrellisError};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Raw key/value storage behind a `Cache`.
///
/// Every operation defaults to `Unsupported`, so a backend implements
/// only what it can do. A zero `expire` means the entry never expires.
pub trait CacheBackend: Send {
    fn get_value(&mut self, key: &str) -> Result<Option<String>> {
        let _ = key;
        Err(TrellisError::Unsupported("get"))
    }

    /// Store unconditionally
    fn set_value(&mut self, key: &str, value: String, expire: Duration) -> Result<bool> {
        let _ = (key, value, expire);
        Err(TrellisError::Unsupported("set"))
    }

    /// Store only if the key is absent
    fn add_value(&mut self, key: &str, value: String, expire: Duration) -> Result<bool> {
        let _ = (key, value, expire);
        Err(TrellisError::Unsupported("add"))
    }

    fn delete_value(&mut self, key: &str) -> Result<bool> {
        let _ = key;
        Err(TrellisError::Unsupported("delete"))
    }
}

struct Slot {
    value: String,
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|at| now >= at).unwrap_or(false)
    }
}

/// In-process backend with per-entry expiry.
#[derive(Default)]
pub struct MemoryCache {
    entries: HashMap<String, Slot>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live (unexpired) entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.values().filter(|s| !s.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Zero, or a lifetime past what `Instant` can represent, never expires.
    fn slot(value: String, expire: Duration) -> Slot {
        Slot {
            value,
            expires_at: if expire.is_zero() {
                None
            } else {
                Instant::now().checked_add(expire)
            },
        }
    }
}

impl CacheBackend for MemoryCache {
    fn get_value(&mut self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(slot) if slot.is_expired(now) => {
                self.entries.remove(key);
                Ok(None)
            }
            Some(slot) => Ok(Some(slot.value.clone())),
            None => Ok(None),
        }
    }

    fn set_value(&mut self, key: &str, value: String, expire: Duration) -> Result<bool> {
        self.entries.insert(key.to_string(), Self::slot(value, expire));
        Ok(true)
    }

    fn add_value(&mut self, key: &str, value: String, expire: Duration) -> Result<bool> {
        let now = Instant::now();
        if let Some(slot) = self.entries.get(key) {
            if !slot.is_expired(now) {
                return Ok(false);
            }
        }
        self.entries.insert(key.to_string(), Self::slot(value, expire));
        Ok(true)
    }

    fn delete_value(&mut self, key: &str) -> Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }
}
