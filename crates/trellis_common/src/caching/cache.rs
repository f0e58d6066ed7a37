//! Cache component: key hashing, value envelopes and dependency checks on
//! top of a `CacheBackend`.
//!
//! With `serialize` on (the default) a stored value is the JSON array
//! `[value, dependency]`; a read whose dependency has changed is a miss.
//! With it off, only the value's JSON is stored and dependencies are
//! ignored.

use crate::base::component::Component;
use crate::base::context::AppContext;
use crate::base::framework::Framework;
use crate::base::property::{as_bool, as_opt_string};
use crate::caching::backend::{CacheBackend, MemoryCache};
use crate::caching::dependency::CacheDependency;
use crate::error::{Result, TrellisError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::any::Any;
use std::time::Duration;

const TRACE_CATEGORY: &str = "system.caching";

pub struct Cache {
    class: String,
    backend: Box<dyn CacheBackend>,
    key_prefix: Option<String>,
    hash_key: bool,
    serialize: bool,
    framework: Option<Framework>,
    initialized: bool,
}

impl Cache {
    pub fn new(class: impl Into<String>, backend: Box<dyn CacheBackend>) -> Self {
        Self {
            class: class.into(),
            backend,
            key_prefix: None,
            hash_key: true,
            serialize: true,
            framework: None,
            initialized: false,
        }
    }

    /// Cache over a `MemoryCache` backend
    pub fn in_memory() -> Self {
        Self::new("MemoryCache", Box::new(MemoryCache::new()))
    }

    /// Prefix for every key; the application id once initialized
    pub fn key_prefix(&self) -> &str {
        self.key_prefix.as_deref().unwrap_or_default()
    }

    pub fn hash_key(&self) -> bool {
        self.hash_key
    }

    pub fn serialize(&self) -> bool {
        self.serialize
    }

    /// Backend key for `id`: sha256 hex of prefix + id, or the plain
    /// concatenation when hashing is off.
    pub fn generate_unique_key(&self, id: &str) -> String {
        let key = format!("{}{}", self.key_prefix(), id);
        if !self.hash_key {
            return key;
        }
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn trace(&self, message: String) {
        if let Some(framework) = &self.framework {
            framework.trace(&message, TRACE_CATEGORY);
        }
    }

    fn encode<T: Serialize>(&self, value: &T, dependency: Option<CacheDependency>) -> Result<String> {
        if !self.serialize {
            return Ok(serde_json::to_string(value)?);
        }
        let dependency = dependency.map(|mut d| {
            d.evaluate();
            d
        });
        Ok(serde_json::to_string(&(value, dependency))?)
    }

    /// Cached value for `id`, or `None` when absent, expired or stale.
    pub fn get<T: DeserializeOwned>(&mut self, id: &str) -> Result<Option<T>> {
        let key = self.generate_unique_key(id);
        let Some(raw) = self.backend.get_value(&key)? else {
            return Ok(None);
        };

        if !self.serialize {
            return Ok(Some(serde_json::from_str(&raw)?));
        }

        let (value, dependency): (Value, Option<CacheDependency>) = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(_) => return Ok(None),
        };
        if dependency.map(|d| d.has_changed()).unwrap_or(false) {
            return Ok(None);
        }

        self.trace(format!("Serving \"{}\" from cache", id));
        Ok(Some(serde_json::from_value(value)?))
    }

    /// Store `value` under `id`. A zero `expire` never expires.
    pub fn set<T: Serialize>(
        &mut self,
        id: &str,
        value: &T,
        expire: Duration,
        dependency: Option<CacheDependency>,
    ) -> Result<bool> {
        self.trace(format!("Saving \"{}\" to cache", id));
        let payload = self.encode(value, dependency)?;
        let key = self.generate_unique_key(id);
        self.backend.set_value(&key, payload, expire)
    }

    /// Store only if `id` is not cached yet.
    pub fn add<T: Serialize>(
        &mut self,
        id: &str,
        value: &T,
        expire: Duration,
        dependency: Option<CacheDependency>,
    ) -> Result<bool> {
        self.trace(format!("Adding \"{}\" to cache", id));
        let payload = self.encode(value, dependency)?;
        let key = self.generate_unique_key(id);
        self.backend.add_value(&key, payload, expire)
    }

    pub fn delete(&mut self, id: &str) -> Result<bool> {
        self.trace(format!("Deleting \"{}\" from cache", id));
        let key = self.generate_unique_key(id);
        self.backend.delete_value(&key)
    }
}

impl Component for Cache {
    fn class_name(&self) -> &str {
        &self.class
    }

    fn init(&mut self, ctx: &mut AppContext) -> Result<()> {
        if self.key_prefix.is_none() {
            self.key_prefix = Some(ctx.id());
        }
        self.framework = Some(ctx.framework().clone());
        self.initialized = true;
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn set_property(&mut self, name: &str, value: &Value) -> Result<()> {
        match name {
            "keyPrefix" => self.key_prefix = as_opt_string(&self.class, name, value)?,
            "hashKey" => self.hash_key = as_bool(&self.class, name, value)?,
            "serialize" => self.serialize = as_bool(&self.class, name, value)?,
            _ => return Err(TrellisError::unknown_property(&self.class, name)),
        }
        Ok(())
    }

    fn get_property(&self, name: &str) -> Option<Value> {
        match name {
            "keyPrefix" => self.key_prefix.clone().map(Value::from),
            "hashKey" => Some(Value::Bool(self.hash_key)),
            "serialize" => Some(Value::Bool(self.serialize)),
            _ => None,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
