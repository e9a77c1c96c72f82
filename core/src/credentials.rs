//! Per-provider API key storage.
//!
//! Keys live in memory as a provider → key mapping and are written through to
//! a single persisted slot (`apiKeys`) as a JSON object after every change.
//! The slot is read once per session. Anything other than a JSON object of
//! strings is discarded wholesale and the slot is deleted, so corrupt data is
//! never partially trusted.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use time::Duration;

pub use crate::errors::CredentialError;
use crate::storage::{SlotAttributes, SlotStore};

pub const API_KEYS_SLOT: &str = "apiKeys";
pub const CREDENTIAL_TTL_DAYS: i64 = 30;

pub type CredentialMap = BTreeMap<String, String>;

/// Result of a successful [`CredentialStore::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No slot was stored.
    Missing,
    /// The slot held a valid mapping with this many entries.
    Restored(usize),
}

pub struct CredentialStore {
    slots: Arc<dyn SlotStore>,
    slot_name: String,
    ttl: Duration,
    keys: CredentialMap,
    loaded: bool,
    /// Set when `load` could not read the slot. The slot may still hold keys,
    /// so it is read again and merged before anything is written over it.
    unread: bool,
}

impl CredentialStore {
    pub fn new(slots: Arc<dyn SlotStore>) -> Self {
        Self::with_slot(slots, API_KEYS_SLOT, Duration::days(CREDENTIAL_TTL_DAYS))
    }

    pub fn with_slot(slots: Arc<dyn SlotStore>, slot_name: impl Into<String>, ttl: Duration) -> Self {
        Self {
            slots,
            slot_name: slot_name.into(),
            ttl,
            keys: CredentialMap::new(),
            loaded: false,
            unread: false,
        }
    }

    /// Populate the mapping from the persisted slot.
    ///
    /// Errors leave the mapping empty. A corrupt slot is deleted before
    /// [`CredentialError::Corrupt`] is returned; `cleared` reports whether
    /// that deletion succeeded. An unreadable slot is left in place and
    /// merged on the next write.
    pub fn load(&mut self) -> Result<LoadOutcome, CredentialError> {
        if self.loaded {
            return Err(CredentialError::AlreadyLoaded);
        }
        self.loaded = true;

        let slot = match self.slots.read(&self.slot_name) {
            Ok(slot) => slot,
            Err(err) => {
                self.unread = true;
                return Err(CredentialError::Unavailable(err));
            }
        };
        let Some(slot) = slot else {
            return Ok(LoadOutcome::Missing);
        };

        match parse_credentials(&slot.value) {
            Ok(keys) => {
                let count = keys.len();
                self.keys = keys;
                Ok(LoadOutcome::Restored(count))
            }
            Err(reason) => {
                let cleared = self.slots.remove(&self.slot_name).is_ok();
                Err(CredentialError::Corrupt { reason, cleared })
            }
        }
    }

    /// Set `provider`'s key and write the whole mapping back to the slot.
    ///
    /// The in-memory mapping is updated even when persisting fails, so the
    /// key stays usable for the rest of the session. If the slot could not be
    /// read at load time, nothing is written until it can be read and its
    /// keys merged underneath the ones set this session.
    pub fn update(&mut self, provider: &str, key: &str) -> Result<(), CredentialError> {
        if provider.trim().is_empty() {
            return Err(CredentialError::EmptyProvider);
        }
        self.keys.insert(provider.to_string(), key.to_string());
        self.persist()
    }

    /// Drop every key and delete the persisted slot.
    pub fn clear(&mut self) -> Result<(), CredentialError> {
        self.keys.clear();
        self.unread = false;
        self.slots
            .remove(&self.slot_name)
            .map_err(CredentialError::Persist)
    }

    /// The key for `provider`, treating an empty string as unset.
    pub fn get(&self, provider: &str) -> Option<&str> {
        self.keys
            .get(provider)
            .map(String::as_str)
            .filter(|key| !key.is_empty())
    }

    pub fn has_key(&self, provider: &str) -> bool {
        self.get(provider).is_some()
    }

    pub fn keys(&self) -> &CredentialMap {
        &self.keys
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_unread(&self) -> bool {
        self.unread
    }

    fn persist(&mut self) -> Result<(), CredentialError> {
        if self.unread {
            self.merge_stored()?;
        }
        let payload = serde_json::to_string(&self.keys)?;
        self.slots
            .write(
                &self.slot_name,
                &payload,
                &SlotAttributes::credentials(self.ttl),
            )
            .map_err(CredentialError::Persist)
    }

    /// Fold the stored mapping under the in-memory one. A corrupt slot is
    /// ignored and will be overwritten.
    fn merge_stored(&mut self) -> Result<(), CredentialError> {
        let slot = self
            .slots
            .read(&self.slot_name)
            .map_err(CredentialError::Persist)?;
        self.unread = false;
        let Some(slot) = slot else {
            return Ok(());
        };
        match parse_credentials(&slot.value) {
            Ok(stored) => {
                for (provider, key) in stored {
                    self.keys.entry(provider).or_insert(key);
                }
            }
            Err(reason) => {
                log::warn!(target: "credentials", "replacing unreadable stored keys: {reason}");
            }
        }
        Ok(())
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("slot_name", &self.slot_name)
            .field("providers", &self.keys.keys().collect::<Vec<_>>())
            .field("loaded", &self.loaded)
            .finish()
    }
}

/// Accept only a JSON object whose values are all strings.
fn parse_credentials(raw: &str) -> Result<CredentialMap, String> {
    let value: Value = serde_json::from_str(raw).map_err(|err| err.to_string())?;
    let Value::Object(entries) = value else {
        return Err(format!("expected an object, found {}", json_kind(&value)));
    };

    let mut keys = CredentialMap::new();
    for (provider, key) in entries {
        match key {
            Value::String(key) => {
                keys.insert(provider, key);
            }
            other => {
                return Err(format!(
                    "key for provider {provider} is {}, not a string",
                    json_kind(&other)
                ))
            }
        }
    }
    Ok(keys)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
