//! Persisted key-value slots with cookie-style attributes.
//!
//! A slot is a named string value carrying an optional expiry plus the
//! transport attributes a browser cookie would carry (secure-only, same-site
//! policy and path). Expired slots read as absent. [`SqliteSlotStore`] keeps
//! slots in the application database; [`MemorySlotStore`] keeps them for the
//! lifetime of the process.

mod sqlite;

pub use sqlite::SqliteSlotStore;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

pub use crate::errors::StorageError;

/// Upper bound on `name + value`, matching the common browser cookie limit.
pub const MAX_SLOT_BYTES: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Lax => "lax",
            Self::None => "none",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "strict" => Self::Strict,
            "none" => Self::None,
            _ => Self::Lax,
        }
    }
}

/// Attributes applied when a slot is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotAttributes {
    /// `None` keeps the slot until it is removed.
    pub max_age: Option<Duration>,
    pub secure: bool,
    pub same_site: SameSite,
    pub path: String,
}

impl SlotAttributes {
    pub fn session() -> Self {
        Self {
            max_age: None,
            secure: false,
            same_site: SameSite::Lax,
            path: "/".into(),
        }
    }

    /// Secure-only, strict same-site, site-wide, expiring after `max_age`.
    pub fn credentials(max_age: Duration) -> Self {
        Self {
            max_age: Some(max_age),
            secure: true,
            same_site: SameSite::Strict,
            path: "/".into(),
        }
    }

    pub fn expires_at(&self, now: OffsetDateTime) -> Result<Option<OffsetDateTime>, StorageError> {
        let Some(age) = self.max_age else {
            return Ok(None);
        };
        now.checked_add(age)
            .map(Some)
            .ok_or_else(|| StorageError::InvalidExpiry(format!("max-age of {age} from {now}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub name: String,
    pub value: String,
    pub expires_at: Option<OffsetDateTime>,
    pub secure: bool,
    pub same_site: SameSite,
    pub path: String,
}

impl Slot {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Backing storage for named slots. Implementations never panic on storage
/// failures; every failure is reported as a [`StorageError`].
pub trait SlotStore: Send + Sync {
    fn read(&self, name: &str) -> Result<Option<Slot>, StorageError>;
    fn write(&self, name: &str, value: &str, attrs: &SlotAttributes) -> Result<(), StorageError>;
    fn remove(&self, name: &str) -> Result<(), StorageError>;
}

pub(crate) fn check_quota(name: &str, value: &str) -> Result<(), StorageError> {
    let size = name.len() + value.len();
    if size > MAX_SLOT_BYTES {
        return Err(StorageError::QuotaExceeded {
            size,
            limit: MAX_SLOT_BYTES,
        });
    }
    Ok(())
}

/// Process-local slot store. Writes can be switched off to emulate storage
/// that the host has disabled.
#[derive(Debug, Default)]
pub struct MemorySlotStore {
    slots: Mutex<HashMap<String, Slot>>,
    disabled: AtomicBool,
}

impl MemorySlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.store(disabled, Ordering::SeqCst);
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Slot>>, StorageError> {
        if self.disabled.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("slot storage is disabled".into()));
        }
        self.slots
            .lock()
            .map_err(|_| StorageError::Unavailable("slot storage lock poisoned".into()))
    }
}

impl SlotStore for MemorySlotStore {
    fn read(&self, name: &str) -> Result<Option<Slot>, StorageError> {
        let mut slots = self.guard()?;
        let now = OffsetDateTime::now_utc();
        if slots.get(name).is_some_and(|slot| slot.is_expired(now)) {
            slots.remove(name);
            return Ok(None);
        }
        Ok(slots.get(name).cloned())
    }

    fn write(&self, name: &str, value: &str, attrs: &SlotAttributes) -> Result<(), StorageError> {
        check_quota(name, value)?;
        let expires_at = attrs.expires_at(OffsetDateTime::now_utc())?;
        let mut slots = self.guard()?;
        slots.insert(
            name.to_string(),
            Slot {
                name: name.to_string(),
                value: value.to_string(),
                expires_at,
                secure: attrs.secure,
                same_site: attrs.same_site,
                path: attrs.path.clone(),
            },
        );
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), StorageError> {
        self.guard()?.remove(name);
        Ok(())
    }
}
