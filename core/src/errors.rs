//! Central error catalogue. Every error carries a stable code and a short
//! human friendly explanation that is written alongside it to the event log.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Slot storage unavailable: {0}")] Unavailable(String),
    #[error("Slot value of {size} bytes exceeds the {limit} byte limit")] QuotaExceeded { size: usize, limit: usize },
    #[error("Slot expiry is out of range: {0}")] InvalidExpiry(String),
}

impl StorageError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "STO-1001",
            Self::QuotaExceeded { .. } => "STO-1002",
            Self::InvalidExpiry(_) => "STO-1003",
        }
    }
    pub fn explain(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "The persisted slot store could not be reached.",
            Self::QuotaExceeded { .. } => "The value is too large to be stored in a single slot.",
            Self::InvalidExpiry(_) => "The slot lifetime does not produce a valid expiry date.",
        }
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

impl From<r2d2::Error> for StorageError {
    fn from(err: r2d2::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Provider name must not be empty")] EmptyProvider,
    #[error("Stored credentials were discarded: {reason}")] Corrupt { reason: String, cleared: bool },
    #[error("Stored credentials could not be read: {0}")] Unavailable(#[source] StorageError),
    #[error("Failed to persist credentials: {0}")] Persist(#[source] StorageError),
    #[error("Credentials were already loaded")] AlreadyLoaded,
    #[error("Failed to encode credentials: {0}")] Serialization(#[from] serde_json::Error),
}

impl CredentialError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyProvider => "CRD-1001",
            Self::Corrupt { .. } => "CRD-1002",
            Self::Persist(_) | Self::Serialization(_) => "CRD-1003",
            Self::AlreadyLoaded => "CRD-1004",
            Self::Unavailable(_) => "CRD-1005",
        }
    }
    pub fn explain(&self) -> &'static str {
        match self {
            Self::EmptyProvider => "API keys must be stored against a named provider.",
            Self::Corrupt { .. } => "The stored API keys were not a valid mapping and were cleared.",
            Self::Persist(_) | Self::Serialization(_) => {
                "The API key is kept for this session only because it could not be saved."
            }
            Self::AlreadyLoaded => "Stored API keys are only read once per session.",
            Self::Unavailable(_) => "Stored API keys could not be read; starting without them.",
        }
    }
}

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("Unknown AI provider: {0}")] UnknownProvider(String),
}

impl SelectionError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownProvider(_) => "SEL-1001",
        }
    }
    pub fn explain(&self) -> &'static str {
        match self {
            Self::UnknownProvider(_) => "The provider is not part of the known provider list.",
        }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Model catalog request failed: {0}")] Request(String),
    #[error("Model catalog response was invalid: {0}")] Decode(String),
    #[error("Model catalog refresh was cancelled")] Cancelled,
}

impl CatalogError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Request(_) => "CAT-1001",
            Self::Decode(_) => "CAT-1002",
            Self::Cancelled => "CAT-1003",
        }
    }
    pub fn explain(&self) -> &'static str {
        match self {
            Self::Request(_) => "The model list could not be fetched; the built-in list stays active.",
            Self::Decode(_) => "The model list response was not understood; the built-in list stays active.",
            Self::Cancelled => "The model list refresh stopped before it finished.",
        }
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}
