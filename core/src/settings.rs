//! Session configuration and the persisted active selection, both kept as
//! JSON values in `app_settings`.

use anyhow::Result;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::{Duration, OffsetDateTime};

use crate::catalog::providers::{DEFAULT_MODEL, DEFAULT_PROVIDER};
use crate::catalog::DEFAULT_OLLAMA_BASE_URL;
use crate::credentials::{API_KEYS_SLOT, CREDENTIAL_TTL_DAYS};
use crate::selection::UnknownProviderPolicy;

const CONFIG_KEY: &str = "session.config";
const ACTIVE_KEY: &str = "ai.active";

/// Longest credential lifetime accepted from configuration, matching the
/// browser cap on cookie max-age.
pub const MAX_CREDENTIAL_TTL_DAYS: i64 = 400;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub credential_slot: String,
    pub credential_ttl_days: i64,
    pub default_provider: String,
    pub default_model: String,
    pub unknown_provider: UnknownProviderPolicy,
    pub ollama_base_url: String,
    pub catalog_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            credential_slot: API_KEYS_SLOT.to_string(),
            credential_ttl_days: CREDENTIAL_TTL_DAYS,
            default_provider: DEFAULT_PROVIDER.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            unknown_provider: UnknownProviderPolicy::default(),
            ollama_base_url: DEFAULT_OLLAMA_BASE_URL.to_string(),
            catalog_timeout_secs: 5,
        }
    }
}

impl SessionConfig {
    /// Lifetime of the credential slot. Values outside
    /// `1..=MAX_CREDENTIAL_TTL_DAYS` fall back to the default.
    pub fn credential_ttl(&self) -> Duration {
        if ttl_in_range(self.credential_ttl_days) {
            Duration::days(self.credential_ttl_days)
        } else {
            Duration::days(CREDENTIAL_TTL_DAYS)
        }
    }
}

fn ttl_in_range(days: i64) -> bool {
    (1..=MAX_CREDENTIAL_TTL_DAYS).contains(&days)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSelection {
    pub provider: Option<String>,
    pub model: Option<String>,
}

/// Stored configuration, or the defaults when none has been saved. Missing
/// fields fall back to their defaults individually, as does a credential
/// lifetime outside `1..=MAX_CREDENTIAL_TTL_DAYS`.
pub fn load_config(conn: &rusqlite::Connection) -> Result<SessionConfig> {
    let Some(raw) = read_setting(conn, CONFIG_KEY)? else {
        return Ok(SessionConfig::default());
    };
    let mut config: SessionConfig = serde_json::from_str(&raw)?;
    if !ttl_in_range(config.credential_ttl_days) {
        log::warn!(
            target: "settings",
            "credential_ttl_days {} is out of range, using {CREDENTIAL_TTL_DAYS}",
            config.credential_ttl_days
        );
        config.credential_ttl_days = CREDENTIAL_TTL_DAYS;
    }
    Ok(config)
}

pub fn save_config(conn: &rusqlite::Connection, config: &SessionConfig) -> Result<()> {
    write_setting(conn, CONFIG_KEY, &serde_json::to_string(config)?)
}

pub fn read_active_selection(conn: &rusqlite::Connection) -> Result<Option<ActiveSelection>> {
    let Some(raw) = read_setting(conn, ACTIVE_KEY)? else {
        return Ok(None);
    };
    let data: serde_json::Value = serde_json::from_str(&raw)?;
    let provider = data
        .get("provider")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let model = data
        .get("model")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    Ok(Some(ActiveSelection { provider, model }))
}

pub fn write_active_selection(
    conn: &rusqlite::Connection,
    provider: Option<&str>,
    model: &str,
) -> Result<()> {
    let payload = json!({
        "provider": provider,
        "model": model,
    })
    .to_string();
    write_setting(conn, ACTIVE_KEY, &payload)
}

fn read_setting(conn: &rusqlite::Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM app_settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

fn write_setting(conn: &rusqlite::Connection, key: &str, value: &str) -> Result<()> {
    let now = OffsetDateTime::now_utc().unix_timestamp();
    conn.execute(
        "INSERT INTO app_settings (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![key, value, now],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_db;

    #[test]
    fn missing_config_uses_defaults() {
        let pool = init_memory_db().unwrap();
        let conn = pool.get().unwrap();
        let config = load_config(&conn).unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.credential_slot, "apiKeys");
        assert_eq!(config.credential_ttl_days, 30);
    }

    #[test]
    fn partial_config_fills_remaining_defaults() {
        let pool = init_memory_db().unwrap();
        let conn = pool.get().unwrap();
        write_setting(&conn, CONFIG_KEY, r#"{"unknown_provider":"reject"}"#).unwrap();
        let config = load_config(&conn).unwrap();
        assert_eq!(config.unknown_provider, UnknownProviderPolicy::Reject);
        assert_eq!(config.default_provider, DEFAULT_PROVIDER);
    }

    #[test]
    fn out_of_range_ttl_falls_back_to_default() {
        let pool = init_memory_db().unwrap();
        let conn = pool.get().unwrap();
        for days in [0, -3, 10_000_000, i64::MAX] {
            write_setting(&conn, CONFIG_KEY, &json!({ "credential_ttl_days": days }).to_string())
                .unwrap();
            let config = load_config(&conn).unwrap();
            assert_eq!(config.credential_ttl_days, CREDENTIAL_TTL_DAYS, "{days}");
        }

        write_setting(&conn, CONFIG_KEY, r#"{"credential_ttl_days":7}"#).unwrap();
        assert_eq!(load_config(&conn).unwrap().credential_ttl(), Duration::days(7));
    }

    #[test]
    fn credential_ttl_ignores_unusable_values() {
        for days in [0, -1, MAX_CREDENTIAL_TTL_DAYS + 1, i64::MAX, i64::MIN] {
            let config = SessionConfig {
                credential_ttl_days: days,
                ..SessionConfig::default()
            };
            assert_eq!(config.credential_ttl(), Duration::days(CREDENTIAL_TTL_DAYS), "{days}");
        }
    }

    #[test]
    fn saved_config_is_read_back() {
        let pool = init_memory_db().unwrap();
        let conn = pool.get().unwrap();
        let config = SessionConfig {
            default_provider: "OpenAI".into(),
            default_model: "gpt-4o".into(),
            ..SessionConfig::default()
        };
        save_config(&conn, &config).unwrap();
        assert_eq!(load_config(&conn).unwrap(), config);
    }

    #[test]
    fn active_selection_allows_missing_provider() {
        let pool = init_memory_db().unwrap();
        let conn = pool.get().unwrap();
        assert_eq!(read_active_selection(&conn).unwrap(), None);

        write_active_selection(&conn, None, "").unwrap();
        let active = read_active_selection(&conn).unwrap().unwrap();
        assert_eq!(active.provider, None);
        assert_eq!(active.model.as_deref(), Some(""));

        write_active_selection(&conn, Some("Groq"), "llama-3.1-8b-instant").unwrap();
        let active = read_active_selection(&conn).unwrap().unwrap();
        assert_eq!(active.provider.as_deref(), Some("Groq"));
    }
}
