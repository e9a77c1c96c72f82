use r2d2_sqlite::rusqlite::{params, Connection};
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::DbPool;

/// Write a structured row to `event_log` and mirror it to the `log` facade.
pub fn log_event(
    conn: &Connection,
    level: &str,
    code: Option<&str>,
    module: &str,
    message: &str,
    explain: Option<&str>,
    data: Option<Value>,
) -> rusqlite::Result<()> {
    let facade_level = match level {
        "error" => log::Level::Error,
        "warn" => log::Level::Warn,
        "debug" => log::Level::Debug,
        _ => log::Level::Info,
    };
    log::log!(target: module, facade_level, "[{}] {}", code.unwrap_or("-"), message);

    let id = Uuid::new_v4().to_string();
    let ts = OffsetDateTime::now_utc().unix_timestamp();
    let data_str = data.map(|v| v.to_string());
    conn.execute(
        "INSERT INTO event_log (id, ts, level, code, module, message, explain, data) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![id, ts, level, code, module, message, explain, data_str],
    )?;
    Ok(())
}

/// Best-effort variant used on degrade paths: a missing connection or a
/// failed insert only reaches the `log` facade.
pub fn record_event(
    pool: &DbPool,
    level: &str,
    code: Option<&str>,
    module: &str,
    message: &str,
    explain: Option<&str>,
    data: Option<Value>,
) {
    let result = pool
        .get()
        .map_err(|err| err.to_string())
        .and_then(|conn| {
            log_event(&conn, level, code, module, message, explain, data)
                .map_err(|err| err.to_string())
        });
    if let Err(err) = result {
        log::error!(target: module, "failed to write event log row: {err}");
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    pub id: String,
    pub ts: i64,
    pub level: String,
    pub code: Option<String>,
    pub message: String,
    pub explain: Option<String>,
    pub data: Option<Value>,
}

/// Most recent events for a module, newest first.
pub fn recent_events(
    conn: &Connection,
    module: &str,
    limit: usize,
) -> rusqlite::Result<Vec<EventRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, ts, level, code, message, explain, data FROM event_log WHERE module = ?1 ORDER BY ts DESC, rowid DESC LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![module, limit as i64], |row| {
        let data: Option<String> = row.get(6)?;
        Ok(EventRecord {
            id: row.get(0)?,
            ts: row.get(1)?,
            level: row.get(2)?,
            code: row.get(3)?,
            message: row.get(4)?,
            explain: row.get(5)?,
            data: data.and_then(|raw| serde_json::from_str(&raw).ok()),
        })
    })?;
    rows.collect()
}
