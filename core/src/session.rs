//! Session owner for credentials and provider/model selection.
//!
//! A [`ChatSession`] is created once per chat view and handed to child views
//! by reference. It is the place where failures from the lower layers are
//! logged and degraded: corrupt stored keys mean "no keys yet", a failed save
//! keeps the key for the current session, and a failed catalog refresh keeps
//! the built-in model list.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::{anyhow, Result};
use serde_json::json;

use crate::catalog::{CatalogSource, ModelCatalog, OllamaCatalogSource, Provider};
use crate::credentials::{CredentialError, CredentialStore, LoadOutcome};
use crate::db::DbPool;
use crate::logging::record_event;
use crate::selection::{
    PendingRefresh, RefreshOutcome, SelectionCoordinator, SelectionError, SelectionState,
};
use crate::settings::{self, SessionConfig};
use crate::storage::{SlotStore, SqliteSlotStore};

const CREDENTIALS_MODULE: &str = "session.credentials";
const SELECTION_MODULE: &str = "session.selection";
const CATALOG_MODULE: &str = "session.catalog";

/// What happened to an API key handed to [`ChatSession::update_api_key`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyUpdate {
    Saved,
    /// Usable until the session ends, but not persisted.
    SessionOnly,
    Rejected,
}

pub struct ChatSession {
    pool: DbPool,
    config: SessionConfig,
    credentials: CredentialStore,
    selection: SelectionCoordinator,
    pending: Option<PendingRefresh>,
}

impl ChatSession {
    /// Open a session with the stored configuration, SQLite-backed slots and
    /// local model discovery.
    pub async fn open(pool: DbPool) -> Result<Self> {
        let config = {
            let conn = pool.get().map_err(|err| anyhow!(err.to_string()))?;
            settings::load_config(&conn)?
        };
        let slots: Arc<dyn SlotStore> = Arc::new(SqliteSlotStore::new(pool.clone()));
        let source: Arc<dyn CatalogSource> = Arc::new(OllamaCatalogSource::new(
            config.ollama_base_url.clone(),
            StdDuration::from_secs(config.catalog_timeout_secs),
        )?);
        Ok(Self::open_with(pool, config, slots, source))
    }

    /// Open a session over explicit collaborators. Must be called from
    /// within a Tokio runtime because the catalog refresh starts here.
    pub fn open_with(
        pool: DbPool,
        config: SessionConfig,
        slots: Arc<dyn SlotStore>,
        source: Arc<dyn CatalogSource>,
    ) -> Self {
        let mut credentials = CredentialStore::with_slot(
            slots,
            config.credential_slot.clone(),
            config.credential_ttl(),
        );
        match credentials.load() {
            Ok(LoadOutcome::Missing) => {}
            Ok(LoadOutcome::Restored(count)) => record_event(
                &pool,
                "info",
                Some("CRD-0200"),
                CREDENTIALS_MODULE,
                "API keys restored",
                None,
                Some(json!({ "providers": count })),
            ),
            Err(err) => log_credential_error(&pool, &err, "Failed to load API keys"),
        }

        let mut selection = SelectionCoordinator::new(config.unknown_provider);
        let pending = selection.initialize(source);

        let active = pool
            .get()
            .map_err(|err| anyhow!(err.to_string()))
            .and_then(|conn| settings::read_active_selection(&conn));
        match active {
            Ok(Some(active)) => {
                selection.restore(active.provider.as_deref(), active.model.as_deref())
            }
            Ok(None) => selection.restore(
                Some(config.default_provider.as_str()),
                Some(config.default_model.as_str()),
            ),
            Err(err) => {
                record_event(
                    &pool,
                    "warn",
                    Some("SEL-1002"),
                    SELECTION_MODULE,
                    "Stored selection unreadable",
                    Some("Falling back to the default provider and model."),
                    Some(json!({ "error": err.to_string() })),
                );
                selection.restore(
                    Some(config.default_provider.as_str()),
                    Some(config.default_model.as_str()),
                );
            }
        }

        Self {
            pool,
            config,
            credentials,
            selection,
            pending: Some(pending),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn selection(&self) -> &SelectionCoordinator {
        &self.selection
    }

    pub fn provider(&self) -> Option<&Provider> {
        self.selection.provider()
    }

    pub fn model(&self) -> &str {
        self.selection.model()
    }

    pub fn catalog(&self) -> &ModelCatalog {
        self.selection.catalog()
    }

    pub fn api_key(&self, provider: &str) -> Option<&str> {
        self.credentials.get(provider)
    }

    /// Key for the selected provider, as shown in the key manager field.
    pub fn selected_api_key(&self) -> Option<&str> {
        self.provider().and_then(|p| self.credentials.get(&p.name))
    }

    pub fn update_api_key(&mut self, provider: &str, key: &str) -> KeyUpdate {
        match self.credentials.update(provider, key) {
            Ok(()) => KeyUpdate::Saved,
            Err(CredentialError::EmptyProvider) => {
                log_credential_error(
                    &self.pool,
                    &CredentialError::EmptyProvider,
                    "API key rejected",
                );
                KeyUpdate::Rejected
            }
            Err(err) => {
                log_credential_error(&self.pool, &err, "Failed to save API key");
                KeyUpdate::SessionOnly
            }
        }
    }

    pub fn clear_credentials(&mut self) {
        match self.credentials.clear() {
            Ok(()) => record_event(
                &self.pool,
                "info",
                Some("CRD-0201"),
                CREDENTIALS_MODULE,
                "API keys cleared",
                None,
                None,
            ),
            Err(err) => log_credential_error(&self.pool, &err, "Failed to clear stored API keys"),
        }
    }

    pub fn select_provider(&mut self, name: &str) -> Result<SelectionState, SelectionError> {
        match self.selection.select_provider(name) {
            Ok(state) => {
                self.persist_selection();
                Ok(state)
            }
            Err(err) => {
                record_event(
                    &self.pool,
                    "warn",
                    Some(err.code()),
                    SELECTION_MODULE,
                    &err.to_string(),
                    Some(err.explain()),
                    Some(json!({ "provider": name })),
                );
                Err(err)
            }
        }
    }

    pub fn select_model(&mut self, name: &str) -> SelectionState {
        let state = self.selection.select_model(name);
        self.persist_selection();
        state
    }

    /// Apply the outstanding catalog refresh, if any. Returns `None` when no
    /// refresh is outstanding.
    pub async fn complete_refresh(&mut self) -> Option<RefreshOutcome> {
        let pending = self.pending.take()?;
        let outcome = self.selection.complete_refresh(pending).await;
        match &outcome {
            RefreshOutcome::Applied { models } => record_event(
                &self.pool,
                "info",
                Some("CAT-0200"),
                CATALOG_MODULE,
                "Model catalog refreshed",
                None,
                Some(json!({ "models": models })),
            ),
            RefreshOutcome::Stale => {
                log::debug!(target: CATALOG_MODULE, "discarded stale catalog refresh")
            }
            RefreshOutcome::Failed(err) => record_event(
                &self.pool,
                "warn",
                Some(err.code()),
                CATALOG_MODULE,
                &err.to_string(),
                Some(err.explain()),
                None,
            ),
        }
        Some(outcome)
    }

    pub fn has_pending_refresh(&self) -> bool {
        self.pending.is_some()
    }

    /// Detach from the view: any refresh still running is aborted and its
    /// result will never be applied.
    pub fn teardown(&mut self) {
        self.selection.teardown();
        self.pending = None;
    }

    fn persist_selection(&self) {
        let provider = self.selection.provider().map(|p| p.name.as_str());
        let model = self.selection.model();
        let result = self
            .pool
            .get()
            .map_err(|err| anyhow!(err.to_string()))
            .and_then(|conn| settings::write_active_selection(&conn, provider, model));
        if let Err(err) = result {
            record_event(
                &self.pool,
                "warn",
                Some("SEL-1003"),
                SELECTION_MODULE,
                "Failed to persist selection",
                Some("The selection applies to this session only."),
                Some(json!({ "error": err.to_string() })),
            );
        }
    }
}

fn log_credential_error(pool: &DbPool, err: &CredentialError, message: &str) {
    let cleared = match err {
        CredentialError::Corrupt { cleared, .. } => Some(*cleared),
        _ => None,
    };
    record_event(
        pool,
        "warn",
        Some(err.code()),
        CREDENTIALS_MODULE,
        message,
        Some(err.explain()),
        Some(json!({ "error": err.to_string(), "cleared": cleared })),
    );
}
