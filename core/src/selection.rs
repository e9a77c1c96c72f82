//! Provider/model selection kept consistent with the model catalog.
//!
//! A provider change always re-derives the model: the first catalog model
//! owned by the new provider wins, and no match selects the empty model. A
//! direct model pick is trusted as-is because the dropdown it comes from is
//! already filtered to the current provider.
//!
//! Catalog refreshes run as Tokio tasks tagged with the coordinator
//! generation at request time. [`SelectionCoordinator::teardown`] and every
//! re-initialisation advance the generation, which turns any result still in
//! flight into a no-op.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::catalog::{CatalogError, CatalogSource, Model, ModelCatalog, Provider};
pub use crate::errors::SelectionError;

/// What happens when `select_provider` names a provider that is not in the
/// catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownProviderPolicy {
    /// Clear the provider and re-derive the model by name.
    #[default]
    Clear,
    /// Reject the call and keep the current selection.
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionState {
    NoProviderSelected,
    ProviderSelectedNoModel,
    ProviderAndModelSelected,
}

/// Handle for a catalog refresh started by [`SelectionCoordinator::initialize`].
/// Dropping it aborts the underlying task.
pub struct PendingRefresh {
    generation: u64,
    task: JoinHandle<Result<ModelCatalog, CatalogError>>,
}

impl PendingRefresh {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PendingRefresh {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[derive(Debug)]
pub enum RefreshOutcome {
    Applied { models: usize },
    /// The coordinator moved on before the refresh resolved.
    Stale,
    Failed(CatalogError),
}

#[derive(Debug)]
pub struct SelectionCoordinator {
    catalog: ModelCatalog,
    provider: Option<Provider>,
    model: String,
    policy: UnknownProviderPolicy,
    generation: u64,
    /// Restored provider name the current catalog does not list yet.
    unresolved_provider: Option<String>,
}

impl SelectionCoordinator {
    pub fn new(policy: UnknownProviderPolicy) -> Self {
        Self {
            catalog: ModelCatalog::builtin(),
            provider: None,
            model: String::new(),
            policy,
            generation: 0,
            unresolved_provider: None,
        }
    }

    /// Install the built-in catalog and start fetching a fresh one from
    /// `source`. Must be called from within a Tokio runtime.
    pub fn initialize(&mut self, source: Arc<dyn CatalogSource>) -> PendingRefresh {
        self.generation += 1;
        self.catalog = ModelCatalog::builtin();
        let task = tokio::spawn(async move { source.fetch_catalog().await });
        PendingRefresh {
            generation: self.generation,
            task,
        }
    }

    /// Wait for `pending` and apply its catalog unless it went stale.
    pub async fn complete_refresh(&mut self, mut pending: PendingRefresh) -> RefreshOutcome {
        let result = match (&mut pending.task).await {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => Err(CatalogError::Cancelled),
            Err(err) => Err(CatalogError::Request(err.to_string())),
        };
        if pending.generation != self.generation {
            return RefreshOutcome::Stale;
        }
        match result {
            Ok(catalog) => {
                let models = catalog.models.len();
                self.apply_catalog(pending.generation, catalog);
                RefreshOutcome::Applied { models }
            }
            Err(err) => RefreshOutcome::Failed(err),
        }
    }

    /// Replace the catalog wholesale if `generation` is still current.
    /// The model is left untouched; a restored provider that the previous
    /// catalog did not list is looked up again by name.
    pub fn apply_catalog(&mut self, generation: u64, catalog: ModelCatalog) -> bool {
        if generation != self.generation {
            return false;
        }
        self.catalog = catalog;
        if let Some(name) = self.unresolved_provider.take() {
            if self.provider.is_none() {
                self.provider = self.catalog.provider(&name).cloned();
            }
        }
        true
    }

    /// Invalidate every refresh still in flight.
    pub fn teardown(&mut self) {
        self.generation += 1;
    }

    pub fn select_provider(&mut self, name: &str) -> Result<SelectionState, SelectionError> {
        let provider = self.catalog.provider(name).cloned();
        if provider.is_none() && self.policy == UnknownProviderPolicy::Reject {
            return Err(SelectionError::UnknownProvider(name.to_string()));
        }
        self.provider = provider;
        self.unresolved_provider = None;
        self.model = self
            .catalog
            .first_model_for(name)
            .map(|m| m.name.clone())
            .unwrap_or_default();
        Ok(self.state())
    }

    /// Set the model without checking it against the current provider.
    pub fn select_model(&mut self, name: impl Into<String>) -> SelectionState {
        self.model = name.into();
        self.state()
    }

    /// Apply an initial provider/model pair verbatim, without re-deriving
    /// the model. A provider missing from the current catalog is resolved
    /// again when the next refreshed catalog is applied.
    pub fn restore(&mut self, provider: Option<&str>, model: Option<&str>) {
        self.provider = provider.and_then(|name| self.catalog.provider(name).cloned());
        self.unresolved_provider = match (provider, &self.provider) {
            (Some(name), None) => Some(name.to_string()),
            _ => None,
        };
        self.model = model.unwrap_or_default().to_string();
    }

    pub fn state(&self) -> SelectionState {
        if !self.model.is_empty() {
            SelectionState::ProviderAndModelSelected
        } else if self.provider.is_some() {
            SelectionState::ProviderSelectedNoModel
        } else {
            SelectionState::NoProviderSelected
        }
    }

    /// True when no model is selected or the selected model belongs to the
    /// selected provider.
    pub fn is_consistent(&self) -> bool {
        if self.model.is_empty() {
            return true;
        }
        match &self.provider {
            Some(provider) => self.catalog.contains_model(&provider.name, &self.model),
            None => false,
        }
    }

    pub fn provider(&self) -> Option<&Provider> {
        self.provider.as_ref()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn providers(&self) -> &[Provider] {
        &self.catalog.providers
    }

    pub fn models_for_selected_provider(&self) -> Vec<&Model> {
        match &self.provider {
            Some(provider) => self.catalog.models_for(&provider.name),
            None => Vec::new(),
        }
    }

    pub fn policy(&self) -> UnknownProviderPolicy {
        self.policy
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ProviderKind;
    use async_trait::async_trait;
    use tokio::sync::Notify;

    fn provider(name: &str) -> Provider {
        Provider {
            name: name.to_string(),
            label: name.to_string(),
            kind: ProviderKind::Cloud,
            requires_api_key: true,
        }
    }

    fn coordinator(policy: UnknownProviderPolicy) -> SelectionCoordinator {
        let mut coordinator = SelectionCoordinator::new(policy);
        let generation = coordinator.generation();
        coordinator.apply_catalog(
            generation,
            ModelCatalog::new(
                vec![provider("X"), provider("Y"), provider("Z")],
                vec![Model::new("m1", "M1", "X"), Model::new("m2", "M2", "Y")],
            ),
        );
        coordinator
    }

    struct FixedSource(ModelCatalog);

    #[async_trait]
    impl CatalogSource for FixedSource {
        async fn fetch_catalog(&self) -> Result<ModelCatalog, CatalogError> {
            Ok(self.0.clone())
        }
    }

    struct GatedSource {
        gate: Arc<Notify>,
        catalog: ModelCatalog,
    }

    #[async_trait]
    impl CatalogSource for GatedSource {
        async fn fetch_catalog(&self) -> Result<ModelCatalog, CatalogError> {
            self.gate.notified().await;
            Ok(self.catalog.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl CatalogSource for FailingSource {
        async fn fetch_catalog(&self) -> Result<ModelCatalog, CatalogError> {
            Err(CatalogError::Request("offline".into()))
        }
    }

    #[test]
    fn provider_change_picks_first_matching_model() {
        let mut c = coordinator(UnknownProviderPolicy::Clear);
        let state = c.select_provider("X").unwrap();
        assert_eq!(c.model(), "m1");
        assert_eq!(state, SelectionState::ProviderAndModelSelected);
        assert!(c.is_consistent());
    }

    #[test]
    fn provider_without_models_selects_empty_model() {
        let mut c = coordinator(UnknownProviderPolicy::Clear);
        let state = c.select_provider("Z").unwrap();
        assert_eq!(c.model(), "");
        assert_eq!(c.provider().unwrap().name, "Z");
        assert_eq!(state, SelectionState::ProviderSelectedNoModel);
    }

    #[test]
    fn every_provider_change_re_derives_the_model() {
        let mut c = coordinator(UnknownProviderPolicy::Clear);
        c.select_provider("X").unwrap();
        c.select_provider("Y").unwrap();
        assert_eq!(c.model(), "m2");
        assert_eq!(c.provider().unwrap().name, "Y");
    }

    #[test]
    fn unknown_provider_clears_under_clear_policy() {
        let mut c = coordinator(UnknownProviderPolicy::Clear);
        c.select_provider("X").unwrap();
        let state = c.select_provider("Nope").unwrap();
        assert!(c.provider().is_none());
        assert_eq!(c.model(), "");
        assert_eq!(state, SelectionState::NoProviderSelected);
    }

    #[test]
    fn unknown_provider_is_rejected_under_reject_policy() {
        let mut c = coordinator(UnknownProviderPolicy::Reject);
        c.select_provider("X").unwrap();
        let err = c.select_provider("Nope").unwrap_err();
        assert!(matches!(err, SelectionError::UnknownProvider(name) if name == "Nope"));
        assert_eq!(c.provider().unwrap().name, "X");
        assert_eq!(c.model(), "m1");
    }

    #[test]
    fn select_model_is_not_cross_checked() {
        let mut c = coordinator(UnknownProviderPolicy::Clear);
        c.select_provider("X").unwrap();
        let state = c.select_model("m2");
        assert_eq!(c.model(), "m2");
        assert_eq!(state, SelectionState::ProviderAndModelSelected);
        // m2 belongs to Y; the mismatch is observable but not prevented.
        assert!(!c.is_consistent());
    }

    #[test]
    fn select_model_without_provider_is_allowed() {
        let mut c = coordinator(UnknownProviderPolicy::Clear);
        assert_eq!(c.state(), SelectionState::NoProviderSelected);
        assert_eq!(c.select_model("m1"), SelectionState::ProviderAndModelSelected);
        assert!(c.provider().is_none());
    }

    #[test]
    fn dropdown_lists_only_selected_provider_models() {
        let mut c = coordinator(UnknownProviderPolicy::Clear);
        assert!(c.models_for_selected_provider().is_empty());
        c.select_provider("Y").unwrap();
        let names: Vec<_> = c
            .models_for_selected_provider()
            .into_iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, vec!["m2"]);
    }

    #[test]
    fn restore_keeps_model_verbatim() {
        let mut c = coordinator(UnknownProviderPolicy::Clear);
        c.restore(Some("Y"), Some("m2"));
        assert_eq!(c.provider().unwrap().name, "Y");
        assert_eq!(c.model(), "m2");
        c.restore(None, None);
        assert_eq!(c.state(), SelectionState::NoProviderSelected);
    }

    #[tokio::test]
    async fn restored_provider_resolves_after_refresh() {
        let mut c = SelectionCoordinator::new(UnknownProviderPolicy::Clear);
        let refreshed = ModelCatalog::new(vec![provider("Q")], vec![Model::new("q1", "Q1", "Q")]);
        let pending = c.initialize(Arc::new(FixedSource(refreshed)));
        c.restore(Some("Q"), Some("q1"));
        assert!(c.provider().is_none());
        assert_eq!(c.model(), "q1");

        c.complete_refresh(pending).await;
        assert_eq!(c.provider().unwrap().name, "Q");
        assert_eq!(c.model(), "q1");
        assert!(c.is_consistent());
    }

    #[tokio::test]
    async fn explicit_provider_choice_is_not_overridden_by_refresh() {
        let mut c = SelectionCoordinator::new(UnknownProviderPolicy::Clear);
        let refreshed = ModelCatalog::new(vec![provider("Q")], vec![Model::new("q1", "Q1", "Q")]);
        let pending = c.initialize(Arc::new(FixedSource(refreshed)));
        c.restore(Some("Q"), Some("q1"));
        c.select_provider("Nope").unwrap();

        c.complete_refresh(pending).await;
        assert!(c.provider().is_none());
        assert_eq!(c.model(), "");
    }

    #[test]
    fn stale_generation_is_ignored() {
        let mut c = coordinator(UnknownProviderPolicy::Clear);
        let old = c.generation();
        c.teardown();
        assert!(!c.apply_catalog(old, ModelCatalog::default()));
        assert!(c.catalog().provider("X").is_some());
    }

    #[tokio::test]
    async fn refresh_replaces_catalog_wholesale() {
        let mut c = SelectionCoordinator::new(UnknownProviderPolicy::Clear);
        let refreshed = ModelCatalog::new(vec![provider("Q")], vec![Model::new("q1", "Q1", "Q")]);
        let pending = c.initialize(Arc::new(FixedSource(refreshed.clone())));
        assert_eq!(c.catalog(), &ModelCatalog::builtin());

        let outcome = c.complete_refresh(pending).await;
        assert!(matches!(outcome, RefreshOutcome::Applied { models: 1 }));
        assert_eq!(c.catalog(), &refreshed);
    }

    #[tokio::test]
    async fn refresh_after_teardown_is_discarded() {
        let gate = Arc::new(Notify::new());
        let mut c = SelectionCoordinator::new(UnknownProviderPolicy::Clear);
        let pending = c.initialize(Arc::new(GatedSource {
            gate: gate.clone(),
            catalog: ModelCatalog::default(),
        }));
        c.teardown();
        gate.notify_one();

        let outcome = c.complete_refresh(pending).await;
        assert!(matches!(outcome, RefreshOutcome::Stale));
        assert_eq!(c.catalog(), &ModelCatalog::builtin());
    }

    #[tokio::test]
    async fn reinitialize_invalidates_earlier_refresh() {
        let mut c = SelectionCoordinator::new(UnknownProviderPolicy::Clear);
        let first = c.initialize(Arc::new(FixedSource(ModelCatalog::default())));
        let second = c.initialize(Arc::new(FixedSource(ModelCatalog::builtin())));
        assert!(matches!(c.complete_refresh(first).await, RefreshOutcome::Stale));
        assert!(matches!(
            c.complete_refresh(second).await,
            RefreshOutcome::Applied { .. }
        ));
    }

    #[tokio::test]
    async fn failed_refresh_keeps_current_catalog() {
        let mut c = SelectionCoordinator::new(UnknownProviderPolicy::Clear);
        let pending = c.initialize(Arc::new(FailingSource));
        let outcome = c.complete_refresh(pending).await;
        assert!(matches!(outcome, RefreshOutcome::Failed(CatalogError::Request(_))));
        assert_eq!(c.catalog(), &ModelCatalog::builtin());
    }
}
