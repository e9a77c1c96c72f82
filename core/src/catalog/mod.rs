//! Provider and model catalog.
//!
//! [`ModelCatalog::builtin`] is always available synchronously. A
//! [`CatalogSource`] produces a refreshed catalog asynchronously; the result
//! replaces the previous catalog wholesale.

mod ollama;
pub mod providers;

pub use ollama::{OllamaCatalogSource, DEFAULT_OLLAMA_BASE_URL, OLLAMA_PROVIDER};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use crate::errors::CatalogError;
use providers::PROVIDER_SEEDS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Cloud,
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub name: String,
    pub label: String,
    pub kind: ProviderKind,
    pub requires_api_key: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    pub name: String,
    pub label: String,
    /// Name of the owning [`Provider`].
    pub provider: String,
}

impl Model {
    pub fn new(name: impl Into<String>, label: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            provider: provider.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCatalog {
    pub providers: Vec<Provider>,
    /// Catalog order is dropdown order and decides first-match selection.
    pub models: Vec<Model>,
}

impl ModelCatalog {
    pub fn new(providers: Vec<Provider>, models: Vec<Model>) -> Self {
        Self { providers, models }
    }

    pub fn builtin() -> Self {
        let providers = PROVIDER_SEEDS
            .iter()
            .map(|seed| Provider {
                name: seed.name.to_string(),
                label: seed.label.to_string(),
                kind: seed.kind,
                requires_api_key: seed.requires_api_key,
            })
            .collect();
        let models = PROVIDER_SEEDS
            .iter()
            .flat_map(|seed| {
                seed.models
                    .iter()
                    .map(move |(name, label)| Model::new(*name, *label, seed.name))
            })
            .collect();
        Self { providers, models }
    }

    pub fn provider(&self, name: &str) -> Option<&Provider> {
        self.providers.iter().find(|p| p.name == name)
    }

    /// First model in catalog order owned by `provider`.
    pub fn first_model_for(&self, provider: &str) -> Option<&Model> {
        self.models.iter().find(|m| m.provider == provider)
    }

    /// Dropdown contents for `provider`: its named models in catalog order.
    pub fn models_for(&self, provider: &str) -> Vec<&Model> {
        self.models
            .iter()
            .filter(|m| m.provider == provider && !m.name.is_empty())
            .collect()
    }

    pub fn contains_model(&self, provider: &str, model: &str) -> bool {
        self.models
            .iter()
            .any(|m| m.provider == provider && m.name == model)
    }
}

/// Supplies a refreshed catalog.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_catalog(&self) -> Result<ModelCatalog, CatalogError>;
}

/// Source that always answers with the built-in catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticCatalogSource;

#[async_trait]
impl CatalogSource for StaticCatalogSource {
    async fn fetch_catalog(&self) -> Result<ModelCatalog, CatalogError> {
        Ok(ModelCatalog::builtin())
    }
}
