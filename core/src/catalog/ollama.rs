use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{CatalogError, CatalogSource, Model, ModelCatalog};

pub const OLLAMA_PROVIDER: &str = "Ollama";
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
    #[serde(default)]
    details: Option<TagDetails>,
}

#[derive(Debug, Deserialize)]
struct TagDetails {
    #[serde(default)]
    parameter_size: Option<String>,
}

/// Built-in catalog extended with the models a local Ollama server reports.
///
/// Discovery failures are logged and the built-in catalog is returned
/// unchanged, so this source never fails a refresh.
pub struct OllamaCatalogSource {
    client: Client,
    base_url: String,
}

impl OllamaCatalogSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("LoopAI-Core/0.1")
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn discover(&self) -> Result<Vec<Model>, CatalogError> {
        let url = format!("{}/api/tags", self.base_url.trim_end_matches('/'));
        let response = self.client.get(url).send().await?.error_for_status()?;
        let body: TagsResponse = response.json().await?;
        Ok(models_from_tags(body))
    }
}

#[async_trait]
impl CatalogSource for OllamaCatalogSource {
    async fn fetch_catalog(&self) -> Result<ModelCatalog, CatalogError> {
        let mut catalog = ModelCatalog::builtin();
        match self.discover().await {
            Ok(models) => {
                log::debug!(target: "catalog.ollama", "discovered {} local models", models.len());
                catalog.models.extend(models);
            }
            Err(err) => {
                log::warn!(
                    target: "catalog.ollama",
                    "[{}] local model discovery at {} failed: {err}",
                    err.code(),
                    self.base_url
                );
            }
        }
        Ok(catalog)
    }
}

fn models_from_tags(body: TagsResponse) -> Vec<Model> {
    body.models
        .into_iter()
        .map(|entry| {
            let label = match entry.details.and_then(|d| d.parameter_size) {
                Some(size) => format!("{} ({size})", entry.name),
                None => entry.name.clone(),
            };
            Model::new(entry.name, label, OLLAMA_PROVIDER)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_map_to_ollama_models() {
        let body: TagsResponse = serde_json::from_value(serde_json::json!({
            "models": [
                { "name": "llama3.2:latest", "details": { "parameter_size": "3.2B" } },
                { "name": "qwen2.5-coder" }
            ]
        }))
        .unwrap();
        let models = models_from_tags(body);
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].label, "llama3.2:latest (3.2B)");
        assert_eq!(models[1].label, "qwen2.5-coder");
        assert!(models.iter().all(|m| m.provider == OLLAMA_PROVIDER));
    }

    #[test]
    fn empty_tags_body_is_accepted() {
        let body: TagsResponse = serde_json::from_str("{}").unwrap();
        assert!(models_from_tags(body).is_empty());
    }

    #[tokio::test]
    async fn unreachable_server_falls_back_to_builtin() {
        // Reserve a port, then release it so nothing is listening there.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let source =
            OllamaCatalogSource::new(format!("http://{addr}"), Duration::from_secs(2)).unwrap();
        assert!(matches!(
            source.discover().await,
            Err(CatalogError::Request(_))
        ));
        let catalog = source.fetch_catalog().await.unwrap();
        assert_eq!(catalog, ModelCatalog::builtin());
    }
}
