//! Listing the agents and models a server offers.

use reqwest::Method;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::client::OpenCodeClient;
use crate::error::{ModelError, ModelResult, Step};
use crate::types::{AgentInfo, ProviderCatalog};

impl OpenCodeClient {
    /// List agent profiles. `GET /agent`.
    #[instrument(skip(self, cancel))]
    pub async fn list_agents(&self, cancel: &CancellationToken) -> ModelResult<Vec<AgentInfo>> {
        let agents: Vec<AgentInfo> = self.get_json(Step::ListAgents, &["agent"], cancel).await?;
        debug!(count = agents.len(), "Listed agents");
        Ok(agents)
    }

    /// List configured providers and their models. `GET /config/providers`.
    #[instrument(skip(self, cancel))]
    pub async fn list_providers(&self, cancel: &CancellationToken) -> ModelResult<ProviderCatalog> {
        let catalog: ProviderCatalog = self
            .get_json(Step::ListProviders, &["config", "providers"], cancel)
            .await?;
        debug!(count = catalog.providers.len(), "Listed providers");
        Ok(catalog)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        step: Step,
        segments: &[&str],
        cancel: &CancellationToken,
    ) -> ModelResult<T> {
        let request = self.request(Method::GET, self.config().endpoint(segments));
        let body = self.send(step, request, cancel).await?;
        serde_json::from_str(&body)
            .map_err(|e| ModelError::protocol(step, format!("unexpected response shape: {e}")))
    }
}
