use std::path::Path;

use aios_protocol::{A2aError, A2aResult, AGENT_CARD_PATH, AgentCard, AgentCardResolver};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Resolves cards from `http(s)://` base URLs (fetching the well-known
/// path) or from local JSON files.
#[derive(Debug, Clone, Default)]
pub struct HttpCardResolver {
    http: reqwest::Client,
}

impl HttpCardResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn fetch(&self, base_url: &str) -> A2aResult<AgentCard> {
        let url = format!("{}{AGENT_CARD_PATH}", base_url.trim_end_matches('/'));
        debug!(%url, "fetching agent card");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| A2aError::Resolution(format!("{url}: {e}")))?;
        response
            .json::<AgentCard>()
            .await
            .map_err(|e| A2aError::Resolution(format!("invalid agent card at {url}: {e}")))
    }

    async fn read(&self, path: &Path) -> A2aResult<AgentCard> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            A2aError::Resolution(format!("failed to read agent card from {}: {e}", path.display()))
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            A2aError::Resolution(format!("invalid agent card in {}: {e}", path.display()))
        })
    }
}

#[async_trait]
impl AgentCardResolver for HttpCardResolver {
    #[instrument(skip(self))]
    async fn resolve(&self, source: &str) -> A2aResult<AgentCard> {
        if source.starts_with("http://") || source.starts_with("https://") {
            self.fetch(source).await
        } else {
            self.read(Path::new(source)).await
        }
    }
}
