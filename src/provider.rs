//! Upstream AI analysis provider client.
//!
//! The provider is an external collaborator: this module only forwards
//! requests and reports reachability. The governance layer measures these
//! calls but never implements the analysis itself.

use crate::config::ProviderSettings;
use crate::models::ChartMetadata;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures::future::BoxFuture;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Provider client error types.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport-level failure.
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Provider answered with a non-success status.
    #[error("provider returned status {0}")]
    Status(u16),
}

/// A single analysis job forwarded to the provider.
#[derive(Debug, Clone)]
pub struct AnalysisJob {
    /// Analysis prompt.
    pub prompt: String,
    /// Raw chart image payload.
    pub image_bytes: Vec<u8>,
    /// Chart metadata.
    pub chart: ChartMetadata,
}

/// Abstraction over the external AI analysis service.
///
/// Injected via application state so tests can substitute an in-process stub.
pub trait AnalysisProvider: Send + Sync {
    /// Forwards a job to the provider and returns its analysis payload.
    fn analyze(&self, job: AnalysisJob) -> BoxFuture<'_, Result<Value, ProviderError>>;

    /// Whether the provider currently answers its health endpoint.
    fn health_check(&self) -> BoxFuture<'_, bool>;
}

/// HTTP client for the analysis provider.
pub struct HttpAnalysisProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAnalysisProvider {
    /// Creates a provider client from settings.
    ///
    /// # Errors
    /// Returns error if the underlying HTTP client cannot be built.
    pub fn new(settings: &ProviderSettings) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl AnalysisProvider for HttpAnalysisProvider {
    fn analyze(&self, job: AnalysisJob) -> BoxFuture<'_, Result<Value, ProviderError>> {
        Box::pin(async move {
            let body = serde_json::json!({
                "prompt": job.prompt,
                "image_base64": BASE64.encode(&job.image_bytes),
                "symbol": job.chart.symbol,
                "timeframe": job.chart.timeframe,
                "indicators": job.chart.indicators,
            });

            let response = self
                .client
                .post(format!("{}/v1/analyze", self.base_url))
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(ProviderError::Status(status.as_u16()));
            }

            let payload: Value = response.json().await?;
            debug!("provider analysis completed");
            Ok(payload)
        })
    }

    fn health_check(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            match self
                .client
                .get(format!("{}/health", self.base_url))
                .send()
                .await
            {
                Ok(response) => response.status().is_success(),
                Err(_) => false,
            }
        })
    }
}
