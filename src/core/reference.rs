use crate::core::{ConfigProvider, ReferenceSet, ReferenceSource};
use crate::utils::error::{Result, UploadError};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Field of each reference entry that carries the identifier.
pub const REFERENCE_FIELD: &str = "ctc_number";

/// Fetches already-uploaded identifiers from the lookup service.
///
/// One GET per upload, no retry. Any failure (transport error, non-2xx status,
/// unexpected body) surfaces as [`UploadError::UpstreamUnavailable`] so the
/// caller aborts before reading a single row.
pub struct HttpReferenceFetcher {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpReferenceFetcher {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            timeout,
        }
    }

    pub fn from_config<C: ConfigProvider>(config: &C) -> Self {
        Self::new(config.reference_endpoint(), config.request_timeout())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ReferenceSource for HttpReferenceFetcher {
    async fn fetch_known_identifiers(&self) -> Result<ReferenceSet> {
        tracing::debug!("Fetching reference identifiers from: {}", self.endpoint);

        let response = self
            .client
            .get(&self.endpoint)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| UploadError::UpstreamUnavailable {
                message: format!("request to {} failed: {}", self.endpoint, e),
            })?;

        let status = response.status();
        tracing::debug!("Reference service response status: {}", status);

        if !status.is_success() {
            return Err(UploadError::UpstreamUnavailable {
                message: format!("{} responded with status {}", self.endpoint, status),
            });
        }

        let body: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| UploadError::UpstreamUnavailable {
                    message: format!("invalid response body: {}", e),
                })?;

        parse_reference_body(body)
    }
}

/// Extracts identifiers from a `[{"ctc_number": ...}, ...]` payload.
pub fn parse_reference_body(body: serde_json::Value) -> Result<ReferenceSet> {
    let serde_json::Value::Array(items) = body else {
        return Err(UploadError::UpstreamUnavailable {
            message: "expected a JSON array of reference entries".to_string(),
        });
    };

    let total = items.len();
    let identifiers: ReferenceSet = items
        .into_iter()
        .filter_map(|item| match item.get(REFERENCE_FIELD) {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
        .collect();

    if identifiers.len() < total {
        tracing::debug!(
            "Skipped {} reference entries without a usable '{}'",
            total - identifiers.len(),
            REFERENCE_FIELD
        );
    }

    Ok(identifiers)
}
