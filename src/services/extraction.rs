//! Table extraction through the external recognition service.

use std::sync::Arc;

use async_trait::async_trait;

use crate::client::BridgeClient;
use crate::error::ExtractionError;
use crate::models::{BillingRow, Config, EncodedPayload};
use crate::server::gemini::GeminiClient;

/// Turns one encoded document into billing rows.
///
/// An empty vector means the service found no matching table; it is not an error.
#[async_trait]
pub trait TableExtractor: Send + Sync {
    async fn extract(&self, payload: &EncodedPayload) -> Result<Vec<BillingRow>, ExtractionError>;

    /// Short label for logs and status output.
    fn describe(&self) -> String;
}

/// Decode a schema-constrained reply: a JSON array of six-field string records.
///
/// Anything else is rejected whole; partial data is never returned.
pub fn decode_rows(body: &str) -> Result<Vec<BillingRow>, ExtractionError> {
    serde_json::from_str::<Vec<BillingRow>>(body.trim())
        .map_err(|e| ExtractionError::InvalidResponseFormat(e.to_string()))
}

/// Extraction through the HTTP bridge, which holds the model credential.
pub struct BridgeExtractor {
    client: BridgeClient,
}

impl BridgeExtractor {
    pub fn new(client: BridgeClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TableExtractor for BridgeExtractor {
    async fn extract(&self, payload: &EncodedPayload) -> Result<Vec<BillingRow>, ExtractionError> {
        let body = self.client.post_document(payload).await?;
        decode_rows(&body)
    }

    fn describe(&self) -> String {
        format!("bridge {}", self.client.url())
    }
}

/// Extraction straight against the Gemini API with a local key.
pub struct GeminiExtractor {
    client: GeminiClient,
}

impl GeminiExtractor {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TableExtractor for GeminiExtractor {
    async fn extract(&self, payload: &EncodedPayload) -> Result<Vec<BillingRow>, ExtractionError> {
        let text = self.client.generate_table_json(payload).await?;
        decode_rows(&text)
    }

    fn describe(&self) -> String {
        format!("gemini {}", self.client.model())
    }
}

/// Pick the extractor for this run: the bridge by default, Gemini with `direct`.
pub fn create_extractor(
    config: &Config,
    direct: bool,
) -> Result<Arc<dyn TableExtractor>, ExtractionError> {
    if direct {
        let client = GeminiClient::new(&config.gemini)?;
        Ok(Arc::new(GeminiExtractor::new(client)))
    } else {
        let client = BridgeClient::new(&config.bridge)?;
        Ok(Arc::new(BridgeExtractor::new(client)))
    }
}
