//! HTTP client for the extraction bridge.

use std::time::Duration;

use reqwest::{Client, Url};

use crate::error::ExtractionError;
use crate::models::{BridgeConfig, EncodedPayload};
use crate::server::protocol::{ErrorBody, ExtractRequest, HealthResponse};

pub const UNKNOWN_SERVER_ERROR: &str = "Unknown error while reading the server response.";

pub struct BridgeClient {
    client: Client,
    url: String,
}

impl BridgeClient {
    pub fn new(config: &BridgeConfig) -> Result<Self, ExtractionError> {
        Url::parse(&config.url).map_err(|e| {
            ExtractionError::Transport(format!("invalid bridge url {}: {}", config.url, e))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExtractionError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST one document and return the raw success body.
    ///
    /// On a non-success status the bridge's `{ error }` text is returned verbatim.
    pub async fn post_document(&self, payload: &EncodedPayload) -> Result<String, ExtractionError> {
        let response = self
            .client
            .post(&self.url)
            .json(&ExtractRequest::new(payload.clone()))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = match serde_json::from_str::<serde_json::Value>(&body) {
                Ok(value) => serde_json::from_value::<ErrorBody>(value)
                    .ok()
                    .map(|b| b.error)
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| format!("request failed with status {}", status.as_u16())),
                Err(_) => UNKNOWN_SERVER_ERROR.to_string(),
            };
            return Err(ExtractionError::Server(message));
        }

        Ok(body)
    }

    /// Query `GET /health` on the bridge's origin.
    pub async fn health(&self) -> Result<HealthResponse, ExtractionError> {
        let mut url = Url::parse(&self.url)
            .map_err(|e| ExtractionError::Transport(e.to_string()))?;
        url.set_path("/health");
        url.set_query(None);

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ExtractionError::Server(format!(
                "health check failed with status: {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ExtractionError::InvalidResponseFormat(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_router;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use serde_json::json;

    fn payload() -> EncodedPayload {
        EncodedPayload {
            data: "AAEC".to_string(),
            mime_type: "image/png".to_string(),
        }
    }

    async fn client_for(app: Router) -> BridgeClient {
        let base = spawn_router(app).await;
        BridgeClient::new(&BridgeConfig {
            url: format!("{}/api/extract", base),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_invalid_url_rejected() {
        let config = BridgeConfig {
            url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            BridgeClient::new(&config),
            Err(ExtractionError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_post_document_returns_raw_body() {
        let app = Router::new().route(
            "/api/extract",
            post(|axum::Json(req): axum::Json<ExtractRequest>| async move {
                let payload = req.payload().cloned().unwrap();
                assert_eq!(payload.mime_type, "image/png");
                "[]"
            }),
        );
        let client = client_for(app).await;
        assert_eq!(client.post_document(&payload()).await.unwrap(), "[]");
    }

    #[tokio::test]
    async fn test_error_body_is_verbatim() {
        let app = Router::new().route(
            "/api/extract",
            post(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    axum::Json(json!({"error": "The API key environment variable API_KEY is not configured."})),
                )
            }),
        );
        let client = client_for(app).await;
        let err = client.post_document(&payload()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "The API key environment variable API_KEY is not configured."
        );
    }

    #[tokio::test]
    async fn test_json_without_error_field_reports_status() {
        let app = Router::new().route(
            "/api/extract",
            post(|| async { (StatusCode::BAD_GATEWAY, axum::Json(json!({"detail": "x"}))) }),
        );
        let client = client_for(app).await;
        let err = client.post_document(&payload()).await.unwrap_err();
        assert_eq!(err.to_string(), "request failed with status 502");
    }

    #[tokio::test]
    async fn test_non_json_error_body() {
        let app = Router::new().route(
            "/api/extract",
            post(|| async { (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed") }),
        );
        let client = client_for(app).await;
        let err = client.post_document(&payload()).await.unwrap_err();
        assert_eq!(err.to_string(), UNKNOWN_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = BridgeClient::new(&BridgeConfig {
            url: format!("http://{}/api/extract", addr),
            ..Default::default()
        })
        .unwrap();
        let err = client.post_document(&payload()).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Transport(_)));
    }

    #[tokio::test]
    async fn test_health_uses_origin() {
        let app = Router::new().route(
            "/health",
            get(|| async {
                axum::Json(HealthResponse {
                    status: "ok".to_string(),
                    model: "gemini-2.5-flash".to_string(),
                    credential_configured: true,
                })
            }),
        );
        let client = client_for(app).await;
        let health = client.health().await.unwrap();
        assert_eq!(health.status, "ok");
        assert!(health.credential_configured);
    }
}
