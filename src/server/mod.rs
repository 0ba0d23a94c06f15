//! HTTP bridge between extraction clients and the Gemini API.
//!
//! The bridge owns the model credential. It accepts
//! `POST {path}` with `{ "fileData": { "data", "mimeType" } }`, forwards the
//! document with the extraction prompt and schema, and answers with the
//! model's JSON text verbatim. Failures are `{ "error": "..." }` bodies.

pub mod gemini;
pub mod protocol;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};

use crate::error::{BridgeError, ExtractionError};
use crate::models::Config;
use crate::server::gemini::GeminiClient;
use crate::server::protocol::{ErrorBody, ExtractRequest, HealthResponse};
use crate::services::PROCESSING_FAILED_PREFIX;

pub const MISSING_FILE_DATA: &str = "Missing file data in the request body.";

#[derive(Clone)]
pub struct BridgeState {
    model: String,
    api_key_env: String,
    gemini: Option<Arc<GeminiClient>>,
}

impl BridgeState {
    /// Build state from config. A missing key is not fatal: each request answers 500.
    pub fn from_config(config: &Config) -> Result<Self, BridgeError> {
        let gemini = match GeminiClient::new(&config.gemini) {
            Ok(client) => Some(Arc::new(client)),
            Err(ExtractionError::MissingCredential(name)) => {
                tracing::warn!(variable = %name, "API key not configured; requests will fail");
                None
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            model: config.gemini.model.clone(),
            api_key_env: config.gemini.api_key_env.clone(),
            gemini,
        })
    }

    pub fn with_client(client: GeminiClient, api_key_env: impl Into<String>) -> Self {
        Self {
            model: client.model().to_string(),
            api_key_env: api_key_env.into(),
            gemini: Some(Arc::new(client)),
        }
    }

    pub fn without_credential(model: impl Into<String>, api_key_env: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key_env: api_key_env.into(),
            gemini: None,
        }
    }
}

pub fn bridge_router(state: BridgeState, path: &str) -> Router {
    Router::new()
        .route(path, post(extract).fallback(method_not_allowed))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, axum::Json(ErrorBody::new(message))).into_response()
}

async fn method_not_allowed() -> Response {
    (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed").into_response()
}

async fn health(State(state): State<BridgeState>) -> axum::Json<HealthResponse> {
    axum::Json(HealthResponse {
        status: "ok".to_string(),
        model: state.model.clone(),
        credential_configured: state.gemini.is_some(),
    })
}

async fn extract(State(state): State<BridgeState>, body: Bytes) -> Response {
    let Some(gemini) = state.gemini.as_ref() else {
        let err = ExtractionError::MissingCredential(state.api_key_env.clone());
        tracing::error!(error = %err, "rejecting request");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string());
    };

    let request: ExtractRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            tracing::debug!(error = %e, "unparseable request body");
            return error_response(StatusCode::BAD_REQUEST, MISSING_FILE_DATA);
        }
    };
    let Some(payload) = request.payload() else {
        return error_response(StatusCode::BAD_REQUEST, MISSING_FILE_DATA);
    };

    tracing::info!(
        mime_type = %payload.mime_type,
        encoded_bytes = payload.data.len(),
        "extraction request"
    );

    match gemini.generate_table_json(payload).await {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            text,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "extraction failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("{} {}", PROCESSING_FAILED_PREFIX, e),
            )
        }
    }
}

pub struct BridgeServer {
    config: Config,
    state: BridgeState,
}

impl BridgeServer {
    pub fn new(config: Config) -> Result<Self, BridgeError> {
        let state = BridgeState::from_config(&config)?;
        Ok(Self { config, state })
    }

    pub fn router(&self) -> Router {
        bridge_router(self.state.clone(), &self.config.server.path)
    }

    pub async fn run(&self) -> Result<(), BridgeError> {
        let addr = format!("{}:{}", self.config.server.host, self.config.server.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|source| BridgeError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local: SocketAddr = listener.local_addr()?;

        tracing::info!(
            addr = %local,
            path = %self.config.server.path,
            model = %self.state.model,
            "bridge listening"
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("bridge stopped");
        Ok(())
    }
}

pub async fn run_bridge(config: Config) -> Result<(), BridgeError> {
    let server = BridgeServer::new(config)?;
    server.run().await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DEFAULT_SERVER_PATH, GeminiConfig};
    use crate::test_support::spawn_router;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    const VALID_BODY: &str = r#"{"fileData":{"data":"AAEC","mimeType":"application/pdf"}}"#;

    fn make_request(method: &str, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn state_with_mock_model(reply: Value, status: StatusCode) -> BridgeState {
        let app = Router::new().route(
            "/models/:call",
            post(move || {
                let reply = reply.clone();
                async move { (status, axum::Json(reply)) }
            }),
        );
        let base = spawn_router(app).await;
        let config = GeminiConfig {
            api_base: base,
            ..Default::default()
        };
        BridgeState::with_client(GeminiClient::with_api_key(&config, "k").unwrap(), "API_KEY")
    }

    #[tokio::test]
    async fn test_get_is_method_not_allowed() {
        let app = bridge_router(
            BridgeState::without_credential("m", "API_KEY"),
            DEFAULT_SERVER_PATH,
        );
        let response = app
            .oneshot(make_request("GET", DEFAULT_SERVER_PATH, ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body_text(response).await, "Method Not Allowed");
    }

    #[tokio::test]
    async fn test_missing_credential_is_500() {
        let app = bridge_router(
            BridgeState::without_credential("m", "API_KEY"),
            DEFAULT_SERVER_PATH,
        );
        let response = app
            .oneshot(make_request("POST", DEFAULT_SERVER_PATH, VALID_BODY))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorBody = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(
            body.error,
            "The API key environment variable API_KEY is not configured."
        );
    }

    #[tokio::test]
    async fn test_missing_file_data_is_400() {
        let state = state_with_mock_model(json!({}), StatusCode::OK).await;
        for body in ["{}", r#"{"fileData":{"data":"","mimeType":"image/png"}}"#, "not json"] {
            let app = bridge_router(state.clone(), DEFAULT_SERVER_PATH);
            let response = app
                .oneshot(make_request("POST", DEFAULT_SERVER_PATH, body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
            let err: ErrorBody = serde_json::from_str(&body_text(response).await).unwrap();
            assert_eq!(err.error, MISSING_FILE_DATA);
        }
    }

    #[tokio::test]
    async fn test_success_returns_model_text_verbatim() {
        let model_text = "[{\"Periodo\":\"Enero\",\"Demanda\":\"10\",\"Consumo Total\":\"100\",\"Factor de potencia\":\"0.9\",\"Factor de Carga\":\"0.5\",\"Precio Medio\":\"1.2\"}]";
        let state = state_with_mock_model(
            json!({"candidates": [{"content": {"parts": [{"text": format!("{}\n", model_text)}]}}]}),
            StatusCode::OK,
        )
        .await;

        let app = bridge_router(state, DEFAULT_SERVER_PATH);
        let response = app
            .oneshot(make_request("POST", DEFAULT_SERVER_PATH, VALID_BODY))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(body_text(response).await, model_text);
    }

    #[tokio::test]
    async fn test_model_failure_is_500_with_message() {
        let state = state_with_mock_model(
            json!({"error": {"code": 429, "message": "Resource exhausted"}}),
            StatusCode::TOO_MANY_REQUESTS,
        )
        .await;

        let app = bridge_router(state, DEFAULT_SERVER_PATH);
        let response = app
            .oneshot(make_request("POST", DEFAULT_SERVER_PATH, VALID_BODY))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let err: ErrorBody = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(err.error, "Failed to process file. Resource exhausted");
    }

    #[tokio::test]
    async fn test_health_reports_credential() {
        let app = bridge_router(
            BridgeState::without_credential("gemini-2.5-flash", "API_KEY"),
            DEFAULT_SERVER_PATH,
        );
        let response = app
            .oneshot(make_request("GET", "/health", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let health: HealthResponse = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(health.model, "gemini-2.5-flash");
        assert!(!health.credential_configured);
    }

    #[tokio::test]
    async fn test_end_to_end_through_bridge_extractor() {
        use crate::client::BridgeClient;
        use crate::models::{BridgeConfig, UploadedFile};
        use crate::services::{BatchOrchestrator, BridgeExtractor, FailureKind};

        let state = state_with_mock_model(
            json!({"candidates": [{"content": {"parts": [{"text": "[]"}]}}]}),
            StatusCode::OK,
        )
        .await;
        let base = spawn_router(bridge_router(state, DEFAULT_SERVER_PATH)).await;
        let client = BridgeClient::new(&BridgeConfig {
            url: format!("{}{}", base, DEFAULT_SERVER_PATH),
            ..Default::default()
        })
        .unwrap();

        let files = vec![UploadedFile::from_bytes("blank.png", "image/png", vec![7u8; 16])];
        let result = BatchOrchestrator::new(Arc::new(BridgeExtractor::new(client)))
            .analyze(&files)
            .await;
        assert_eq!(
            result.error_for(files[0].id()).unwrap().kind,
            FailureKind::NotFound
        );
    }
}
