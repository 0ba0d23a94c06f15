//! Client for the Gemini `generateContent` REST endpoint.
//!
//! Sends the document inline next to a fixed instruction and constrains the
//! reply with a JSON schema: an array of objects carrying the six billing
//! columns as required strings.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::ExtractionError;
use crate::models::{BILLING_COLUMNS, EncodedPayload, GeminiConfig};

pub const EXTRACTION_PROMPT: &str = "Analiza la imagen o documento y extrae la información de la tabla de facturación. \
La tabla debe contener las siguientes 6 columnas: \"Periodo\", \"Demanda\", \"Consumo Total\", \
\"Factor de potencia\", \"Factor de Carga\" y \"Precio Medio\". Ignora cualquier otra tabla o texto. \
Si la tabla no se encuentra, devuelve un arreglo vacío. Asegúrate de que los valores sean cadenas de texto. \
No incluyas unidades en los valores numéricos, solo el número.";

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Output schema: `ARRAY` of `OBJECT`s with every billing column a required `STRING`.
pub fn response_schema() -> Value {
    let mut properties = Map::new();
    for column in BILLING_COLUMNS {
        properties.insert(column.to_string(), json!({ "type": "STRING" }));
    }

    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": properties,
            "required": BILLING_COLUMNS,
            "propertyOrdering": BILLING_COLUMNS,
        }
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    #[serde(rename_all = "camelCase")]
    Inline {
        inline_data: InlineData<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Gemini API client bound to one model and credential.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    api_base: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    /// Build a client, reading the key from the configured environment variable.
    pub fn new(config: &GeminiConfig) -> Result<Self, ExtractionError> {
        let api_key = config
            .api_key()
            .ok_or_else(|| ExtractionError::MissingCredential(config.api_key_env.clone()))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(
        config: &GeminiConfig,
        api_key: impl Into<String>,
    ) -> Result<Self, ExtractionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExtractionError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }

    /// Run the extraction prompt on one document and return the model's raw text, trimmed.
    pub async fn generate_table_json(
        &self,
        payload: &EncodedPayload,
    ) -> Result<String, ExtractionError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: EXTRACTION_PROMPT,
                    },
                    Part::Inline {
                        inline_data: InlineData {
                            mime_type: &payload.mime_type,
                            data: &payload.data,
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: response_schema(),
            },
        };

        tracing::debug!(model = %self.model, mime_type = %payload.mime_type, "calling generateContent");

        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = match serde_json::from_str::<ApiErrorEnvelope>(&body) {
                Ok(envelope) => match envelope.error.status {
                    Some(code) => format!("{} ({})", envelope.error.message, code),
                    None => envelope.error.message,
                },
                Err(_) if body.trim().is_empty() => format!("model API returned status {}", status),
                Err(_) => format!("model API returned status {}: {}", status, body.trim()),
            };
            return Err(ExtractionError::Server(message));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| ExtractionError::InvalidResponseFormat(e.to_string()))?;

        extract_text(parsed)
    }
}

fn extract_text(response: GenerateContentResponse) -> Result<String, ExtractionError> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates".to_string());
        return Err(ExtractionError::Server(format!(
            "the model returned no content ({})",
            reason
        )));
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate
            .finish_reason
            .unwrap_or_else(|| "empty response".to_string());
        return Err(ExtractionError::Server(format!(
            "the model returned no content ({})",
            reason
        )));
    }

    Ok(text.trim().to_string())
}
