use serde::{Deserialize, Serialize};

use crate::models::EncodedPayload;

/// Body of a bridge extraction request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractRequest {
    #[serde(default)]
    pub file_data: Option<EncodedPayload>,
}

impl ExtractRequest {
    pub fn new(payload: EncodedPayload) -> Self {
        Self {
            file_data: Some(payload),
        }
    }

    /// The payload, if both its data and media type are present.
    pub fn payload(&self) -> Option<&EncodedPayload> {
        self.file_data
            .as_ref()
            .filter(|p| !p.data.is_empty() && !p.mime_type.is_empty())
    }
}

/// Body returned with every non-200 bridge response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
    pub credential_configured: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_shape() {
        let request = ExtractRequest::new(EncodedPayload {
            data: "AAEC".to_string(),
            mime_type: "application/pdf".to_string(),
        });
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["fileData"]["data"], "AAEC");
        assert_eq!(json["fileData"]["mimeType"], "application/pdf");
    }

    #[test]
    fn test_payload_requires_both_fields() {
        let request: ExtractRequest =
            serde_json::from_str(r#"{"fileData":{"data":"","mimeType":"image/png"}}"#).unwrap();
        assert!(request.payload().is_none());

        let request: ExtractRequest = serde_json::from_str("{}").unwrap();
        assert!(request.payload().is_none());

        let request: ExtractRequest =
            serde_json::from_str(r#"{"fileData":{"data":"AA==","mimeType":"image/png"}}"#)
                .unwrap();
        assert!(request.payload().is_some());
    }
}
