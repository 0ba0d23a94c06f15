//! Error types for the billing table extractor.

use thiserror::Error;

/// Errors raised while turning a file into an encoded payload.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("could not read {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors related to the extraction service.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("{0}")]
    Transport(String),

    /// Non-success status from the bridge or the model API, message verbatim.
    #[error("{0}")]
    Server(String),

    #[error("The API key environment variable {0} is not configured.")]
    MissingCredential(String),

    #[error("invalid response format: {0}")]
    InvalidResponseFormat(String),
}

impl From<reqwest::Error> for ExtractionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ExtractionError::Transport(format!("request timed out: {}", e))
        } else if e.is_connect() {
            ExtractionError::Transport(format!(
                "could not connect to the extraction service: {}",
                e
            ))
        } else {
            ExtractionError::Transport(e.to_string())
        }
    }
}

/// Anything that can fail for a single file in a batch.
#[derive(Debug, Error)]
pub enum FileError {
    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

/// Errors related to the analysis session state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("no files selected")]
    EmptySelection,

    #[error("an analysis is already in progress")]
    AnalysisInProgress,

    #[error("no analysis is in progress")]
    NoAnalysisInProgress,
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Errors related to CSV export and clipboard copy.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("nothing to export")]
    Empty,

    #[error("clipboard error: {0}")]
    Clipboard(String),
}

/// Errors raised while running the bridge server.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),

    #[error("extraction client error: {0}")]
    Client(#[from] ExtractionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_message_is_verbatim() {
        let err = ExtractionError::Server("quota exceeded".to_string());
        assert_eq!(err.to_string(), "quota exceeded");
    }

    #[test]
    fn test_missing_credential_names_variable() {
        let err = ExtractionError::MissingCredential("API_KEY".to_string());
        assert!(err.to_string().contains("API_KEY"));
    }

    #[test]
    fn test_file_error_is_transparent() {
        let err: FileError = ExtractionError::InvalidResponseFormat("not an array".into()).into();
        assert_eq!(err.to_string(), "invalid response format: not an array");

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: FileError = EncodeError::Io {
            name: "a.pdf".to_string(),
            source: io,
        }
        .into();
        assert_eq!(err.to_string(), "could not read a.pdf: gone");
    }
}
