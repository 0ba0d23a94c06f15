mod billing;
mod config;
mod format;
mod upload;

pub use billing::{BILLING_COLUMNS, BillingRow, ExtractedTable};
pub use config::{
    BatchConfig, BridgeConfig, Config, DEFAULT_API_KEY_ENV, DEFAULT_BRIDGE_URL,
    DEFAULT_GEMINI_API_BASE, DEFAULT_GEMINI_MODEL, DEFAULT_SERVER_PATH, DEFAULT_SERVER_PORT,
    GeminiConfig, OutputConfig, ServerConfig,
};
pub use format::OutputFormat;
pub use upload::{
    ACCEPTED_MEDIA_TYPES, EncodedPayload, FALLBACK_MEDIA_TYPE, FileContent, FileId, UploadedFile,
    guess_media_type, is_accepted_media_type,
};
