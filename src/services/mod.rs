mod batch;
mod encoder;
mod export;
mod extraction;
mod session;

pub use batch::{
    BatchOrchestrator, BatchResult, FailureKind, FileFailure, FileOutcome,
    PROCESSING_FAILED_PREFIX, TABLE_NOT_FOUND_MESSAGE, TableResult, process_file,
};
pub use encoder::{collect_uploads, encode};
pub use export::{
    COPY_CONFIRMATION, CopyConfirmation, copy_to_clipboard, csv_file_name, export_csv,
    export_tables, tables_to_csv, to_csv,
};
pub use extraction::{
    BridgeExtractor, GeminiExtractor, TableExtractor, create_extractor, decode_rows,
};
pub use session::{AnalysisSession, CardState};
