use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Date parsing error: {0}")]
    DateParse(#[from] chrono::ParseError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid date range: start {start} must precede end {end}")]
    InvalidDateRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    #[error("Band name collision: '{band}' already exists in the target schema")]
    BandCollision { band: String },

    #[error("Unknown band '{band}' in {context}")]
    UnknownBand { band: String, context: String },

    #[error("Grid mismatch: {0}")]
    GridMismatch(String),

    #[error("Invalid geometry for region '{region_id}': {message}")]
    InvalidGeometry { region_id: String, message: String },

    #[error("Region validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Missing required data: {0}")]
    MissingData(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Processing cancelled")]
    Cancelled,

    #[error("Async task error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}
