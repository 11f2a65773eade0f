use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("No file was attached to the upload request")]
    MissingFile,

    #[error("Reference service unavailable: {message}")]
    UpstreamUnavailable { message: String },

    #[error("No acceptable rows found in the uploaded file")]
    NoAcceptableRows,

    #[error("Invalid upload type: {value}")]
    InvalidUploadType { value: String },

    #[error("Invalid file name: {name}")]
    InvalidFileName { name: String },

    #[error("Column '{column}' required for {upload_type} uploads is missing (found: {available})")]
    SchemaMismatch {
        upload_type: String,
        column: String,
        available: String,
    },

    #[error("Failed to persist '{path}': {source}")]
    WriteFailure {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}' ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

pub type Result<T> = std::result::Result<T, UploadError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Request,
    Upstream,
    Data,
    Storage,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl UploadError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            UploadError::MissingFile
            | UploadError::InvalidUploadType { .. }
            | UploadError::InvalidFileName { .. } => ErrorCategory::Request,
            UploadError::UpstreamUnavailable { .. } | UploadError::ApiError(_) => {
                ErrorCategory::Upstream
            }
            UploadError::NoAcceptableRows
            | UploadError::SchemaMismatch { .. }
            | UploadError::CsvError(_)
            | UploadError::SerializationError(_) => ErrorCategory::Data,
            UploadError::WriteFailure { .. } | UploadError::IoError(_) => ErrorCategory::Storage,
            UploadError::ConfigError { .. }
            | UploadError::InvalidConfigValueError { .. }
            | UploadError::MissingConfigError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Request | ErrorCategory::Data => ErrorSeverity::High,
            // The caller can resubmit once the dependency service recovers.
            ErrorCategory::Upstream => ErrorSeverity::Medium,
            ErrorCategory::Storage | ErrorCategory::Configuration => ErrorSeverity::Critical,
        }
    }

    /// HTTP status reported by the error responder.
    pub fn status_code(&self) -> StatusCode {
        match self {
            UploadError::MissingFile
            | UploadError::InvalidUploadType { .. }
            | UploadError::InvalidFileName { .. } => StatusCode::BAD_REQUEST,
            UploadError::UpstreamUnavailable { .. } | UploadError::ApiError(_) => {
                StatusCode::BAD_GATEWAY
            }
            UploadError::NoAcceptableRows
            | UploadError::SchemaMismatch { .. }
            | UploadError::CsvError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            UploadError::MissingFile => "Attach a CSV file to the request and resubmit",
            UploadError::UpstreamUnavailable { .. } | UploadError::ApiError(_) => {
                "Check that the reference service is reachable, then resubmit the upload"
            }
            UploadError::NoAcceptableRows => {
                "Review the rejected rows; every row was rejected or the file was empty"
            }
            UploadError::InvalidUploadType { .. } => {
                "Name the file <prefix>_<clients|contacts|results>_<suffix>.csv"
            }
            UploadError::InvalidFileName { .. } => "Upload the file with a plain file name",
            UploadError::SchemaMismatch { .. } => {
                "Make sure the CSV header contains the configured identifier column"
            }
            UploadError::CsvError(_) => "Make sure the file is a well-formed CSV document",
            UploadError::WriteFailure { .. } | UploadError::IoError(_) => {
                "Check that the output directory exists and is writable"
            }
            UploadError::SerializationError(_) => "Report this problem to the maintainers",
            UploadError::ConfigError { .. }
            | UploadError::InvalidConfigValueError { .. }
            | UploadError::MissingConfigError { .. } => {
                "Fix the configuration file or command line arguments"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            UploadError::UpstreamUnavailable { .. } | UploadError::ApiError(_) => {
                "Could not load the list of known identifiers".to_string()
            }
            UploadError::WriteFailure { .. } | UploadError::IoError(_) => {
                "The accepted rows could not be saved".to_string()
            }
            other => other.to_string(),
        }
    }
}
