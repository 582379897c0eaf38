use thiserror::Error;

/// The full error taxonomy for the backup engine.
///
/// Audit findings are not represented here: `RemoteAuditor` returns its
/// warnings and errors by value rather than raising, since an inconsistent
/// remote should never abort a backup run outright.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("config error: {0}")]
    Config(String),

    #[error("integrity error: {0}")]
    Integrity(String),

    #[error("unsupported file kind at {path}")]
    UnsupportedFileKind { path: String },

    #[error("object already exists: {key}")]
    AlreadyExists { key: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, BackupError>;
