use thiserror::Error;

/// Failures that stop a run before or after the assignment pass.
///
/// Problems with individual performer rows are never reported here; they
/// surface as declined outcomes instead.
#[derive(Debug, Error)]
pub enum AssignError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("config file error: {0}")]
    ConfigFormat(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("input is missing the '{0}' column")]
    MissingColumn(&'static str),
}

pub type Result<T> = std::result::Result<T, AssignError>;
