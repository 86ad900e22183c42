use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("CONNECTION_FAILED: {0}")]
    Connection(String),
    #[error("QUERY_FAILED: {0}")]
    Query(String),
    #[error("CONFIG_INVALID: {0}")]
    Config(String),
    #[error("IO_FAILURE: {0}")]
    Io(String),
    #[error("NOT_FOUND: {0}")]
    NotFound(String),
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Query(value.to_string())
    }
}

#[cfg(feature = "mysql")]
impl From<mysql::Error> for AppError {
    fn from(value: mysql::Error) -> Self {
        Self::Query(value.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(value: serde_yaml::Error) -> Self {
        Self::Config(value.to_string())
    }
}

impl AppError {
    /// Driver or reason text without the code prefix, for inline display.
    pub fn detail(&self) -> &str {
        match self {
            Self::Connection(message)
            | Self::Query(message)
            | Self::Config(message)
            | Self::Io(message)
            | Self::NotFound(message)
            | Self::Internal(message) => message,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
