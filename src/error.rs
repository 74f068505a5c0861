use thiserror::Error;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Browser error: {0}")]
    BrowserError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Inference error: {0}")]
    InferenceError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

#[derive(Debug, PartialEq, Eq)]
pub enum RecoveryStrategy {
    RetryWithBackoff,
    FallbackToHttp,
    SkipArticle,
    Abort,
}

impl CrawlError {
    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            CrawlError::NetworkError(_) => RecoveryStrategy::RetryWithBackoff,
            CrawlError::BrowserError(_) => RecoveryStrategy::FallbackToHttp,
            CrawlError::ParseError(_) => RecoveryStrategy::SkipArticle,
            CrawlError::InferenceError(_) => RecoveryStrategy::SkipArticle,
            CrawlError::StorageError(_) => RecoveryStrategy::Abort,
            CrawlError::ConfigError(_) => RecoveryStrategy::Abort,
        }
    }
}

/// Recovery strategy for a boxed error, when it is a `CrawlError`.
pub fn recovery_for(err: &(dyn std::error::Error + Send + Sync + 'static)) -> Option<RecoveryStrategy> {
    err.downcast_ref::<CrawlError>().map(CrawlError::recovery_strategy)
}

// Conversion implementations for common error types
impl From<std::io::Error> for CrawlError {
    fn from(err: std::io::Error) -> Self {
        CrawlError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for CrawlError {
    fn from(err: serde_json::Error) -> Self {
        CrawlError::ParseError(err.to_string())
    }
}

impl From<toml::de::Error> for CrawlError {
    fn from(err: toml::de::Error) -> Self {
        CrawlError::ConfigError(err.to_string())
    }
}

impl From<reqwest::Error> for CrawlError {
    fn from(err: reqwest::Error) -> Self {
        CrawlError::NetworkError(err.to_string())
    }
}

impl From<chromiumoxide::error::CdpError> for CrawlError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        CrawlError::BrowserError(err.to_string())
    }
}
