use thiserror::Error;

/// Main error type for the agent
#[derive(Error, Debug)]
pub enum FluxError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Data collection errors
    #[error("No data available: {0}")]
    NotFound(String),

    #[error("Source {source_name} failed: {reason}")]
    Source { source_name: String, reason: String },

    // Collaborator errors
    #[error("Analysis failed: {0}")]
    Analysis(String),

    #[error("Order rejected: {0}")]
    OrderRejected(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl FluxError {
    /// Build a source failure tagged with the provider name
    pub fn source_failure(source_name: &str, reason: impl Into<String>) -> Self {
        FluxError::Source {
            source_name: source_name.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FluxError::NotFound(_))
    }
}

/// Result type alias for FluxError
pub type Result<T> = std::result::Result<T, FluxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_error_display() {
        let err = FluxError::source_failure("binance", "unexpected status code: 503");
        assert_eq!(
            err.to_string(),
            "Source binance failed: unexpected status code: 503"
        );
    }

    #[test]
    fn test_not_found_predicate() {
        assert!(FluxError::NotFound("token info for BTC".into()).is_not_found());
        assert!(!FluxError::Cancelled.is_not_found());
    }
}
