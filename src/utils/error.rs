use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("Transport failure for {url}: {source}")]
    TransportError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("API returned status {status} for {url}")]
    ApiStatusError { url: String, status: u16 },

    #[error("Unexpected response shape from {url}: {reason} (observed keys: {keys:?})")]
    ApiShapeError {
        url: String,
        keys: Vec<String>,
        reason: String,
    },

    #[error("Failed to write {target}: {source}")]
    StorageError {
        target: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for {field} ({value:?}): {reason}")]
    ValidationError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Api,
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

impl CollectorError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CollectorError::TransportError { .. } => ErrorCategory::Network,
            CollectorError::ApiStatusError { .. } | CollectorError::ApiShapeError { .. } => {
                ErrorCategory::Api
            }
            CollectorError::StorageError { .. } => ErrorCategory::Storage,
            CollectorError::ConfigError { .. } | CollectorError::ValidationError { .. } => {
                ErrorCategory::Configuration
            }
        }
    }

    /// 決定 CLI 退出碼的嚴重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 網路或服務端暫時性問題，重新執行通常即可
            CollectorError::TransportError { .. } => ErrorSeverity::Medium,
            CollectorError::ApiStatusError { status, .. } if *status >= 500 => {
                ErrorSeverity::Medium
            }
            CollectorError::ApiStatusError { .. } | CollectorError::ApiShapeError { .. } => {
                ErrorSeverity::High
            }
            CollectorError::ConfigError { .. } | CollectorError::ValidationError { .. } => {
                ErrorSeverity::High
            }
            CollectorError::StorageError { .. } => ErrorSeverity::Critical,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            CollectorError::TransportError { url, .. } => {
                format!("Could not reach the survey API at {}", url)
            }
            CollectorError::ApiStatusError { url, status } => {
                format!("The survey API answered {} for {}", status, url)
            }
            CollectorError::ApiShapeError { url, keys, .. } => format!(
                "The survey API response from {} is missing `count` or `results` (got: {})",
                url,
                keys.join(", ")
            ),
            CollectorError::StorageError { target, .. } => {
                format!("Writing feedback to {} failed; nothing was replaced", target)
            }
            CollectorError::ConfigError { message } => format!("Configuration problem: {}", message),
            CollectorError::ValidationError { field, reason, .. } => {
                format!("Invalid {}: {}", field, reason)
            }
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            CollectorError::TransportError { .. } => {
                "Check network access and the API host's TLS certificate, then re-run"
            }
            CollectorError::ApiStatusError { status: 401, .. }
            | CollectorError::ApiStatusError { status: 403, .. } => {
                "Verify the API token passed with --token"
            }
            CollectorError::ApiStatusError { .. } => {
                "Check the API base URL and the provider's status page, then re-run"
            }
            CollectorError::ApiShapeError { .. } => {
                "The API contract may have changed; inspect the raw response for the listed keys"
            }
            CollectorError::StorageError { .. } => {
                "Check GOSPEL_DB_URL, database reachability and permissions on the target schema"
            }
            CollectorError::ConfigError { .. } => {
                "Check the config file and required environment variables"
            }
            CollectorError::ValidationError { .. } => "Correct the flagged argument and re-run",
        }
    }
}

pub type Result<T> = std::result::Result<T, CollectorError>;
