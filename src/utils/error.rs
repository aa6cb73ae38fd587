use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}: {body}")]
    HttpStatusError {
        status: u16,
        url: String,
        body: String,
    },

    #[error("Rate limit still active after {attempts} attempts: {url}")]
    RateLimitExceeded { url: String, attempts: u32 },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Schema mismatch: required column '{column}' is missing from transformed data")]
    SchemaMismatch { column: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Warehouse error: {message}")]
    WarehouseError { message: String },

    #[error("Domain '{domain}' failed: {source}")]
    DomainError {
        domain: String,
        #[source]
        source: Box<EtlError>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Configuration,
    Data,
    Storage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// Exit code of a failed run; every severity is non-zero.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ApiError(_)
            | EtlError::HttpStatusError { .. }
            | EtlError::RateLimitExceeded { .. } => ErrorCategory::Network,
            EtlError::ConfigError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            EtlError::ProcessingError { .. }
            | EtlError::SchemaMismatch { .. }
            | EtlError::ValidationError { .. } => ErrorCategory::Data,
            EtlError::CsvError(_) | EtlError::IoError(_) | EtlError::WarehouseError { .. } => {
                ErrorCategory::Storage
            }
            EtlError::DomainError { source, .. } => source.category(),
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 暫時性錯誤，重跑通常可以恢復
            EtlError::ApiError(_)
            | EtlError::HttpStatusError { .. }
            | EtlError::RateLimitExceeded { .. } => ErrorSeverity::Medium,
            EtlError::ProcessingError { .. }
            | EtlError::ValidationError { .. }
            | EtlError::WarehouseError { .. }
            | EtlError::CsvError(_) => ErrorSeverity::High,
            EtlError::ConfigError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::SchemaMismatch { .. }
            | EtlError::IoError(_) => ErrorSeverity::Critical,
            EtlError::DomainError { source, .. } => source.severity(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EtlError::ApiError(_) => "Check network connectivity and the shop API endpoint",
            EtlError::HttpStatusError { status, .. } if *status == 401 || *status == 403 => {
                "Check the API key and password for this domain"
            }
            EtlError::HttpStatusError { .. } => {
                "Re-run later; the watermark was not advanced for this domain"
            }
            EtlError::RateLimitExceeded { .. } => {
                "Raise fetch.rate_limit_max_retries or re-run when the API quota resets"
            }
            EtlError::CsvError(_) | EtlError::IoError(_) => {
                "Check the warehouse directory exists and is writable"
            }
            EtlError::ConfigError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::ConfigValidationError { .. } => {
                "Fix the configuration file or the SHOPIFY_* environment variables"
            }
            EtlError::ProcessingError { .. } | EtlError::ValidationError { .. } => {
                "Inspect the offending order payload; nothing was loaded for this domain"
            }
            EtlError::SchemaMismatch { .. } => {
                "The API payload no longer carries a required field; update the column mapping"
            }
            EtlError::WarehouseError { .. } => {
                "Check warehouse credentials and that the destination table exists"
            }
            EtlError::DomainError { source, .. } => source.recovery_suggestion(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EtlError::DomainError { domain, source } => {
                format!("[{}] {}", domain, source.user_friendly_message())
            }
            EtlError::RateLimitExceeded { attempts, .. } => {
                format!("The shop API kept rate limiting us ({} attempts)", attempts)
            }
            EtlError::SchemaMismatch { column } => {
                format!("Orders are missing the required column '{}'", column)
            }
            other => other.to_string(),
        }
    }

    /// 加上 domain 名稱，方便從日誌追查是哪一條產品線失敗
    pub fn in_domain(self, domain: &str) -> Self {
        EtlError::DomainError {
            domain: domain.to_string(),
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_error_delegates_to_source() {
        let err = EtlError::SchemaMismatch {
            column: "tags".to_string(),
        }
        .in_domain("rugby");

        assert_eq!(err.category(), ErrorCategory::Data);
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert!(err.user_friendly_message().starts_with("[rugby]"));
        assert!(err.to_string().contains("tags"));
    }

    #[test]
    fn test_every_failure_exits_non_zero() {
        let rate_limited = EtlError::RateLimitExceeded {
            url: "https://shop.example.com/orders.json".to_string(),
            attempts: 6,
        }
        .in_domain("foot");
        assert_eq!(rate_limited.severity().exit_code(), 2);

        let warehouse = EtlError::WarehouseError {
            message: "load job failed".to_string(),
        };
        assert_eq!(warehouse.severity().exit_code(), 1);

        let config = EtlError::MissingConfigError {
            field: "SHOPIFY_FOOT_ENDPOINT".to_string(),
        };
        assert_eq!(config.severity().exit_code(), 3);
    }

    #[test]
    fn test_auth_failures_get_credential_hint() {
        let err = EtlError::HttpStatusError {
            status: 401,
            url: "https://shop.example.com/orders.json".to_string(),
            body: String::new(),
        };
        assert_eq!(err.category(), ErrorCategory::Network);
        assert!(err.recovery_suggestion().contains("API key"));
    }
}
