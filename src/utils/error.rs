use thiserror::Error;

#[derive(Error, Debug)]
pub enum IanaError {
    #[error("Failed to fetch {url}: {message}")]
    FetchError { url: String, message: String },

    #[error("HTTP client error: {0}")]
    HttpClientError(#[from] reqwest::Error),

    #[error("Malformed record #{index} in {source_name}: {reason}")]
    MalformedRecordError {
        source_name: String,
        index: usize,
        reason: String,
    },

    #[error("Malformed document {source_name}: {reason}")]
    MalformedDocumentError { source_name: String, reason: String },

    #[error("Duplicate key {key} in {source_name}: {existing} conflicts with {incoming}")]
    DuplicateKeyError {
        source_name: String,
        key: String,
        existing: String,
        incoming: String,
    },

    #[error("Failed to write {path}: {source}")]
    WriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive error: {0}")]
    ArchiveError(#[source] std::io::Error),

    #[error("Pattern error: {0}")]
    PatternError(#[from] regex::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Fetch,
    Data,
    Storage,
    Config,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// 可重試 (網路、上游暫時失敗)
    Medium,
    /// 資料或設定錯誤，需人工處理
    High,
    /// 檔案系統層級的錯誤
    Critical,
}

impl IanaError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            IanaError::FetchError { .. } | IanaError::HttpClientError(_) => ErrorCategory::Fetch,
            IanaError::MalformedRecordError { .. }
            | IanaError::MalformedDocumentError { .. }
            | IanaError::DuplicateKeyError { .. } => ErrorCategory::Data,
            IanaError::WriteError { .. } | IanaError::IoError(_) | IanaError::ArchiveError(_) => {
                ErrorCategory::Storage
            }
            IanaError::ConfigError { .. }
            | IanaError::ConfigValidationError { .. }
            | IanaError::InvalidConfigValueError { .. }
            | IanaError::MissingConfigError { .. } => ErrorCategory::Config,
            IanaError::PatternError(_) => ErrorCategory::Internal,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Fetch => ErrorSeverity::Medium,
            ErrorCategory::Data | ErrorCategory::Config => ErrorSeverity::High,
            ErrorCategory::Storage | ErrorCategory::Internal => ErrorSeverity::Critical,
        }
    }

    /// 根據錯誤嚴重程度決定退出碼
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            IanaError::FetchError { url, message } => {
                format!("Could not download IANA registry from {}: {}", url, message)
            }
            IanaError::HttpClientError(e) => format!("Could not set up HTTP client: {}", e),
            IanaError::DuplicateKeyError {
                key,
                existing,
                incoming,
                ..
            } => format!(
                "Registry assigns {} to both {} and {}",
                key, existing, incoming
            ),
            IanaError::WriteError { path, source } => {
                format!("Could not write {}: {}", path, source)
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            IanaError::FetchError { .. } | IanaError::HttpClientError(_) => {
                "Check network connectivity and the upstream URL, then retry"
            }
            IanaError::MalformedRecordError { .. } | IanaError::MalformedDocumentError { .. } => {
                "The upstream registry format may have changed; inspect the saved XML"
            }
            IanaError::DuplicateKeyError { .. } => {
                "Report the conflict upstream or rerun with --on-conflict alias"
            }
            IanaError::WriteError { .. } | IanaError::IoError(_) | IanaError::ArchiveError(_) => {
                "Check that the output directory exists, is writable and has free space"
            }
            IanaError::ConfigError { .. }
            | IanaError::ConfigValidationError { .. }
            | IanaError::InvalidConfigValueError { .. }
            | IanaError::MissingConfigError { .. } => {
                "Fix the configuration file or command line arguments"
            }
            IanaError::PatternError(_) => "This is a bug, please report it",
        }
    }
}

pub type Result<T> = std::result::Result<T, IanaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_follow_category() {
        let fetch = IanaError::FetchError {
            url: "https://example.com".to_string(),
            message: "HTTP status 500".to_string(),
        };
        assert_eq!(fetch.category(), ErrorCategory::Fetch);
        assert_eq!(fetch.exit_code(), 2);

        let malformed = IanaError::MalformedRecordError {
            source_name: "services".to_string(),
            index: 3,
            reason: "port 'abc' is not a number".to_string(),
        };
        assert_eq!(malformed.exit_code(), 1);

        let write = IanaError::WriteError {
            path: "/out/services".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(write.severity(), ErrorSeverity::Critical);
        assert_eq!(write.exit_code(), 3);
    }

    #[test]
    fn test_duplicate_key_message_names_both_records() {
        let err = IanaError::DuplicateKeyError {
            source_name: "services".to_string(),
            key: "80/tcp".to_string(),
            existing: "record #1 'http'".to_string(),
            incoming: "record #4 'www'".to_string(),
        };

        let message = err.to_string();
        assert!(message.contains("record #1 'http'"));
        assert!(message.contains("record #4 'www'"));
        assert!(err.user_friendly_message().contains("80/tcp"));
    }
}
