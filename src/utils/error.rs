use thiserror::Error;

/// 傳輸層錯誤：非 2xx 回應帶有 HTTP 狀態碼，其餘為網路或逾時錯誤
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Request timed out: {message}")]
    Timeout { message: String },

    #[error("Network error: {message}")]
    Network { message: String },
}

impl TransportError {
    /// 取得 HTTP 狀態碼（若有）
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 伺服器回應中的 `message` 欄位
    pub fn server_message(&self) -> Option<String> {
        match self {
            TransportError::Status { body, .. } => serde_json::from_str::<serde_json::Value>(body)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string)),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout {
                message: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            TransportError::Status {
                status: status.as_u16(),
                body: String::new(),
            }
        } else {
            TransportError::Network {
                message: err.to_string(),
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("API request failed: {0}")]
    ApiError(#[from] TransportError),

    #[error("Request to {path} was rejected again after refreshing credentials")]
    UnauthorizedError { path: String },

    #[error("Credential refresh failed: {reason}")]
    RefreshFailedError { status: Option<u16>, reason: String },

    #[error("Session invalidated: {message}")]
    SessionInvalidatedError { message: String },

    #[error("Credential refresh superseded: {reason}")]
    RefreshSupersededError { reason: String },

    #[error("Invalid request: {message}")]
    InvalidRequestError { message: String },

    #[error("Sign-in rejected: {message}")]
    SignInRejectedError { status: Option<u16>, message: String },

    #[error("Credential store error: {message}")]
    CredentialStoreError { message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for {field}: {message}")]
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
    Network,
    Authentication,
    Session,
    Request,
    Storage,
    Configuration,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl GatewayError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            GatewayError::ApiError(_) => ErrorCategory::Network,
            GatewayError::UnauthorizedError { .. }
            | GatewayError::RefreshFailedError { .. }
            | GatewayError::SignInRejectedError { .. } => ErrorCategory::Authentication,
            GatewayError::SessionInvalidatedError { .. }
            | GatewayError::RefreshSupersededError { .. } => ErrorCategory::Session,
            GatewayError::InvalidRequestError { .. } => ErrorCategory::Request,
            GatewayError::CredentialStoreError { .. } | GatewayError::IoError(_) => {
                ErrorCategory::Storage
            }
            GatewayError::SerializationError(_) => ErrorCategory::Data,
            GatewayError::ConfigError { .. }
            | GatewayError::ConfigValidationError { .. }
            | GatewayError::InvalidConfigValueError { .. }
            | GatewayError::MissingConfigError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            GatewayError::ApiError(TransportError::Status { status, .. }) if *status < 500 => {
                ErrorSeverity::Low
            }
            GatewayError::ApiError(_) => ErrorSeverity::Medium,
            GatewayError::InvalidRequestError { .. }
            | GatewayError::SerializationError(_)
            | GatewayError::RefreshSupersededError { .. } => ErrorSeverity::Medium,
            GatewayError::UnauthorizedError { .. }
            | GatewayError::RefreshFailedError { .. }
            | GatewayError::SessionInvalidatedError { .. }
            | GatewayError::SignInRejectedError { .. } => ErrorSeverity::High,
            GatewayError::CredentialStoreError { .. }
            | GatewayError::IoError(_)
            | GatewayError::ConfigError { .. }
            | GatewayError::ConfigValidationError { .. }
            | GatewayError::InvalidConfigValueError { .. }
            | GatewayError::MissingConfigError { .. } => ErrorSeverity::Critical,
        }
    }

    /// 是否已導致登入狀態被清除
    pub fn ends_session(&self) -> bool {
        matches!(
            self,
            GatewayError::UnauthorizedError { .. }
                | GatewayError::RefreshFailedError { .. }
                | GatewayError::SessionInvalidatedError { .. }
        )
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            GatewayError::ApiError(err) => match err.server_message() {
                Some(message) => message,
                None => format!("The server could not complete the request ({})", err),
            },
            GatewayError::UnauthorizedError { .. } | GatewayError::RefreshFailedError { .. } => {
                "Your session has expired. Please sign in again.".to_string()
            }
            GatewayError::SessionInvalidatedError { message } => message.clone(),
            GatewayError::RefreshSupersededError { .. } => {
                "The session changed while this request was in progress. Please retry.".to_string()
            }
            GatewayError::SignInRejectedError { message, .. } => message.clone(),
            GatewayError::InvalidRequestError { message } => message.clone(),
            GatewayError::CredentialStoreError { .. } | GatewayError::IoError(_) => {
                "Stored credentials could not be read or written".to_string()
            }
            GatewayError::SerializationError(_) => {
                "The server returned data in an unexpected format".to_string()
            }
            GatewayError::ConfigError { .. }
            | GatewayError::ConfigValidationError { .. }
            | GatewayError::InvalidConfigValueError { .. }
            | GatewayError::MissingConfigError { .. } => format!("Configuration problem: {}", self),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check the network connection and the API base URL, then retry",
            ErrorCategory::Authentication | ErrorCategory::Session => {
                "Run `whgate login` to start a new session"
            }
            ErrorCategory::Request => "Check the request path and arguments",
            ErrorCategory::Storage => "Check that the credentials file location is writable",
            ErrorCategory::Configuration => "Fix the configuration file and try again",
            ErrorCategory::Data => "The API contract may have changed; check the server version",
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_status_and_message() {
        let err = TransportError::Status {
            status: 400,
            body: r#"{"message":"Số lượng không hợp lệ"}"#.to_string(),
        };
        assert_eq!(err.status(), Some(400));
        assert_eq!(err.server_message().as_deref(), Some("Số lượng không hợp lệ"));

        let err = TransportError::Network {
            message: "connection refused".to_string(),
        };
        assert_eq!(err.status(), None);
        assert!(err.server_message().is_none());
    }

    #[test]
    fn test_error_classification() {
        let refresh = GatewayError::RefreshFailedError {
            status: Some(400),
            reason: "bad refresh token".to_string(),
        };
        assert_eq!(refresh.category(), ErrorCategory::Authentication);
        assert_eq!(refresh.severity(), ErrorSeverity::High);
        assert!(refresh.ends_session());

        let not_found = GatewayError::ApiError(TransportError::Status {
            status: 404,
            body: String::new(),
        });
        assert_eq!(not_found.category(), ErrorCategory::Network);
        assert_eq!(not_found.severity(), ErrorSeverity::Low);
        assert!(!not_found.ends_session());

        let superseded = GatewayError::RefreshSupersededError {
            reason: "signed in again".to_string(),
        };
        assert_eq!(superseded.category(), ErrorCategory::Session);
        assert_eq!(superseded.severity(), ErrorSeverity::Medium);
        assert!(!superseded.ends_session());

        let config = GatewayError::MissingConfigError {
            field: "api.base_url".to_string(),
        };
        assert_eq!(config.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_user_friendly_message_prefers_server_message() {
        let err = GatewayError::ApiError(TransportError::Status {
            status: 422,
            body: r#"{"message":"Phiếu đã hoàn thành"}"#.to_string(),
        });
        assert_eq!(err.user_friendly_message(), "Phiếu đã hoàn thành");
    }
}
