use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Device responded {status} -> {body}")]
    Http { status: u16, body: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Unexpected response from {endpoint}: {message}")]
    ResponseError { endpoint: String, message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Timed out waiting for {operation}")]
    Timeout { operation: String },

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Background task failed: {0}")]
    TaskError(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Device,
    Input,
    Configuration,
    System,
}

impl DeviceError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            DeviceError::RequestError(_) | DeviceError::Timeout { .. } => ErrorCategory::Network,
            DeviceError::Http { .. } | DeviceError::ResponseError { .. } => ErrorCategory::Device,
            DeviceError::InvalidInput { .. } => ErrorCategory::Input,
            DeviceError::UrlError(_)
            | DeviceError::ConfigValidationError { .. }
            | DeviceError::InvalidConfigValueError { .. }
            | DeviceError::MissingConfigError { .. } => ErrorCategory::Configuration,
            DeviceError::IoError(_)
            | DeviceError::SerializationError(_)
            | DeviceError::TaskError(_) => ErrorCategory::System,
        }
    }

    /// HTTP status returned by the device, if the failure was a rejection.
    pub fn status(&self) -> Option<u16> {
        match self {
            DeviceError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self, DeviceError::Http { .. })
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            DeviceError::RequestError(e) if e.is_timeout() => {
                "The device did not answer in time".to_string()
            }
            DeviceError::RequestError(e) if e.is_connect() => {
                "Could not connect to the device".to_string()
            }
            DeviceError::Http { status, body } => {
                format!("The device rejected the request ({}): {}", status, body)
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check that the device is powered and reachable on the network",
            ErrorCategory::Device => "Check the request values against the device's accepted ranges",
            ErrorCategory::Input => "Check the command arguments and input files",
            ErrorCategory::Configuration => "Check the device profile and command line options",
            ErrorCategory::System => "Check file permissions and available disk space",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::Input | ErrorCategory::Configuration => 2,
            ErrorCategory::Network => 3,
            ErrorCategory::Device => 4,
            ErrorCategory::System => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, DeviceError>;
