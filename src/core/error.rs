//! Error types for the log dispatch pipeline

pub type Result<T> = std::result::Result<T, LoggerError>;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// Message template could not be interpolated
    #[error("Format error in template '{template}': {message}")]
    Format { template: String, message: String },

    /// File handler error with path
    #[error("File handler error for '{path}': {message}")]
    FileHandlerError { path: String, message: String },

    /// File rotation error
    #[error("File rotation failed for '{path}': {message}")]
    FileRotationError { path: String, message: String },

    /// Socket could not be created or written
    #[error("Connectivity error for '{address}': {message}")]
    Connectivity { address: String, message: String },

    /// Handler panicked while processing a record
    #[error("Handler '{handler}' panicked: {message}")]
    HandlerPanic { handler: String, message: String },

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl LoggerError {
    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        LoggerError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create an interpolation error
    pub fn format(template: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::Format {
            template: template.into(),
            message: message.into(),
        }
    }

    /// Create a file handler error
    pub fn file_handler(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FileHandlerError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a file rotation error
    pub fn file_rotation(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FileRotationError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a connectivity error
    pub fn connectivity(address: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::Connectivity {
            address: address.into(),
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        LoggerError::Other(msg.into())
    }

    /// True for errors raised while assembling the pipeline
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, LoggerError::InvalidConfiguration { .. })
    }
}
