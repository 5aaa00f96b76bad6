//! Error types for siftstream operations

use std::time::Duration;

use siftstream_domain::DomainError;

/// Result type alias for siftstream operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error raised by a caller-supplied event handler
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for siftstream operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An operation was called from a state that does not allow it
    #[error("Invalid usage: {0}")]
    InvalidUsage(String),

    /// The consumer factory does not know the requested protocol
    #[error("Consumer type \"{0}\" is unknown")]
    UnsupportedProtocol(String),

    /// Configuration could not be loaded
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Establishing the stream connection failed
    #[error("Connection failed: {0}")]
    Connect(#[from] ConnectError),

    /// Reading from an established stream failed
    #[error("Stream read failed: {0}")]
    Read(#[from] ReadError),

    /// A caller-supplied callback returned an error
    #[error("Event handler failed: {0}")]
    Handler(#[source] HandlerError),

    /// The API rejected the credentials
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// The API rate limit has been used up
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Any other non-2xx API response
    #[error("API error ({code}): {message}")]
    Api {
        /// HTTP status code
        code: u16,
        /// Server-provided or synthesised error text
        message: String,
    },

    /// A filter definition did not compile
    #[error("Compile failed: {0}")]
    CompileFailed(String),

    /// The async runtime was unavailable or the consumer task was cancelled
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Domain validation failed
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl Error {
    /// Create an invalid usage error
    pub fn invalid_usage(message: impl Into<String>) -> Self {
        Self::InvalidUsage(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an API error
    pub fn api(code: u16, message: impl Into<String>) -> Self {
        Self::Api {
            code,
            message: message.into(),
        }
    }
}

/// Failure to establish a stream connection
///
/// Never accompanied by a partially opened connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectError {
    /// The request could not be built (bad URL or header value)
    #[error("invalid stream request: {0}")]
    InvalidRequest(String),

    /// The handshake did not complete in time
    #[error("connection timed out after {0:?}")]
    Timeout(Duration),

    /// Refused, reset, DNS or TLS failure
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered the handshake with a non-2xx status
    #[error("HTTP {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Beginning of the response body
        body: String,
    },
}

impl ConnectError {
    /// True when the server answered with a non-2xx status
    pub fn is_http(&self) -> bool {
        matches!(self, ConnectError::Status { .. })
    }
}

/// Failure while reading frames from an open stream
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    /// The underlying connection dropped or failed mid-stream
    #[error("I/O error: {0}")]
    Io(String),

    /// A single line exceeded the configured frame size limit
    #[error("frame of {size} bytes exceeds the {limit} byte limit")]
    FrameTooLarge {
        /// Bytes buffered without a delimiter
        size: usize,
        /// Configured limit
        limit: usize,
    },
}

impl ReadError {
    /// Create an I/O error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }

    /// True when the connection went away rather than the data being bad
    ///
    /// A disconnect ends the session like a clean end of stream; anything
    /// else stops the consumer.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, ReadError::Io(_))
    }
}

impl From<std::io::Error> for ReadError {
    fn from(err: std::io::Error) -> Self {
        ReadError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnsupportedProtocol("ftp".into());
        assert_eq!(err.to_string(), "Consumer type \"ftp\" is unknown");

        let err = Error::api(500, "boom");
        assert_eq!(err.to_string(), "API error (500): boom");
    }

    #[test]
    fn test_connect_error_kind() {
        let http = ConnectError::Status {
            status: 404,
            body: "not found".into(),
        };
        assert!(http.is_http());
        assert!(!ConnectError::Transport("reset".into()).is_http());
    }

    #[test]
    fn test_read_error_kind() {
        assert!(ReadError::io("reset by peer").is_disconnect());
        assert!(
            !ReadError::FrameTooLarge {
                size: 32,
                limit: 16
            }
            .is_disconnect()
        );
    }

    #[test]
    fn test_domain_error_is_transparent() {
        let err: Error = DomainError::NoHashes.into();
        assert_eq!(
            err.to_string(),
            "No valid hashes found when creating the consumer"
        );
    }
}
