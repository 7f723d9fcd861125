//! Blobsim Core - synthetic upload bodies for capacity testing
//!
//! Provides seekable byte streams of arbitrary nominal size that synthesize
//! their content on demand, optional read pacing to emulate constrained
//! links, and a concurrent driver that pushes many such streams through an
//! upload sink.

pub mod clock;
pub mod config;
pub mod content;
pub mod pacing;
pub mod schedule;
pub mod stream;
pub mod tracing_setup;
pub mod upload;

// Re-export main types for convenient access
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BlobsimConfig, StreamConfig, UploadConfig};
pub use content::ContentMode;
pub use pacing::{PacingStrategy, RateLimit};
pub use stream::{StreamBuilder, StreamError, SyntheticByteStream, Whence};
pub use upload::{
    DiscardSink, UploadError, UploadJob, UploadPlan, UploadReport, UploadSink, run_uploads,
};

/// Errors that can bubble up from any blobsim component.
#[derive(Debug, thiserror::Error)]
pub enum BlobsimError {
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BlobsimError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            BlobsimError::Stream(StreamError::InvalidArgument { reason }) => {
                format!("Invalid stream setting: {reason}")
            }
            BlobsimError::Upload(e) => match e {
                UploadError::ShortUpload {
                    name,
                    expected,
                    actual,
                } => format!("Upload {name} stopped after {actual} of {expected} bytes"),
                UploadError::Stream(StreamError::InvalidArgument { reason }) => {
                    format!("Invalid stream setting: {reason}")
                }
                _ => "Upload failed".to_string(),
            },
            BlobsimError::Configuration { reason } => format!("Configuration error: {reason}"),
            BlobsimError::Io(_) => "File system error occurred".to_string(),
            BlobsimError::Serialization(_) => "Could not encode report".to_string(),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            BlobsimError::Configuration { .. }
                | BlobsimError::Stream(_)
                | BlobsimError::Upload(UploadError::Stream(_))
        )
    }
}

pub type Result<T> = std::result::Result<T, BlobsimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_errors_are_classified() {
        let invalid = BlobsimError::from(StreamError::InvalidArgument {
            reason: "chunk size must be greater than zero".to_string(),
        });
        assert!(invalid.is_user_error());
        assert_eq!(
            invalid.user_message(),
            "Invalid stream setting: chunk size must be greater than zero"
        );

        let short = BlobsimError::from(UploadError::ShortUpload {
            name: "test0".to_string(),
            expected: 10,
            actual: 4,
        });
        assert!(!short.is_user_error());
        assert_eq!(short.user_message(), "Upload test0 stopped after 4 of 10 bytes");
    }
}
