//! Error definitions shared by every transform component.

use thiserror::Error;

/// Result type for transform operations.
pub type BridgeResult<T> = Result<T, TransformError>;

/// Errors that can occur while translating between the message models.
#[derive(Debug, Error)]
pub enum TransformError {
    /// Protocol version string carried no `/` separator. There is no safe
    /// default version to assume, so this is fatal.
    #[error("malformed protocol version {0:?}, expected the form \"HTTP/x.y\"")]
    MalformedVersion(String),

    /// The structured URI's string form did not parse back into a unified URI.
    #[error("invalid URI: {0}")]
    InvalidUri(#[from] url::ParseError),

    /// Status code outside the representable HTTP range.
    #[error("invalid status code {0}")]
    InvalidStatus(u16),

    /// An argument-tree leaf matched the upload heuristic but its fields
    /// could not be read as upload metadata.
    #[error("invalid upload descriptor at {path}: {reason}")]
    InvalidUploadDescriptor { path: String, reason: String },

    /// An uploaded-file entity hides its temporary file location, so the
    /// unified upload descriptor cannot be reconstructed from it.
    #[error("cannot reconstruct upload descriptor at {path}: entity does not expose its temporary file location")]
    UploadRoundTripUnsupported { path: String },

    /// A body stream was requested after the source was consumed, or the
    /// body was never backed by a stream resource.
    #[error("body unavailable: {0}")]
    BodyUnavailable(String),
}
