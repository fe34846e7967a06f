use http::StatusCode;
use thiserror::Error;

/// Body decoding error.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error while persisting a file part.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The underlying transport stream failed.
    #[error(transparent)]
    BoxError(#[from] Box<dyn std::error::Error + Send + Sync>),

    /// Content type is not one of the recognized families.
    #[error("unsupported media type `{0}`")]
    UnsupportedMediaType(String),

    /// Malformed request payload.
    #[error("bad request: {0}")]
    BadRequest(&'static str),

    /// Buffered-body or total-request cap exceeded.
    #[error("payload is too large, limit to `{0}`")]
    PayloadTooLarge(u64),

    /// A part's header block exceeds its cap.
    #[error("part header block is too large, limit to `{0}`")]
    HeaderTooLarge(usize),

    /// No free file name found within the rename retry cap.
    #[error("unable to resolve a free name for `{0}`")]
    RenameLimit(String),
}

impl Error {
    /// The HTTP status a caller can echo for protocol errors.
    ///
    /// `None` for internal failures (IO, transport, rename exhaustion),
    /// which should not be mapped to a client-facing status.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::UnsupportedMediaType(_) => Some(StatusCode::UNSUPPORTED_MEDIA_TYPE),
            Error::BadRequest(_) => Some(StatusCode::BAD_REQUEST),
            Error::PayloadTooLarge(_) => Some(StatusCode::PAYLOAD_TOO_LARGE),
            Error::HeaderTooLarge(_) => Some(StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE),
            _ => None,
        }
    }
}
