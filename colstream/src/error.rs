use crate::types::FrameKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ColstreamError {
    #[error("Schema Mismatch: {reason}")]
    SchemaMismatch { reason: String },

    #[error("Nullability Violation: null at row {row} of a non-nullable column")]
    NullabilityViolation { row: usize },

    #[error("Index Out Of Range: {index} (length {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Malformed Stream: {reason}")]
    MalformedStream { reason: String },

    #[error("Stream Closed")]
    StreamClosed,

    #[error("Frame Too Large: {frame} frame of {len} bytes exceeds the limit of {limit}")]
    FrameTooLarge {
        frame: FrameKind,
        len: usize,
        limit: u32,
    },

    #[error("IO Error in {frame} frame")]
    IOError {
        frame: FrameKind,
        #[source]
        source: std::io::Error,
    },

    #[error("Numeric Bounds Error")]
    BoundsError {
        #[from]
        source: std::num::TryFromIntError,
    },
}

impl ColstreamError {
    pub(crate) fn schema_mismatch<S: Into<String>>(reason: S) -> Self {
        Self::SchemaMismatch {
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed<S: Into<String>>(reason: S) -> Self {
        Self::MalformedStream {
            reason: reason.into(),
        }
    }

    pub(crate) fn io(frame: FrameKind) -> impl FnOnce(std::io::Error) -> Self {
        move |source| Self::IOError { frame, source }
    }
}

impl<I> nom::error::ParseError<I> for ColstreamError {
    fn from_error_kind(_input: I, kind: nom::error::ErrorKind) -> Self {
        Self::malformed(format!("parse error ({kind:?})"))
    }

    fn append(_input: I, _kind: nom::error::ErrorKind, other: Self) -> Self {
        other
    }
}

impl<I, E> nom::error::FromExternalError<I, E> for ColstreamError {
    fn from_external_error(_input: I, kind: nom::error::ErrorKind, _e: E) -> Self {
        Self::malformed(format!("parse error ({kind:?})"))
    }
}

impl<I> nom::error::ContextError<I> for ColstreamError {}

impl From<nom::Err<ColstreamError>> for ColstreamError {
    fn from(e: nom::Err<ColstreamError>) -> Self {
        match e {
            nom::Err::Incomplete(_) => Self::malformed("truncated frame"),
            nom::Err::Error(e) | nom::Err::Failure(e) => e,
        }
    }
}

pub type Result<T, E = ColstreamError> = std::result::Result<T, E>;
