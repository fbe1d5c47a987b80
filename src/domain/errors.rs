//! Domain Errors

use std::io;
use thiserror::Error;

/// Failures while reading a request off the wire.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("read timed out")]
    Timeout,
    #[error("stream ended in the middle of a request")]
    Incomplete,
    #[error("malformed request line: {0:?}")]
    MalformedRequestLine(String),
    #[error("malformed header line: {0:?}")]
    MalformedHeader(String),
    #[error("request is not valid utf-8")]
    InvalidEncoding,
    #[error("invalid content-length: {0:?}")]
    InvalidContentLength(String),
    #[error("line exceeds {0} bytes")]
    LineTooLong(usize),
    #[error("body of {got} bytes exceeds the limit of {limit} bytes")]
    BodyTooLarge { got: u64, limit: u64 },
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl CodecError {
    /// Transport-level failures: the peer stalled or went away.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Timeout | Self::Incomplete | Self::Io(_))
    }
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("invalid route pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        source: regex_lite::Error,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum ResponseError {
    #[error("unknown status code {0}")]
    UnknownStatus(u16),
}

#[derive(Debug, Error)]
pub enum BindError {
    #[error("request has no body to decode")]
    MissingBody,
    #[error("request body is not valid json: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("server already started")]
    AlreadyStarted,
    #[error("server not started yet")]
    NotStarted,
    #[error(transparent)]
    Io(#[from] io::Error),
}
